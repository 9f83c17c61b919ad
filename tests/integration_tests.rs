use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use pinned_lru::{Cache, CacheBuilder, Deleter, Handle, ShardedLruCache};

/// Deleter that counts its invocations.
fn counting_deleter<V: Send + Sync + 'static>(counter: &Arc<AtomicUsize>) -> Option<Deleter<V>> {
	let counter = Arc::clone(counter);
	Some(Box::new(move |_key, _value| {
		counter.fetch_add(1, Ordering::SeqCst);
	}))
}

/// Looks a key up and immediately releases it, reporting whether it was hit.
/// Still counts as a recency touch.
fn touch(cache: &ShardedLruCache<u64>, key: &[u8]) -> bool {
	match cache.lookup(key) {
		Some(handle) => {
			cache.release(handle);
			true
		}
		None => false,
	}
}

#[test]
fn test_insert_lookup_release_roundtrip() {
	let cache: ShardedLruCache<String> = ShardedLruCache::new(1024);

	let handle = cache.insert(b"key", "hello".to_string(), 5, None);
	assert_eq!(*cache.value(&handle), "hello");
	cache.release(handle);

	let handle = cache.lookup(b"key").expect("key should be cached");
	assert_eq!(*cache.value(&handle), "hello");
	cache.release(handle);

	assert!(cache.lookup(b"missing").is_none());
	assert!(cache.contains(b"key"));
	assert_eq!(cache.len(), 1);
	assert_eq!(cache.total_charge(), 5);
}

#[test]
fn test_erase_unmaps_but_destruction_waits_for_release() {
	let cache: ShardedLruCache<u64> = ShardedLruCache::new(1024);
	let deleted = Arc::new(AtomicUsize::new(0));

	let handle = cache.insert(b"k", 7, 10, counting_deleter(&deleted));
	cache.erase(b"k");

	// Unmapped immediately, destroyed lazily.
	assert!(cache.lookup(b"k").is_none());
	assert_eq!(cache.total_charge(), 0);
	assert_eq!(deleted.load(Ordering::SeqCst), 0);
	assert_eq!(*cache.value(&handle), 7);

	cache.release(handle);
	assert_eq!(deleted.load(Ordering::SeqCst), 1);

	// Erasing again is a no-op; the deleter never fires twice.
	cache.erase(b"k");
	assert_eq!(deleted.load(Ordering::SeqCst), 1);
}

#[test]
fn test_pinned_entries_survive_capacity_pressure() {
	// Capacity 100, single shard. Two pinned entries push usage to 120 with
	// nothing evictable; unpinning one makes it the eviction victim.
	let cache: ShardedLruCache<u64> = CacheBuilder::new(100).shards(1).build();

	let a = cache.insert(b"a", 1, 60, None);
	let b = cache.insert(b"b", 2, 60, None);
	assert_eq!(cache.total_charge(), 120);
	assert!(touch(&cache, b"a"));
	assert!(touch(&cache, b"b"));

	cache.release(a);
	let c = cache.insert(b"c", 3, 50, None);

	assert!(cache.lookup(b"a").is_none(), "unpinned entry should have been evicted");
	assert!(touch(&cache, b"b"));
	assert!(touch(&cache, b"c"));
	assert_eq!(cache.total_charge(), 110);

	cache.release(b);
	cache.release(c);
}

#[test]
fn test_least_recently_used_is_evicted_first() {
	let cache: ShardedLruCache<u64> = CacheBuilder::new(4).shards(1).build();

	for key in [b"k1", b"k2", b"k3", b"k4"] {
		let handle = cache.insert(key, 0, 1, None);
		cache.release(handle);
	}
	// Touch k1 so k2 becomes the oldest.
	assert!(touch(&cache, b"k1"));

	let handle = cache.insert(b"k5", 0, 1, None);
	cache.release(handle);

	assert!(!cache.contains(b"k2"), "oldest entry should be evicted");
	for key in [b"k1", b"k3", b"k4", b"k5"] {
		assert!(cache.contains(key), "{:?} should survive", key);
	}
}

#[test]
fn test_duplicate_insert_displaces_but_old_handle_stays_valid() {
	let cache: ShardedLruCache<u64> = ShardedLruCache::new(1024);
	let old_deleted = Arc::new(AtomicUsize::new(0));

	let old = cache.insert(b"k", 1, 10, counting_deleter(&old_deleted));
	let new = cache.insert(b"k", 2, 10, None);

	// Lookup resolves to the new value; only one mapping is charged.
	let current = cache.lookup(b"k").expect("key should be cached");
	assert_eq!(*cache.value(&current), 2);
	cache.release(current);
	assert_eq!(cache.len(), 1);
	assert_eq!(cache.total_charge(), 10);

	// The displaced entry is still pinned and readable.
	assert_eq!(old_deleted.load(Ordering::SeqCst), 0);
	assert_eq!(*cache.value(&old), 1);
	cache.release(old);
	assert_eq!(old_deleted.load(Ordering::SeqCst), 1);

	cache.release(new);
}

#[test]
fn test_oversized_entry_is_evicted_once_unpinned() {
	let cache: ShardedLruCache<u64> = CacheBuilder::new(10).shards(1).build();
	let deleted = Arc::new(AtomicUsize::new(0));

	// Larger than the whole cache; insert still succeeds and pins it.
	let big = cache.insert(b"big", 1, 100, counting_deleter(&deleted));
	assert_eq!(cache.total_charge(), 100);
	assert!(cache.contains(b"big"));

	cache.release(big);
	// Now evictable; the next insert pushes it out.
	let small = cache.insert(b"small", 2, 1, None);
	assert!(!cache.contains(b"big"));
	assert_eq!(deleted.load(Ordering::SeqCst), 1);
	assert_eq!(cache.total_charge(), 1);
	cache.release(small);
}

#[test]
fn test_prune_evicts_everything_unpinned() {
	let cache: ShardedLruCache<u64> = ShardedLruCache::new(1 << 20);

	for i in 0..100u64 {
		let handle = cache.insert(&i.to_be_bytes(), i, 1, None);
		cache.release(handle);
	}
	let pinned = cache.insert(b"pinned", 0, 1, None);
	assert_eq!(cache.len(), 101);

	cache.prune();

	assert_eq!(cache.len(), 1);
	assert_eq!(cache.total_charge(), 1);
	assert!(cache.contains(b"pinned"));
	cache.release(pinned);
}

#[test]
fn test_zero_capacity_disables_caching() {
	let cache: ShardedLruCache<u64> = CacheBuilder::new(0).shards(1).build();
	let deleted = Arc::new(AtomicUsize::new(0));

	let handle = cache.insert(b"k", 42, 10, counting_deleter(&deleted));

	// Never reachable by key, but the handle works normally.
	assert!(cache.lookup(b"k").is_none());
	assert!(!cache.contains(b"k"));
	assert_eq!(cache.total_charge(), 0);
	assert_eq!(*cache.value(&handle), 42);

	cache.release(handle);
	assert_eq!(deleted.load(Ordering::SeqCst), 1);
}

#[test]
fn test_drop_runs_remaining_deleters_exactly_once() {
	let deleted = Arc::new(AtomicUsize::new(0));
	{
		let cache: ShardedLruCache<u64> = ShardedLruCache::new(1024);
		for i in 0..10u64 {
			let handle = cache.insert(&i.to_be_bytes(), i, 1, counting_deleter(&deleted));
			cache.release(handle);
		}
		// One entry already destroyed by erase + no handles.
		cache.erase(&3u64.to_be_bytes());
		assert_eq!(deleted.load(Ordering::SeqCst), 1);
	}
	assert_eq!(deleted.load(Ordering::SeqCst), 10);
}

#[test]
fn test_deleter_receives_key_and_value() {
	let cache: ShardedLruCache<String> = ShardedLruCache::new(1024);
	let seen: Arc<parking_lot::Mutex<Vec<(Vec<u8>, String)>>> =
		Arc::new(parking_lot::Mutex::new(Vec::new()));

	let sink = Arc::clone(&seen);
	let handle = cache.insert(
		b"block:9",
		"payload".to_string(),
		7,
		Some(Box::new(move |key, value| {
			sink.lock().push((key.to_vec(), (*value).clone()));
		})),
	);
	cache.erase(b"block:9");
	cache.release(handle);

	let seen = seen.lock();
	assert_eq!(seen.len(), 1);
	assert_eq!(seen[0].0, b"block:9");
	assert_eq!(seen[0].1, "payload");
}

#[test]
fn test_deleter_may_reenter_the_cache() {
	let cache: Arc<ShardedLruCache<u64>> = Arc::new(ShardedLruCache::new(1024));

	let reentrant = Arc::clone(&cache);
	let handle = cache.insert(
		b"outer",
		1,
		1,
		Some(Box::new(move |_key, _value| {
			// Runs outside any shard lock, so this must not deadlock even
			// though it locks the same shard the eviction came from.
			let inner = reentrant.insert(b"outer", 2, 1, None);
			reentrant.release(inner);
		})),
	);
	cache.erase(b"outer");
	cache.release(handle);

	let handle = cache.lookup(b"outer").expect("deleter should have re-inserted");
	assert_eq!(*cache.value(&handle), 2);
	cache.release(handle);
}

#[test]
fn test_foreign_handle_is_rejected() {
	let issuer: ShardedLruCache<u64> = ShardedLruCache::new(1024);
	let other: ShardedLruCache<u64> = ShardedLruCache::new(1024);

	let handle = issuer.insert(b"k", 1, 1, None);
	let result = catch_unwind(AssertUnwindSafe(|| other.value(&handle)));
	assert!(result.is_err(), "reading a foreign handle should panic");

	issuer.release(handle);
}

#[test]
fn test_new_id_is_unique_across_threads() {
	let cache: Arc<ShardedLruCache<u64>> = Arc::new(ShardedLruCache::new(1024));
	let mut handles = vec![];

	for _ in 0..4 {
		let cache = cache.clone();
		handles.push(thread::spawn(move || {
			(0..1000).map(|_| cache.new_id()).collect::<Vec<u64>>()
		}));
	}

	let mut ids = Vec::new();
	for handle in handles {
		ids.extend(handle.join().expect("thread should not panic"));
	}
	ids.sort_unstable();
	let before = ids.len();
	ids.dedup();
	assert_eq!(ids.len(), before, "new_id must never repeat");
}

#[test]
fn test_metrics_track_operations() {
	let cache: ShardedLruCache<u64> = CacheBuilder::new(2).shards(1).build();

	let a = cache.insert(b"a", 1, 1, None);
	cache.release(a);
	let a2 = cache.insert(b"a", 2, 1, None);
	cache.release(a2);

	assert!(touch(&cache, b"a"));
	assert!(!touch(&cache, b"nope"));
	cache.erase(b"a");
	cache.erase(b"a"); // miss; not counted

	let b = cache.insert(b"b", 1, 2, None);
	cache.release(b);
	let c = cache.insert(b"c", 1, 2, None); // evicts b
	cache.release(c);

	let metrics = cache.metrics();
	assert_eq!(metrics.hits, 1);
	assert_eq!(metrics.misses, 1);
	assert_eq!(metrics.inserts, 3); // a, b, c
	assert_eq!(metrics.updates, 1); // a re-inserted
	assert_eq!(metrics.erasures, 1);
	assert_eq!(metrics.evictions, 1); // b
	assert_eq!(metrics.entry_count, 1);
	assert_eq!(metrics.current_charge, 2);
	assert_eq!(metrics.hit_rate(), 0.5);
	assert_eq!(metrics.utilization(), 1.0);
}

#[test]
fn test_works_through_trait_object() {
	let cache: Arc<dyn Cache<u64>> = Arc::new(ShardedLruCache::new(1024));

	let handle = cache.insert(b"k", 9, 1, None);
	assert_eq!(*cache.value(&handle), 9);
	cache.release(handle);
	assert_eq!(cache.total_charge(), 1);
	cache.erase(b"k");
	assert_eq!(cache.total_charge(), 0);
}

#[test]
fn test_value_arc_outlives_entry() {
	let cache: ShardedLruCache<Vec<u8>> = ShardedLruCache::new(1024);

	let handle = cache.insert(b"k", vec![1, 2, 3], 3, None);
	let value = cache.value(&handle);
	cache.erase(b"k");
	cache.release(handle);

	// Entry is gone; the Arc still is not.
	assert_eq!(*value, vec![1, 2, 3]);
}

#[test]
fn test_concurrent_mixed_operations() {
	let cache: Arc<ShardedLruCache<u64>> = Arc::new(ShardedLruCache::new(4096));
	let deleted = Arc::new(AtomicUsize::new(0));

	// Pre-populate a shared working set.
	for i in 0..256u64 {
		let handle = cache.insert(&i.to_be_bytes(), i, 1, counting_deleter(&deleted));
		cache.release(handle);
	}

	let mut handles = vec![];

	// Readers hammer the shared set, holding pins briefly.
	for _ in 0..3 {
		let cache = cache.clone();
		handles.push(thread::spawn(move || {
			for _ in 0..50 {
				for i in 0..256u64 {
					if let Some(handle) = cache.lookup(&i.to_be_bytes()) {
						assert_eq!(*cache.value(&handle), i);
						cache.release(handle);
					}
				}
			}
		}));
	}

	// Writers churn disjoint key ranges.
	for t in 0..3u64 {
		let cache = cache.clone();
		let deleted = deleted.clone();
		handles.push(thread::spawn(move || {
			for round in 0..50u64 {
				for i in 0..64u64 {
					let key = (1000 + t * 64 + i).to_be_bytes();
					let handle =
						cache.insert(&key, round, 1, counting_deleter(&deleted));
					assert_eq!(*cache.value(&handle), round);
					cache.release(handle);
					if i % 8 == 0 {
						cache.erase(&key);
					}
				}
			}
		}));
	}

	// One thread prunes occasionally.
	{
		let cache = cache.clone();
		handles.push(thread::spawn(move || {
			for _ in 0..20 {
				cache.prune();
				thread::yield_now();
			}
		}));
	}

	for handle in handles {
		handle.join().expect("thread should not panic");
	}

	drop(cache);
	// Every destroyed entry ran its deleter exactly once: the count equals
	// total inserts minus whatever was still resident at drop (those ran
	// during drop), so after drop it must equal total inserts.
	assert_eq!(deleted.load(Ordering::SeqCst), 256 + 3 * 50 * 64);
}

#[test]
fn test_sharding_is_transparent() {
	// The same workload against different shard counts gives the same
	// answers for everything but eviction timing.
	for shards in [1usize, 2, 8, 64] {
		let cache: ShardedLruCache<u64> = CacheBuilder::new(1 << 20).shards(shards).build();
		for i in 0..500u64 {
			let handle = cache.insert(&i.to_be_bytes(), i * 3, 8, None);
			cache.release(handle);
		}
		assert_eq!(cache.len(), 500);
		assert_eq!(cache.total_charge(), 4000);
		for i in 0..500u64 {
			let handle = cache.lookup(&i.to_be_bytes()).expect("present");
			assert_eq!(*cache.value(&handle), i * 3);
			cache.release(handle);
		}
		for i in (0..500u64).step_by(2) {
			cache.erase(&i.to_be_bytes());
		}
		assert_eq!(cache.len(), 250);
		assert_eq!(cache.total_charge(), 2000);
	}
}

#[test]
fn test_handle_can_cross_threads() {
	fn assert_send<T: Send>() {}
	fn assert_sync<T: Sync>() {}
	assert_send::<Handle>();
	assert_send::<ShardedLruCache<Vec<u8>>>();
	assert_sync::<ShardedLruCache<Vec<u8>>>();

	let cache: Arc<ShardedLruCache<u64>> = Arc::new(ShardedLruCache::new(1024));
	let handle = cache.insert(b"k", 5, 1, None);

	let cache2 = cache.clone();
	thread::spawn(move || {
		assert_eq!(*cache2.value(&handle), 5);
		cache2.release(handle);
	})
	.join()
	.expect("thread should not panic");

	assert!(cache.contains(b"k"));
}
