use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::RandomState;

use crate::handle::Handle;
use crate::metrics::CacheMetrics;
use crate::shard::LruShard;
use crate::traits::{Cache, Deleter};

/// Default shard count. Plenty for typical thread counts without splitting
/// the capacity into uselessly small slices.
const DEFAULT_SHARDS: usize = 16;

/// Thread-safe LRU cache with handle-pinned entries and charge-based
/// capacity accounting.
///
/// The keyspace is split across shards, each guarded by its own mutex; no
/// operation takes more than one shard lock. Keys are hashed once at entry
/// and routed by the high bits of the hash, and the same hash feeds the
/// shard's index so key bytes are never hashed twice.
///
/// Capacity is divided evenly across shards (rounding up), so a single shard
/// evicts based on its slice of the budget, not the global total. Capacity is
/// a soft limit: pinned entries are never evicted, so total charge can exceed
/// capacity while many handles are outstanding.
///
/// A cache with capacity 0 caches nothing: inserts still return valid,
/// readable handles and deleters still run exactly once, but lookups always
/// miss. This turns caching off without changing calling code.
///
/// Share across threads via `Arc<ShardedLruCache<V>>`, or as
/// `Arc<dyn Cache<V>>` through the [`Cache`] trait.
pub struct ShardedLruCache<V> {
	shards: Box<[LruShard<V>]>,
	shard_bits: u32,
	hasher: RandomState,
	capacity: usize,
	/// Next client id, handed out by `new_id`.
	last_id: AtomicU64,
	hits: AtomicU64,
	misses: AtomicU64,
	inserts: AtomicU64,
	updates: AtomicU64,
	evictions: AtomicU64,
	erasures: AtomicU64,
}

impl<V: Send + Sync + 'static> ShardedLruCache<V> {
	/// A cache with the given total capacity and the default shard count.
	pub fn new(capacity: usize) -> Self {
		Self::with_shards(capacity, DEFAULT_SHARDS)
	}

	/// A cache with an explicit shard count, rounded up to a power of two.
	pub fn with_shards(capacity: usize, shards: usize) -> Self {
		let shard_count = shards.max(1).next_power_of_two();
		let per_shard = (capacity + shard_count - 1) / shard_count;
		let shards: Vec<LruShard<V>> =
			(0..shard_count).map(|_| LruShard::new(per_shard)).collect();
		Self {
			shards: shards.into_boxed_slice(),
			shard_bits: shard_count.trailing_zeros(),
			// Fixed seeds: routing and the per-shard indexes both key off
			// this hash, so it must be stable for the cache's lifetime.
			hasher: RandomState::with_seeds(
				0x243f_6a88_85a3_08d3,
				0x1319_8a2e_0370_7344,
				0xa409_3822_299f_31d0,
				0x082e_fa98_ec4e_6c89,
			),
			capacity,
			last_id: AtomicU64::new(0),
			hits: AtomicU64::new(0),
			misses: AtomicU64::new(0),
			inserts: AtomicU64::new(0),
			updates: AtomicU64::new(0),
			evictions: AtomicU64::new(0),
			erasures: AtomicU64::new(0),
		}
	}

	fn hash_key(&self, key: &[u8]) -> u64 {
		self.hasher.hash_one(key)
	}

	/// Routes by the high-order bits: the low bits keep their full spread
	/// for the shard's own index.
	fn shard_index(&self, hash: u64) -> usize {
		if self.shard_bits == 0 {
			0
		} else {
			(hash >> (64 - self.shard_bits)) as usize
		}
	}

	/// The shard a handle was issued by. Out-of-range means the handle came
	/// from a cache with more shards.
	fn shard_of(&self, handle: &Handle) -> &LruShard<V> {
		match self.shards.get(handle.shard() as usize) {
			Some(shard) => shard,
			None => panic!("handle does not belong to this cache"),
		}
	}

	/// See [`Cache::insert`].
	pub fn insert(
		&self,
		key: &[u8],
		value: V,
		charge: usize,
		deleter: Option<Deleter<V>>,
	) -> Handle {
		let hash = self.hash_key(key);
		let shard = self.shard_index(hash);
		let outcome = self.shards[shard].insert(key, hash, value, charge, deleter);

		if outcome.displaced {
			self.updates.fetch_add(1, Ordering::Relaxed);
		} else {
			self.inserts.fetch_add(1, Ordering::Relaxed);
		}
		if outcome.evicted > 0 {
			self.evictions.fetch_add(outcome.evicted, Ordering::Relaxed);
		}

		let handle = Handle::new(shard as u32, outcome.id);
		for reclaimed in outcome.reclaimed {
			reclaimed.run();
		}
		handle
	}

	/// See [`Cache::lookup`].
	pub fn lookup(&self, key: &[u8]) -> Option<Handle> {
		let hash = self.hash_key(key);
		let shard = self.shard_index(hash);
		match self.shards[shard].lookup(hash, key) {
			Some(id) => {
				self.hits.fetch_add(1, Ordering::Relaxed);
				Some(Handle::new(shard as u32, id))
			}
			None => {
				self.misses.fetch_add(1, Ordering::Relaxed);
				None
			}
		}
	}

	/// See [`Cache::release`].
	pub fn release(&self, handle: Handle) {
		if let Some(reclaimed) = self.shard_of(&handle).release(handle.id()) {
			reclaimed.run();
		}
	}

	/// See [`Cache::value`].
	pub fn value(&self, handle: &Handle) -> Arc<V> {
		self.shard_of(handle).value(handle.id())
	}

	/// See [`Cache::erase`].
	pub fn erase(&self, key: &[u8]) {
		let hash = self.hash_key(key);
		let shard = self.shard_index(hash);
		let (erased, reclaimed) = self.shards[shard].erase(hash, key);
		if erased {
			self.erasures.fetch_add(1, Ordering::Relaxed);
		}
		if let Some(reclaimed) = reclaimed {
			reclaimed.run();
		}
	}

	/// See [`Cache::new_id`].
	pub fn new_id(&self) -> u64 {
		self.last_id.fetch_add(1, Ordering::Relaxed) + 1
	}

	/// See [`Cache::prune`]. Shards are pruned one at a time; each shard's
	/// deleters run before the next shard is locked.
	pub fn prune(&self) {
		for shard in self.shards.iter() {
			let (evicted, reclaimed) = shard.prune();
			if evicted > 0 {
				self.evictions.fetch_add(evicted, Ordering::Relaxed);
			}
			for entry in reclaimed {
				entry.run();
			}
		}
	}

	/// See [`Cache::total_charge`].
	pub fn total_charge(&self) -> usize {
		self.shards.iter().map(|shard| shard.usage()).sum()
	}

	/// Whether `key` is cached, without pinning it or touching recency.
	pub fn contains(&self, key: &[u8]) -> bool {
		let hash = self.hash_key(key);
		self.shards[self.shard_index(hash)].contains(hash, key)
	}

	/// Number of cached entries.
	pub fn len(&self) -> usize {
		self.shards.iter().map(|shard| shard.len()).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// The configured total capacity.
	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// A point-in-time snapshot of the cache's counters.
	pub fn metrics(&self) -> CacheMetrics {
		CacheMetrics {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			inserts: self.inserts.load(Ordering::Relaxed),
			updates: self.updates.load(Ordering::Relaxed),
			evictions: self.evictions.load(Ordering::Relaxed),
			erasures: self.erasures.load(Ordering::Relaxed),
			current_charge: self.total_charge(),
			capacity: self.capacity,
			entry_count: self.len(),
		}
	}
}

impl<V: Send + Sync + 'static> Cache<V> for ShardedLruCache<V> {
	fn insert(&self, key: &[u8], value: V, charge: usize, deleter: Option<Deleter<V>>) -> Handle {
		ShardedLruCache::insert(self, key, value, charge, deleter)
	}

	fn lookup(&self, key: &[u8]) -> Option<Handle> {
		ShardedLruCache::lookup(self, key)
	}

	fn release(&self, handle: Handle) {
		ShardedLruCache::release(self, handle)
	}

	fn value(&self, handle: &Handle) -> Arc<V> {
		ShardedLruCache::value(self, handle)
	}

	fn erase(&self, key: &[u8]) {
		ShardedLruCache::erase(self, key)
	}

	fn new_id(&self) -> u64 {
		ShardedLruCache::new_id(self)
	}

	fn prune(&self) {
		ShardedLruCache::prune(self)
	}

	fn total_charge(&self) -> usize {
		ShardedLruCache::total_charge(self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn shard_count_rounds_to_power_of_two() {
		let cache: ShardedLruCache<u32> = ShardedLruCache::with_shards(1000, 5);
		assert_eq!(cache.shards.len(), 8);
		assert_eq!(cache.shard_bits, 3);
	}

	#[test]
	fn single_shard_routes_everything_to_shard_zero() {
		let cache: ShardedLruCache<u32> = ShardedLruCache::with_shards(100, 1);
		for i in 0..64u64 {
			assert_eq!(cache.shard_index(i.wrapping_mul(0x9e37_79b9_7f4a_7c15)), 0);
		}
	}

	#[test]
	fn routing_is_stable_per_key() {
		let cache: ShardedLruCache<u32> = ShardedLruCache::new(1 << 16);
		for key in [b"a".as_slice(), b"bb", b"ccc", b"dddd"] {
			let first = cache.shard_index(cache.hash_key(key));
			for _ in 0..8 {
				assert_eq!(cache.shard_index(cache.hash_key(key)), first);
			}
			assert!(first < cache.shards.len());
		}
	}

	#[test]
	fn new_id_is_strictly_increasing() {
		let cache: ShardedLruCache<u32> = ShardedLruCache::new(100);
		let a = cache.new_id();
		let b = cache.new_id();
		let c = cache.new_id();
		assert!(a < b && b < c);
		assert_eq!(a, 1);
	}
}
