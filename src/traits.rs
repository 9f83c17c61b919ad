//! The public cache contract.

use std::sync::Arc;

use crate::handle::Handle;

/// One-shot destruction callback.
///
/// Runs exactly once per entry, after the entry's last reference is gone and
/// after the owning shard's lock has been released, receiving the key and the
/// cache's value `Arc`. Because no lock is held, a deleter may call back into
/// the cache.
pub type Deleter<V> = Box<dyn FnOnce(&[u8], Arc<V>) + Send>;

/// A thread-safe cache of byte keys to values, with caller-assigned charges
/// against a total capacity and handle-based pinning.
///
/// [`ShardedLruCache`](crate::ShardedLruCache) is the provided
/// implementation; the trait exists so engine code can take `&dyn Cache<V>`
/// and tests can substitute instrumented caches.
pub trait Cache<V>: Send + Sync {
	/// Inserts `value` under `key`, charging `charge` against capacity, and
	/// pins the new entry. Always succeeds: if the key was already mapped the
	/// old entry is displaced (its deleter deferred until it is unpinned),
	/// and an entry too large for the capacity is still inserted, then
	/// evicted once unpinned.
	fn insert(&self, key: &[u8], value: V, charge: usize, deleter: Option<Deleter<V>>) -> Handle;

	/// Pins and returns the entry under `key`, marking it most recently used.
	fn lookup(&self, key: &[u8]) -> Option<Handle>;

	/// Drops the pin. When this was the entry's last reference, the entry is
	/// destroyed and its deleter runs before `release` returns.
	fn release(&self, handle: Handle);

	/// The pinned entry's value. The `Arc` stays valid after the handle is
	/// released and even after the entry is destroyed.
	fn value(&self, handle: &Handle) -> Arc<V>;

	/// Unmaps `key` so future lookups miss. The entry's destruction is
	/// deferred until its last handle is released. No-op for absent keys.
	fn erase(&self, key: &[u8]);

	/// A numeric id no other `new_id` call on this cache has returned or will
	/// return. Clients partition a shared cache's keyspace with these.
	fn new_id(&self) -> u64;

	/// Evicts every unpinned entry, regardless of capacity.
	fn prune(&self);

	/// Sum of the charges of all cached entries. Shards are read one at a
	/// time, so the value is an estimate while writers are active.
	fn total_charge(&self) -> usize;
}
