//! A single cache partition.
//!
//! A `LruShard` owns everything for one slice of the keyspace behind a single
//! mutex: the entry arena, the key index, capacity accounting, and two
//! recency lists. Entries referenced only by the shard sit on the *cold* list
//! and are evicted from its back when usage exceeds capacity; entries with at
//! least one outstanding handle sit on the *hot* list and are never evicted.
//!
//! # Reference counting
//!
//! Every entry holds one reference per outstanding handle, plus one owned by
//! the shard while the entry is reachable through the index. Erasure,
//! displacement by a re-insert, and eviction all just drop the shard's
//! reference; the entry is destroyed when the count reaches zero, which may
//! be long after it left the index.
//!
//! # Deferred deleters
//!
//! No deleter ever runs under the shard lock. Mutating operations return the
//! entries whose reference count hit zero as [`Reclaimed`] values; the
//! router invokes them once the lock is out of scope, so a deleter is free to
//! call back into the cache.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::entry::{Entry, EntryArena, EntryId, ListKind};
use crate::index::KeyIndex;
use crate::list::LruList;
use crate::traits::Deleter;

/// An entry whose last reference was dropped while the shard lock was held.
/// Calling [`run`](Reclaimed::run) after unlocking fires the deleter.
pub(crate) struct Reclaimed<V> {
	key: Box<[u8]>,
	value: Arc<V>,
	deleter: Option<Deleter<V>>,
}

impl<V> Reclaimed<V> {
	pub(crate) fn run(self) {
		if let Some(deleter) = self.deleter {
			deleter(&self.key, self.value);
		}
	}
}

/// What an insert did, for the router's metrics.
pub(crate) struct InsertOutcome<V> {
	pub(crate) id: EntryId,
	pub(crate) displaced: bool,
	pub(crate) evicted: u64,
	pub(crate) reclaimed: Vec<Reclaimed<V>>,
}

pub(crate) struct LruShard<V> {
	capacity: usize,
	state: Mutex<ShardState<V>>,
}

struct ShardState<V> {
	arena: EntryArena<V>,
	index: KeyIndex,
	cold: LruList,
	hot: LruList,
	usage: usize,
}

impl<V> LruShard<V> {
	pub(crate) fn new(capacity: usize) -> Self {
		Self {
			capacity,
			state: Mutex::new(ShardState {
				arena: EntryArena::new(),
				index: KeyIndex::new(),
				cold: LruList::new(ListKind::Cold),
				hot: LruList::new(ListKind::Hot),
				usage: 0,
			}),
		}
	}

	/// Inserts the entry pinned (on the hot list), displacing any previous
	/// mapping for `key`, then evicts from the cold back until usage fits.
	///
	/// With zero capacity the entry is not indexed at all; the returned
	/// handle id is its only reference.
	pub(crate) fn insert(
		&self,
		key: &[u8],
		hash: u64,
		value: V,
		charge: usize,
		deleter: Option<Deleter<V>>,
	) -> InsertOutcome<V> {
		let mut reclaimed = Vec::new();
		let mut displaced = false;
		let mut evicted = 0;

		let mut guard = self.state.lock();
		let state = &mut *guard;
		let id = state.arena.insert(Entry::new(key, hash, value, charge, deleter));

		if self.capacity > 0 {
			{
				let entry = state.arena.resolve_mut(id);
				entry.refs += 1; // the shard's own reference
				entry.in_cache = true;
			}
			state.hot.push_front(&mut state.arena, id);
			state.usage += charge;

			if let Some(old) = state.index.insert(hash, id, &state.arena) {
				displaced = true;
				if let Some(r) = state.finish_erase(old) {
					reclaimed.push(r);
				}
			}
			while state.usage > self.capacity && !state.cold.is_empty() {
				if let Some(r) = state.evict_lru() {
					reclaimed.push(r);
				}
				evicted += 1;
			}
		}

		drop(guard);
		InsertOutcome { id, displaced, evicted, reclaimed }
	}

	/// Finds `key`, pins it, and marks it most recently used.
	pub(crate) fn lookup(&self, hash: u64, key: &[u8]) -> Option<EntryId> {
		let mut guard = self.state.lock();
		let state = &mut *guard;
		let id = state.index.lookup(hash, key, &state.arena)?;
		state.ref_entry(id);
		Some(id)
	}

	/// Drops one handle reference.
	///
	/// Panics if `id` does not name a live entry here (a handle from another
	/// cache, or one that somehow survived its entry's slot being recycled).
	pub(crate) fn release(&self, id: EntryId) -> Option<Reclaimed<V>> {
		let mut guard = self.state.lock();
		let state = &mut *guard;
		if state.arena.get(id).is_none() {
			panic!("released a handle that does not belong to this cache");
		}
		let reclaimed = state.unref(id);
		drop(guard);
		reclaimed
	}

	/// The pinned entry's value. Same panic contract as [`release`](Self::release).
	pub(crate) fn value(&self, id: EntryId) -> Arc<V> {
		let guard = self.state.lock();
		match guard.arena.get(id) {
			Some(entry) => Arc::clone(&entry.value),
			None => panic!("read through a handle that does not belong to this cache"),
		}
	}

	/// Unmaps `key`. Returns whether a mapping existed.
	pub(crate) fn erase(&self, hash: u64, key: &[u8]) -> (bool, Option<Reclaimed<V>>) {
		let mut guard = self.state.lock();
		let state = &mut *guard;
		match state.index.remove(hash, key, &state.arena) {
			Some(id) => {
				let reclaimed = state.finish_erase(id);
				drop(guard);
				(true, reclaimed)
			}
			None => (false, None),
		}
	}

	/// Evicts every cold entry. Hot entries are untouched.
	pub(crate) fn prune(&self) -> (u64, Vec<Reclaimed<V>>) {
		let mut reclaimed = Vec::new();
		let mut evicted = 0;
		let mut guard = self.state.lock();
		let state = &mut *guard;
		while !state.cold.is_empty() {
			if let Some(r) = state.evict_lru() {
				reclaimed.push(r);
			}
			evicted += 1;
		}
		drop(guard);
		(evicted, reclaimed)
	}

	/// Whether `key` is cached, without pinning or touching recency.
	pub(crate) fn contains(&self, hash: u64, key: &[u8]) -> bool {
		let guard = self.state.lock();
		guard.index.lookup(hash, key, &guard.arena).is_some()
	}

	pub(crate) fn usage(&self) -> usize {
		self.state.lock().usage
	}

	pub(crate) fn len(&self) -> usize {
		let guard = self.state.lock();
		// Every indexed entry is on exactly one list; the arena additionally
		// holds detached entries that are kept alive by handles.
		debug_assert_eq!(guard.index.len(), guard.cold.len() + guard.hot.len());
		debug_assert!(guard.index.len() <= guard.arena.len());
		guard.index.len()
	}
}

impl<V> ShardState<V> {
	/// Adds a handle reference, promoting a cold entry to the hot list.
	fn ref_entry(&mut self, id: EntryId) {
		let promote = {
			let entry = self.arena.resolve_mut(id);
			let promote = entry.in_cache && entry.refs == 1;
			entry.refs += 1;
			promote
		};
		if promote {
			self.cold.unlink(&mut self.arena, id);
			self.hot.push_front(&mut self.arena, id);
		}
	}

	/// Drops one reference. At zero the entry leaves the arena and is handed
	/// back for out-of-lock destruction; at one-with-`in_cache` only the
	/// shard still references it, so it becomes evictable.
	fn unref(&mut self, id: EntryId) -> Option<Reclaimed<V>> {
		let (refs, in_cache) = {
			let entry = self.arena.resolve_mut(id);
			debug_assert!(entry.refs > 0);
			entry.refs -= 1;
			(entry.refs, entry.in_cache)
		};
		if refs == 0 {
			debug_assert!(!in_cache);
			let entry = self.arena.remove(id)?;
			debug_assert_eq!(entry.location, ListKind::Detached);
			Some(Reclaimed { key: entry.key, value: entry.value, deleter: entry.deleter })
		} else {
			if in_cache && refs == 1 {
				self.hot.unlink(&mut self.arena, id);
				self.cold.push_front(&mut self.arena, id);
			}
			None
		}
	}

	/// Completes removal of an entry already unmapped from the index: leave
	/// the recency list, give back the charge, drop the shard's reference.
	fn finish_erase(&mut self, id: EntryId) -> Option<Reclaimed<V>> {
		let location;
		{
			let entry = self.arena.resolve_mut(id);
			debug_assert!(entry.in_cache);
			entry.in_cache = false;
			location = entry.location;
			self.usage -= entry.charge;
		}
		match location {
			ListKind::Cold => self.cold.unlink(&mut self.arena, id),
			ListKind::Hot => self.hot.unlink(&mut self.arena, id),
			ListKind::Detached => debug_assert!(false, "in-cache entry must be on a list"),
		}
		self.unref(id)
	}

	/// Evicts the least recently used cold entry.
	fn evict_lru(&mut self) -> Option<Reclaimed<V>> {
		let victim = self.cold.back()?;
		{
			let entry = self.arena.resolve(victim);
			debug_assert_eq!(entry.refs, 1);
			let removed = self.index.remove(entry.hash, &entry.key, &self.arena);
			debug_assert_eq!(removed, Some(victim));
		}
		self.finish_erase(victim)
	}
}

impl<V> Drop for ShardState<V> {
	fn drop(&mut self) {
		// Dropping the cache logically erases everything still resident, so
		// each remaining deleter fires exactly once. Dropping while handles
		// are outstanding is a caller bug.
		debug_assert!(self.hot.is_empty(), "cache dropped with outstanding handles");
		for entry in self.arena.drain() {
			if let Some(deleter) = entry.deleter {
				deleter(&entry.key, entry.value);
			}
		}
	}
}
