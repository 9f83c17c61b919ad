//! Entry storage for a shard.
//!
//! Entries live in a slot arena and are addressed by [`EntryId`] everywhere a
//! linked structure would otherwise hold a pointer. Each slot carries a
//! generation that is bumped when the slot is freed, so an id held across a
//! free/reuse cycle stops resolving instead of silently aliasing the slot's
//! next occupant.

use std::sync::Arc;

use crate::traits::Deleter;

/// Stable, generation-checked identifier for an arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EntryId {
	pub(crate) index: u32,
	pub(crate) generation: u32,
}

/// Which recency list an entry currently sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListKind {
	/// In cache and referenced only by the cache itself; eligible for eviction.
	Cold,
	/// In cache with at least one outstanding handle; never evicted.
	Hot,
	/// On no list: never cached (zero capacity), or already removed from the
	/// index and kept alive only by outstanding handles.
	Detached,
}

/// One cached record.
///
/// `refs` counts outstanding handles plus one reference owned by the cache
/// while `in_cache` is true. The deleter is taken exactly once, when `refs`
/// drops to zero.
pub(crate) struct Entry<V> {
	pub(crate) key: Box<[u8]>,
	pub(crate) hash: u64,
	pub(crate) value: Arc<V>,
	pub(crate) charge: usize,
	pub(crate) deleter: Option<Deleter<V>>,
	pub(crate) refs: u32,
	pub(crate) in_cache: bool,
	pub(crate) location: ListKind,
	pub(crate) prev: Option<EntryId>,
	pub(crate) next: Option<EntryId>,
}

impl<V> Entry<V> {
	/// A fresh entry holding one reference for the handle about to be handed
	/// back to the caller. Not yet on any list or in any index.
	pub(crate) fn new(
		key: &[u8],
		hash: u64,
		value: V,
		charge: usize,
		deleter: Option<Deleter<V>>,
	) -> Self {
		Self {
			key: Box::from(key),
			hash,
			value: Arc::new(value),
			charge,
			deleter,
			refs: 1,
			in_cache: false,
			location: ListKind::Detached,
			prev: None,
			next: None,
		}
	}
}

struct Slot<V> {
	generation: u32,
	entry: Option<Entry<V>>,
}

/// Slot arena with a free list and generation-checked ids.
pub(crate) struct EntryArena<V> {
	slots: Vec<Slot<V>>,
	free: Vec<u32>,
	len: usize,
}

impl<V> EntryArena<V> {
	pub(crate) fn new() -> Self {
		Self { slots: Vec::new(), free: Vec::new(), len: 0 }
	}

	pub(crate) fn len(&self) -> usize {
		self.len
	}

	/// Stores `entry`, reusing a freed slot when one is available.
	pub(crate) fn insert(&mut self, entry: Entry<V>) -> EntryId {
		self.len += 1;
		if let Some(index) = self.free.pop() {
			let slot = &mut self.slots[index as usize];
			debug_assert!(slot.entry.is_none());
			slot.entry = Some(entry);
			EntryId { index, generation: slot.generation }
		} else {
			let index = self.slots.len() as u32;
			self.slots.push(Slot { generation: 0, entry: Some(entry) });
			EntryId { index, generation: 0 }
		}
	}

	/// Resolves `id` to its entry, or `None` when the slot was freed (and
	/// possibly reused) since the id was minted.
	pub(crate) fn get(&self, id: EntryId) -> Option<&Entry<V>> {
		let slot = self.slots.get(id.index as usize)?;
		if slot.generation != id.generation {
			return None;
		}
		slot.entry.as_ref()
	}

	pub(crate) fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry<V>> {
		let slot = self.slots.get_mut(id.index as usize)?;
		if slot.generation != id.generation {
			return None;
		}
		slot.entry.as_mut()
	}

	/// Resolves an id that is known to be live. Ids reachable from a shard's
	/// index or lists always are.
	pub(crate) fn resolve(&self, id: EntryId) -> &Entry<V> {
		match self.get(id) {
			Some(entry) => entry,
			None => panic!("entry id {id:?} does not resolve to a live entry"),
		}
	}

	pub(crate) fn resolve_mut(&mut self, id: EntryId) -> &mut Entry<V> {
		match self.get_mut(id) {
			Some(entry) => entry,
			None => panic!("entry id {id:?} does not resolve to a live entry"),
		}
	}

	/// Frees the slot and bumps its generation so `id` stops resolving.
	pub(crate) fn remove(&mut self, id: EntryId) -> Option<Entry<V>> {
		let slot = self.slots.get_mut(id.index as usize)?;
		if slot.generation != id.generation || slot.entry.is_none() {
			return None;
		}
		slot.generation = slot.generation.wrapping_add(1);
		self.len -= 1;
		self.free.push(id.index);
		slot.entry.take()
	}

	/// Removes and yields every live entry. Used during teardown.
	pub(crate) fn drain(&mut self) -> impl Iterator<Item = Entry<V>> + '_ {
		self.len = 0;
		self.free.clear();
		self.slots.drain(..).filter_map(|slot| slot.entry)
	}
}
