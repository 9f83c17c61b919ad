//! Recency lists threaded through the entry arena.

use crate::entry::{EntryArena, EntryId, ListKind};

/// Doubly-linked list whose links are `prev`/`next` ids stored inline in the
/// arena entries. The front is the most recently used end; the back is the
/// eviction candidate.
///
/// Each shard runs two of these: a cold list of evictable entries and a hot
/// list of pinned ones. An entry records which list it is on via its
/// `location` field, which must match this list's kind on every unlink.
pub(crate) struct LruList {
	kind: ListKind,
	head: Option<EntryId>,
	tail: Option<EntryId>,
	len: usize,
}

impl LruList {
	pub(crate) fn new(kind: ListKind) -> Self {
		Self { kind, head: None, tail: None, len: 0 }
	}

	pub(crate) fn len(&self) -> usize {
		self.len
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// The least recently used entry.
	pub(crate) fn back(&self) -> Option<EntryId> {
		self.tail
	}

	/// Attaches a detached entry at the most recently used end.
	pub(crate) fn push_front<V>(&mut self, arena: &mut EntryArena<V>, id: EntryId) {
		let old_head = self.head;
		{
			let entry = arena.resolve_mut(id);
			debug_assert_eq!(entry.location, ListKind::Detached);
			entry.location = self.kind;
			entry.prev = None;
			entry.next = old_head;
		}
		match old_head {
			Some(head) => arena.resolve_mut(head).prev = Some(id),
			None => self.tail = Some(id),
		}
		self.head = Some(id);
		self.len += 1;
	}

	/// Detaches an entry from anywhere in the list.
	pub(crate) fn unlink<V>(&mut self, arena: &mut EntryArena<V>, id: EntryId) {
		let (prev, next) = {
			let entry = arena.resolve_mut(id);
			debug_assert_eq!(entry.location, self.kind);
			entry.location = ListKind::Detached;
			(entry.prev.take(), entry.next.take())
		};
		match prev {
			Some(prev) => arena.resolve_mut(prev).next = next,
			None => self.head = next,
		}
		match next {
			Some(next) => arena.resolve_mut(next).prev = prev,
			None => self.tail = prev,
		}
		self.len -= 1;
	}

	/// Walks the list front to back, checking link symmetry and membership.
	#[cfg(test)]
	pub(crate) fn assert_valid<V>(&self, arena: &EntryArena<V>) {
		let mut seen = 0;
		let mut prev = None;
		let mut cursor = self.head;
		while let Some(id) = cursor {
			let entry = arena.resolve(id);
			assert_eq!(entry.location, self.kind);
			assert_eq!(entry.prev, prev);
			prev = Some(id);
			cursor = entry.next;
			seen += 1;
		}
		assert_eq!(self.tail, prev);
		assert_eq!(self.len, seen);
	}
}
