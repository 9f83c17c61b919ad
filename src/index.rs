//! Per-shard key index.

use hashbrown::hash_table::Entry as TableEntry;
use hashbrown::HashTable;

use crate::entry::{EntryArena, EntryId};

/// Maps byte keys to arena entries for one shard.
///
/// Each element stores the key's pre-computed hash next to the `EntryId`, so
/// probes and rehashes never touch the key bytes; a candidate with a matching
/// hash is confirmed by exact byte comparison against the arena-held key.
/// Growth (bucket doubling and rehash from the stored hashes) is handled by
/// `hashbrown`.
///
/// Only in-cache entries appear here, so every stored id resolves.
pub(crate) struct KeyIndex {
	table: HashTable<IndexedEntry>,
}

#[derive(Clone, Copy)]
struct IndexedEntry {
	hash: u64,
	id: EntryId,
}

impl KeyIndex {
	pub(crate) fn new() -> Self {
		Self { table: HashTable::new() }
	}

	pub(crate) fn len(&self) -> usize {
		self.table.len()
	}

	/// Maps the key of the entry behind `id` to `id`. When the key was
	/// already mapped, the previous id is replaced and returned.
	pub(crate) fn insert<V>(
		&mut self,
		hash: u64,
		id: EntryId,
		arena: &EntryArena<V>,
	) -> Option<EntryId> {
		let key: &[u8] = &arena.resolve(id).key;
		let slot = self.table.entry(
			hash,
			|other| other.hash == hash && arena.resolve(other.id).key.as_ref() == key,
			|other| other.hash,
		);
		match slot {
			TableEntry::Occupied(mut occupied) => {
				let displaced = occupied.get().id;
				occupied.get_mut().id = id;
				Some(displaced)
			}
			TableEntry::Vacant(vacant) => {
				vacant.insert(IndexedEntry { hash, id });
				None
			}
		}
	}

	pub(crate) fn lookup<V>(
		&self,
		hash: u64,
		key: &[u8],
		arena: &EntryArena<V>,
	) -> Option<EntryId> {
		self.table
			.find(hash, |other| other.hash == hash && arena.resolve(other.id).key.as_ref() == key)
			.map(|found| found.id)
	}

	/// Unmaps `key`, returning the id it pointed at.
	pub(crate) fn remove<V>(
		&mut self,
		hash: u64,
		key: &[u8],
		arena: &EntryArena<V>,
	) -> Option<EntryId> {
		match self
			.table
			.find_entry(hash, |other| other.hash == hash && arena.resolve(other.id).key.as_ref() == key)
		{
			Ok(occupied) => {
				let (removed, _) = occupied.remove();
				Some(removed.id)
			}
			Err(_) => None,
		}
	}
}
