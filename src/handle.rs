//! The entry-pinning capability.

use crate::entry::EntryId;

/// Proof of one live reference to a cached entry.
///
/// Returned by `insert` and `lookup`. While a handle exists, the entry it
/// names is pinned: its value can be read via `value`, and it is never
/// evicted, even if it has been erased or displaced from the index in the
/// meantime.
///
/// A handle is deliberately neither `Clone` nor `Copy`, and `release` takes
/// it by value, so releasing twice or touching a released handle is a compile
/// error. To hold an entry twice, look it up twice.
///
/// Presenting a handle to a cache other than the one that issued it is a
/// contract violation and panics (or, if the foreign cache happens to have a
/// live entry in the same slot, reads that entry; handles are not portable
/// between instances).
#[derive(Debug)]
pub struct Handle {
	shard: u32,
	id: EntryId,
}

impl Handle {
	pub(crate) fn new(shard: u32, id: EntryId) -> Self {
		Self { shard, id }
	}

	pub(crate) fn shard(&self) -> u32 {
		self.shard
	}

	pub(crate) fn id(&self) -> EntryId {
		self.id
	}
}
