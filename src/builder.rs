use crate::cache::ShardedLruCache;

/// Builder for configuring a [`ShardedLruCache`].
///
/// # Example
///
/// ```
/// use pinned_lru::CacheBuilder;
///
/// let cache = CacheBuilder::new(64 * 1024 * 1024) // 64 MB of charge
///     .shards(32)
///     .build::<Vec<u8>>();
/// assert_eq!(cache.capacity(), 64 * 1024 * 1024);
/// ```
pub struct CacheBuilder {
	capacity: usize,
	shards: Option<usize>,
}

impl CacheBuilder {
	/// A builder for a cache with the given total capacity, in whatever unit
	/// the caller charges entries in (bytes, entry counts, ...).
	pub fn new(capacity: usize) -> Self {
		Self { capacity, shards: None }
	}

	/// Sets the number of shards, rounded up to the next power of two.
	///
	/// More shards reduce lock contention but split the capacity into
	/// smaller independent slices. Default: 16.
	pub fn shards(mut self, count: usize) -> Self {
		self.shards = Some(count);
		self
	}

	pub fn build<V: Send + Sync + 'static>(self) -> ShardedLruCache<V> {
		match self.shards {
			Some(count) => ShardedLruCache::with_shards(self.capacity, count),
			None => ShardedLruCache::new(self.capacity),
		}
	}
}
