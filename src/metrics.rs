//! Cache performance counters.

/// Point-in-time snapshot of a cache's counters.
///
/// Counters are maintained with relaxed atomics and sampled one at a time,
/// so a snapshot taken while writers are active is an estimate, not a
/// transactionally consistent view.
///
/// # Example
///
/// ```
/// use pinned_lru::ShardedLruCache;
///
/// let cache: ShardedLruCache<u64> = ShardedLruCache::new(1024);
/// // ... perform cache operations ...
///
/// let metrics = cache.metrics();
/// println!("Hit rate: {:.2}%", metrics.hit_rate() * 100.0);
/// println!("Utilization: {:.2}%", metrics.utilization() * 100.0);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
	/// Lookups that found their key.
	pub hits: u64,
	/// Lookups that missed.
	pub misses: u64,
	/// Inserts of keys that were not already mapped.
	pub inserts: u64,
	/// Inserts that displaced an existing mapping for the same key.
	pub updates: u64,
	/// Entries evicted for capacity or by `prune`.
	pub evictions: u64,
	/// Explicit `erase` calls that found a mapping.
	pub erasures: u64,
	/// Sum of the charges of all cached entries.
	pub current_charge: usize,
	/// Configured total capacity.
	pub capacity: usize,
	/// Number of cached entries.
	pub entry_count: usize,
}

impl CacheMetrics {
	/// Hit rate over all lookups so far, between 0.0 and 1.0.
	/// 0.0 when there have been no lookups.
	pub fn hit_rate(&self) -> f64 {
		let total = self.hits + self.misses;
		if total == 0 {
			0.0
		} else {
			self.hits as f64 / total as f64
		}
	}

	/// Fraction of capacity currently charged, between 0.0 and 1.0 in the
	/// steady state. Can exceed 1.0 while pinned entries hold the cache over
	/// budget. 0.0 for a zero-capacity cache.
	pub fn utilization(&self) -> f64 {
		if self.capacity == 0 {
			0.0
		} else {
			self.current_charge as f64 / self.capacity as f64
		}
	}
}
