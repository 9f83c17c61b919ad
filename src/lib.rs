//! Sharded, handle-pinned LRU cache with charge-based capacity accounting.
//!
//! Built for storage engines that cache decoded blocks or open file handles:
//! every entry carries a caller-assigned *charge* against the cache's total
//! capacity, and every `insert` or `lookup` pins the entry through a
//! [`Handle`] until it is released. Pinned entries are never evicted; an
//! entry that is erased, displaced, or evicted while pinned stays readable
//! through its handles and is destroyed, with its one-shot deleter, only
//! when the last handle goes away.
//!
//! The keyspace is split across independently locked shards, so threads
//! contend only when they touch the same slice of the keyspace.
//!
//! # Example
//!
//! ```
//! use pinned_lru::ShardedLruCache;
//!
//! let cache: ShardedLruCache<Vec<u8>> = ShardedLruCache::new(1 << 20);
//!
//! // Insert pins the entry via the returned handle.
//! let handle = cache.insert(b"block:1", vec![0u8; 4096], 4096, None);
//! assert_eq!(cache.value(&handle).len(), 4096);
//! cache.release(handle);
//!
//! // Lookup pins it again.
//! let handle = cache.lookup(b"block:1").expect("still cached");
//! cache.release(handle);
//! ```

mod builder;
mod cache;
mod entry;
mod handle;
mod index;
mod list;
mod metrics;
mod shard;
mod traits;

pub use builder::CacheBuilder;
pub use cache::ShardedLruCache;
pub use handle::Handle;
pub use metrics::CacheMetrics;
pub use traits::{Cache, Deleter};
