//! The per-thread cache that backs all pooled memory.
//!
//! Every thread has its own [MemoryPool], so acquiring and releasing memory never contends on
//!  a lock. The flip side is that memory released on a different thread than the one that
//!  acquired it migrates to the releasing thread's pool, and utilization can be uneven.
//!
//! Settings are process-wide and are fixed by the first call to [ObjectCache::initialize]. A
//!  thread that touches the cache before that uses [ObjectCacheSettings::default_server] for
//!  the rest of its lifetime.

use std::cell::RefCell;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;
use tracing::{debug, warn};
use crate::buffers::memory_pool::{MemoryPool, MemoryPoolStats};
use crate::config::ObjectCacheSettings;

static SETTINGS: OnceLock<ObjectCacheSettings> = OnceLock::new();

/// Number of recycling arrays that were created but not yet recycled, across all threads.
static LIVE_ARRAYS: AtomicI64 = AtomicI64::new(0);

thread_local! {
    static CACHE: RefCell<ThreadCache> = RefCell::new(ThreadCache::new(&ObjectCache::settings()));
}

/// Per-thread counters. Arrays may be recycled on a different thread than the one that created
///  them, so the difference between `arrays_created` and `arrays_recycled` is meaningful only
///  process-wide, see [ObjectCache::live_arrays].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectCacheStats {
    pub memory: MemoryPoolStats,
    pub arrays_created: u64,
    pub arrays_recycled: u64,
}

struct ThreadCache {
    memory: MemoryPool,
    arrays_created: u64,
    arrays_recycled: u64,
}

impl ThreadCache {
    fn new(settings: &ObjectCacheSettings) -> ThreadCache {
        debug!("initializing thread local object cache");
        ThreadCache {
            memory: MemoryPool::new(settings),
            arrays_created: 0,
            arrays_recycled: 0,
        }
    }
}

pub struct ObjectCache;

impl ObjectCache {
    /// Fixes the process-wide settings. Returns `false` (and leaves the settings unchanged) if
    ///  the cache was initialized before.
    pub fn initialize(settings: ObjectCacheSettings) -> bool {
        match SETTINGS.set(settings) {
            Ok(_) => {
                debug!("object cache initialized: {:?}", settings);
                true
            }
            Err(_) => {
                warn!("object cache was already initialized - ignoring new settings");
                false
            }
        }
    }

    pub fn is_initialized() -> bool {
        SETTINGS.get().is_some()
    }

    pub fn settings() -> ObjectCacheSettings {
        SETTINGS.get()
            .copied()
            .unwrap_or_else(ObjectCacheSettings::default_server)
    }

    /// Memory for a new recycling array
    pub(crate) fn acquire_array_memory(min_size: usize) -> Vec<u8> {
        LIVE_ARRAYS.fetch_add(1, Ordering::Relaxed);
        CACHE.try_with(|cache| {
            let mut cache = cache.borrow_mut();
            cache.arrays_created += 1;
            cache.memory.acquire(min_size)
        })
            .unwrap_or_else(|_| vec![0; min_size])
    }

    /// Called exactly once per recycling array, when its last handle is dropped
    pub(crate) fn recycle_array_memory(block: Vec<u8>) {
        LIVE_ARRAYS.fetch_sub(1, Ordering::Relaxed);
        // during thread teardown the block is simply dropped
        let _ = CACHE.try_with(|cache| {
            let mut cache = cache.borrow_mut();
            cache.arrays_recycled += 1;
            cache.memory.release(block);
        });
    }

    pub fn thread_stats() -> ObjectCacheStats {
        CACHE.with(|cache| {
            let cache = cache.borrow();
            ObjectCacheStats {
                memory: cache.memory.stats(),
                arrays_created: cache.arrays_created,
                arrays_recycled: cache.arrays_recycled,
            }
        })
    }

    /// Number of pooled blocks per memory class in the current thread's pool
    pub fn thread_pooled_blocks() -> Vec<usize> {
        CACHE.with(|cache| cache.borrow().memory.pooled_blocks())
    }

    /// The number of arrays that are currently alive process-wide. An ever-growing value
    ///  indicates buffers that are leaked rather than dropped or disposed.
    pub fn live_arrays() -> i64 {
        LIVE_ARRAYS.load(Ordering::Relaxed)
    }
}
