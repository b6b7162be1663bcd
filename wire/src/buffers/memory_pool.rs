use tracing::trace;
use crate::buffers::object_pool::ObjectPool;
use crate::config::ObjectCacheSettings;

struct MemoryClassPool {
    block_size: usize,
    pool: ObjectPool<Vec<u8>>,
}

/// Counters for a single [MemoryPool]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryPoolStats {
    /// blocks handed out, pooled or fresh
    pub acquired: u64,
    /// blocks that had to be allocated because there was no pooled block
    pub allocated: u64,
    /// blocks retained for reuse on release
    pub returned: u64,
    /// blocks dropped on release, either because the class was full or because they were
    ///  smaller than the smallest class
    pub discarded: u64,
}

/// Size-bucketed pools of byte blocks.
///
/// Blocks are plain `Vec<u8>` with `len() == capacity`, i.e. the entire block is addressable.
///  A block's content is *not* cleared between uses.
pub struct MemoryPool {
    classes: Vec<MemoryClassPool>,
    stats: MemoryPoolStats,
}

impl MemoryPool {
    pub fn new(settings: &ObjectCacheSettings) -> MemoryPool {
        MemoryPool {
            classes: settings.memory_classes.iter()
                .map(|c| MemoryClassPool {
                    block_size: c.block_size,
                    pool: ObjectPool::new(c.max_blocks),
                })
                .collect(),
            stats: MemoryPoolStats::default(),
        }
    }

    /// Returns a block of at least `min_size` bytes from the smallest class that fits. Requests
    ///  bigger than the biggest class are allocated with exactly the requested size.
    pub fn acquire(&mut self, min_size: usize) -> Vec<u8> {
        self.stats.acquired += 1;

        if let Some(class) = self.classes.iter_mut().find(|c| min_size <= c.block_size) {
            if let Some(block) = class.pool.get_from_pool() {
                return block;
            }
            self.stats.allocated += 1;
            return vec![0; class.block_size];
        }

        trace!("requested size {} exceeds the biggest memory class - allocating", min_size);
        self.stats.allocated += 1;
        vec![0; min_size]
    }

    /// Returns a block to the biggest class it can serve. Blocks smaller than the smallest
    ///  class are dropped.
    pub fn release(&mut self, block: Vec<u8>) {
        let len = block.len();
        match self.classes.iter_mut().rev().find(|c| len >= c.block_size) {
            Some(class) => {
                if class.pool.return_to_pool(block) {
                    self.stats.returned += 1;
                }
                else {
                    self.stats.discarded += 1;
                }
            }
            None => {
                trace!("block of {} bytes is too small for pooling - discarding", len);
                self.stats.discarded += 1;
            }
        }
    }

    pub fn stats(&self) -> MemoryPoolStats {
        self.stats
    }

    /// number of pooled blocks per class, smallest class first
    pub fn pooled_blocks(&self) -> Vec<usize> {
        self.classes.iter()
            .map(|c| c.pool.len())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::zero(0, 16)]
    #[case::smallest(16, 16)]
    #[case::above_smallest(17, 64)]
    #[case::middle(200, 256)]
    #[case::biggest(4096, 4096)]
    #[case::oversize(4097, 4097)]
    #[case::huge(100_000, 100_000)]
    fn test_acquire_size(#[case] min_size: usize, #[case] expected_len: usize) {
        let mut pool = MemoryPool::new(&ObjectCacheSettings::default_server());
        let block = pool.acquire(min_size);
        assert_eq!(block.len(), expected_len);
        assert_eq!(pool.stats().acquired, 1);
        assert_eq!(pool.stats().allocated, 1);
    }

    #[rstest]
    #[case::exact_16(16, vec![1, 0, 0, 0, 0])]
    #[case::between(100, vec![0, 1, 0, 0, 0])]
    #[case::exact_4096(4096, vec![0, 0, 0, 0, 1])]
    #[case::oversize(5000, vec![0, 0, 0, 0, 1])]
    #[case::too_small(15, vec![0, 0, 0, 0, 0])]
    fn test_release_class(#[case] len: usize, #[case] expected: Vec<usize>) {
        let mut pool = MemoryPool::new(&ObjectCacheSettings::default_server());
        pool.release(vec![0; len]);
        assert_eq!(pool.pooled_blocks(), expected);
    }

    #[test]
    fn test_reuse() {
        let mut pool = MemoryPool::new(&ObjectCacheSettings::default_server());

        let mut block = pool.acquire(50);
        block[0] = 99;
        let ptr = block.as_ptr();
        pool.release(block);

        let block = pool.acquire(33);
        assert_eq!(block.as_ptr(), ptr);
        assert_eq!(block[0], 99);

        assert_eq!(pool.stats(), MemoryPoolStats {
            acquired: 2,
            allocated: 1,
            returned: 1,
            discarded: 0,
        });
    }

    #[test]
    fn test_class_cap() {
        let mut pool = MemoryPool::new(&ObjectCacheSettings::default_client());
        for _ in 0..5 {
            pool.release(vec![0; 256]);
        }
        assert_eq!(pool.pooled_blocks(), vec![0, 0, 2, 0, 0]);
        assert_eq!(pool.stats().returned, 2);
        assert_eq!(pool.stats().discarded, 3);
    }

    #[test]
    fn test_no_cache() {
        let mut pool = MemoryPool::new(&ObjectCacheSettings::dont_use_cache());
        pool.release(vec![0; 64]);
        assert_eq!(pool.pooled_blocks(), vec![0; 5]);

        let _ = pool.acquire(64);
        assert_eq!(pool.stats().allocated, 1);
    }
}
