use anyhow::bail;

/// The number of size classes in a [crate::buffers::memory_pool::MemoryPool]
pub const NUM_MEMORY_CLASSES: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryClass {
    /// The length of blocks handed out for this class. A request is served from the smallest
    ///  class whose block size is at least the requested size.
    pub block_size: usize,
    /// The number of blocks that are retained per thread - blocks returned in excess of this
    ///  number are discarded.
    pub max_blocks: usize,
}

/// Settings for the per-thread object cache. The settings are process-wide, but every thread has
///  its own pools, so the memory retained by the cache is up to `max_blocks * block_size` summed
///  over all classes *per thread*.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectCacheSettings {
    /// Size classes, ordered by strictly increasing block size
    pub memory_classes: [MemoryClass; NUM_MEMORY_CLASSES],
}

impl ObjectCacheSettings {
    const DEFAULT_BLOCK_SIZES: [usize; NUM_MEMORY_CLASSES] = [16, 64, 256, 1024, 4096];

    /// Settings for a client process: few threads and few concurrent messages
    pub fn default_client() -> ObjectCacheSettings {
        Self::with_max_blocks(2)
    }

    /// Settings for a server process with many concurrent connections
    pub fn default_server() -> ObjectCacheSettings {
        Self::with_max_blocks(4)
    }

    /// Settings that never retain memory, i.e. every block is freshly allocated. This is useful
    ///  for isolating pooling problems.
    pub fn dont_use_cache() -> ObjectCacheSettings {
        Self::with_max_blocks(0)
    }

    fn with_max_blocks(max_blocks: usize) -> ObjectCacheSettings {
        ObjectCacheSettings {
            memory_classes: Self::DEFAULT_BLOCK_SIZES.map(|block_size| MemoryClass {
                block_size,
                max_blocks,
            }),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let mut prev_size = 0;
        for class in &self.memory_classes {
            if class.block_size == 0 {
                bail!("memory class block size must be positive");
            }
            if class.block_size <= prev_size {
                bail!("memory class block sizes must be strictly increasing, {} follows {}", class.block_size, prev_size);
            }
            prev_size = class.block_size;
        }
        Ok(())
    }
}

impl Default for ObjectCacheSettings {
    fn default() -> Self {
        Self::default_server()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::client(ObjectCacheSettings::default_client(), 2)]
    #[case::server(ObjectCacheSettings::default_server(), 4)]
    #[case::no_cache(ObjectCacheSettings::dont_use_cache(), 0)]
    fn test_defaults(#[case] settings: ObjectCacheSettings, #[case] max_blocks: usize) {
        assert!(settings.validate().is_ok());

        let sizes = settings.memory_classes.iter().map(|c| c.block_size).collect::<Vec<_>>();
        assert_eq!(sizes, vec![16, 64, 256, 1024, 4096]);
        assert!(settings.memory_classes.iter().all(|c| c.max_blocks == max_blocks));
    }

    #[rstest]
    #[case::zero_size([0, 64, 256, 1024, 4096])]
    #[case::duplicate([16, 64, 64, 1024, 4096])]
    #[case::decreasing([16, 64, 256, 4096, 1024])]
    fn test_validate_invalid(#[case] sizes: [usize; NUM_MEMORY_CLASSES]) {
        let settings = ObjectCacheSettings {
            memory_classes: sizes.map(|block_size| MemoryClass { block_size, max_blocks: 1 }),
        };
        assert!(settings.validate().is_err());
    }
}
