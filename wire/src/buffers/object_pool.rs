use tracing::{debug, trace};

/// A capped pool of reusable objects. It is not synchronized: pools are owned by a single
///  thread's [crate::buffers::object_cache::ObjectCache].
pub struct ObjectPool<T> {
    max_size: usize,
    items: Vec<T>,
}

impl <T> ObjectPool<T> {
    pub fn new(max_size: usize) -> ObjectPool<T> {
        ObjectPool {
            max_size,
            items: Vec::with_capacity(max_size),
        }
    }

    pub fn get_from_pool(&mut self) -> Option<T> {
        let result = self.items.pop();
        if result.is_some() {
            trace!("returning object from pool");
        }
        result
    }

    /// Returns `true` if the object was retained, `false` if it was discarded because the
    ///  pool is full
    pub fn return_to_pool(&mut self, item: T) -> bool {
        if self.items.len() < self.max_size {
            trace!("returning object to pool");
            self.items.push(item);
            true
        }
        else {
            debug!("pool is full: discarding returned object");
            false
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty(0, 3, 0)]
    #[case::below_cap(2, 3, 2)]
    #[case::at_cap(3, 3, 3)]
    #[case::above_cap(5, 3, 3)]
    #[case::no_pooling(4, 0, 0)]
    fn test_cap(#[case] num_returned: usize, #[case] max_size: usize, #[case] expected_len: usize) {
        let mut pool = ObjectPool::new(max_size);
        for i in 0..num_returned {
            pool.return_to_pool(i);
        }
        assert_eq!(pool.len(), expected_len);
    }

    #[test]
    fn test_get_returns_pooled() {
        let mut pool = ObjectPool::new(2);
        assert_eq!(pool.get_from_pool(), None::<u32>);

        assert!(pool.return_to_pool(7));
        assert!(pool.return_to_pool(8));
        assert!(!pool.return_to_pool(9));

        assert_eq!(pool.get_from_pool(), Some(8));
        assert_eq!(pool.get_from_pool(), Some(7));
        assert_eq!(pool.get_from_pool(), None);
        assert!(pool.is_empty());
    }
}
