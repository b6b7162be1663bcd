use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use crate::buffers::object_cache::ObjectCache;

struct ArrayMemory {
    block: Vec<u8>,
}

impl Drop for ArrayMemory {
    fn drop(&mut self) {
        ObjectCache::recycle_array_memory(std::mem::take(&mut self.block));
    }
}

/// A reference counted block of pooled memory.
///
/// Every handle counts as one reference: creation starts the count at 1, `clone()` increments it
///  and dropping a handle decrements it. When the last handle is dropped, the block goes back
///  to the memory pool of the dropping thread - exactly once, since it is the `Arc`'s strong
///  count that does the counting. Using the memory after that point is ruled out by ownership.
#[derive(Clone)]
pub struct RecyclingArray {
    inner: Arc<ArrayMemory>,
}

impl RecyclingArray {
    /// Creates an array with a length of at least `min_size` bytes
    pub fn create(min_size: usize) -> RecyclingArray {
        RecyclingArray {
            inner: Arc::new(ArrayMemory {
                block: ObjectCache::acquire_array_memory(min_size),
            }),
        }
    }

    /// The full length of the underlying block, which can exceed the requested size
    pub fn len(&self) -> usize {
        self.inner.block.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.block.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner.block
    }

    /// Mutable access to the memory, which is only possible while this is the only handle
    pub fn get_mut(&mut self) -> Option<&mut [u8]> {
        Arc::get_mut(&mut self.inner)
            .map(|m| m.block.as_mut_slice())
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn ptr_eq(&self, other: &RecyclingArray) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for RecyclingArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecyclingArray")
            .field("len", &self.len())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::one(1)]
    #[case::two(2)]
    #[case::many(17)]
    fn test_returned_exactly_once(#[case] num_handles: usize) {
        std::thread::spawn(move || {
            let array = RecyclingArray::create(10);
            let mut handles = vec![array];
            for _ in 1..num_handles {
                let clone = handles[0].clone();
                handles.push(clone);
            }
            assert_eq!(handles[0].ref_count(), num_handles);

            while handles.len() > 1 {
                handles.pop();
                assert_eq!(ObjectCache::thread_stats().arrays_recycled, 0);
            }
            assert_eq!(handles[0].ref_count(), 1);

            handles.pop();
            let stats = ObjectCache::thread_stats();
            assert_eq!(stats.arrays_created, 1);
            assert_eq!(stats.arrays_recycled, 1);
            assert_eq!(stats.memory.returned, 1);
        })
            .join()
            .unwrap();
    }

    #[test]
    fn test_get_mut_only_when_unique() {
        let mut array = RecyclingArray::create(4);
        assert!(array.get_mut().is_some());

        let clone = array.clone();
        assert!(array.ptr_eq(&clone));
        assert!(array.get_mut().is_none());

        drop(clone);
        array.get_mut().unwrap()[0] = 5;
        assert_eq!(array.as_slice()[0], 5);
    }

    #[test]
    fn test_recycled_on_dropping_thread() {
        let array = RecyclingArray::create(1000);
        std::thread::spawn(move || {
            drop(array);
            let stats = ObjectCache::thread_stats();
            assert_eq!(stats.arrays_created, 0);
            assert_eq!(stats.arrays_recycled, 1);
            assert_eq!(ObjectCache::thread_pooled_blocks(), vec![0, 0, 0, 1, 0]);
        })
            .join()
            .unwrap();
    }
}
