use std::fmt::{Debug, Formatter};
use crate::buffers::recycling_array::RecyclingArray;

/// An offset / length view onto a [RecyclingArray].
///
/// Cloning a view is cheap: it shares the array (incrementing its reference count) and has its
///  own independent offset and length. Dropping or [MessageBuffer::dispose]ing a view releases
///  its reference.
///
/// A view is mutated by its owner before it is shared. If a view is mutated while its array is
///  shared, the content is copied to a fresh array first so that other views never observe the
///  change.
#[derive(Clone)]
pub struct MessageBuffer {
    array: RecyclingArray,
    offset: usize,
    count: usize,
}

impl MessageBuffer {
    /// Creates an empty buffer that can hold at least `min_capacity` bytes without growing
    pub fn create(min_capacity: usize) -> MessageBuffer {
        MessageBuffer {
            array: RecyclingArray::create(min_capacity),
            offset: 0,
            count: 0,
        }
    }

    pub fn from_slice(data: &[u8]) -> MessageBuffer {
        let mut result = MessageBuffer::create(data.len());
        result.set_len(data.len());
        result.as_mut_slice().copy_from_slice(data);
        result
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The number of bytes available from this view's offset to the end of the array
    pub fn capacity(&self) -> usize {
        self.array.len() - self.offset
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.array.as_slice()[self.offset..self.offset + self.count]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let count = self.count;
        &mut self.capacity_mut()[..count]
    }

    /// The full memory from this view's offset to the end of the array, including the bytes
    ///  after the current length
    pub fn capacity_mut(&mut self) -> &mut [u8] {
        if self.array.get_mut().is_none() {
            let mut copy = RecyclingArray::create(self.capacity());
            if let Some(memory) = copy.get_mut() {
                memory[..self.count].copy_from_slice(self.as_slice());
            }
            self.array = copy;
            self.offset = 0;
        }

        let offset = self.offset;
        match self.array.get_mut() {
            Some(memory) => &mut memory[offset..],
            None => unreachable!("a freshly copied array has no other handles"),
        }
    }

    /// Makes sure that the view can hold `new_len` bytes. If the array is too small, a new array
    ///  is acquired, the view's content is copied over and the reference to the old array is
    ///  released. The array never grows in place.
    pub fn ensure_length(&mut self, new_len: usize) {
        if new_len <= self.capacity() {
            return;
        }

        let mut grown = RecyclingArray::create(new_len);
        if let Some(memory) = grown.get_mut() {
            memory[..self.count].copy_from_slice(self.as_slice());
        }
        self.array = grown;
        self.offset = 0;
    }

    /// Sets the view's length, growing the array if necessary. Bytes that become part of the
    ///  view this way have unspecified content.
    pub fn set_len(&mut self, new_len: usize) {
        self.ensure_length(new_len);
        self.count = new_len;
    }

    pub fn truncate(&mut self, len: usize) {
        self.count = self.count.min(len);
    }

    /// Removes `cnt` bytes from the front of the view without copying
    pub fn advance(&mut self, cnt: usize) {
        assert!(cnt <= self.count, "cannot advance {} bytes in a buffer of {} bytes", cnt, self.count);
        self.offset += cnt;
        self.count -= cnt;
    }

    /// The number of views (and other handles) that currently share this view's array
    pub fn ref_count(&self) -> usize {
        self.array.ref_count()
    }

    pub fn shares_array_with(&self, other: &MessageBuffer) -> bool {
        self.array.ptr_eq(&other.array)
    }

    /// Releases this view's reference to the array. This is the same as dropping it, and makes
    ///  the release explicit at call sites.
    pub fn dispose(self) {}
}

impl AsRef<[u8]> for MessageBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl PartialEq for MessageBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}
impl Eq for MessageBuffer {}

impl Debug for MessageBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.as_slice().fmt(f)
    }
}
