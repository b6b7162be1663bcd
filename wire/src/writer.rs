use bytes::buf::UninitSlice;
use bytes::BufMut;
use crate::buffers::message_buffer::MessageBuffer;
use crate::safe_converter::PrecheckedCast;
use crate::serializable::Serializable;
use crate::text_encoding::TextEncoding;

macro_rules! write_array {
    ($name:ident, $t:ty, $put:ident) => {
        /// Writes the element count (i32) followed by the elements
        pub fn $name(&mut self, values: &[$t]) {
            self.ensure_capacity(4 + values.len() * size_of::<$t>());
            self.put_i32(values.len().prechecked_cast());
            for &v in values {
                self.$put(v);
            }
        }
    };
}

/// Serializes values into a pooled [MessageBuffer] using the big-endian wire encoding.
///
/// The writer has a cursor ([MessageWriter::position]) that can be moved back to overwrite
///  data written before. Its length is the highest position ever written to, so moving the
///  cursor back never truncates. The backing buffer grows on demand.
pub struct MessageWriter {
    buffer: MessageBuffer,
    position: usize,
    encoding: TextEncoding,
}

impl Default for MessageWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageWriter {
    pub const DEFAULT_CAPACITY: usize = 16;

    pub fn new() -> MessageWriter {
        Self::with_capacity_and_encoding(Self::DEFAULT_CAPACITY, TextEncoding::default())
    }

    pub fn with_capacity(initial_capacity: usize) -> MessageWriter {
        Self::with_capacity_and_encoding(initial_capacity, TextEncoding::default())
    }

    pub fn with_encoding(encoding: TextEncoding) -> MessageWriter {
        Self::with_capacity_and_encoding(Self::DEFAULT_CAPACITY, encoding)
    }

    pub fn with_capacity_and_encoding(initial_capacity: usize, encoding: TextEncoding) -> MessageWriter {
        MessageWriter {
            buffer: MessageBuffer::create(initial_capacity),
            position: 0,
            encoding,
        }
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.encoding = encoding;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        assert!(position <= self.len(), "position {} is beyond the writer's length {}", position, self.len());
        self.position = position;
    }

    pub fn as_slice(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    fn ensure_capacity(&mut self, additional: usize) {
        let required = self.position + additional;
        if required > self.buffer.capacity() {
            self.buffer.ensure_length(required.max(2 * self.buffer.capacity()));
        }
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.ensure_capacity(1);
        self.put_u8(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.ensure_capacity(1);
        self.put_i8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.ensure_capacity(2);
        self.put_u16(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.ensure_capacity(2);
        self.put_i16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.ensure_capacity(4);
        self.put_u32(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.ensure_capacity(4);
        self.put_i32(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.ensure_capacity(8);
        self.put_u64(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.ensure_capacity(8);
        self.put_i64(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.ensure_capacity(4);
        self.put_f32(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.ensure_capacity(8);
        self.put_f64(value);
    }

    /// A char is written as a string of one character so that it carries its byte length
    pub fn write_char(&mut self, value: char) {
        let mut buf = [0u8; 4];
        self.write_str(value.encode_utf8(&mut buf));
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_str_with_encoding(value, self.encoding);
    }

    /// Writes the encoded length in *bytes* (i32) followed by the encoded text
    pub fn write_str_with_encoding(&mut self, value: &str, encoding: TextEncoding) {
        let byte_count = encoding.byte_count(value);
        self.ensure_capacity(4 + byte_count);
        self.put_i32(byte_count.prechecked_cast());

        let start = self.position;
        encoding.encode_into(value, &mut self.buffer.capacity_mut()[start..start + byte_count]);
        self.advance_position(byte_count);
    }

    /// Writes chars as a single string
    pub fn write_chars(&mut self, value: &[char]) {
        let s = value.iter().collect::<String>();
        self.write_str(&s);
    }

    /// Writes the length (i32) followed by the raw bytes
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.ensure_capacity(4 + value.len());
        self.put_i32(value.len().prechecked_cast());
        self.put_slice(value);
    }

    /// Writes the bytes without a length prefix
    pub fn write_raw(&mut self, value: &[u8]) {
        self.ensure_capacity(value.len());
        self.put_slice(value);
    }

    /// Writes the number of *bits* (i32) followed by the values, packed 8 per byte with the
    ///  first value in the most significant bit
    pub fn write_bool_array(&mut self, values: &[bool]) {
        self.ensure_capacity(4 + values.len().div_ceil(8));
        self.put_i32(values.len().prechecked_cast());

        for chunk in values.chunks(8) {
            let mut b = 0u8;
            for (i, &value) in chunk.iter().enumerate() {
                if value {
                    b |= 1 << (7 - i);
                }
            }
            self.put_u8(b);
        }
    }

    write_array!(write_i8_array, i8, put_i8);
    write_array!(write_i16_array, i16, put_i16);
    write_array!(write_u16_array, u16, put_u16);
    write_array!(write_i32_array, i32, put_i32);
    write_array!(write_u32_array, u32, put_u32);
    write_array!(write_i64_array, i64, put_i64);
    write_array!(write_u64_array, u64, put_u64);
    write_array!(write_f32_array, f32, put_f32);
    write_array!(write_f64_array, f64, put_f64);

    /// Writes the element count (i32) followed by the strings
    pub fn write_str_array<S: AsRef<str>>(&mut self, values: &[S]) {
        self.write_i32(values.len().prechecked_cast());
        for s in values {
            self.write_str(s.as_ref());
        }
    }

    pub fn write_serializable<T: Serializable>(&mut self, value: &T) {
        value.serialize(self);
    }

    /// Writes the element count (i32) followed by the serialized elements
    pub fn write_serializable_array<T: Serializable>(&mut self, values: &[T]) {
        self.write_i32(values.len().prechecked_cast());
        for value in values {
            value.serialize(self);
        }
    }

    /// Reserves `size` zeroed bytes at the current position and returns their position, e.g.
    ///  for a value that is known only after subsequent data was written
    pub fn reserve(&mut self, size: usize) -> usize {
        self.ensure_capacity(size);
        let location = self.position;
        self.buffer.capacity_mut()[location..location + size].fill(0);
        self.advance_position(size);
        location
    }

    /// A view of the written data, sharing the writer's memory
    pub fn to_buffer(&self) -> MessageBuffer {
        self.buffer.clone()
    }

    pub fn into_buffer(self) -> MessageBuffer {
        self.buffer
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    fn advance_position(&mut self, cnt: usize) {
        self.position += cnt;
        if self.position > self.buffer.len() {
            self.buffer.set_len(self.position);
        }
    }
}

unsafe impl BufMut for MessageWriter {
    fn remaining_mut(&self) -> usize {
        isize::MAX as usize - self.position
    }

    unsafe fn advance_mut(&mut self, cnt: usize) {
        assert!(self.position + cnt <= self.buffer.capacity());
        self.advance_position(cnt);
    }

    fn chunk_mut(&mut self) -> &mut UninitSlice {
        if self.position == self.buffer.capacity() {
            self.ensure_capacity(Self::DEFAULT_CAPACITY);
        }
        let position = self.position;
        UninitSlice::new(&mut self.buffer.capacity_mut()[position..])
    }
}
