use bytes::Buf;
use crate::buffers::message_buffer::MessageBuffer;
use crate::serializable::Serializable;
use crate::text_encoding::TextEncoding;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("expected {expected} bytes but reader only has {remaining} bytes remaining")]
    EndOfData { expected: usize, remaining: usize },
    #[error("length prefix is negative: {0}")]
    NegativeLength(i32),
    #[error("data is not valid {encoding:?} text")]
    InvalidText { encoding: TextEncoding },
}

macro_rules! read_array {
    ($name:ident, $name_into:ident, $t:ty, $get:ident) => {
        pub fn $name(&mut self) -> Result<Vec<$t>, ReadError> {
            let mut result = Vec::new();
            self.$name_into(&mut result)?;
            Ok(result)
        }

        /// Appends the elements to `dest`, allowing reuse of an existing allocation
        pub fn $name_into(&mut self, dest: &mut Vec<$t>) -> Result<(), ReadError> {
            let count = self.read_length_prefix(|n| n.saturating_mul(size_of::<$t>()))?;
            dest.reserve(count);
            for _ in 0..count {
                dest.push(self.$get());
            }
            Ok(())
        }
    };
}

/// Deserializes values from a [MessageBuffer], mirroring [crate::writer::MessageWriter].
///
/// Every read checks that the requested number of bytes is available before consuming anything,
///  failing with [ReadError::EndOfData] otherwise. A failed read leaves the position unchanged.
pub struct MessageReader {
    buffer: MessageBuffer,
    position: usize,
    encoding: TextEncoding,
}

impl MessageReader {
    pub fn new(buffer: MessageBuffer) -> MessageReader {
        MessageReader {
            buffer,
            position: 0,
            encoding: TextEncoding::default(),
        }
    }

    /// Copies the data into a pooled buffer
    pub fn from_slice(data: &[u8]) -> MessageReader {
        Self::new(MessageBuffer::from_slice(data))
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

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        assert!(position <= self.len(), "position {} is beyond the reader's length {}", position, self.len());
        self.position = position;
    }

    pub fn remaining(&self) -> usize {
        self.len() - self.position
    }

    pub fn into_buffer(self) -> MessageBuffer {
        self.buffer
    }

    fn check(&self, size: usize) -> Result<(), ReadError> {
        if size > self.remaining() {
            return Err(ReadError::EndOfData {
                expected: size,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    /// Reads an i32 length prefix and checks that the data it announces is available, as
    ///  computed by `byte_len`
    fn read_length_prefix(&mut self, byte_len: impl Fn(usize) -> usize) -> Result<usize, ReadError> {
        self.check(4)?;
        let raw = i32::from_be_bytes([
            self.chunk()[0], self.chunk()[1], self.chunk()[2], self.chunk()[3]
        ]);
        let count = usize::try_from(raw)
            .map_err(|_| ReadError::NegativeLength(raw))?;

        let available = self.remaining() - 4;
        let required = byte_len(count);
        if required > available {
            return Err(ReadError::EndOfData {
                expected: required,
                remaining: available,
            });
        }

        self.position += 4;
        Ok(count)
    }

    pub fn read_bool(&mut self) -> Result<bool, ReadError> {
        Ok(self.read_u8()? == 1)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        self.check(1)?;
        Ok(self.get_u8())
    }

    pub fn read_i8(&mut self) -> Result<i8, ReadError> {
        self.check(1)?;
        Ok(self.get_i8())
    }

    pub fn read_u16(&mut self) -> Result<u16, ReadError> {
        self.check(2)?;
        Ok(self.get_u16())
    }

    pub fn read_i16(&mut self) -> Result<i16, ReadError> {
        self.check(2)?;
        Ok(self.get_i16())
    }

    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        self.check(4)?;
        Ok(self.get_u32())
    }

    pub fn read_i32(&mut self) -> Result<i32, ReadError> {
        self.check(4)?;
        Ok(self.get_i32())
    }

    pub fn read_u64(&mut self) -> Result<u64, ReadError> {
        self.check(8)?;
        Ok(self.get_u64())
    }

    pub fn read_i64(&mut self) -> Result<i64, ReadError> {
        self.check(8)?;
        Ok(self.get_i64())
    }

    pub fn read_f32(&mut self) -> Result<f32, ReadError> {
        self.check(4)?;
        Ok(self.get_f32())
    }

    pub fn read_f64(&mut self) -> Result<f64, ReadError> {
        self.check(8)?;
        Ok(self.get_f64())
    }

    pub fn read_str(&mut self) -> Result<String, ReadError> {
        self.read_str_with_encoding(self.encoding)
    }

    pub fn read_str_with_encoding(&mut self, encoding: TextEncoding) -> Result<String, ReadError> {
        let start = self.position;
        let byte_count = self.read_length_prefix(|n| n)?;

        let text_start = self.position;
        match encoding.decode(&self.buffer.as_slice()[text_start..text_start + byte_count]) {
            Ok(s) => {
                self.position += byte_count;
                Ok(s)
            }
            Err(e) => {
                self.position = start;
                Err(e)
            }
        }
    }

    /// Reads a string that must consist of exactly one char
    pub fn read_char(&mut self) -> Result<char, ReadError> {
        let start = self.position;
        let s = self.read_str()?;

        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => {
                self.position = start;
                Err(ReadError::InvalidText { encoding: self.encoding })
            }
        }
    }

    pub fn read_chars(&mut self) -> Result<Vec<char>, ReadError> {
        Ok(self.read_str()?.chars().collect())
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, ReadError> {
        let mut result = Vec::new();
        self.read_bytes_into(&mut result)?;
        Ok(result)
    }

    pub fn read_bytes_into(&mut self, dest: &mut Vec<u8>) -> Result<(), ReadError> {
        let len = self.read_length_prefix(|n| n)?;
        dest.extend_from_slice(&self.chunk()[..len]);
        self.position += len;
        Ok(())
    }

    /// Reads `len` bytes without a length prefix, borrowing them from the reader's buffer
    pub fn read_raw(&mut self, len: usize) -> Result<&[u8], ReadError> {
        self.check(len)?;
        let start = self.position;
        self.position += len;
        Ok(&self.buffer.as_slice()[start..start + len])
    }

    pub fn read_bool_array(&mut self) -> Result<Vec<bool>, ReadError> {
        let mut result = Vec::new();
        self.read_bool_array_into(&mut result)?;
        Ok(result)
    }

    pub fn read_bool_array_into(&mut self, dest: &mut Vec<bool>) -> Result<(), ReadError> {
        let num_bits = self.read_length_prefix(|n| n.div_ceil(8))?;
        dest.reserve(num_bits);

        let mut remaining_bits = num_bits;
        while remaining_bits > 0 {
            let b = self.get_u8();
            for k in (0..8).rev().take(remaining_bits.min(8)) {
                dest.push(b & (1 << k) != 0);
            }
            remaining_bits = remaining_bits.saturating_sub(8);
        }
        Ok(())
    }

    read_array!(read_i8_array, read_i8_array_into, i8, get_i8);
    read_array!(read_i16_array, read_i16_array_into, i16, get_i16);
    read_array!(read_u16_array, read_u16_array_into, u16, get_u16);
    read_array!(read_i32_array, read_i32_array_into, i32, get_i32);
    read_array!(read_u32_array, read_u32_array_into, u32, get_u32);
    read_array!(read_i64_array, read_i64_array_into, i64, get_i64);
    read_array!(read_u64_array, read_u64_array_into, u64, get_u64);
    read_array!(read_f32_array, read_f32_array_into, f32, get_f32);
    read_array!(read_f64_array, read_f64_array_into, f64, get_f64);

    /// For reads that consist of several reads, any of which may fail after others succeeded
    fn rewind_on_error<T>(&mut self, read: impl FnOnce(&mut MessageReader) -> Result<T, ReadError>) -> Result<T, ReadError> {
        let start = self.position;
        let result = read(self);
        if result.is_err() {
            self.position = start;
        }
        result
    }

    pub fn read_str_array(&mut self) -> Result<Vec<String>, ReadError> {
        self.rewind_on_error(|reader| {
            // each string has at least its 4 byte length prefix
            let count = reader.read_length_prefix(|n| n.saturating_mul(4))?;
            (0..count)
                .map(|_| reader.read_str())
                .collect()
        })
    }

    pub fn read_serializable<T: Serializable>(&mut self) -> Result<T, ReadError> {
        self.rewind_on_error(|reader| T::deserialize(reader))
    }

    /// On failure, the position is restored but `value` may be partially overwritten
    pub fn read_serializable_into<T: Serializable>(&mut self, value: &mut T) -> Result<(), ReadError> {
        self.rewind_on_error(|reader| value.deserialize_into(reader))
    }

    pub fn read_serializable_array<T: Serializable>(&mut self) -> Result<Vec<T>, ReadError> {
        self.rewind_on_error(|reader| {
            let count = reader.read_length_prefix(|_| 0)?;
            (0..count)
                .map(|_| T::deserialize(reader))
                .collect()
        })
    }
}

impl Buf for MessageReader {
    fn remaining(&self) -> usize {
        self.len() - self.position
    }

    fn chunk(&self) -> &[u8] {
        &self.buffer.as_slice()[self.position..]
    }

    fn advance(&mut self, cnt: usize) {
        assert!(cnt <= self.len() - self.position);
        self.position += cnt;
    }
}
