use crate::reader::{MessageReader, ReadError};
use crate::writer::MessageWriter;

/// Application types that can be written to and read from a message payload
pub trait Serializable {
    fn serialize(&self, writer: &mut MessageWriter);

    fn deserialize(reader: &mut MessageReader) -> Result<Self, ReadError> where Self: Sized;

    /// Deserializes into an existing instance. Types that hold reusable allocations can
    ///  override this to avoid allocating.
    fn deserialize_into(&mut self, reader: &mut MessageReader) -> Result<(), ReadError> where Self: Sized {
        *self = Self::deserialize(reader)?;
        Ok(())
    }
}
