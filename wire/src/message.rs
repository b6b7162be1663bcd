use std::fmt::{Display, Formatter};
use bytes::{Buf, BufMut};
use rand::Rng;
use crate::buffers::message_buffer::MessageBuffer;
use crate::reader::{MessageReader, ReadError};
use crate::serializable::Serializable;
use crate::writer::MessageWriter;

const COMMAND_FLAG_MASK: u8 = 0b1000_0000;
const IS_PING_FLAG_MASK: u8 = 0b0100_0000;
const PING_TYPE_FLAG_MASK: u8 = 0b0010_0000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("message is read-only - create a writable instance using Message::clone()")]
    ReadOnly,
    #[error("the message to acknowledge is not a ping message")]
    NotAPing,
    #[error("{len} bytes are too short for a message header of {header_len} bytes")]
    Truncated { len: usize, header_len: usize },
    #[error(transparent)]
    Read(#[from] ReadError),
}

/// The header that precedes a message's payload on the wire, see the crate documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub flags: u8,
    pub tag: u16,
    /// meaningful only if the flags mark a ping or ping acknowledgement
    pub ping_code: u16,
}

impl MessageHeader {
    pub const BASE_LEN: usize = 3;
    pub const WITH_PING_CODE_LEN: usize = 5;

    pub fn has_ping_code(&self) -> bool {
        self.flags & IS_PING_FLAG_MASK != 0
    }

    pub fn serialized_len(&self) -> usize {
        if self.has_ping_code() {
            Self::WITH_PING_CODE_LEN
        }
        else {
            Self::BASE_LEN
        }
    }

    pub fn ser(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.flags);
        buf.put_u16(self.tag);
        if self.has_ping_code() {
            buf.put_u16(self.ping_code);
        }
    }

    pub fn deser(buf: &mut impl Buf) -> Result<MessageHeader, MessageError> {
        let len = buf.remaining();
        if len < Self::BASE_LEN {
            return Err(MessageError::Truncated { len, header_len: Self::BASE_LEN });
        }

        let flags = buf.get_u8();
        let tag = buf.get_u16();
        let mut result = MessageHeader { flags, tag, ping_code: 0 };

        if result.has_ping_code() {
            if buf.remaining() < 2 {
                return Err(MessageError::Truncated { len, header_len: Self::WITH_PING_CODE_LEN });
            }
            result.ping_code = buf.get_u16();
        }
        Ok(result)
    }
}

/// An application level message: a tag and a payload, plus flags and an optional ping code.
///
/// Messages that wrap inbound wire data are read-only, and their setters fail with
///  [MessageError::ReadOnly]. `clone()` always produces a writable message that shares the
///  payload memory.
pub struct Message {
    flags: u8,
    tag: u16,
    ping_code: u16,
    payload: MessageBuffer,
    read_only: bool,
}

impl Message {
    pub fn create_empty(tag: u16) -> Message {
        Self::with_payload(tag, MessageBuffer::create(0))
    }

    /// Creates a message with the writer's content as payload. The payload shares the writer's
    ///  memory.
    pub fn create(tag: u16, writer: &MessageWriter) -> Message {
        Self::with_payload(tag, writer.to_buffer())
    }

    pub fn create_serializable<T: Serializable>(tag: u16, value: &T) -> Message {
        let mut writer = MessageWriter::new();
        writer.write_serializable(value);
        Self::with_payload(tag, writer.into_buffer())
    }

    pub fn with_payload(tag: u16, payload: MessageBuffer) -> Message {
        Message {
            flags: 0,
            tag,
            ping_code: 0,
            payload,
            read_only: false,
        }
    }

    /// Decodes a header + payload buffer as it was received from the network. The header is
    ///  sliced off the front, and the payload is a view onto the same memory.
    pub fn from_wire(buffer: &MessageBuffer, read_only: bool) -> Result<Message, MessageError> {
        let header = MessageHeader::deser(&mut buffer.as_slice())?;

        let mut payload = buffer.clone();
        payload.advance(header.serialized_len());

        Ok(Message {
            flags: header.flags,
            tag: header.tag,
            ping_code: header.ping_code,
            payload,
            read_only,
        })
    }

    fn check_writable(&self) -> Result<(), MessageError> {
        if self.read_only {
            return Err(MessageError::ReadOnly);
        }
        Ok(())
    }

    pub fn tag(&self) -> u16 {
        self.tag
    }

    pub fn set_tag(&mut self, tag: u16) -> Result<(), MessageError> {
        self.check_writable()?;
        self.tag = tag;
        Ok(())
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_command_message(&self) -> bool {
        self.flags & COMMAND_FLAG_MASK != 0
    }

    pub fn set_command_message(&mut self, value: bool) -> Result<(), MessageError> {
        self.check_writable()?;
        if value {
            self.flags |= COMMAND_FLAG_MASK;
        }
        else {
            self.flags &= !COMMAND_FLAG_MASK;
        }
        Ok(())
    }

    pub fn is_ping_message(&self) -> bool {
        self.flags & IS_PING_FLAG_MASK != 0 && self.flags & PING_TYPE_FLAG_MASK == 0
    }

    pub fn is_ping_acknowledgement_message(&self) -> bool {
        self.flags & IS_PING_FLAG_MASK != 0 && self.flags & PING_TYPE_FLAG_MASK != 0
    }

    /// The correlation code of a ping or ping acknowledgement, `None` for other messages
    pub fn ping_code(&self) -> Option<u16> {
        if self.flags & IS_PING_FLAG_MASK != 0 {
            Some(self.ping_code)
        }
        else {
            None
        }
    }

    /// Flags this message as a ping with a random correlation code
    pub fn make_ping_message(&mut self) -> Result<(), MessageError> {
        self.check_writable()?;
        self.flags = (self.flags | IS_PING_FLAG_MASK) & !PING_TYPE_FLAG_MASK;
        self.ping_code = rand::rng().random();
        Ok(())
    }

    /// Flags this message as the acknowledgement of the given ping, copying its code
    pub fn make_ping_acknowledgement_message(&mut self, acknowledging: &Message) -> Result<(), MessageError> {
        self.check_writable()?;
        if !acknowledging.is_ping_message() {
            return Err(MessageError::NotAPing);
        }
        self.flags |= IS_PING_FLAG_MASK | PING_TYPE_FLAG_MASK;
        self.ping_code = acknowledging.ping_code;
        Ok(())
    }

    pub fn data_len(&self) -> usize {
        self.payload.len()
    }

    pub fn payload(&self) -> &MessageBuffer {
        &self.payload
    }

    /// A reader over the payload. It shares the payload memory, but has its own reference.
    pub fn reader(&self) -> MessageReader {
        MessageReader::new(self.payload.clone())
    }

    /// Replaces the payload with an empty one
    pub fn empty(&mut self) -> Result<(), MessageError> {
        self.check_writable()?;
        self.payload = MessageBuffer::create(0);
        Ok(())
    }

    /// Replaces the payload with the writer's content
    pub fn serialize_writer(&mut self, writer: &MessageWriter) -> Result<(), MessageError> {
        self.check_writable()?;
        self.payload = writer.to_buffer();
        Ok(())
    }

    pub fn serialize<T: Serializable>(&mut self, value: &T) -> Result<(), MessageError> {
        self.check_writable()?;
        let mut writer = MessageWriter::new();
        writer.write_serializable(value);
        self.payload = writer.into_buffer();
        Ok(())
    }

    pub fn deserialize<T: Serializable>(&self) -> Result<T, MessageError> {
        Ok(self.reader().read_serializable()?)
    }

    pub fn deserialize_into<T: Serializable>(&self, value: &mut T) -> Result<(), MessageError> {
        Ok(self.reader().read_serializable_into(value)?)
    }

    pub fn header(&self) -> MessageHeader {
        MessageHeader {
            flags: self.flags,
            tag: self.tag,
            ping_code: self.ping_code,
        }
    }

    /// Header and payload in a new buffer, ready to be sent
    pub fn to_buffer(&self) -> MessageBuffer {
        let header = self.header();
        let total_len = header.serialized_len() + self.data_len();

        let mut result = MessageBuffer::create(total_len);
        result.set_len(total_len);
        let mut dst = result.as_mut_slice();
        header.ser(&mut dst);
        dst.put_slice(self.payload.as_slice());
        result
    }

    /// Releases the payload. This is the same as dropping the message.
    pub fn dispose(self) {}
}

impl Clone for Message {
    fn clone(&self) -> Self {
        Message {
            flags: self.flags,
            tag: self.tag,
            ping_code: self.ping_code,
            payload: self.payload.clone(),
            read_only: false,
        }
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Message with tag '{}' and {} bytes of data.", self.tag, self.data_len())
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("flags", &self.flags)
            .field("tag", &self.tag)
            .field("ping_code", &self.ping_code())
            .field("data_len", &self.data_len())
            .field("read_only", &self.read_only)
            .finish()
    }
}
