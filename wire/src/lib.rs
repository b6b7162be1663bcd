//! Message framing and pooled buffer memory for the bichannel transport.
//!
//! This crate has no I/O of its own. It provides the building blocks that the connection layer
//!  uses to move bytes between sockets and the application without allocating per message:
//!
//! * per-thread pools of byte blocks in five size classes ([buffers::memory_pool])
//! * reference counted arrays that return their memory to the pool when the last handle is
//!   dropped ([buffers::recycling_array])
//! * cheaply cloneable offset / length views onto such arrays ([buffers::message_buffer])
//! * a writer and a reader for the big-endian value encoding ([writer], [reader])
//! * the logical [message::Message] with its flags / tag / ping code header
//!
//! ## Value encoding
//!
//! All numbers are in network byte order (BE). Floating point values are written as the bit
//!  pattern of their IEEE-754 representation.
//!
//! ```ascii
//! bool         1 byte, 0 or 1
//! u8 / i8      1 byte
//! u16 / i16    2 bytes
//! u32 / i32    4 bytes
//! u64 / i64    8 bytes
//! f32          4 bytes
//! f64          8 bytes
//! string       length (i32, number of *bytes*) followed by the encoded text
//! char         encoded like a string with a single character
//! byte array   length (i32) followed by the raw bytes
//! bool array   length (i32, number of *bits*) followed by the bits, packed 8 per byte MSB first
//! arrays       length (i32, number of elements) followed by the elements
//! ```
//!
//! ## Message header
//!
//! ```ascii
//! 0: flags (u8)
//!    * bit 7: command message
//!    * bit 6: a ping code is attached
//!    * bit 5: ping type - 0 for a ping, 1 for a ping acknowledgement
//!    * 0-4: unused, should be 0
//! 1: tag (u16)
//! 3: ping code (u16) - present only if bit 6 of the flags is set
//! *: payload
//! ```
//!
//! The header is therefore 3 bytes long for regular messages and 5 bytes for pings and ping
//!  acknowledgements.

pub mod buffers;
pub mod config;
pub mod message;
pub mod reader;
pub mod safe_converter;
pub mod send_mode;
pub mod serializable;
pub mod text_encoding;
pub mod writer;

pub use buffers::message_buffer::MessageBuffer;
pub use message::{Message, MessageError};
pub use reader::{MessageReader, ReadError};
pub use send_mode::SendMode;
pub use serializable::Serializable;
pub use text_encoding::TextEncoding;
pub use writer::MessageWriter;
