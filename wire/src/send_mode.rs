use std::fmt::{Display, Formatter};

/// The channel a message is sent or was received on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SendMode {
    /// TCP: ordered, reliable, any message size
    Reliable,
    /// UDP: unordered, no delivery guarantee, one datagram per message
    Unreliable,
}

impl Display for SendMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SendMode::Reliable => write!(f, "reliable"),
            SendMode::Unreliable => write!(f, "unreliable"),
        }
    }
}
