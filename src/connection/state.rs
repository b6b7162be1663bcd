use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU8, Ordering};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The lifecycle of a bichannel connection.
///
/// Connections are created `Connected`, on the client only after the handshake has completed.
///  Every connection ends in `Disconnected`, passing through the transient `Disconnecting`
///  while its sockets are shut down.
///
/// `Connecting` and `Interrupted` exist for hosts that track their own connection attempts and
///  network interruptions. Connections of this crate never enter them.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
pub enum ConnectionState {
    Disconnected = 0,
    /// Not produced by this crate
    Connecting = 1,
    Connected = 2,
    Disconnecting = 3,
    /// The connection was interrupted by the network rather than closed by either side. Not
    ///  produced by this crate.
    Interrupted = 4,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub struct AtomicConnectionState(AtomicU8);

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> AtomicConnectionState {
        AtomicConnectionState(AtomicU8::new(state.into()))
    }

    pub fn load(&self) -> ConnectionState {
        ConnectionState::try_from(self.0.load(Ordering::Acquire))
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn store(&self, state: ConnectionState) {
        self.0.store(state.into(), Ordering::Release);
    }

    /// Moves to `Disconnecting` unless the connection is already disconnecting or disconnected.
    ///  Exactly one of several concurrent callers gets `true`.
    pub fn begin_disconnect(&self) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            match ConnectionState::try_from(current) {
                Ok(ConnectionState::Disconnecting) | Ok(ConnectionState::Disconnected) | Err(_) => return false,
                Ok(_) => {}
            }

            match self.0.compare_exchange(current, ConnectionState::Disconnecting.into(), Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}
