use std::fmt::{Display, Formatter};
use std::io;

/// The cause of a disconnection, in the shape of a socket error code. It is reported to the
///  application through [crate::connection::ConnectionHandler::on_disconnected].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketError {
    /// The connection was closed locally, by calling `disconnect()`
    Success,
    /// The peer closed the TCP stream
    Disconnecting,
    ConnectionReset,
    ConnectionAborted,
    ConnectionRefused,
    TimedOut,
    NotConnected,
    /// The socket was shut down, e.g. writing after the peer closed its receiving end
    Shutdown,
    /// The peer violated a protocol limit and the connection was struck
    ProtocolViolation,
    Other,
}

impl SocketError {
    /// `true` for errors that represent a regular, non-faulty close
    pub fn is_graceful(&self) -> bool {
        matches!(self, SocketError::Success | SocketError::Disconnecting)
    }
}

impl From<&io::Error> for SocketError {
    fn from(e: &io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionReset => SocketError::ConnectionReset,
            io::ErrorKind::ConnectionAborted => SocketError::ConnectionAborted,
            io::ErrorKind::ConnectionRefused => SocketError::ConnectionRefused,
            io::ErrorKind::TimedOut => SocketError::TimedOut,
            io::ErrorKind::NotConnected => SocketError::NotConnected,
            io::ErrorKind::BrokenPipe => SocketError::Shutdown,
            io::ErrorKind::UnexpectedEof => SocketError::Disconnecting,
            _ => SocketError::Other,
        }
    }
}

impl Display for SocketError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SocketError::Success => "success",
            SocketError::Disconnecting => "disconnecting",
            SocketError::ConnectionReset => "connection reset",
            SocketError::ConnectionAborted => "connection aborted",
            SocketError::ConnectionRefused => "connection refused",
            SocketError::TimedOut => "timed out",
            SocketError::NotConnected => "not connected",
            SocketError::Shutdown => "shutdown",
            SocketError::ProtocolViolation => "protocol violation",
            SocketError::Other => "other socket error",
        };
        write!(f, "{}", s)
    }
}

/// Failure to establish a client connection
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The server could be reached, but the handshake did not complete: a timeout, or a
    ///  malformed token or hello
    #[error("connection establishment failed: {reason}")]
    Establishment {
        reason: String,
        socket_error: SocketError,
        #[source]
        source: Option<io::Error>,
    },
    /// A socket operation failed, e.g. the TCP connect was refused
    #[error("socket error during connect: {socket_error}")]
    Transport {
        socket_error: SocketError,
        #[source]
        source: io::Error,
    },
}

impl ConnectionError {
    pub(crate) fn establishment(reason: impl Into<String>, socket_error: SocketError) -> ConnectionError {
        ConnectionError::Establishment {
            reason: reason.into(),
            socket_error,
            source: None,
        }
    }

    pub(crate) fn establishment_caused_by(reason: impl Into<String>, source: io::Error) -> ConnectionError {
        ConnectionError::Establishment {
            reason: reason.into(),
            socket_error: SocketError::from(&source),
            source: Some(source),
        }
    }

    pub fn socket_error(&self) -> SocketError {
        match self {
            ConnectionError::Establishment { socket_error, .. } => *socket_error,
            ConnectionError::Transport { socket_error, .. } => *socket_error,
        }
    }
}

impl From<io::Error> for ConnectionError {
    fn from(e: io::Error) -> Self {
        ConnectionError::Transport {
            socket_error: SocketError::from(&e),
            source: e,
        }
    }
}
