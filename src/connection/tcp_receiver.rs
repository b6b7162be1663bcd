use std::io;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{trace, warn};
use wire::{MessageBuffer, SendMode};
use crate::connection::stats::TrafficCounters;
use crate::connection::DisconnectCause;
use crate::error::SocketError;

pub const FRAME_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    #[error("peer declared a negative body length {0}")]
    NegativeLength(i32),
    #[error("peer declared a body length of {len} bytes, the maximum is {max}")]
    BodyTooLong { len: usize, max: usize },
}

enum ReceivePhase {
    AwaitingHeader {
        header: [u8; FRAME_HEADER_LEN],
        filled: usize,
    },
    AwaitingBody {
        body: MessageBuffer,
        filled: usize,
    },
}

/// The framing state of a TCP stream: a 4 byte big-endian body length followed by the body.
///
/// This is a pure state machine without I/O. The receive loop asks for the memory to read into
///  ([TcpReceiveState::read_target]) and reports how many bytes were read into it
///  ([TcpReceiveState::on_bytes_read]), getting a complete body back whenever one is finished.
pub struct TcpReceiveState {
    phase: ReceivePhase,
    max_body_length: Option<usize>,
}

impl TcpReceiveState {
    /// `max_body_length` limits the body length a peer may declare, `None` for no limit
    pub fn new(max_body_length: Option<usize>) -> TcpReceiveState {
        TcpReceiveState {
            phase: Self::awaiting_header(),
            max_body_length,
        }
    }

    fn awaiting_header() -> ReceivePhase {
        ReceivePhase::AwaitingHeader {
            header: [0; FRAME_HEADER_LEN],
            filled: 0,
        }
    }

    pub fn is_awaiting_header(&self) -> bool {
        matches!(self.phase, ReceivePhase::AwaitingHeader { .. })
    }

    /// The memory that the next read should go to. It is never empty.
    pub fn read_target(&mut self) -> &mut [u8] {
        match &mut self.phase {
            ReceivePhase::AwaitingHeader { header, filled } => &mut header[*filled..],
            ReceivePhase::AwaitingBody { body, filled } => &mut body.as_mut_slice()[*filled..],
        }
    }

    pub fn on_bytes_read(&mut self, num_read: usize) -> Result<Option<MessageBuffer>, FramingError> {
        match &mut self.phase {
            ReceivePhase::AwaitingHeader { header, filled } => {
                *filled += num_read;
                if *filled < FRAME_HEADER_LEN {
                    return Ok(None);
                }

                let declared = i32::from_be_bytes(*header);
                let body_len = self.check_body_length(declared)?;
                if body_len == 0 {
                    self.phase = Self::awaiting_header();
                    return Ok(Some(MessageBuffer::create(0)));
                }

                let mut body = MessageBuffer::create(body_len);
                body.set_len(body_len);
                self.phase = ReceivePhase::AwaitingBody { body, filled: 0 };
                Ok(None)
            }
            ReceivePhase::AwaitingBody { body, filled } => {
                *filled += num_read;
                if *filled < body.len() {
                    return Ok(None);
                }

                match std::mem::replace(&mut self.phase, Self::awaiting_header()) {
                    ReceivePhase::AwaitingBody { body, .. } => Ok(Some(body)),
                    ReceivePhase::AwaitingHeader { .. } => unreachable!(),
                }
            }
        }
    }

    fn check_body_length(&self, declared: i32) -> Result<usize, FramingError> {
        let Ok(len) = usize::try_from(declared) else {
            return Err(FramingError::NegativeLength(declared));
        };
        match self.max_body_length {
            Some(max) if len >= max => Err(FramingError::BodyTooLong { len, max }),
            _ => Ok(len),
        }
    }
}

/// Reads frames from a TCP stream and queues their bodies for dispatch
pub(crate) struct TcpReceiver {
    stream: Arc<TcpStream>,
    state: TcpReceiveState,
    inbound: mpsc::Sender<(MessageBuffer, SendMode)>,
}

impl TcpReceiver {
    pub fn new(stream: Arc<TcpStream>, max_body_length: Option<usize>, inbound: mpsc::Sender<(MessageBuffer, SendMode)>) -> TcpReceiver {
        TcpReceiver {
            stream,
            state: TcpReceiveState::new(max_body_length),
            inbound,
        }
    }

    /// Runs until the stream is closed or fails, returning the cause.
    ///
    /// A body is queued before the next read is started, and bytes that are available right
    ///  away are read in a loop rather than waiting for another readiness notification.
    pub async fn receive_loop(&mut self, traffic: &TrafficCounters) -> DisconnectCause {
        loop {
            if let Err(e) = self.stream.readable().await {
                return (SocketError::from(&e), Some(e));
            }

            loop {
                let num_read = match self.stream.try_read(self.state.read_target()) {
                    Ok(0) => {
                        trace!("peer closed the TCP stream");
                        return (SocketError::Disconnecting, None);
                    }
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => return (SocketError::from(&e), Some(e)),
                };
                traffic.add_tcp_received(num_read);

                match self.state.on_bytes_read(num_read) {
                    Ok(None) => {}
                    Ok(Some(body)) => {
                        if self.inbound.send((body, SendMode::Reliable)).await.is_err() {
                            trace!("dispatch queue is closed - stopping TCP receive loop");
                            return (SocketError::Shutdown, None);
                        }
                    }
                    Err(e) => {
                        warn!("striking connection: {}", e);
                        return (SocketError::ProtocolViolation, None);
                    }
                }
            }
        }
    }
}
