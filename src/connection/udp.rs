use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
#[cfg(test)] use mockall::automock;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use wire::{MessageBuffer, SendMode};
use crate::connection::stats::TrafficCounters;
use crate::connection::DisconnectCause;
use crate::error::SocketError;

/// The largest payload that fits into a single IPv4 UDP datagram
pub const MAX_DATAGRAM_PAYLOAD: usize = 65507;

/// The unreliable half of a connection: sends datagrams to the connection's remote UDP endpoint
#[cfg_attr(test, automock)]
pub trait DatagramSink: Send + Sync + 'static {
    /// Sends without waiting, failing with `WouldBlock` if the socket is not ready
    fn try_send_datagram(&self, datagram: &[u8]) -> io::Result<usize>;

    fn remote_addr(&self) -> SocketAddr;
}

/// A client's own UDP socket, connected to the server's UDP endpoint
pub struct ConnectedUdpSink {
    socket: Arc<UdpSocket>,
    remote_addr: SocketAddr,
}

impl ConnectedUdpSink {
    pub fn new(socket: Arc<UdpSocket>, remote_addr: SocketAddr) -> ConnectedUdpSink {
        ConnectedUdpSink {
            socket,
            remote_addr,
        }
    }
}

impl DatagramSink for ConnectedUdpSink {
    fn try_send_datagram(&self, datagram: &[u8]) -> io::Result<usize> {
        self.socket.try_send(datagram)
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}

/// The listener's UDP socket, shared by all of the listener's connections, with an explicit
///  destination per connection
pub struct ListenerUdpSink {
    socket: Arc<UdpSocket>,
    remote_addr: SocketAddr,
}

impl ListenerUdpSink {
    pub fn new(socket: Arc<UdpSocket>, remote_addr: SocketAddr) -> ListenerUdpSink {
        ListenerUdpSink {
            socket,
            remote_addr,
        }
    }
}

impl DatagramSink for ListenerUdpSink {
    fn try_send_datagram(&self, datagram: &[u8]) -> io::Result<usize> {
        self.socket.try_send_to(datagram, self.remote_addr)
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}

/// Returns `Ok(false)` if the datagram was dropped: UDP gives no delivery guarantee, so a datagram
///  that is too large or that finds the socket busy is not an error. Any other failure is.
pub(crate) fn send_datagram(sink: &dyn DatagramSink, datagram: &[u8]) -> io::Result<bool> {
    if datagram.len() > MAX_DATAGRAM_PAYLOAD {
        debug!("datagram of {} bytes exceeds the maximum of {} - dropping", datagram.len(), MAX_DATAGRAM_PAYLOAD);
        return Ok(false);
    }

    match sink.try_send_datagram(datagram) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            trace!("UDP socket is busy - dropping datagram to {:?}", sink.remote_addr());
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// An ICMP 'port unreachable' bounce, reported as reset or refused depending on the platform.
///  This is expected noise with NAT traversal.
pub(crate) fn is_unreachable_bounce(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused)
}

/// Queues a received datagram for dispatch. Zero-length datagrams are keepalives for NAT hole
///  punching, and datagrams that find the dispatch queue full are dropped.
pub(crate) fn offer_datagram(inbound: &mpsc::Sender<(MessageBuffer, SendMode)>, datagram: MessageBuffer) -> bool {
    if datagram.is_empty() {
        trace!("discarding keepalive datagram");
        return false;
    }

    match inbound.try_send((datagram, SendMode::Unreliable)) {
        Ok(_) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!("dispatch queue is full - dropping datagram");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            trace!("dispatch queue is closed - dropping datagram");
            false
        }
    }
}

/// The receive loop for a client's connected UDP socket
pub(crate) async fn client_receive_loop(socket: &UdpSocket, inbound: &mpsc::Sender<(MessageBuffer, SendMode)>, traffic: &TrafficCounters) -> DisconnectCause {
    let mut scratch = vec![0u8; MAX_DATAGRAM_PAYLOAD];
    loop {
        match socket.recv(&mut scratch).await {
            Ok(num_read) => {
                traffic.add_udp_received(num_read);
                offer_datagram(inbound, MessageBuffer::from_slice(&scratch[..num_read]));
            }
            Err(e) if is_unreachable_bounce(&e) => {
                trace!("ignoring ICMP bounce: {}", e);
            }
            Err(e) => return (SocketError::from(&e), Some(e)),
        }
    }
}
