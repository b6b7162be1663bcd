//! A bichannel connection: one TCP stream for reliable messages and one UDP association for
//!  unreliable messages, to the same peer.
//!
//! Every started connection runs these tasks:
//! * a TCP receive loop that reads frames and queues their bodies for dispatch
//! * a TCP send loop that writes queued outbound buffers as frames
//! * a dispatch loop that passes received buffers to the [ConnectionHandler] in order, and that
//!   reports the disconnect after the last queued buffer
//! * on the client side, a UDP receive loop. On the server side, the listener receives all
//!   datagrams on its shared socket and routes them to the connection.
//!
//! Disconnecting stops the I/O tasks, but not the dispatch loop: that loop ends by itself after
//!  calling [ConnectionHandler::on_disconnected] exactly once.

pub mod state;
pub mod stats;
pub mod tcp_receiver;
pub mod tcp_sender;
pub mod udp;

use std::io;
use std::net::{Shutdown, SocketAddr};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use socket2::SockRef;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use wire::{Message, MessageBuffer, SendMode};
use crate::connection::state::{AtomicConnectionState, ConnectionState};
use crate::connection::stats::{ConnectionStats, TrafficCounters};
use crate::connection::tcp_receiver::TcpReceiver;
use crate::connection::tcp_sender::TcpSender;
use crate::connection::udp::DatagramSink;
use crate::error::SocketError;
use crate::rtt::RoundTripTimes;
use crate::server::peer_table::PeerTable;

/// The socket error that ends a connection, and the underlying I/O error if there is one
pub type DisconnectCause = (SocketError, Option<io::Error>);

type Inbound = (MessageBuffer, SendMode);

/// The application's side of a connection
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Called for every received message, in the order of reception. `buffer` holds the message
    ///  header and payload, see [Message::from_wire].
    async fn on_message_received(&self, buffer: MessageBuffer, send_mode: SendMode);

    /// Called exactly once per started connection, after the last message
    async fn on_disconnected(&self, socket_error: SocketError, source: Option<io::Error>);
}

/// Provides the handler for each connection that a listener accepts
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConnectionAcceptor: Send + Sync + 'static {
    async fn on_new_connection(&self, connection: &Arc<BichannelConnection>) -> Arc<dyn ConnectionHandler>;
}

pub(crate) enum ConnectionRole {
    /// The client owns its UDP socket and receives on it
    Client { udp_socket: Arc<UdpSocket> },
    /// Server side connections are registered with their listener, which receives their datagrams
    Server { peers: Weak<PeerTable> },
}

/// Everything a connection's settings contribute, shared between client and listener
pub(crate) struct ConnectionParams {
    pub no_delay: bool,
    pub max_tcp_body_length: Option<usize>,
    pub dispatch_queue_len: usize,
    pub rtt_sample_count: usize,
    pub ping_backlog: usize,
}

/// The channels that connect the tasks, handed to the tasks when the connection is started
struct Startup {
    outbound_rx: mpsc::UnboundedReceiver<MessageBuffer>,
    inbound_rx: mpsc::Receiver<Inbound>,
    disconnect_rx: oneshot::Receiver<DisconnectCause>,
}

pub struct BichannelConnection {
    state: AtomicConnectionState,
    tcp_stream: Arc<TcpStream>,
    remote_tcp_addr: SocketAddr,
    udp_sink: Arc<dyn DatagramSink>,
    role: ConnectionRole,
    auth_token: i64,
    no_delay: bool,
    max_tcp_body_length: Option<usize>,

    outbound: mpsc::UnboundedSender<MessageBuffer>,
    inbound: mpsc::Sender<Inbound>,
    startup: Mutex<Option<Startup>>,
    /// `None` once the connection is disconnected
    tasks: Mutex<Option<Vec<JoinHandle<()>>>>,
    disconnect_signal: Mutex<Option<oneshot::Sender<DisconnectCause>>>,

    round_trip_times: Mutex<RoundTripTimes>,
    traffic: TrafficCounters,
}

impl BichannelConnection {
    pub(crate) fn new(
        tcp_stream: Arc<TcpStream>,
        remote_tcp_addr: SocketAddr,
        udp_sink: Arc<dyn DatagramSink>,
        role: ConnectionRole,
        auth_token: i64,
        params: &ConnectionParams,
    ) -> BichannelConnection {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound, inbound_rx) = mpsc::channel(params.dispatch_queue_len);
        let (disconnect_tx, disconnect_rx) = oneshot::channel();

        BichannelConnection {
            state: AtomicConnectionState::new(ConnectionState::Connected),
            tcp_stream,
            remote_tcp_addr,
            udp_sink,
            role,
            auth_token,
            no_delay: params.no_delay,
            max_tcp_body_length: params.max_tcp_body_length,
            outbound,
            inbound,
            startup: Mutex::new(Some(Startup { outbound_rx, inbound_rx, disconnect_rx })),
            tasks: Mutex::new(Some(Vec::new())),
            disconnect_signal: Mutex::new(Some(disconnect_tx)),
            round_trip_times: Mutex::new(RoundTripTimes::new(params.rtt_sample_count, params.ping_backlog)),
            traffic: TrafficCounters::default(),
        }
    }

    /// Spawns the connection's tasks. Messages received before this call are queued, and a
    ///  connection that was disconnected before it was started still reports the disconnect.
    pub(crate) fn start(self: &Arc<Self>, handler: Arc<dyn ConnectionHandler>) {
        let Some(startup) = self.startup.lock().unwrap().take() else {
            warn!("connection to {:?} was already started", self.remote_tcp_addr);
            return;
        };

        tokio::spawn(self.clone().dispatch_loop(startup.inbound_rx, startup.disconnect_rx, handler));

        let mut tasks = self.tasks.lock().unwrap();
        let Some(tasks) = tasks.as_mut() else {
            trace!("connection was disconnected before it was started");
            return;
        };

        let mut receiver = TcpReceiver::new(self.tcp_stream.clone(), self.max_tcp_body_length, self.inbound.clone());
        let connection = self.clone();
        tasks.push(tokio::spawn(async move {
            let (socket_error, source) = receiver.receive_loop(&connection.traffic).await;
            connection.disconnect_with(socket_error, source);
        }));

        let mut sender = TcpSender::new(self.tcp_stream.clone(), startup.outbound_rx);
        let connection = self.clone();
        tasks.push(tokio::spawn(async move {
            let (socket_error, source) = sender.send_loop(&connection.traffic).await;
            connection.disconnect_with(socket_error, source);
        }));

        if let ConnectionRole::Client { udp_socket } = &self.role {
            let udp_socket = udp_socket.clone();
            let inbound = self.inbound.clone();
            let connection = self.clone();
            tasks.push(tokio::spawn(async move {
                let (socket_error, source) = udp::client_receive_loop(&udp_socket, &inbound, &connection.traffic).await;
                connection.disconnect_with(socket_error, source);
            }));
        }
    }

    async fn dispatch_loop(self: Arc<Self>, mut inbound: mpsc::Receiver<Inbound>, mut disconnect_rx: oneshot::Receiver<DisconnectCause>, handler: Arc<dyn ConnectionHandler>) {
        let (socket_error, source) = loop {
            tokio::select! {
                biased;
                Some((buffer, send_mode)) = inbound.recv() => {
                    self.on_inbound_ping(&buffer);
                    handler.on_message_received(buffer, send_mode).await;
                }
                cause = &mut disconnect_rx => {
                    break cause.unwrap_or((SocketError::Other, None));
                }
            }
        };

        inbound.close();
        let mut num_dropped = 0;
        while inbound.try_recv().is_ok() {
            num_dropped += 1;
        }
        if num_dropped > 0 {
            debug!("dropped {} received messages after disconnect", num_dropped);
        }

        debug!("connection to {:?} disconnected: {}", self.remote_tcp_addr, socket_error);
        handler.on_disconnected(socket_error, source).await;
    }

    fn on_inbound_ping(&self, buffer: &MessageBuffer) {
        let Ok(message) = Message::from_wire(buffer, true) else {
            return;
        };
        if !message.is_ping_acknowledgement_message() {
            return;
        }
        if let Some(ping_code) = message.ping_code() {
            if let Some(rtt) = self.round_trip_times.lock().unwrap().record_inbound_ping(ping_code, Instant::now()) {
                trace!("round trip time to {:?}: {:?}", self.remote_tcp_addr, rtt);
            }
        }
    }

    /// Queues a buffer holding message header and payload for sending. Returns `false` if the
    ///  connection is not connected, or if an unreliable send failed or was dropped.
    ///
    /// A reliable send only queues the buffer, so `true` means that the send was initiated, not
    ///  that it completed.
    pub fn send_message(&self, buffer: MessageBuffer, send_mode: SendMode) -> bool {
        if self.state.load() != ConnectionState::Connected {
            trace!("not connected - rejecting send");
            return false;
        }

        match send_mode {
            SendMode::Reliable => self.send_message_reliable(buffer),
            SendMode::Unreliable => self.send_message_unreliable(buffer),
        }
    }

    fn send_message_reliable(&self, buffer: MessageBuffer) -> bool {
        if buffer.len() > i32::MAX as usize {
            warn!("message of {} bytes exceeds the frame header's range - not sending", buffer.len());
            return false;
        }
        self.outbound.send(buffer).is_ok()
    }

    fn send_message_unreliable(&self, buffer: MessageBuffer) -> bool {
        match udp::send_datagram(self.udp_sink.as_ref(), buffer.as_slice()) {
            Ok(true) => {
                self.traffic.add_udp_sent(buffer.len());
                true
            }
            Ok(false) => false,
            Err(e) => {
                debug!("UDP send to {:?} failed: {}", self.udp_sink.remote_addr(), e);
                self.disconnect_with(SocketError::from(&e), Some(e));
                false
            }
        }
    }

    /// Serializes and sends a message. Sending a ping records it for round trip time measurement.
    pub fn send(&self, message: &Message, send_mode: SendMode) -> bool {
        if let Some(ping_code) = message.ping_code() {
            if message.is_ping_message() {
                self.round_trip_times.lock().unwrap().record_outbound_ping(ping_code, Instant::now());
            }
        }
        self.send_message(message.to_buffer(), send_mode)
    }

    /// Called by the listener for datagrams from this connection's remote UDP endpoint
    pub(crate) fn on_datagram_received(&self, datagram: MessageBuffer) {
        self.traffic.add_udp_received(datagram.len());
        udp::offer_datagram(&self.inbound, datagram);
    }

    /// Closes the connection locally. Returns `false` if it was already disconnected.
    pub fn disconnect(&self) -> bool {
        self.disconnect_with(SocketError::Success, None)
    }

    /// Only the first call for a connection has an effect, no matter which task it comes from
    pub(crate) fn disconnect_with(&self, socket_error: SocketError, source: Option<io::Error>) -> bool {
        if !self.state.begin_disconnect() {
            trace!("connection to {:?} is already disconnected", self.remote_tcp_addr);
            return false;
        }
        debug!("disconnecting from {:?}: {}", self.remote_tcp_addr, socket_error);

        if let ConnectionRole::Server { peers } = &self.role {
            if let Some(peers) = peers.upgrade() {
                peers.remove(&self.udp_sink.remote_addr(), self);
            }
        }

        if let Err(e) = SockRef::from(self.tcp_stream.as_ref()).shutdown(Shutdown::Both) {
            trace!("error shutting down TCP socket: {}", e);
        }

        if let Some(tasks) = self.tasks.lock().unwrap().take() {
            for task in tasks {
                task.abort();
            }
        }

        self.state.store(ConnectionState::Disconnected);

        if let Some(signal) = self.disconnect_signal.lock().unwrap().take() {
            let _ = signal.send((socket_error, source));
        }
        true
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.load()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// The remote endpoint for a protocol name, `"tcp"` or `"udp"` (case insensitive)
    pub fn remote_endpoint(&self, protocol: &str) -> Option<SocketAddr> {
        if protocol.eq_ignore_ascii_case("tcp") {
            Some(self.remote_tcp_addr)
        }
        else if protocol.eq_ignore_ascii_case("udp") {
            Some(self.udp_sink.remote_addr())
        }
        else {
            None
        }
    }

    /// TCP and UDP remote endpoints
    pub fn remote_endpoints(&self) -> (SocketAddr, SocketAddr) {
        (self.remote_tcp_addr, self.udp_sink.remote_addr())
    }

    pub fn local_tcp_addr(&self) -> io::Result<SocketAddr> {
        self.tcp_stream.local_addr()
    }

    /// The token that bound the UDP endpoint to the TCP stream during the handshake
    pub fn auth_token(&self) -> i64 {
        self.auth_token
    }

    pub fn no_delay(&self) -> bool {
        self.no_delay
    }

    pub fn stats(&self) -> ConnectionStats {
        self.traffic.snapshot()
    }

    pub fn latest_rtt(&self) -> Option<Duration> {
        self.round_trip_times.lock().unwrap().latest_rtt()
    }

    /// Moving average of the most recent round trip times
    pub fn smoothed_rtt(&self) -> Option<Duration> {
        self.round_trip_times.lock().unwrap().smoothed_rtt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::udp::MockDatagramSink;
    use mockall::predicate::eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const REMOTE_UDP: ([u8; 4], u16) = ([127, 0, 0, 1], 4297);

    fn params() -> ConnectionParams {
        ConnectionParams {
            no_delay: true,
            max_tcp_body_length: Some(1024),
            dispatch_queue_len: 16,
            rtt_sample_count: 4,
            ping_backlog: 8,
        }
    }

    /// Returns the connection under test and the peer's end of its TCP stream
    async fn connection(udp_sink: MockDatagramSink) -> (Arc<BichannelConnection>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let (stream, remote_addr) = listener.accept().await.unwrap();

        let peers = Arc::new(PeerTable::default());
        let connection = Arc::new(BichannelConnection::new(
            Arc::new(stream),
            remote_addr,
            Arc::new(udp_sink),
            ConnectionRole::Server { peers: Arc::downgrade(&peers) },
            42,
            &params(),
        ));
        (connection, peer)
    }

    fn udp_sink() -> MockDatagramSink {
        let mut sink = MockDatagramSink::new();
        sink.expect_remote_addr()
            .returning(|| REMOTE_UDP.into());
        sink
    }

    /// Records disconnects, and forwards received messages to a channel
    struct RecordingHandler {
        messages: mpsc::UnboundedSender<(Vec<u8>, SendMode)>,
        disconnects: Mutex<Vec<SocketError>>,
        num_disconnects: AtomicUsize,
        disconnected: tokio::sync::Notify,
    }

    impl RecordingHandler {
        fn new() -> (Arc<RecordingHandler>, mpsc::UnboundedReceiver<(Vec<u8>, SendMode)>) {
            let (messages, rx) = mpsc::unbounded_channel();
            let handler = Arc::new(RecordingHandler {
                messages,
                disconnects: Mutex::new(Vec::new()),
                num_disconnects: AtomicUsize::new(0),
                disconnected: tokio::sync::Notify::new(),
            });
            (handler, rx)
        }

        async fn await_disconnect(&self) {
            while self.num_disconnects.load(Ordering::Acquire) == 0 {
                let notified = self.disconnected.notified();
                if self.num_disconnects.load(Ordering::Acquire) > 0 {
                    break;
                }
                notified.await;
            }
        }
    }

    #[async_trait]
    impl ConnectionHandler for RecordingHandler {
        async fn on_message_received(&self, buffer: MessageBuffer, send_mode: SendMode) {
            let _ = self.messages.send((buffer.as_slice().to_vec(), send_mode));
        }

        async fn on_disconnected(&self, socket_error: SocketError, _source: Option<io::Error>) {
            self.disconnects.lock().unwrap().push(socket_error);
            self.num_disconnects.fetch_add(1, Ordering::AcqRel);
            self.disconnected.notify_waiters();
        }
    }

    #[tokio::test]
    async fn test_send_reliable() {
        let (connection, mut peer) = connection(udp_sink()).await;
        let (handler, _) = RecordingHandler::new();
        connection.start(handler);

        assert!(connection.send_message(MessageBuffer::from_slice(b"hello"), SendMode::Reliable));

        let mut received = [0u8; 9];
        peer.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"\0\0\0\x05hello");
    }

    #[tokio::test]
    async fn test_receive_reliable() {
        let (connection, mut peer) = connection(udp_sink()).await;
        let (handler, mut messages) = RecordingHandler::new();
        connection.start(handler);

        peer.write_all(b"\0\0\0\x03abc\0\0\0\x01d").await.unwrap();

        assert_eq!(messages.recv().await.unwrap(), (b"abc".to_vec(), SendMode::Reliable));
        assert_eq!(messages.recv().await.unwrap(), (b"d".to_vec(), SendMode::Reliable));
        assert_eq!(connection.stats().tcp_bytes_received, 12);
    }

    #[tokio::test]
    async fn test_send_unreliable() {
        let mut sink = udp_sink();
        sink.expect_try_send_datagram()
            .withf(|datagram| datagram.starts_with(b"0123456789"))
            .times(1)
            .returning(|datagram| Ok(datagram.len()));

        let (connection, _peer) = connection(sink).await;
        assert!(connection.send_message(MessageBuffer::from_slice(b"0123456789"), SendMode::Unreliable));
        assert_eq!(connection.stats().udp_bytes_sent, 10);
    }

    #[tokio::test]
    async fn test_unreliable_send_failure_disconnects() {
        let mut sink = udp_sink();
        sink.expect_try_send_datagram()
            .times(1)
            .returning(|_| Err(io::ErrorKind::PermissionDenied.into()));

        let (connection, _peer) = connection(sink).await;
        let (handler, _) = RecordingHandler::new();
        connection.start(handler.clone());

        assert!(!connection.send_message(MessageBuffer::from_slice(b"x"), SendMode::Unreliable));
        handler.await_disconnect().await;
        assert_eq!(connection.connection_state(), ConnectionState::Disconnected);
        assert_eq!(*handler.disconnects.lock().unwrap(), vec![SocketError::Other]);
    }

    #[tokio::test]
    async fn test_receive_datagram() {
        let (connection, _peer) = connection(udp_sink()).await;
        let (handler, mut messages) = RecordingHandler::new();
        connection.start(handler);

        connection.on_datagram_received(MessageBuffer::create(0));
        connection.on_datagram_received(MessageBuffer::from_slice(b"dgram"));

        assert_eq!(messages.recv().await.unwrap(), (b"dgram".to_vec(), SendMode::Unreliable));
        assert_eq!(connection.stats().udp_bytes_received, 5);
    }

    #[tokio::test]
    async fn test_send_when_disconnected() {
        let mut sink = udp_sink();
        sink.expect_try_send_datagram()
            .never();

        let (connection, _peer) = connection(sink).await;
        assert!(connection.disconnect());

        assert!(!connection.send_message(MessageBuffer::from_slice(b"a"), SendMode::Reliable));
        assert!(!connection.send_message(MessageBuffer::from_slice(b"a"), SendMode::Unreliable));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (connection, mut peer) = connection(udp_sink()).await;
        let (handler, _) = RecordingHandler::new();
        connection.start(handler.clone());

        assert!(connection.disconnect());
        assert!(!connection.disconnect());
        assert!(!connection.disconnect_with(SocketError::ConnectionReset, None));

        handler.await_disconnect().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*handler.disconnects.lock().unwrap(), vec![SocketError::Success]);
        assert_eq!(connection.connection_state(), ConnectionState::Disconnected);

        // the TCP stream was shut down
        let mut buf = [0u8; 1];
        assert_eq!(peer.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_races_with_peer_close() {
        let (connection, peer) = connection(udp_sink()).await;
        let (handler, _) = RecordingHandler::new();
        connection.start(handler.clone());

        drop(peer);
        connection.disconnect();

        handler.await_disconnect().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.num_disconnects.load(Ordering::Acquire), 1);
    }

    #[tokio::test]
    async fn test_peer_close_disconnects() {
        let (connection, peer) = connection(udp_sink()).await;
        let (handler, _) = RecordingHandler::new();
        connection.start(handler.clone());

        drop(peer);

        handler.await_disconnect().await;
        assert_eq!(*handler.disconnects.lock().unwrap(), vec![SocketError::Disconnecting]);
        assert_eq!(connection.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_oversized_body_strikes_connection() {
        let (connection, mut peer) = connection(udp_sink()).await;
        let (handler, mut messages) = RecordingHandler::new();
        connection.start(handler.clone());

        peer.write_all(&1024i32.to_be_bytes()).await.unwrap();

        handler.await_disconnect().await;
        assert_eq!(*handler.disconnects.lock().unwrap(), vec![SocketError::ProtocolViolation]);
        assert!(messages.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_before_start() {
        let (connection, _peer) = connection(udp_sink()).await;
        connection.disconnect();

        let (handler, _) = RecordingHandler::new();
        connection.start(handler.clone());

        handler.await_disconnect().await;
        assert_eq!(*handler.disconnects.lock().unwrap(), vec![SocketError::Success]);
    }

    #[tokio::test]
    async fn test_mock_handler_receives_messages_in_order() {
        let (connection, mut peer) = connection(udp_sink()).await;

        let (done_tx, done_rx) = oneshot::channel();
        let mut seq = mockall::Sequence::new();
        let mut handler = MockConnectionHandler::new();
        handler.expect_on_message_received()
            .with(eq(MessageBuffer::from_slice(b"1")), eq(SendMode::Reliable))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        handler.expect_on_message_received()
            .with(eq(MessageBuffer::from_slice(b"2")), eq(SendMode::Reliable))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        let mut done_tx = Some(done_tx);
        handler.expect_on_disconnected()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _| {
                if let Some(tx) = done_tx.take() {
                    let _ = tx.send(());
                }
            });

        connection.start(Arc::new(handler));
        peer.write_all(b"\0\0\0\x011\0\0\0\x012").await.unwrap();
        drop(peer);

        done_rx.await.unwrap();
    }

    #[tokio::test]
    async fn test_round_trip_time() {
        let (connection, mut peer) = connection(udp_sink()).await;
        let (handler, mut messages) = RecordingHandler::new();
        connection.start(handler);

        let mut ping = Message::create_empty(5);
        ping.make_ping_message().unwrap();
        assert!(connection.send(&ping, SendMode::Reliable));

        let mut header = [0u8; 4];
        peer.read_exact(&mut header).await.unwrap();
        let mut body = vec![0u8; i32::from_be_bytes(header) as usize];
        peer.read_exact(&mut body).await.unwrap();

        let received = Message::from_wire(&MessageBuffer::from_slice(&body), true).unwrap();
        let mut ack = Message::create_empty(5);
        ack.make_ping_acknowledgement_message(&received).unwrap();
        let ack = ack.to_buffer();
        peer.write_all(&(ack.len() as i32).to_be_bytes()).await.unwrap();
        peer.write_all(ack.as_slice()).await.unwrap();

        messages.recv().await.unwrap();
        assert!(connection.latest_rtt().is_some());
        assert!(connection.smoothed_rtt().is_some());
    }

    #[tokio::test]
    async fn test_accessors() {
        let (connection, _peer) = connection(udp_sink()).await;

        assert_eq!(connection.remote_endpoint("udp"), Some(REMOTE_UDP.into()));
        assert_eq!(connection.remote_endpoint("TCP"), Some(connection.remote_tcp_addr));
        assert_eq!(connection.remote_endpoint("sctp"), None);
        assert_eq!(connection.remote_endpoints().1, REMOTE_UDP.into());
        assert_eq!(connection.auth_token(), 42);
        assert!(connection.no_delay());
        assert!(connection.is_connected());
    }
}
