use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tokio::net::{TcpListener, TcpSocket, TcpStream, UdpSocket};
use tracing::{debug, error, info, instrument, trace, warn};
use wire::MessageBuffer;
use crate::config::{ListenerConfig, ListenerStrategy};
use crate::connection::tcp_sender;
use crate::connection::udp::{is_unreachable_bounce, ListenerUdpSink, MAX_DATAGRAM_PAYLOAD};
use crate::connection::{BichannelConnection, ConnectionAcceptor, ConnectionParams, ConnectionRole};
use crate::error::SocketError;
use crate::handshake::{HelloMsg, TokenMsg};
use crate::server::peer_table::PeerTable;
use crate::server::pending::PendingHandshakes;

/// Back-off before the compatibility strategy retries a failed accept or UDP receive
const SOCKET_RETRY_DELAY: Duration = Duration::from_millis(100);

/// The listener's receiving side of its UDP socket
#[async_trait]
trait DatagramSource: Send + Sync {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

#[async_trait]
impl DatagramSource for UdpSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReceiveErrorAction {
    Ignore,
    Retry,
    Stop,
}

/// ICMP bounces caused by earlier sends to vanished peers are expected under any strategy
fn receive_error_action(strategy: ListenerStrategy, e: &io::Error) -> ReceiveErrorAction {
    if is_unreachable_bounce(e) {
        return ReceiveErrorAction::Ignore;
    }
    match strategy {
        ListenerStrategy::Bichannel => ReceiveErrorAction::Stop,
        ListenerStrategy::Compatibility => ReceiveErrorAction::Retry,
    }
}

/// Accepts bichannel connections on a TCP port and a UDP port.
///
/// An accepted TCP stream is sent a token and becomes a pending handshake. When the token
///  arrives over UDP, the datagram's source becomes the connection's UDP endpoint, the server
///  acknowledges with a hello datagram, and the connection is handed to the
///  [ConnectionAcceptor]. All of the listener's connections share its UDP socket.
pub struct BichannelListener {
    config: ListenerConfig,
    tcp_listener: TcpListener,
    udp_socket: Arc<UdpSocket>,
    pending: Arc<PendingHandshakes>,
    peers: Arc<PeerTable>,
    acceptor: Arc<dyn ConnectionAcceptor>,
}

impl BichannelListener {
    pub async fn bind(config: ListenerConfig, acceptor: Arc<dyn ConnectionAcceptor>) -> anyhow::Result<BichannelListener> {
        config.validate()?;

        let tcp_socket = if config.address.is_ipv4() {
            TcpSocket::new_v4()?
        }
        else {
            TcpSocket::new_v6()?
        };
        tcp_socket.set_reuseaddr(true)?;
        tcp_socket.bind(config.tcp_addr())?;
        let tcp_listener = tcp_socket.listen(config.listen_backlog)?;
        let local_tcp_addr = tcp_listener.local_addr()?;
        info!("bound TCP listener to {:?}", local_tcp_addr);

        // with an ephemeral TCP port, 'same port' means the port that was actually bound
        let udp_port = config.udp_port.unwrap_or(local_tcp_addr.port());
        let udp_socket = Arc::new(UdpSocket::bind(SocketAddr::new(config.address, udp_port)).await?);
        info!("bound UDP socket to {:?}", udp_socket.local_addr()?);

        Ok(BichannelListener {
            config,
            tcp_listener,
            udp_socket,
            pending: Default::default(),
            peers: Default::default(),
            acceptor,
        })
    }

    pub fn local_tcp_addr(&self) -> io::Result<SocketAddr> {
        self.tcp_listener.local_addr()
    }

    pub fn local_udp_addr(&self) -> io::Result<SocketAddr> {
        self.udp_socket.local_addr()
    }

    pub fn connection_count(&self) -> usize {
        self.peers.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// The number of accepted TCP streams that were closed because they did not complete the
    ///  handshake in time
    pub fn handshake_timeouts(&self) -> u64 {
        self.pending.num_timeouts()
    }

    pub fn connections(&self) -> Vec<Arc<BichannelConnection>> {
        self.peers.connections()
    }

    /// Closes all pending handshakes and disconnects all connections. This does not stop
    ///  [BichannelListener::run], which is done by dropping or aborting its future.
    pub fn shutdown(&self) {
        info!("shutting down listener");
        self.pending.clear();
        for connection in self.peers.connections() {
            connection.disconnect();
        }
    }

    /// Runs the accept loop and the UDP receive loop. This returns only if a loop fails in a way
    ///  that the listener's strategy treats as fatal.
    pub async fn run(&self) -> anyhow::Result<()> {
        self.run_with(self.udp_socket.as_ref()).await
    }

    async fn run_with(&self, udp_source: &dyn DatagramSource) -> anyhow::Result<()> {
        if self.config.strategy == ListenerStrategy::Compatibility {
            warn!("the compatibility listener strategy is deprecated - failures of the listener's sockets are retried rather than reported");
        }

        tokio::select! {
            result = self.accept_loop() => result,
            result = self.udp_receive_loop(udp_source) => result,
        }
    }

    async fn accept_loop(&self) -> anyhow::Result<()> {
        info!("starting accept loop");
        loop {
            match self.tcp_listener.accept().await {
                Ok((tcp_stream, remote_addr)) => self.on_accepted(tcp_stream, remote_addr),
                Err(e) => match self.config.strategy {
                    ListenerStrategy::Bichannel => {
                        error!("accepting TCP connections failed - stopping listener: {}", e);
                        return Err(e.into());
                    }
                    ListenerStrategy::Compatibility => {
                        warn!("accepting TCP connections failed, retrying: {}", e);
                        tokio::time::sleep(SOCKET_RETRY_DELAY).await;
                    }
                },
            }
        }
    }

    fn on_accepted(&self, tcp_stream: TcpStream, remote_addr: SocketAddr) {
        debug!("accepted TCP connection from {:?}", remote_addr);
        if let Err(e) = tcp_stream.set_nodelay(self.config.no_delay) {
            trace!("setting TCP_NODELAY failed: {}", e);
        }

        let tcp_stream = Arc::new(tcp_stream);
        let token = self.pending.register(tcp_stream.clone(), remote_addr, self.config.handshake_timeout);
        tokio::spawn(send_token(tcp_stream, remote_addr, token, self.pending.clone()));
    }

    async fn udp_receive_loop(&self, udp_source: &dyn DatagramSource) -> anyhow::Result<()> {
        info!("starting UDP receive loop");
        let mut scratch = vec![0u8; MAX_DATAGRAM_PAYLOAD];
        loop {
            let (num_read, from) = match udp_source.recv_from(&mut scratch).await {
                Ok(x) => x,
                Err(e) => match receive_error_action(self.config.strategy, &e) {
                    ReceiveErrorAction::Ignore => {
                        trace!("ignoring ICMP bounce: {}", e);
                        continue;
                    }
                    ReceiveErrorAction::Stop => {
                        error!("receiving on the UDP socket failed - stopping listener: {}", e);
                        return Err(e.into());
                    }
                    ReceiveErrorAction::Retry => {
                        warn!("receiving on the UDP socket failed, restarting receive: {}", e);
                        tokio::time::sleep(SOCKET_RETRY_DELAY).await;
                        continue;
                    }
                },
            };

            let datagram = &scratch[..num_read];
            match self.peers.get(&from) {
                Some(connection) => connection.on_datagram_received(MessageBuffer::from_slice(datagram)),
                None => self.on_handshake_datagram(datagram, from).await,
            }
        }
    }

    /// A datagram from an unknown endpoint is either a token echo, completing a handshake, or
    ///  noise
    async fn on_handshake_datagram(&self, datagram: &[u8], from: SocketAddr) {
        let Some(token_msg) = TokenMsg::from_datagram(datagram) else {
            trace!("dropping datagram of {} bytes from unknown endpoint {:?}", datagram.len(), from);
            return;
        };
        let Some((tcp_stream, remote_tcp_addr)) = self.pending.complete(token_msg.token) else {
            debug!("dropping token echo from {:?}: token is not pending", from);
            return;
        };

        let connection = Arc::new(BichannelConnection::new(
            tcp_stream,
            remote_tcp_addr,
            Arc::new(ListenerUdpSink::new(self.udp_socket.clone(), from)),
            ConnectionRole::Server { peers: Arc::downgrade(&self.peers) },
            token_msg.token,
            &self.connection_params(),
        ));

        // registered before the hello goes out, so that the client's first datagrams find it
        self.peers.insert(from, connection.clone());

        let mut hello = Vec::with_capacity(HelloMsg::SERIALIZED_LEN);
        HelloMsg { token: token_msg.token }.ser(&mut hello);
        if let Err(e) = self.udp_socket.send_to(&hello, from).await {
            debug!("sending hello to {:?} failed: {}", from, e);
            connection.disconnect_with(SocketError::from(&e), Some(e));
            return;
        }
        info!("established connection with {:?} (TCP) / {:?} (UDP)", remote_tcp_addr, from);

        let acceptor = self.acceptor.clone();
        tokio::spawn(async move {
            let handler = acceptor.on_new_connection(&connection).await;
            connection.start(handler);
        });
    }

    fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            no_delay: self.config.no_delay,
            max_tcp_body_length: Some(self.config.max_tcp_body_length),
            dispatch_queue_len: self.config.dispatch_queue_len,
            rtt_sample_count: self.config.rtt_sample_count,
            ping_backlog: self.config.ping_backlog,
        }
    }
}

#[instrument(skip(tcp_stream, token, pending))]
async fn send_token(tcp_stream: Arc<TcpStream>, remote_addr: SocketAddr, token: i64, pending: Arc<PendingHandshakes>) {
    let mut buf = Vec::with_capacity(TokenMsg::SERIALIZED_LEN);
    TokenMsg { token }.ser(&mut buf);

    if let Err(e) = tcp_sender::write_all(&tcp_stream, buf.as_slice()).await {
        trace!("sending the token failed, peer is probably gone: {}", e);
        pending.abandon(token);
    }
}
