use std::io;
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;
use socket2::SockRef;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, info, instrument, trace};
use crate::config::ClientConfig;
use crate::connection::udp::{is_unreachable_bounce, ConnectedUdpSink};
use crate::connection::{BichannelConnection, ConnectionHandler, ConnectionParams, ConnectionRole};
use crate::error::{ConnectionError, SocketError};
use crate::handshake::{HelloMsg, TokenMsg};

impl BichannelConnection {
    /// Connects to a listener and performs the handshake: the server sends a token over TCP,
    ///  the client echoes it over UDP, and the server acknowledges with a hello datagram.
    ///
    /// Failures to reach the server are [ConnectionError::Transport]; a handshake that times out
    ///  or is malformed is [ConnectionError::Establishment]. Either way the TCP stream is closed.
    #[instrument(skip(config, handler), fields(server = ?config.server_tcp_addr))]
    pub async fn connect(config: &ClientConfig, handler: Arc<dyn ConnectionHandler>) -> Result<Arc<BichannelConnection>, ConnectionError> {
        config.validate()
            .map_err(|e| ConnectionError::establishment(format!("invalid client configuration: {}", e), SocketError::Other))?;

        let mut tcp_stream = TcpStream::connect(config.server_tcp_addr).await?;
        tcp_stream.set_nodelay(config.no_delay)?;
        let remote_tcp_addr = tcp_stream.peer_addr()?;
        debug!("TCP connection established");

        let udp_socket = match bind_udp(&tcp_stream, config.server_udp_addr).await {
            Ok(udp_socket) => udp_socket,
            Err(e) => {
                close(&tcp_stream);
                return Err(ConnectionError::establishment_caused_by("binding the UDP socket failed", e));
            }
        };

        let token = match handshake(&mut tcp_stream, &udp_socket, config).await {
            Ok(token) => token,
            Err(e) => {
                debug!("handshake failed: {}", e);
                close(&tcp_stream);
                return Err(e);
            }
        };

        let udp_socket = Arc::new(udp_socket);
        let connection = Arc::new(BichannelConnection::new(
            Arc::new(tcp_stream),
            remote_tcp_addr,
            Arc::new(ConnectedUdpSink::new(udp_socket.clone(), config.server_udp_addr)),
            ConnectionRole::Client { udp_socket },
            token,
            &ConnectionParams {
                no_delay: config.no_delay,
                max_tcp_body_length: None,
                dispatch_queue_len: config.dispatch_queue_len,
                rtt_sample_count: config.rtt_sample_count,
                ping_backlog: config.ping_backlog,
            },
        ));
        connection.start(handler);

        info!("connected");
        Ok(connection)
    }
}

/// An ephemeral UDP socket on the interface that the TCP connection uses, connected to the
///  server's UDP endpoint
async fn bind_udp(tcp_stream: &TcpStream, server_udp_addr: SocketAddr) -> io::Result<UdpSocket> {
    let local_ip = tcp_stream.local_addr()?.ip();
    let udp_socket = UdpSocket::bind(SocketAddr::new(local_ip, 0)).await?;
    udp_socket.connect(server_udp_addr).await?;
    Ok(udp_socket)
}

async fn handshake(tcp_stream: &mut TcpStream, udp_socket: &UdpSocket, config: &ClientConfig) -> Result<i64, ConnectionError> {
    let mut token_buf = [0u8; TokenMsg::SERIALIZED_LEN];
    match timeout(config.handshake_timeout, tcp_stream.read_exact(&mut token_buf)).await {
        Err(_) => return Err(ConnectionError::establishment("timeout waiting for auth token from server", SocketError::TimedOut)),
        Ok(Err(e)) => return Err(ConnectionError::establishment_caused_by("receiving the auth token failed", e)),
        Ok(Ok(_)) => {}
    }
    let token = TokenMsg::deser(&mut token_buf.as_slice())
        .map_err(|e| ConnectionError::establishment(format!("malformed auth token: {}", e), SocketError::ProtocolViolation))?
        .token;
    trace!("received auth token");

    udp_socket.send(&token_buf).await
        .map_err(|e| ConnectionError::establishment_caused_by("echoing the auth token over UDP failed", e))?;

    match timeout(config.handshake_timeout, await_hello(udp_socket, token)).await {
        Err(_) => Err(ConnectionError::establishment("timeout waiting for UDP acknowledgement", SocketError::TimedOut)),
        Ok(result) => result.map(|_| token),
    }
}

async fn await_hello(udp_socket: &UdpSocket, token: i64) -> Result<(), ConnectionError> {
    let mut buf = [0u8; 64];
    loop {
        let num_read = match udp_socket.recv(&mut buf).await {
            Ok(n) => n,
            Err(e) if is_unreachable_bounce(&e) => {
                trace!("ignoring ICMP bounce while waiting for UDP acknowledgement: {}", e);
                continue;
            }
            Err(e) => return Err(ConnectionError::establishment_caused_by("receiving the UDP acknowledgement failed", e)),
        };

        let hello = HelloMsg::deser(&mut &buf[..num_read])
            .map_err(|e| ConnectionError::establishment(format!("malformed UDP acknowledgement: {}", e), SocketError::ProtocolViolation))?;
        if hello.token != token {
            return Err(ConnectionError::establishment("auth token mismatch in UDP acknowledgement", SocketError::ProtocolViolation));
        }
        return Ok(());
    }
}

fn close(tcp_stream: &TcpStream) {
    if let Err(e) = SockRef::from(tcp_stream).shutdown(Shutdown::Both) {
        trace!("error shutting down TCP stream: {}", e);
    }
}
