use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use anyhow::bail;

/// How a listener reacts to failures of its sockets
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListenerStrategy {
    /// A failing accept loop is fatal to the listener: it is logged as an error and the
    ///  listener's `run()` returns it
    #[default]
    Bichannel,
    /// Deprecated behavior for older deployments: accept failures are retried after a short
    ///  back-off, and UDP receive failures restart the receive loop
    Compatibility,
}

pub struct ListenerConfig {
    /// The address to bind both the TCP and the UDP socket to
    pub address: IpAddr,

    /// `0` binds to an ephemeral port, which is useful for testing
    pub tcp_port: u16,

    /// The UDP port, defaulting to the TCP port. `Some(0)` binds to an ephemeral port.
    pub udp_port: Option<u16>,

    /// Sets `TCP_NODELAY` on accepted sockets, disabling Nagle's algorithm
    pub no_delay: bool,

    /// The maximum body length a peer may declare in a TCP frame header. A peer that declares a
    ///  body length at or above this limit is struck, i.e. disconnected immediately, before any
    ///  memory is allocated for the body.
    pub max_tcp_body_length: usize,

    /// The time an accepted TCP connection has for echoing its token over UDP. Connections that
    ///  do not complete the handshake in time are closed and counted.
    pub handshake_timeout: Duration,

    pub listen_backlog: u32,

    /// The number of received messages that can be queued per connection before the connection's
    ///  TCP receive loop waits for the application. UDP messages that do not fit into the queue
    ///  are dropped.
    pub dispatch_queue_len: usize,

    /// see [ClientConfig::rtt_sample_count]
    pub rtt_sample_count: usize,

    /// see [ClientConfig::ping_backlog]
    pub ping_backlog: usize,

    pub strategy: ListenerStrategy,
}

impl ListenerConfig {
    pub fn new(address: IpAddr, tcp_port: u16) -> ListenerConfig {
        ListenerConfig {
            address,
            tcp_port,
            udp_port: None,
            no_delay: false,
            max_tcp_body_length: 65535,
            handshake_timeout: Duration::from_millis(5000),
            listen_backlog: 100,
            dispatch_queue_len: 256,
            rtt_sample_count: 10,
            ping_backlog: 64,
            strategy: ListenerStrategy::default(),
        }
    }

    /// listening on all IPV4 interfaces
    pub fn default_ipv4(tcp_port: u16) -> ListenerConfig {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), tcp_port)
    }

    pub fn tcp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.tcp_port)
    }

    pub fn udp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.udp_port.unwrap_or(self.tcp_port))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_tcp_body_length == 0 {
            bail!("max TCP body length must be positive");
        }
        if self.max_tcp_body_length > i32::MAX as usize {
            bail!("max TCP body length {} exceeds the range of the frame header", self.max_tcp_body_length);
        }
        if self.handshake_timeout.is_zero() {
            bail!("handshake timeout must be positive");
        }
        if self.dispatch_queue_len == 0 {
            bail!("dispatch queue length must be positive");
        }
        if self.rtt_sample_count == 0 {
            bail!("RTT sample count must be positive");
        }
        if self.ping_backlog == 0 {
            bail!("ping backlog must be positive");
        }
        Ok(())
    }
}

pub struct ClientConfig {
    pub server_tcp_addr: SocketAddr,
    pub server_udp_addr: SocketAddr,

    /// Sets `TCP_NODELAY`, disabling Nagle's algorithm
    pub no_delay: bool,

    /// The time to wait for each of the server's handshake messages, i.e. the token over TCP and
    ///  the hello over UDP
    pub handshake_timeout: Duration,

    /// see [ListenerConfig::dispatch_queue_len]
    pub dispatch_queue_len: usize,

    /// The number of round trip time samples in the moving average
    pub rtt_sample_count: usize,

    /// The number of unacknowledged pings that are remembered for round trip time measurement
    pub ping_backlog: usize,
}

impl ClientConfig {
    /// Connects to the same port for TCP and UDP
    pub fn new(server_addr: SocketAddr) -> ClientConfig {
        Self::with_udp_addr(server_addr, server_addr)
    }

    pub fn with_udp_addr(server_tcp_addr: SocketAddr, server_udp_addr: SocketAddr) -> ClientConfig {
        ClientConfig {
            server_tcp_addr,
            server_udp_addr,
            no_delay: false,
            handshake_timeout: Duration::from_millis(5000),
            dispatch_queue_len: 256,
            rtt_sample_count: 10,
            ping_backlog: 64,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.handshake_timeout.is_zero() {
            bail!("handshake timeout must be positive");
        }
        if self.dispatch_queue_len == 0 {
            bail!("dispatch queue length must be positive");
        }
        if self.rtt_sample_count == 0 {
            bail!("RTT sample count must be positive");
        }
        if self.ping_backlog == 0 {
            bail!("ping backlog must be positive");
        }
        Ok(())
    }
}
