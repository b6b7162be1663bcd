use std::sync::atomic::{AtomicU64, Ordering};
use wire::safe_converter::SafeCast;

/// A snapshot of a connection's traffic. TCP counts include the 4 byte frame headers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub tcp_bytes_sent: u64,
    pub tcp_bytes_received: u64,
    pub udp_bytes_sent: u64,
    pub udp_bytes_received: u64,
}

#[derive(Default)]
pub(crate) struct TrafficCounters {
    tcp_sent: AtomicU64,
    tcp_received: AtomicU64,
    udp_sent: AtomicU64,
    udp_received: AtomicU64,
}

impl TrafficCounters {
    pub fn add_tcp_sent(&self, num_bytes: usize) {
        self.tcp_sent.fetch_add(num_bytes.safe_cast(), Ordering::Relaxed);
    }

    pub fn add_tcp_received(&self, num_bytes: usize) {
        self.tcp_received.fetch_add(num_bytes.safe_cast(), Ordering::Relaxed);
    }

    pub fn add_udp_sent(&self, num_bytes: usize) {
        self.udp_sent.fetch_add(num_bytes.safe_cast(), Ordering::Relaxed);
    }

    pub fn add_udp_received(&self, num_bytes: usize) {
        self.udp_received.fetch_add(num_bytes.safe_cast(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ConnectionStats {
        ConnectionStats {
            tcp_bytes_sent: self.tcp_sent.load(Ordering::Relaxed),
            tcp_bytes_received: self.tcp_received.load(Ordering::Relaxed),
            udp_bytes_sent: self.udp_sent.load(Ordering::Relaxed),
            udp_bytes_received: self.udp_received.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let counters = TrafficCounters::default();
        assert_eq!(counters.snapshot(), ConnectionStats::default());

        counters.add_tcp_sent(9);
        counters.add_tcp_sent(4);
        counters.add_tcp_received(20);
        counters.add_udp_sent(13);
        counters.add_udp_received(7);
        counters.add_udp_received(0);

        assert_eq!(counters.snapshot(), ConnectionStats {
            tcp_bytes_sent: 13,
            tcp_bytes_received: 20,
            udp_bytes_sent: 13,
            udp_bytes_received: 7,
        });
    }
}
