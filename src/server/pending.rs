use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use rand::Rng;
use rustc_hash::FxHashMap;
use socket2::SockRef;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

struct PendingConnection {
    tcp_stream: Arc<TcpStream>,
    remote_tcp_addr: SocketAddr,
    expiry: JoinHandle<()>,
}

/// Accepted TCP streams whose clients have not yet echoed their token over UDP, by token.
///
/// Completing a handshake and expiring it race for the same entry. Both remove the entry under
///  the table's lock, and whoever comes second finds it gone.
#[derive(Default)]
pub struct PendingHandshakes {
    entries: Mutex<FxHashMap<i64, PendingConnection>>,
    num_timeouts: AtomicU64,
}

impl PendingHandshakes {
    /// Registers an accepted stream under a fresh token that no other pending stream uses, and
    ///  arms its expiry timer
    pub fn register(self: &Arc<Self>, tcp_stream: Arc<TcpStream>, remote_tcp_addr: SocketAddr, timeout: Duration) -> i64 {
        let mut entries = self.entries.lock().unwrap();

        let mut token: i64 = rand::rng().random();
        while entries.contains_key(&token) {
            debug!("token collision - generating a new token");
            token = rand::rng().random();
        }

        let pending = Arc::downgrade(self);
        let expiry = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(pending) = pending.upgrade() {
                pending.expire(token);
            }
        });

        entries.insert(token, PendingConnection {
            tcp_stream,
            remote_tcp_addr,
            expiry,
        });
        token
    }

    /// Removes the entry for a token and cancels its expiry, returning the stream if the token
    ///  was pending
    pub fn complete(&self, token: i64) -> Option<(Arc<TcpStream>, SocketAddr)> {
        let entry = self.entries.lock().unwrap().remove(&token)?;
        entry.expiry.abort();
        Some((entry.tcp_stream, entry.remote_tcp_addr))
    }

    /// Removes the entry for a token and closes its stream, e.g. when sending the token failed
    pub fn abandon(&self, token: i64) -> bool {
        match self.entries.lock().unwrap().remove(&token) {
            Some(entry) => {
                entry.expiry.abort();
                shutdown(&entry.tcp_stream);
                true
            }
            None => false,
        }
    }

    fn expire(&self, token: i64) {
        let Some(entry) = self.entries.lock().unwrap().remove(&token) else {
            trace!("handshake for token {} was completed concurrently", token);
            return;
        };

        debug!("handshake with {:?} timed out - closing TCP stream", entry.remote_tcp_addr);
        self.num_timeouts.fetch_add(1, Ordering::Relaxed);
        shutdown(&entry.tcp_stream);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of handshakes that timed out so far
    pub fn num_timeouts(&self) -> u64 {
        self.num_timeouts.load(Ordering::Relaxed)
    }

    /// Closes all pending streams
    pub fn clear(&self) {
        let entries = std::mem::take(&mut *self.entries.lock().unwrap());
        for entry in entries.into_values() {
            entry.expiry.abort();
            shutdown(&entry.tcp_stream);
        }
    }
}

fn shutdown(tcp_stream: &TcpStream) {
    if let Err(e) = SockRef::from(tcp_stream).shutdown(Shutdown::Both) {
        trace!("error shutting down pending TCP stream: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn accepted_stream() -> (Arc<TcpStream>, SocketAddr, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let (stream, remote_addr) = listener.accept().await.unwrap();
        (Arc::new(stream), remote_addr, client)
    }

    #[tokio::test]
    async fn test_complete() {
        let pending = Arc::new(PendingHandshakes::default());
        let (stream, remote_addr, _client) = accepted_stream().await;

        let token = pending.register(stream.clone(), remote_addr, Duration::from_secs(5));
        assert_eq!(pending.len(), 1);

        let (completed, completed_addr) = pending.complete(token).unwrap();
        assert!(Arc::ptr_eq(&completed, &stream));
        assert_eq!(completed_addr, remote_addr);
        assert!(pending.is_empty());

        assert!(pending.complete(token).is_none());
        assert!(pending.complete(token.wrapping_add(1)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let pending = Arc::new(PendingHandshakes::default());
        let (stream, remote_addr, mut client) = accepted_stream().await;

        let token = pending.register(stream, remote_addr, Duration::from_millis(200));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.num_timeouts(), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(pending.is_empty());
        assert_eq!(pending.num_timeouts(), 1);
        assert!(pending.complete(token).is_none());

        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(pending.num_timeouts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_handshake_does_not_expire() {
        let pending = Arc::new(PendingHandshakes::default());
        let (stream, remote_addr, _client) = accepted_stream().await;

        let token = pending.register(stream, remote_addr, Duration::from_millis(200));
        assert!(pending.complete(token).is_some());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(pending.num_timeouts(), 0);
    }

    #[tokio::test]
    async fn test_unique_tokens() {
        let pending = Arc::new(PendingHandshakes::default());
        let mut clients = Vec::new();
        let mut tokens = Vec::new();
        for _ in 0..20 {
            let (stream, remote_addr, client) = accepted_stream().await;
            tokens.push(pending.register(stream, remote_addr, Duration::from_secs(5)));
            clients.push(client);
        }

        tokens.sort();
        tokens.dedup();
        assert_eq!(tokens.len(), 20);
        assert_eq!(pending.len(), 20);

        pending.clear();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_abandon() {
        let pending = Arc::new(PendingHandshakes::default());
        let (stream, remote_addr, mut client) = accepted_stream().await;

        let token = pending.register(stream, remote_addr, Duration::from_secs(5));
        assert!(pending.abandon(token));
        assert!(!pending.abandon(token));
        assert_eq!(pending.num_timeouts(), 0);

        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }
}
