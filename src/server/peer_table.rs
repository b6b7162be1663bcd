use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use rustc_hash::FxHashMap;
use tracing::trace;
use crate::connection::BichannelConnection;

/// A listener's connections by their remote UDP endpoint, for routing received datagrams
#[derive(Default)]
pub struct PeerTable {
    peers: RwLock<FxHashMap<SocketAddr, Arc<BichannelConnection>>>,
}

impl PeerTable {
    pub fn get(&self, udp_addr: &SocketAddr) -> Option<Arc<BichannelConnection>> {
        self.peers.read().unwrap()
            .get(udp_addr)
            .cloned()
    }

    pub fn insert(&self, udp_addr: SocketAddr, connection: Arc<BichannelConnection>) {
        let previous = self.peers.write().unwrap().insert(udp_addr, connection);
        if let Some(previous) = previous {
            // the endpoint was reused before the previous connection's disconnect unregistered it
            trace!("replacing connection for {:?}", udp_addr);
            previous.disconnect();
        }
    }

    /// Removes the entry only if it is this very connection, so that a stale connection's
    ///  disconnect does not unregister its successor on the same endpoint
    pub fn remove(&self, udp_addr: &SocketAddr, connection: &BichannelConnection) -> bool {
        let mut peers = self.peers.write().unwrap();
        match peers.get(udp_addr) {
            Some(registered) if std::ptr::eq(registered.as_ref(), connection) => {
                peers.remove(udp_addr);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.peers.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn connections(&self) -> Vec<Arc<BichannelConnection>> {
        self.peers.read().unwrap()
            .values()
            .cloned()
            .collect()
    }
}
