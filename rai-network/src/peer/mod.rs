//! Known peer endpoints, most recently seen first

use std::collections::VecDeque;
use std::net::SocketAddr;

use crate::error::{ParseError, ParseResult};

/// Default number of peers kept before the oldest are evicted
pub const DEFAULT_PEER_CAPACITY: usize = 200;

/// Bounded recency list of peer endpoints.
///
/// Observing a peer moves it to the front; the back is dropped once the
/// list grows past its capacity. There is no time-based expiry.
#[derive(Debug, Clone)]
pub struct PeerDirectory {
    peers: VecDeque<SocketAddr>,
    capacity: usize,
}

impl Default for PeerDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_PEER_CAPACITY)
    }
}

impl PeerDirectory {
    pub fn new(capacity: usize) -> Self {
        Self {
            peers: VecDeque::with_capacity(capacity.min(DEFAULT_PEER_CAPACITY)),
            capacity,
        }
    }

    /// Record that `peer` was just heard from
    pub fn observe(&mut self, peer: SocketAddr) {
        if let Some(index) = self.peers.iter().position(|p| *p == peer) {
            self.peers.remove(index);
        }
        self.peers.push_front(peer);
        if self.peers.len() > self.capacity {
            if let Some(evicted) = self.peers.pop_back() {
                log::trace!("Evicting peer {}", evicted);
            }
        }
    }

    /// Snapshot of all peers, most recent first
    pub fn all(&self) -> Vec<SocketAddr> {
        self.peers.iter().copied().collect()
    }

    pub fn contains(&self, peer: &SocketAddr) -> bool {
        self.peers.contains(peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Parse an `ip:port` peer string
pub fn parse_peer(peer: &str) -> ParseResult<SocketAddr> {
    peer.trim()
        .parse()
        .map_err(|_| ParseError::InvalidAddress(peer.to_string()))
}
