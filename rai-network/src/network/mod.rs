//! Network layer for the Rai light peer

use std::net::SocketAddr;
use std::time::Duration;

use crate::peer::DEFAULT_PEER_CAPACITY;
use crate::protocol::{Network as NetworkType, ProtocolVersions, VoteMode};

pub mod bulk_pull;
pub mod gossip;

pub use bulk_pull::{summarize, BulkPullCodec, BulkPullFrame, ChainPuller, PullSummary};
pub use gossip::{GossipEvent, GossipTransport, Publication};

/// Well-known mainnet entry point
pub const MAINNET_BOOTSTRAP: &str = "rai.raiblocks.net:7075";

/// Network configuration
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network type (mainnet or testnet)
    pub network: NetworkType,
    /// Local UDP address; port 0 picks a random port
    pub bind_addr: SocketAddr,
    /// `host:port` entries probed on startup
    pub bootstrap_peers: Vec<String>,
    /// Maximum size of the peer directory
    pub peer_capacity: usize,
    /// How far incoming `confirm_ack` messages are decoded
    pub vote_mode: VoteMode,
    /// Period of the keepalive broadcast driven by the node
    pub keepalive_interval: Duration,
    /// Per-peer deadline for a bulk pull
    pub pull_timeout: Duration,
    /// Versions advertised in outgoing headers
    pub versions: ProtocolVersions,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl NetworkConfig {
    pub fn mainnet() -> Self {
        Self {
            network: NetworkType::Mainnet,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            bootstrap_peers: vec![MAINNET_BOOTSTRAP.to_string()],
            peer_capacity: DEFAULT_PEER_CAPACITY,
            vote_mode: VoteMode::AccountOnly,
            keepalive_interval: Duration::from_secs(60),
            pull_timeout: Duration::from_millis(4000),
            versions: ProtocolVersions::default(),
        }
    }

    /// Testnet configuration - no public bootstrap host
    pub fn testnet() -> Self {
        Self {
            network: NetworkType::Testnet,
            bootstrap_peers: vec![],
            ..Self::mainnet()
        }
    }

    /// Default port peers of this network listen on
    pub fn default_peer_port(&self) -> u16 {
        self.network.default_port()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = NetworkConfig::default();
        assert_eq!(config.network, NetworkType::Mainnet);
        assert_eq!(config.bind_addr.port(), 0);
        assert_eq!(config.bootstrap_peers, vec!["rai.raiblocks.net:7075".to_string()]);
        assert_eq!(config.peer_capacity, 200);
        assert_eq!(config.vote_mode, VoteMode::AccountOnly);
        assert_eq!(config.pull_timeout, Duration::from_millis(4000));
        assert_eq!(config.default_peer_port(), 7075);

        let testnet = NetworkConfig::testnet();
        assert_eq!(testnet.network, NetworkType::Testnet);
        assert!(testnet.bootstrap_peers.is_empty());
        assert_eq!(testnet.default_peer_port(), 54000);
    }
}
