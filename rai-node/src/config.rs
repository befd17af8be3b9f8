use std::net::SocketAddr;
use std::time::Duration;

use rai_network::{Network, NetworkConfig, VoteMode};
use serde::{Deserialize, Serialize};

use crate::cli::Args;

pub const APP_NAME: &str = "rai-node";
pub const CONFIG_NAME: &str = "node-config";

/// Settings persisted in the platform config directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub network: Network,
    pub listen_port: u16,
    pub bootstrap_peers: Vec<String>,
    pub peer_capacity: usize,
    pub full_votes: bool,
    pub keepalive_interval_secs: u64,
    pub pull_timeout_ms: u64,
    /// How long `pull` gossips before dialing peers
    pub warmup_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let network = NetworkConfig::mainnet();
        Self {
            network: network.network,
            listen_port: network.bind_addr.port(),
            bootstrap_peers: network.bootstrap_peers,
            peer_capacity: network.peer_capacity,
            full_votes: false,
            keepalive_interval_secs: network.keepalive_interval.as_secs(),
            pull_timeout_ms: network.pull_timeout.as_millis() as u64,
            warmup_secs: 5,
        }
    }
}

impl NodeConfig {
    /// Override file settings with whatever was given on the command line
    pub fn apply_args(&mut self, args: &Args) {
        if args.testnet {
            self.network = Network::Testnet;
            if args.bootstrap.is_none() {
                self.bootstrap_peers = NetworkConfig::testnet().bootstrap_peers;
            }
        }
        if let Some(port) = args.port {
            self.listen_port = port;
        }
        if let Some(bootstrap) = &args.bootstrap {
            self.bootstrap_peers = bootstrap.clone();
        }
        if args.full_votes {
            self.full_votes = true;
        }
    }

    pub fn network_config(&self) -> NetworkConfig {
        let base = match self.network {
            Network::Mainnet => NetworkConfig::mainnet(),
            Network::Testnet => NetworkConfig::testnet(),
        };
        NetworkConfig {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], self.listen_port)),
            bootstrap_peers: self.bootstrap_peers.clone(),
            peer_capacity: self.peer_capacity,
            vote_mode: if self.full_votes {
                VoteMode::Full
            } else {
                VoteMode::AccountOnly
            },
            keepalive_interval: Duration::from_secs(self.keepalive_interval_secs.max(1)),
            pull_timeout: Duration::from_millis(self.pull_timeout_ms),
            ..base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults_match_network_defaults() {
        let config = NodeConfig::default().network_config();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.bind_addr.port(), 0);
        assert_eq!(config.bootstrap_peers, vec!["rai.raiblocks.net:7075".to_string()]);
        assert_eq!(config.vote_mode, VoteMode::AccountOnly);
        assert_eq!(config.pull_timeout, Duration::from_millis(4000));
    }

    #[test]
    fn test_cli_overrides() {
        let args = Args::try_parse_from([
            "rai-node",
            "--testnet",
            "--port",
            "54000",
            "--full-votes",
            "pull",
            "AB",
        ])
        .unwrap();
        let mut config = NodeConfig::default();
        config.apply_args(&args);

        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.listen_port, 54000);
        assert!(config.bootstrap_peers.is_empty());

        let network = config.network_config();
        assert_eq!(network.vote_mode, VoteMode::Full);
        assert_eq!(network.bind_addr.port(), 54000);
    }

    #[test]
    fn test_bootstrap_list_override() {
        let args =
            Args::try_parse_from(["rai-node", "--bootstrap", "10.0.0.1:7075,10.0.0.2:7075"])
                .unwrap();
        let mut config = NodeConfig::default();
        config.apply_args(&args);
        assert_eq!(config.bootstrap_peers, vec!["10.0.0.1:7075", "10.0.0.2:7075"]);
        assert_eq!(args.command, None);
    }

    #[test]
    fn test_config_file_round_trip() {
        let config = NodeConfig {
            network: Network::Testnet,
            ..NodeConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"testnet\""));
        assert_eq!(serde_json::from_str::<NodeConfig>(&json).unwrap(), config);
    }
}
