//! UDP gossip: peer discovery, block publication and vote observation

use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::join_all;
use rand::seq::SliceRandom;
use rai_crypto::RaiKeyPair;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::error::{NetworkError, NetworkResult};
use crate::network::NetworkConfig;
use crate::peer::{parse_peer, PeerDirectory};
use crate::protocol::message::KEEPALIVE_PEERS;
use crate::protocol::{Block, BlockHash, Body, Message, MessageType};

/// Largest datagram the receive loop accepts
const MAX_DATAGRAM: usize = 2048;

/// Events produced by the receive loop, in arrival order
#[derive(Debug)]
pub enum GossipEvent {
    /// Any successfully parsed message
    Message { message: Message, from: SocketAddr },
    /// A published block; its signature has not been checked
    Block { block: Block, from: SocketAddr },
    /// A `confirm_ack`, either [`Body::Vote`] or [`Body::VoteAccount`]
    Vote { body: Body, from: SocketAddr },
    /// A datagram that failed to parse, or a send that failed
    Error(NetworkError),
}

/// Result of [`GossipTransport::publish`]
#[derive(Debug)]
pub struct Publication {
    /// Hash of the published block, known before any send completes
    pub hash: Option<BlockHash>,
    /// Resolves to the number of peers the datagram reached
    pub completion: JoinHandle<usize>,
}

impl Publication {
    /// Wait for every send to finish
    pub async fn sent(self) -> usize {
        match self.completion.await {
            Ok(delivered) => delivered,
            Err(e) => {
                log::warn!("Publication task failed: {}", e);
                0
            }
        }
    }
}

/// One UDP endpoint plus the peer directory it maintains.
///
/// Cloning is cheap; all clones share the socket and the directory.
#[derive(Clone)]
pub struct GossipTransport {
    socket: Arc<UdpSocket>,
    peers: Arc<RwLock<PeerDirectory>>,
    config: Arc<NetworkConfig>,
    event_tx: mpsc::UnboundedSender<GossipEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GossipTransport {
    /// Bind the UDP socket and create the event channel
    pub async fn bind(
        config: NetworkConfig,
    ) -> NetworkResult<(Self, mpsc::UnboundedReceiver<GossipEvent>)> {
        if config.peer_capacity == 0 {
            return Err(NetworkError::Config("peer_capacity must be at least 1".into()));
        }
        let socket = UdpSocket::bind(config.bind_addr).await?;
        log::info!("Gossip listening on {}", socket.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);
        let transport = Self {
            socket: Arc::new(socket),
            peers: Arc::new(RwLock::new(PeerDirectory::new(config.peer_capacity))),
            config: Arc::new(config),
            event_tx,
            shutdown_tx,
        };
        Ok((transport, event_rx))
    }

    pub fn local_addr(&self) -> NetworkResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Run the receive loop on its own task
    pub fn spawn(&self) -> JoinHandle<()> {
        let transport = self.clone();
        tokio::spawn(async move { transport.run().await })
    }

    /// Receive and dispatch datagrams one at a time until [`shutdown`](Self::shutdown)
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, from)) => self.handle_datagram(&buf[..len], from).await,
                        // ICMP errors from earlier sends show up here on some platforms
                        Err(e) => log::debug!("UDP receive error: {}", e),
                    }
                }
                _ = shutdown_rx.recv() => {
                    log::info!("Shutting down gossip transport");
                    break;
                }
            }
        }
    }

    /// Parse one datagram and dispatch it.
    ///
    /// A datagram that fails to parse is reported as
    /// [`NetworkError::InvalidMessage`] and otherwise ignored.
    pub async fn handle_datagram(&self, bytes: &[u8], from: SocketAddr) {
        let message = match Message::parse(bytes, self.config.vote_mode) {
            Ok(message) => message,
            Err(source) => {
                log::debug!("Dropping datagram from {}: {}", from, source);
                self.emit(GossipEvent::Error(NetworkError::InvalidMessage {
                    peer: from,
                    bytes: bytes.to_vec(),
                    source,
                }));
                return;
            }
        };
        log::trace!("{:?} from {}", message.message_type(), from);

        self.peers.write().await.observe(from);
        self.emit(GossipEvent::Message {
            message: message.clone(),
            from,
        });

        match (message.message_type(), message.body) {
            (MessageType::Keepalive, Body::Keepalive(peers)) => {
                for peer in peers.into_iter().filter(SocketAddr::is_ipv4) {
                    if let Err(e) = self.send_keepalive(peer).await {
                        self.emit(GossipEvent::Error(e));
                    }
                }
            }
            (MessageType::Publish, Body::Block(block)) => {
                self.emit(GossipEvent::Block { block, from });
            }
            (MessageType::ConfirmAck, body) => {
                self.emit(GossipEvent::Vote { body, from });
            }
            _ => {}
        }
    }

    /// Render `message` once and send it to every known peer.
    ///
    /// Per-peer failures are reported on the event channel and do not stop
    /// the other sends.
    pub async fn publish(
        &self,
        message: &Message,
        signer: Option<&RaiKeyPair>,
    ) -> NetworkResult<Publication> {
        let rendered = message.render(signer)?;
        let peers = self.peers().await;
        log::debug!(
            "Publishing {:?} to {} peers",
            message.message_type(),
            peers.len()
        );

        let socket = Arc::clone(&self.socket);
        let events = self.event_tx.clone();
        let bytes = rendered.bytes;
        let completion = tokio::spawn(async move {
            let socket = &*socket;
            let bytes = bytes.as_slice();
            let sends = peers
                .into_iter()
                .map(move |peer| async move { (peer, socket.send_to(bytes, peer).await) });

            let mut delivered = 0;
            for (peer, result) in join_all(sends).await {
                match result {
                    Ok(_) => delivered += 1,
                    Err(source) => {
                        log::warn!("Failed to send to {}: {}", peer, source);
                        let _ = events.send(GossipEvent::Error(NetworkError::Send { peer, source }));
                    }
                }
            }
            delivered
        });

        Ok(Publication {
            hash: rendered.hash,
            completion,
        })
    }

    /// Send a keepalive with no peers to `peer`
    pub async fn send_keepalive(&self, peer: SocketAddr) -> NetworkResult<()> {
        let bytes = self.keepalive(vec![]).render(None)?.bytes;
        self.socket
            .send_to(&bytes, peer)
            .await
            .map_err(|source| NetworkError::Send { peer, source })?;
        Ok(())
    }

    /// Send every known peer a keepalive listing a random sample of the others
    pub async fn broadcast_keepalive(&self) -> NetworkResult<Publication> {
        let ipv4: Vec<SocketAddr> = self
            .peers()
            .await
            .into_iter()
            .filter(SocketAddr::is_ipv4)
            .collect();
        let sample: Vec<SocketAddr> = ipv4
            .choose_multiple(&mut rand::thread_rng(), KEEPALIVE_PEERS)
            .copied()
            .collect();
        self.publish(&self.keepalive(sample), None).await
    }

    /// Probe each `host:port`, resolving names through DNS.
    ///
    /// Returns how many probes were sent. Unresolvable hosts are logged and skipped.
    pub async fn bootstrap(&self, hosts: &[String]) -> usize {
        let mut probed = 0;
        for host in hosts {
            let peer = match self.resolve(host).await {
                Ok(peer) => peer,
                Err(e) => {
                    log::warn!("Skipping bootstrap peer {}: {}", host, e);
                    continue;
                }
            };
            match self.send_keepalive(peer).await {
                Ok(()) => {
                    log::info!("Probed bootstrap peer {} ({})", host, peer);
                    probed += 1;
                }
                Err(e) => self.emit(GossipEvent::Error(e)),
            }
        }
        probed
    }

    /// Snapshot of the peer directory, most recent first
    pub async fn peers(&self) -> Vec<SocketAddr> {
        self.peers.read().await.all()
    }

    /// Record `peer` as seen without having received from it
    pub async fn observe_peer(&self, peer: SocketAddr) {
        self.peers.write().await.observe(peer);
    }

    /// Stop the receive loop
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    fn keepalive(&self, peers: Vec<SocketAddr>) -> Message {
        Message::keepalive(self.config.network, peers).with_versions(self.config.versions)
    }

    async fn resolve(&self, host: &str) -> NetworkResult<SocketAddr> {
        if let Ok(peer) = parse_peer(host) {
            return Ok(peer);
        }
        lookup_host(host)
            .await
            .map_err(|e| NetworkError::Resolve(format!("{}: {}", host, e)))?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| NetworkError::Resolve(host.to_string()))
    }

    fn emit(&self, event: GossipEvent) {
        // Nobody listening is not an error for the transport
        let _ = self.event_tx.send(event);
    }
}
