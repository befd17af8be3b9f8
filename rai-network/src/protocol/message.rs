//! Network message envelope, rendering and parsing

use std::net::{Ipv6Addr, SocketAddr};

use rai_crypto::RaiKeyPair;

use crate::error::{ParseError, ParseResult};
use crate::protocol::vote::{self, Vote, VoteMode};
use crate::protocol::{
    Block, BlockHash, Header, MessageType, Network, ProtocolVersions, ACCOUNT_LENGTH,
    HEADER_LENGTH,
};

/// Peers carried by one keepalive
pub const KEEPALIVE_PEERS: usize = 8;

/// 16-byte IPv6 address followed by a little-endian port
const PEER_ENTRY_LENGTH: usize = 18;

/// Keepalive body size, whatever the number of peers
pub const KEEPALIVE_BODY_LENGTH: usize = KEEPALIVE_PEERS * PEER_ENTRY_LENGTH;

/// Default frontier request: start at the zero account, no age or count limit
pub const FRONTIER_REQ_BODY: [u8; 36] = {
    let mut body = [0u8; 36];
    body[32] = 0xff;
    body[33] = 0xff;
    body[34] = 0xff;
    body[35] = 0xff;
    body
};

/// Account range for `bulk_pull`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountRange {
    pub start: [u8; ACCOUNT_LENGTH],
    pub end: [u8; ACCOUNT_LENGTH],
}

impl AccountRange {
    /// Range covering the chain of a single account given as 64 hex characters
    pub fn single(account: &str) -> ParseResult<Self> {
        if account.len() != ACCOUNT_LENGTH * 2 || !account.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseError::InvalidAccount(account.to_string()));
        }
        let mut key = [0u8; ACCOUNT_LENGTH];
        hex::decode_to_slice(account, &mut key)
            .map_err(|_| ParseError::InvalidAccount(account.to_string()))?;
        Ok(Self { start: key, end: key })
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let mut start = [0u8; ACCOUNT_LENGTH];
        let mut end = [0u8; ACCOUNT_LENGTH];
        start.copy_from_slice(&bytes[..ACCOUNT_LENGTH]);
        end.copy_from_slice(&bytes[ACCOUNT_LENGTH..ACCOUNT_LENGTH * 2]);
        Self { start, end }
    }

    pub fn to_bytes(&self) -> [u8; ACCOUNT_LENGTH * 2] {
        let mut bytes = [0u8; ACCOUNT_LENGTH * 2];
        bytes[..ACCOUNT_LENGTH].copy_from_slice(&self.start);
        bytes[ACCOUNT_LENGTH..].copy_from_slice(&self.end);
        bytes
    }
}

/// Message body, tagged by what was decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Up to eight peer endpoints
    Keepalive(Vec<SocketAddr>),
    /// `publish` or `confirm_req`
    Block(Block),
    /// `confirm_ack` decoded and verified
    Vote(Vote),
    /// `confirm_ack` decoded only up to the voting account
    VoteAccount {
        account: [u8; ACCOUNT_LENGTH],
        rest: Vec<u8>,
    },
    /// `bulk_pull` request
    AccountRange(AccountRange),
    /// Default `frontier_req`
    FrontierReq,
    /// Undecoded bytes; rendered verbatim
    Raw(Vec<u8>),
}

/// A protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub body: Body,
}

/// Rendered wire bytes plus the hash of the carried block, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub hash: Option<BlockHash>,
}

impl Message {
    /// Create a message with a default header for `message_type`
    pub fn new(network: Network, message_type: MessageType, body: Body) -> Self {
        Self {
            header: Header::new(network, message_type),
            body,
        }
    }

    pub fn keepalive(network: Network, peers: Vec<SocketAddr>) -> Self {
        Self::new(network, MessageType::Keepalive, Body::Keepalive(peers))
    }

    pub fn publish(network: Network, block: Block) -> Self {
        Self::new(network, MessageType::Publish, Body::Block(block))
    }

    pub fn confirm_req(network: Network, block: Block) -> Self {
        Self::new(network, MessageType::ConfirmReq, Body::Block(block))
    }

    pub fn confirm_ack(network: Network, vote: Vote) -> Self {
        Self::new(network, MessageType::ConfirmAck, Body::Vote(vote))
    }

    /// Request the chain of one account, given as 64 hex characters
    pub fn bulk_pull(network: Network, account: &str) -> ParseResult<Self> {
        let range = AccountRange::single(account)?;
        Ok(Self::new(
            network,
            MessageType::BulkPull,
            Body::AccountRange(range),
        ))
    }

    pub fn frontier_req(network: Network) -> Self {
        Self::new(network, MessageType::FrontierReq, Body::FrontierReq)
    }

    pub fn with_versions(mut self, versions: ProtocolVersions) -> Self {
        self.header.versions = versions;
        self
    }

    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }

    /// Serialize header and body.
    ///
    /// Block-carrying messages get the block type in the header extensions.
    /// An unsigned block is signed with `signer` when one is given.
    pub fn render(&self, signer: Option<&RaiKeyPair>) -> ParseResult<Rendered> {
        let mut header = self.header;
        let mut hash = None;

        let body = match &self.body {
            Body::Keepalive(peers) => encode_keepalive(peers)?,
            Body::Block(block) => {
                header.set_block_type(block.block_type());
                hash = Some(block.hash());
                match signer {
                    Some(keypair) if block.signature().is_none() => {
                        let mut signed = block.clone();
                        signed.sign(keypair);
                        signed.to_bytes()
                    }
                    _ => block.to_bytes(),
                }
            }
            Body::Vote(vote) => {
                header.set_block_type(vote.block.block_type());
                hash = Some(vote.block.hash());
                vote.to_bytes()
            }
            Body::VoteAccount { account, rest } => {
                let mut bytes = account.to_vec();
                bytes.extend_from_slice(rest);
                bytes
            }
            Body::AccountRange(range) => range.to_bytes().to_vec(),
            Body::FrontierReq => FRONTIER_REQ_BODY.to_vec(),
            Body::Raw(bytes) => bytes.clone(),
        };

        let mut bytes = Vec::with_capacity(HEADER_LENGTH + body.len());
        bytes.extend_from_slice(&header.to_bytes());
        bytes.extend_from_slice(&body);
        Ok(Rendered { bytes, hash })
    }

    /// Parse one datagram.
    pub fn parse(bytes: &[u8], mode: VoteMode) -> ParseResult<Self> {
        let header = Header::parse(bytes)?;
        let body = &bytes[HEADER_LENGTH..];

        let body = match header.message_type {
            MessageType::Keepalive => Body::Keepalive(decode_keepalive(body)?),
            MessageType::Publish | MessageType::ConfirmReq => {
                Body::Block(Block::decode(body, header.block_type()?)?)
            }
            MessageType::ConfirmAck => vote::parse_confirm_ack(&header, body, mode)?,
            MessageType::BulkPull if body.len() == ACCOUNT_LENGTH * 2 => {
                Body::AccountRange(AccountRange::from_bytes(body))
            }
            MessageType::FrontierReq if body == FRONTIER_REQ_BODY => Body::FrontierReq,
            _ => Body::Raw(body.to_vec()),
        };

        Ok(Self { header, body })
    }
}

/// Parse a complete block-carrying datagram: header, then exactly one block frame.
pub(crate) fn parse_block_message(bytes: &[u8]) -> ParseResult<(Header, Block)> {
    let header = Header::parse(bytes)?;
    let block = Block::decode(&bytes[HEADER_LENGTH..], header.block_type()?)?;
    Ok((header, block))
}

/// Map a peer onto the IPv4-mapped IPv6 form used in keepalive slots.
fn mapped_address(peer: &SocketAddr) -> ParseResult<Ipv6Addr> {
    match peer {
        SocketAddr::V4(v4) => Ok(v4.ip().to_ipv6_mapped()),
        SocketAddr::V6(v6) if v6.ip().to_ipv4_mapped().is_some() => Ok(*v6.ip()),
        SocketAddr::V6(v6) => Err(ParseError::Ipv6Unsupported(v6.to_string())),
    }
}

fn encode_keepalive(peers: &[SocketAddr]) -> ParseResult<Vec<u8>> {
    if peers.len() > KEEPALIVE_PEERS {
        return Err(ParseError::TooManyPeers(peers.len()));
    }
    let mut body = vec![0u8; KEEPALIVE_BODY_LENGTH];
    for (slot, peer) in body.chunks_exact_mut(PEER_ENTRY_LENGTH).zip(peers) {
        slot[..16].copy_from_slice(&mapped_address(peer)?.octets());
        slot[16..].copy_from_slice(&peer.port().to_le_bytes());
    }
    Ok(body)
}

fn decode_keepalive(body: &[u8]) -> ParseResult<Vec<SocketAddr>> {
    if body.len() != KEEPALIVE_BODY_LENGTH {
        return Err(ParseError::InvalidBlockLength {
            expected: KEEPALIVE_BODY_LENGTH,
            actual: body.len(),
        });
    }
    let mut peers = Vec::new();
    for slot in body.chunks_exact(PEER_ENTRY_LENGTH) {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&slot[..16]);
        let ip = Ipv6Addr::from(octets);
        let mapped_unspecified = ip.to_ipv4_mapped().map_or(false, |v4| v4.is_unspecified());
        if ip.is_unspecified() || mapped_unspecified {
            continue;
        }
        let port = u16::from_le_bytes([slot[16], slot[17]]);
        let peer = match ip.to_ipv4_mapped() {
            Some(v4) => SocketAddr::from((v4, port)),
            None => SocketAddr::from((ip, port)),
        };
        peers.push(peer);
    }
    Ok(peers)
}
