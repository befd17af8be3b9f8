//! Wire protocol for the Rai network
//!
//! Every UDP datagram starts with an 8-byte header:
//!
//! ```text
//! +-------+---------+------+-------+------+------+------------+
//! | magic | network | vmax | vusing| vmin | type | extensions |
//! | 0x52  | C / A   |  u8  |  u8   |  u8  |  u8  | u16 (BE)   |
//! +-------+---------+------+-------+------+------+------------+
//! ```
//!
//! For `publish`, `confirm_req` and `confirm_ack` the extension field
//! carries the block type index.

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

pub mod block;
pub mod message;
pub mod vote;

pub use block::{Block, BlockContents, BlockHash, Field, FieldValues, Work};
pub use message::{AccountRange, Body, Message, Rendered};
pub use vote::{Vote, VoteMode};

/// First byte of every message.
pub const MAGIC: u8 = 0x52;

/// Network byte for mainnet ('C').
pub const MAINNET_BYTE: u8 = 0x43;

/// Network byte for testnet ('A').
pub const TESTNET_BYTE: u8 = 0x41;

/// Size of the message header.
pub const HEADER_LENGTH: usize = 8;

/// Size of a block or vote signature.
pub const SIGNATURE_LENGTH: usize = 64;

/// Size of the proof-of-work value.
pub const WORK_LENGTH: usize = 8;

/// Size of an account public key.
pub const ACCOUNT_LENGTH: usize = 32;

/// Size of the vote sequence number.
pub const SEQUENCE_LENGTH: usize = 8;

/// Default peering port.
pub const DEFAULT_PORT: u16 = 7075;

/// Length of the synthetic header placed before each streamed bulk-pull block.
pub const BULK_PULL_PREFIX_LENGTH: usize = HEADER_LENGTH - 1;

/// Network type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Get the header byte for this network
    pub fn byte(&self) -> u8 {
        match self {
            Network::Mainnet => MAINNET_BYTE,
            Network::Testnet => TESTNET_BYTE,
        }
    }

    /// Get the default port for this network
    pub fn default_port(&self) -> u16 {
        match self {
            Network::Mainnet => DEFAULT_PORT,
            Network::Testnet => 54000,
        }
    }
}

impl TryFrom<u8> for Network {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            MAINNET_BYTE => Ok(Network::Mainnet),
            TESTNET_BYTE => Ok(Network::Testnet),
            _ => Err(ParseError::InvalidNetwork(value)),
        }
    }
}

/// Protocol versions advertised in every header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersions {
    pub max: u8,
    pub using: u8,
    pub min: u8,
}

impl Default for ProtocolVersions {
    fn default() -> Self {
        Self {
            max: 0x0b,
            using: 0x0b,
            min: 0x07,
        }
    }
}

/// Message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Invalid = 0,
    NotAType = 1,
    Keepalive = 2,
    Publish = 3,
    ConfirmReq = 4,
    ConfirmAck = 5,
    BulkPull = 6,
    BulkPush = 7,
    FrontierReq = 8,
}

impl TryFrom<u8> for MessageType {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageType::Invalid),
            1 => Ok(MessageType::NotAType),
            2 => Ok(MessageType::Keepalive),
            3 => Ok(MessageType::Publish),
            4 => Ok(MessageType::ConfirmReq),
            5 => Ok(MessageType::ConfirmAck),
            6 => Ok(MessageType::BulkPull),
            7 => Ok(MessageType::BulkPush),
            8 => Ok(MessageType::FrontierReq),
            _ => Err(ParseError::InvalidType(value)),
        }
    }
}

impl MessageType {
    /// Whether the header extension field holds a block type for this message.
    pub fn carries_block(&self) -> bool {
        matches!(
            self,
            MessageType::Publish | MessageType::ConfirmReq | MessageType::ConfirmAck
        )
    }
}

/// Block type index, as carried in header extensions and bulk-pull streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BlockType {
    Invalid = 0,
    NotABlock = 1,
    Send = 2,
    Receive = 3,
    Open = 4,
    Change = 5,
    State = 6,
}

impl TryFrom<u8> for BlockType {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(BlockType::Invalid),
            1 => Ok(BlockType::NotABlock),
            2 => Ok(BlockType::Send),
            3 => Ok(BlockType::Receive),
            4 => Ok(BlockType::Open),
            5 => Ok(BlockType::Change),
            6 => Ok(BlockType::State),
            _ => Err(ParseError::InvalidBlockType(value)),
        }
    }
}

impl BlockType {
    /// Fixed size of the field section, `None` for the non-block markers.
    pub fn body_len(&self) -> Option<usize> {
        match self {
            BlockType::Send => Some(80),
            BlockType::Receive => Some(64),
            BlockType::Open => Some(96),
            BlockType::Change => Some(64),
            BlockType::State => Some(144),
            BlockType::Invalid | BlockType::NotABlock => None,
        }
    }

    /// Size of a full block frame: fields, signature and work.
    pub fn frame_len(&self) -> Option<usize> {
        self.body_len()
            .map(|len| len + SIGNATURE_LENGTH + WORK_LENGTH)
    }

    /// Error out unless this is one of the five real block variants.
    pub fn require_block(self) -> ParseResult<Self> {
        match self.body_len() {
            Some(_) => Ok(self),
            None => Err(ParseError::InvalidBlockType(self as u8)),
        }
    }
}

/// Message header (8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub network: Network,
    pub versions: ProtocolVersions,
    pub message_type: MessageType,
    pub extensions: u16,
}

impl Header {
    /// Create a header with default versions and no extensions
    pub fn new(network: Network, message_type: MessageType) -> Self {
        Self {
            network,
            versions: ProtocolVersions::default(),
            message_type,
            extensions: 0,
        }
    }

    /// Serialize the header
    pub fn to_bytes(&self) -> [u8; HEADER_LENGTH] {
        let ext = self.extensions.to_be_bytes();
        [
            MAGIC,
            self.network.byte(),
            self.versions.max,
            self.versions.using,
            self.versions.min,
            self.message_type as u8,
            ext[0],
            ext[1],
        ]
    }

    /// Parse and validate the header at the start of `bytes`
    pub fn parse(bytes: &[u8]) -> ParseResult<Self> {
        if bytes.len() < HEADER_LENGTH {
            return Err(ParseError::Truncated {
                needed: HEADER_LENGTH,
                available: bytes.len(),
            });
        }
        if bytes[0] != MAGIC {
            return Err(ParseError::InvalidMagic(bytes[0]));
        }
        let network = Network::try_from(bytes[1])?;
        let message_type = MessageType::try_from(bytes[5])?;

        Ok(Self {
            network,
            versions: ProtocolVersions {
                max: bytes[2],
                using: bytes[3],
                min: bytes[4],
            },
            message_type,
            extensions: u16::from_be_bytes([bytes[6], bytes[7]]),
        })
    }

    /// Block type carried in the extension field
    pub fn block_type(&self) -> ParseResult<BlockType> {
        if self.extensions > 0x00ff {
            return Err(ParseError::InvalidExtensions(self.extensions));
        }
        BlockType::try_from(self.extensions as u8)?.require_block()
    }

    /// Set the extension field to `block_type`
    pub fn set_block_type(&mut self, block_type: BlockType) {
        self.extensions = block_type as u16;
    }
}

/// The constant prefix that turns a streamed bulk-pull block into a publish message.
///
/// A bulk-pull response is a bare sequence of `type || fields || signature || work`
/// frames. Putting these seven bytes in front of a frame yields a complete
/// `publish` datagram whose last header byte is the streamed type byte.
pub fn bulk_pull_response_prefix(
    network: Network,
    versions: ProtocolVersions,
) -> [u8; BULK_PULL_PREFIX_LENGTH] {
    let header = Header {
        network,
        versions,
        message_type: MessageType::Publish,
        extensions: 0,
    }
    .to_bytes();
    let mut prefix = [0u8; BULK_PULL_PREFIX_LENGTH];
    prefix.copy_from_slice(&header[..BULK_PULL_PREFIX_LENGTH]);
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut header = Header::new(Network::Mainnet, MessageType::Publish);
        header.set_block_type(BlockType::State);

        assert_eq!(
            header.to_bytes(),
            [0x52, 0x43, 0x0b, 0x0b, 0x07, 0x03, 0x00, 0x06]
        );
        assert_eq!(Header::parse(&header.to_bytes()).unwrap(), header);
    }

    #[test]
    fn test_header_rejects_bad_bytes() {
        let good = Header::new(Network::Testnet, MessageType::Keepalive).to_bytes();

        let mut bad_magic = good;
        bad_magic[0] = 0x53;
        assert_eq!(Header::parse(&bad_magic), Err(ParseError::InvalidMagic(0x53)));

        let mut bad_network = good;
        bad_network[1] = 0x42;
        assert_eq!(Header::parse(&bad_network), Err(ParseError::InvalidNetwork(0x42)));

        let mut bad_type = good;
        bad_type[5] = 9;
        assert_eq!(Header::parse(&bad_type), Err(ParseError::InvalidType(9)));

        assert_eq!(
            Header::parse(&good[..5]),
            Err(ParseError::Truncated { needed: 8, available: 5 })
        );
    }

    #[test]
    fn test_block_type_needs_clean_high_byte() {
        let mut bytes = Header::new(Network::Mainnet, MessageType::Publish).to_bytes();
        bytes[7] = BlockType::Receive as u8;
        assert_eq!(Header::parse(&bytes).unwrap().block_type(), Ok(BlockType::Receive));

        bytes[6] = 0xff;
        let header = Header::parse(&bytes).unwrap();
        assert_eq!(header.block_type(), Err(ParseError::InvalidExtensions(0xff03)));
    }

    #[test]
    fn test_block_type_lengths() {
        assert_eq!(BlockType::Send.frame_len(), Some(80 + 72));
        assert_eq!(BlockType::Receive.frame_len(), Some(136));
        assert_eq!(BlockType::NotABlock.body_len(), None);
        assert!(BlockType::Invalid.require_block().is_err());
        assert_eq!(BlockType::try_from(7), Err(ParseError::InvalidBlockType(7)));
    }

    #[test]
    fn test_bulk_pull_prefix() {
        let prefix = bulk_pull_response_prefix(Network::Mainnet, ProtocolVersions::default());
        assert_eq!(prefix, [0x52, 0x43, 0x0b, 0x0b, 0x07, 0x03, 0x00]);
    }
}
