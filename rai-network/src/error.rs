//! Error types for the Rai network module.

use std::{io, net::SocketAddr};
use thiserror::Error;

/// Malformed wire data.
///
/// Always local to one message or one connection; never fatal to a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Buffer ends before a fixed-size section
    #[error("Truncated message: needed {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    /// First header byte is not the protocol magic
    #[error("Invalid magic byte: 0x{0:02x}")]
    InvalidMagic(u8),

    /// Network byte is neither mainnet nor testnet
    #[error("Invalid network byte: 0x{0:02x}")]
    InvalidNetwork(u8),

    /// Message type byte out of range
    #[error("Invalid message type: {0}")]
    InvalidType(u8),

    /// Extension field has bits set above the block type byte
    #[error("Invalid extensions: 0x{0:04x}")]
    InvalidExtensions(u16),

    /// Block type is unknown or does not describe a block
    #[error("Invalid block type: {0}")]
    InvalidBlockType(u8),

    /// Body length does not match the fixed layout
    #[error("Invalid block length: expected {expected} bytes, got {actual}")]
    InvalidBlockLength { expected: usize, actual: usize },

    /// A field required by the block type was not supplied
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A field has the wrong number of bytes
    #[error("Length mismatch for {field}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Account is not 64 hex characters
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// Peer address is not `ip:port`
    #[error("Invalid peer address: {0}")]
    InvalidAddress(String),

    /// Keepalive carries at most eight peers
    #[error("Too many peers for keepalive: {0} (max: 8)")]
    TooManyPeers(usize),

    /// Only IPv4-mapped addresses fit the keepalive slots
    #[error("IPv6 peer not supported: {0}")]
    Ipv6Unsupported(String),

    /// Vote signature does not verify against its account
    #[error("Signature invalid")]
    SignatureInvalid,
}

/// Main error type for the network module
#[derive(Error, Debug)]
pub enum NetworkError {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed wire data outside of a received datagram
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// A datagram from `peer` failed to parse
    #[error("Invalid message from {peer}: {source}")]
    InvalidMessage {
        peer: SocketAddr,
        bytes: Vec<u8>,
        #[source]
        source: ParseError,
    },

    /// Sending to one peer failed
    #[error("Send to {peer} failed: {source}")]
    Send {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Host name lookup failed
    #[error("Failed to resolve {0}")]
    Resolve(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A specialized `Result` type for network operations
pub type NetworkResult<T> = std::result::Result<T, NetworkError>;

/// A specialized `Result` type for wire parsing and rendering
pub type ParseResult<T> = std::result::Result<T, ParseError>;
