//! Wire protocol and networking for the RaiBlocks light peer.
//!
//! - [`protocol`]: block and message codecs, vote parsing
//! - [`peer`]: the bounded recency list of known peers
//! - [`network`]: UDP gossip and TCP bulk pull

pub mod error;
pub mod network;
pub mod peer;
pub mod protocol;

pub use error::{NetworkError, NetworkResult, ParseError, ParseResult};
pub use network::{
    summarize, ChainPuller, GossipEvent, GossipTransport, NetworkConfig, Publication, PullSummary,
};
pub use peer::{parse_peer, PeerDirectory};
pub use protocol::{
    Block, BlockContents, BlockHash, BlockType, Body, Header, Message, MessageType, Network,
    ProtocolVersions, Vote, VoteMode, Work,
};
