//! TCP bulk pull of an account chain from many peers at once
//!
//! A bulk-pull response is a bare stream of frames:
//!
//! ```text
//! +------+------------------+-----------+------+
//! | type | fields           | signature | work |
//! |  u8  | body_len(type)   | 64 bytes  | 8    |
//! +------+------------------+-----------+------+
//! ```
//!
//! terminated by a single `not_a_block` type byte. Frames arrive split
//! across TCP segments in arbitrary places.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures::future::join_all;
use futures::StreamExt;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tokio_util::codec::{Decoder, FramedRead};

use crate::error::{NetworkError, NetworkResult, ParseError};
use crate::network::NetworkConfig;
use crate::protocol::message::parse_block_message;
use crate::protocol::{
    bulk_pull_response_prefix, Block, BlockType, Message, Network, ProtocolVersions,
    BULK_PULL_PREFIX_LENGTH,
};

/// One item of a bulk-pull response stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkPullFrame {
    Block(Block),
    /// The peer has sent its whole chain
    End,
}

/// Streaming decoder for bulk-pull responses.
///
/// A frame is only yielded once all of its bytes have arrived; anything
/// shorter stays buffered for the next read.
#[derive(Debug, Clone)]
pub struct BulkPullCodec {
    prefix: [u8; BULK_PULL_PREFIX_LENGTH],
    finished: bool,
}

impl BulkPullCodec {
    pub fn new(network: Network, versions: ProtocolVersions) -> Self {
        Self {
            prefix: bulk_pull_response_prefix(network, versions),
            finished: false,
        }
    }
}

impl Decoder for BulkPullCodec {
    type Item = BulkPullFrame;
    type Error = NetworkError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.finished {
            src.clear();
            return Ok(None);
        }
        let type_byte = match src.first() {
            Some(byte) => *byte,
            None => return Ok(None),
        };

        let block_type = BlockType::try_from(type_byte)?;
        if block_type == BlockType::NotABlock {
            self.finished = true;
            src.clear();
            return Ok(Some(BulkPullFrame::End));
        }
        let frame_len = 1 + block_type
            .frame_len()
            .ok_or(ParseError::InvalidBlockType(type_byte))?;

        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        // The type byte completes the prefix's extension field.
        let frame = src.split_to(frame_len);
        let mut framed = Vec::with_capacity(BULK_PULL_PREFIX_LENGTH + frame_len);
        framed.extend_from_slice(&self.prefix);
        framed.extend_from_slice(&frame);
        let (_, block) = parse_block_message(&framed)?;

        Ok(Some(BulkPullFrame::Block(block)))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                if !buf.is_empty() {
                    log::debug!("Discarding {} bytes of incomplete block", buf.len());
                    buf.clear();
                }
                Ok(None)
            }
        }
    }
}

/// Aggregate over every peer's response
#[derive(Debug, Clone, Serialize)]
pub struct PullSummary {
    /// The longest chain returned, first one on ties
    pub blocks: Vec<Block>,
    /// Fraction of non-empty responses as long as `blocks`
    pub match_proportion: f64,
    /// Number of peers that returned at least one block
    pub return_count: usize,
}

/// Reduce per-peer chains, given in peer order, to a [`PullSummary`]
pub fn summarize(chains: Vec<Vec<Block>>) -> PullSummary {
    let non_empty = chains.iter().filter(|chain| !chain.is_empty()).count();

    // Strictly longer replaces, so ties keep the earliest peer.
    let mut plurality: &[Block] = &[];
    for chain in &chains {
        if chain.len() > plurality.len() {
            plurality = chain;
        }
    }
    let matching = if plurality.is_empty() {
        0
    } else {
        chains
            .iter()
            .filter(|chain| chain.len() == plurality.len())
            .count()
    };

    let match_proportion = if non_empty == 0 {
        0.0
    } else {
        matching as f64 / non_empty as f64
    };

    PullSummary {
        blocks: plurality.to_vec(),
        match_proportion,
        return_count: non_empty,
    }
}

/// Fetches account chains over TCP, one connection per peer
#[derive(Debug, Clone, Copy)]
pub struct ChainPuller {
    network: Network,
    versions: ProtocolVersions,
    timeout: Duration,
}

impl ChainPuller {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            network: config.network,
            versions: config.versions,
            timeout: config.pull_timeout,
        }
    }

    /// Pull the chain of `account` (64 hex characters) from every peer.
    ///
    /// Every peer is dialed concurrently and gets its own deadline. A peer
    /// that fails or times out contributes whatever it sent before that.
    pub async fn fetch_account(
        &self,
        peers: &[SocketAddr],
        account: &str,
    ) -> NetworkResult<PullSummary> {
        let request: Arc<[u8]> = Message::bulk_pull(self.network, account)?
            .with_versions(self.versions)
            .render(None)?
            .bytes
            .into();
        log::info!("Pulling {} from {} peers", account, peers.len());

        let pulls = peers.iter().map(|&peer| {
            let puller = *self;
            let request = Arc::clone(&request);
            tokio::spawn(async move { puller.pull_from(peer, &request).await })
        });
        let chains = join_all(pulls)
            .await
            .into_iter()
            .map(|joined| joined.unwrap_or_default())
            .collect();

        Ok(summarize(chains))
    }

    async fn pull_from(&self, peer: SocketAddr, request: &[u8]) -> Vec<Block> {
        let deadline = Instant::now() + self.timeout;
        let mut blocks = Vec::new();

        let outcome = timeout_at(deadline, self.stream_chain(peer, request, &mut blocks)).await;
        match outcome {
            Ok(Ok(())) => log::debug!("{} sent {} blocks", peer, blocks.len()),
            Ok(Err(e)) => log::warn!(
                "Bulk pull from {} failed after {} blocks: {}",
                peer,
                blocks.len(),
                e
            ),
            Err(_) => log::debug!("Bulk pull from {} timed out after {} blocks", peer, blocks.len()),
        }
        blocks
    }

    async fn stream_chain(
        &self,
        peer: SocketAddr,
        request: &[u8],
        blocks: &mut Vec<Block>,
    ) -> NetworkResult<()> {
        let mut stream = TcpStream::connect(peer).await?;
        stream.write_all(request).await?;

        let mut frames = FramedRead::new(stream, BulkPullCodec::new(self.network, self.versions));
        while let Some(frame) = frames.next().await {
            match frame? {
                BulkPullFrame::Block(block) => blocks.push(block),
                BulkPullFrame::End => break,
            }
        }
        Ok(())
    }
}
