use std::net::SocketAddr;
use std::time::Duration;

use rai_network::protocol::block::{OpenBlock, ReceiveBlock};
use rai_network::{Block, BlockContents, BlockType, ChainPuller, Network, NetworkConfig, Work};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::sleep;

const ACCOUNT: &str = "E89208DD038FBB269987689621D52292AE9C35941A7484756ECCED92A65093BA";

fn chain() -> Vec<Block> {
    let account = hex::decode(ACCOUNT).unwrap();
    let mut account_key = [0u8; 32];
    account_key.copy_from_slice(&account);

    let open = Block::new(
        BlockContents::Open(OpenBlock {
            source: [0x01; 32],
            representative: [0x02; 32],
            account: account_key,
        }),
        Work::from_u64(1),
    )
    .with_signature([0x0a; 64]);
    let receive = Block::new(
        BlockContents::Receive(ReceiveBlock {
            previous: open.hash().0,
            source: [0x03; 32],
        }),
        Work::from_u64(2),
    )
    .with_signature([0x0b; 64]);
    vec![receive, open]
}

fn stream_bytes(blocks: &[Block]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for block in blocks {
        bytes.push(block.block_type() as u8);
        bytes.extend_from_slice(&block.to_bytes());
    }
    bytes
}

/// Serve `response` in `chunk`-sized writes, then hold the connection open for `linger`.
async fn serve(response: Vec<u8>, chunk: usize, linger: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 72];
        stream.read_exact(&mut request).await.unwrap();
        assert_eq!(request[5], 6, "bulk_pull message type");
        assert_eq!(hex::encode_upper(&request[8..40]), ACCOUNT);
        assert_eq!(&request[8..40], &request[40..72]);

        for piece in response.chunks(chunk) {
            stream.write_all(piece).await.unwrap();
            stream.flush().await.unwrap();
            sleep(Duration::from_millis(5)).await;
        }
        sleep(linger).await;
    });
    addr
}

async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test]
async fn test_fetch_account_reassembles_and_aggregates() {
    env_logger::builder().is_test(true).try_init().unwrap_or(());

    let blocks = chain();
    let mut full = stream_bytes(&blocks);
    full.push(BlockType::NotABlock as u8);

    // complete chain in awkward 50-byte pieces
    let complete = serve(full, 50, Duration::ZERO).await;
    // one block, then silence until the deadline
    let stalled = serve(stream_bytes(&blocks[..1]), 1000, Duration::from_secs(5)).await;
    let refused = closed_port().await;

    let config = NetworkConfig {
        pull_timeout: Duration::from_millis(500),
        ..NetworkConfig::default()
    };
    let summary = ChainPuller::new(&config)
        .fetch_account(&[complete, stalled, refused], ACCOUNT)
        .await
        .unwrap();

    assert_eq!(summary.blocks, blocks);
    assert_eq!(summary.return_count, 2);
    assert_eq!(summary.match_proportion, 0.5);
}

#[tokio::test]
async fn test_trailing_partial_block_is_discarded() {
    let blocks = chain();
    let mut response = stream_bytes(&blocks);
    response.truncate(response.len() - 10);

    let peer = serve(response, 64, Duration::ZERO).await;
    let config = NetworkConfig {
        network: Network::Mainnet,
        pull_timeout: Duration::from_millis(500),
        ..NetworkConfig::default()
    };
    let summary = ChainPuller::new(&config)
        .fetch_account(&[peer], ACCOUNT)
        .await
        .unwrap();

    assert_eq!(summary.blocks, blocks[..1].to_vec());
    assert_eq!(summary.return_count, 1);
    assert_eq!(summary.match_proportion, 1.0);
}

#[tokio::test]
async fn test_no_peers() {
    let summary = ChainPuller::new(&NetworkConfig::default())
        .fetch_account(&[], ACCOUNT)
        .await
        .unwrap();
    assert!(summary.blocks.is_empty());
    assert_eq!(summary.return_count, 0);
}
