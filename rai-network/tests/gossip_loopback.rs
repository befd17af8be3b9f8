use std::net::{Ipv6Addr, SocketAddr};
use std::time::Duration;

use rai_crypto::RaiKeyPair;
use rai_network::protocol::block::StateBlock;
use rai_network::protocol::HEADER_LENGTH;
use rai_network::{
    Block, BlockContents, Body, GossipEvent, GossipTransport, Message, Network, NetworkConfig,
    NetworkError, Vote, VoteMode, Work,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

fn loopback_config(vote_mode: VoteMode) -> NetworkConfig {
    NetworkConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        vote_mode,
        ..NetworkConfig::testnet()
    }
}

async fn start(vote_mode: VoteMode) -> (GossipTransport, UnboundedReceiver<GossipEvent>) {
    let (transport, events) = GossipTransport::bind(loopback_config(vote_mode)).await.unwrap();
    transport.spawn();
    (transport, events)
}

async fn next_event(events: &mut UnboundedReceiver<GossipEvent>) -> GossipEvent {
    timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for gossip event")
        .expect("event channel closed")
}

fn state_block() -> Block {
    Block::new(
        BlockContents::State(StateBlock {
            account: [0x11; 32],
            previous: [0x22; 32],
            representative: [0x33; 32],
            balance: [0x44; 16],
            link: [0x55; 32],
        }),
        Work::from_u64(0xdead_beef),
    )
}

#[tokio::test]
async fn test_published_block_reaches_peer() {
    env_logger::builder().is_test(true).try_init().unwrap_or(());

    let (sender, _sender_events) = start(VoteMode::AccountOnly).await;
    let (receiver, mut receiver_events) = start(VoteMode::AccountOnly).await;
    sender.observe_peer(receiver.local_addr().unwrap()).await;

    let keypair = RaiKeyPair::from_private_key([3u8; 32]);
    let block = state_block();
    let publication = sender
        .publish(&Message::publish(Network::Testnet, block.clone()), Some(&keypair))
        .await
        .unwrap();
    assert_eq!(publication.hash, Some(block.hash()));
    assert_eq!(publication.sent().await, 1);

    let sender_addr = sender.local_addr().unwrap();
    match next_event(&mut receiver_events).await {
        GossipEvent::Message { message, from } => {
            assert_eq!(from, sender_addr);
            assert!(matches!(message.body, Body::Block(_)));
        }
        other => panic!("expected message event, got {:?}", other),
    }
    match next_event(&mut receiver_events).await {
        GossipEvent::Block { block: received, from } => {
            assert_eq!(from, sender_addr);
            assert_eq!(received.hash(), block.hash());
            received.verify_signature(&keypair.public_key()).unwrap();
        }
        other => panic!("expected block event, got {:?}", other),
    }
    assert_eq!(receiver.peers().await, vec![sender_addr]);

    sender.shutdown();
    receiver.shutdown();
}

#[tokio::test]
async fn test_votes_in_both_modes() {
    let (sender, _sender_events) = start(VoteMode::AccountOnly).await;
    let (light, mut light_events) = start(VoteMode::AccountOnly).await;
    let (full, mut full_events) = start(VoteMode::Full).await;
    sender.observe_peer(light.local_addr().unwrap()).await;
    sender.observe_peer(full.local_addr().unwrap()).await;

    let keypair = RaiKeyPair::from_private_key([8u8; 32]);
    let vote = Vote::sign(state_block(), 3, &keypair);
    sender
        .publish(&Message::confirm_ack(Network::Testnet, vote.clone()), None)
        .await
        .unwrap()
        .sent()
        .await;

    let _ = next_event(&mut light_events).await;
    match next_event(&mut light_events).await {
        GossipEvent::Vote {
            body: Body::VoteAccount { account, .. },
            ..
        } => assert_eq!(account, keypair.public_key()),
        other => panic!("expected account-only vote, got {:?}", other),
    }

    let _ = next_event(&mut full_events).await;
    match next_event(&mut full_events).await {
        GossipEvent::Vote {
            body: Body::Vote(received),
            ..
        } => assert_eq!(received, vote),
        other => panic!("expected verified vote, got {:?}", other),
    }
}

#[tokio::test]
async fn test_keepalive_floods_probes() {
    let (origin, _origin_events) = start(VoteMode::AccountOnly).await;
    let (relay, _relay_events) = start(VoteMode::AccountOnly).await;
    let (target, mut target_events) = start(VoteMode::AccountOnly).await;
    origin.observe_peer(relay.local_addr().unwrap()).await;

    let listed = vec![target.local_addr().unwrap()];
    origin
        .publish(&Message::keepalive(Network::Testnet, listed), None)
        .await
        .unwrap()
        .sent()
        .await;

    // the relay probes every listed peer with a bare keepalive
    match next_event(&mut target_events).await {
        GossipEvent::Message { message, from } => {
            assert_eq!(from, relay.local_addr().unwrap());
            assert_eq!(message.body, Body::Keepalive(vec![]));
        }
        other => panic!("expected keepalive probe, got {:?}", other),
    }
    assert_eq!(target.peers().await, vec![relay.local_addr().unwrap()]);
}

#[tokio::test]
async fn test_garbage_does_not_stop_transport() {
    let (receiver, mut events) = start(VoteMode::AccountOnly).await;
    let (sender, _sender_events) = start(VoteMode::AccountOnly).await;
    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let target = receiver.local_addr().unwrap();

    socket.send_to(b"not a rai message", target).await.unwrap();
    match next_event(&mut events).await {
        GossipEvent::Error(rai_network::NetworkError::InvalidMessage { peer, bytes, .. }) => {
            assert_eq!(peer, socket.local_addr().unwrap());
            assert_eq!(bytes, b"not a rai message".to_vec());
        }
        other => panic!("expected invalid message, got {:?}", other),
    }

    sender.send_keepalive(target).await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        GossipEvent::Message { .. }
    ));
    assert_eq!(receiver.peers().await, vec![sender.local_addr().unwrap()]);
}

#[tokio::test]
async fn test_failed_send_reported_and_others_counted() {
    let (sender, mut sender_events) = start(VoteMode::AccountOnly).await;
    let (receiver, mut receiver_events) = start(VoteMode::AccountOnly).await;
    let unreachable: SocketAddr = "[::1]:7075".parse().unwrap();
    sender.observe_peer(unreachable).await;
    sender.observe_peer(receiver.local_addr().unwrap()).await;

    let block = state_block();
    let publication = sender
        .publish(&Message::publish(Network::Testnet, block.clone()), None)
        .await
        .unwrap();
    assert_eq!(publication.hash, Some(block.hash()));
    // an IPv4 socket cannot reach an IPv6 peer
    assert_eq!(publication.sent().await, 1);

    match next_event(&mut sender_events).await {
        GossipEvent::Error(NetworkError::Send { peer, .. }) => assert_eq!(peer, unreachable),
        other => panic!("expected send error, got {:?}", other),
    }
    assert!(matches!(
        next_event(&mut receiver_events).await,
        GossipEvent::Message { .. }
    ));
}

#[tokio::test]
async fn test_keepalive_skips_ipv6_entries() {
    let (relay, mut relay_events) =
        GossipTransport::bind(loopback_config(VoteMode::AccountOnly)).await.unwrap();
    let (target, mut target_events) = start(VoteMode::AccountOnly).await;
    let target_addr = target.local_addr().unwrap();

    let mut bytes = Message::keepalive(Network::Testnet, vec![target_addr])
        .render(None)
        .unwrap()
        .bytes;
    // second slot: [2001:db8::1]:7075
    let slot = HEADER_LENGTH + 18;
    bytes[slot..slot + 16].copy_from_slice(&"2001:db8::1".parse::<Ipv6Addr>().unwrap().octets());
    bytes[slot + 16..slot + 18].copy_from_slice(&7075u16.to_le_bytes());

    let from: SocketAddr = "127.0.0.1:9".parse().unwrap();
    relay.handle_datagram(&bytes, from).await;

    let v6: SocketAddr = "[2001:db8::1]:7075".parse().unwrap();
    match next_event(&mut relay_events).await {
        GossipEvent::Message { message, .. } => {
            assert_eq!(message.body, Body::Keepalive(vec![target_addr, v6]));
        }
        other => panic!("expected keepalive, got {:?}", other),
    }
    // no probe was attempted toward the IPv6 entry
    assert!(relay_events.try_recv().is_err());

    match next_event(&mut target_events).await {
        GossipEvent::Message { message, from } => {
            assert_eq!(from, relay.local_addr().unwrap());
            assert_eq!(message.body, Body::Keepalive(vec![]));
        }
        other => panic!("expected keepalive probe, got {:?}", other),
    }
}
