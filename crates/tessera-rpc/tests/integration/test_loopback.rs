//! Client adapters against a real loopback store server

use tessera_core::domain::{Block, BlockHash, FileMetaData, StoreError, UpdateOutcome};
use tessera_core::ports::{IBlockStore, IMetaStore};
use tessera_rpc::{BlockStoreClient, MetaStoreClient};

use crate::common::{self, name, record, v, TIMEOUT};

#[tokio::test]
async fn test_block_roundtrip_over_http() {
    let server = common::start_server(true, false).await;
    let client = BlockStoreClient::new(&server.address(), TIMEOUT).unwrap();

    let block = Block::new((0..=255u8).collect());
    client.put_block(&block).await.unwrap();

    let fetched = client.get_block(&block.hash()).await.unwrap();
    assert_eq!(fetched, block);
}

#[tokio::test]
async fn test_missing_block_is_not_found() {
    let server = common::start_server(true, false).await;
    let client = BlockStoreClient::new(&server.address(), TIMEOUT).unwrap();

    let hash = BlockHash::of(b"never stored");
    assert_eq!(
        client.get_block(&hash).await.unwrap_err(),
        StoreError::NotFound(hash)
    );
}

#[tokio::test]
async fn test_has_blocks_over_http() {
    let server = common::start_server(true, false).await;
    let client = BlockStoreClient::new(&server.address(), TIMEOUT).unwrap();

    let stored = Block::new(b"stored".to_vec());
    client.put_block(&stored).await.unwrap();

    let present = client
        .has_blocks(&[BlockHash::of(b"missing"), stored.hash()])
        .await
        .unwrap();
    assert_eq!(present, vec![stored.hash()]);
}

#[tokio::test]
async fn test_empty_block_roundtrip() {
    let server = common::start_server(true, false).await;
    let client = BlockStoreClient::new(&server.address(), TIMEOUT).unwrap();

    let block = Block::new(Vec::new());
    client.put_block(&block).await.unwrap();
    assert_eq!(client.get_block(&block.hash()).await.unwrap().size(), 0);
}

#[tokio::test]
async fn test_meta_update_rules_over_http() {
    let server = common::start_server(false, true).await;
    let client = MetaStoreClient::new(vec![server.address()], TIMEOUT).unwrap();

    assert_eq!(
        client.update_file(&record("a.txt", 2, b"x")).await.unwrap(),
        UpdateOutcome::Rejected
    );
    assert_eq!(
        client.update_file(&record("a.txt", 1, b"x")).await.unwrap(),
        UpdateOutcome::Accepted(v(1))
    );
    assert_eq!(
        client
            .update_file(&FileMetaData::tombstone(name("a.txt"), v(2)))
            .await
            .unwrap(),
        UpdateOutcome::Accepted(v(2))
    );

    let map = client.get_file_info_map().await.unwrap();
    let stored = &map[&name("a.txt")];
    assert_eq!(stored.version, v(2));
    assert!(stored.is_tombstone());

    assert_eq!(
        client.update_file(&record("a.txt", 1, b"y")).await.unwrap(),
        UpdateOutcome::Accepted(v(3))
    );
}

#[tokio::test]
async fn test_block_store_addr_over_http() {
    let server = common::start_server(false, true).await;
    let client = MetaStoreClient::new(vec![server.address()], TIMEOUT).unwrap();
    assert_eq!(client.get_block_store_addr().await.unwrap(), server.address());
}

#[tokio::test]
async fn test_unhosted_service_answers_404() {
    let server = common::start_server(true, false).await;
    let client = MetaStoreClient::new(vec![server.address()], TIMEOUT).unwrap();

    let err = client.get_file_info_map().await.unwrap_err();
    assert!(matches!(err, StoreError::Protocol(ref msg) if msg.contains("404")), "{err:?}");
}

#[tokio::test]
async fn test_follower_redirects_to_leader() {
    let follower = common::start_server(false, true).await;
    follower.leadership.set_leader(false);
    let leader = common::start_server(false, true).await;

    let client =
        MetaStoreClient::new(vec![follower.address(), leader.address()], TIMEOUT).unwrap();
    assert_eq!(client.get_block_store_addr().await.unwrap(), leader.address());
}

#[tokio::test]
async fn test_all_followers_is_no_leader() {
    let a = common::start_server(false, true).await;
    let b = common::start_server(false, true).await;
    a.leadership.set_leader(false);
    b.leadership.set_leader(false);

    let client = MetaStoreClient::new(vec![a.address(), b.address()], TIMEOUT).unwrap();
    assert_eq!(
        client.get_file_info_map().await.unwrap_err(),
        StoreError::NoLeader { tried: 2 }
    );
}

#[tokio::test]
async fn test_server_stops_on_cancel() {
    let server = common::start_server(true, false).await;
    let addr = server.address();
    server.shutdown.cancel();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let client = BlockStoreClient::new(&addr, TIMEOUT).unwrap();
    let err = client.has_blocks(&[]).await.unwrap_err();
    assert!(matches!(err, StoreError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = tessera_rpc::StoreServer::new()
        .with_block_store(std::sync::Arc::new(tessera_store::BlockStore::new()))
        .with_body_limit(1024);
    let shutdown = tokio_util::sync::CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move { server.serve(listener, token).await });

    let client = BlockStoreClient::new(&addr, TIMEOUT).unwrap();
    client.put_block(&Block::new(vec![7; 512])).await.unwrap();

    let err = client.put_block(&Block::new(vec![7; 4096])).await.unwrap_err();
    assert!(
        matches!(err, StoreError::Protocol(ref m) if m.contains("413")),
        "{err:?}"
    );
    shutdown.cancel();
}
