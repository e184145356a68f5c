//! Leader discovery and error mapping against wiremock endpoints

use std::time::Duration;

use tessera_core::domain::{BlockHash, StoreError, UpdateOutcome};
use tessera_core::ports::{IBlockStore, IMetaStore};
use tessera_rpc::{BlockStoreClient, MetaStoreClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{record, v, TIMEOUT};

async fn mount_not_leader(server: &MockServer, route: &str) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(serde_json::json!({"error": "not_leader"})),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_not_leader_is_skipped() {
    let follower = MockServer::start().await;
    let leader = MockServer::start().await;
    mount_not_leader(&follower, "/meta/block-store-addr").await;
    Mock::given(method("POST"))
        .and(path("/meta/block-store-addr"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"addr": "blocks:9000"})),
        )
        .expect(1)
        .mount(&leader)
        .await;

    let client = MetaStoreClient::new(vec![follower.uri(), leader.uri()], TIMEOUT).unwrap();
    assert_eq!(client.get_block_store_addr().await.unwrap(), "blocks:9000");
}

#[tokio::test]
async fn test_last_accepting_endpoint_is_tried_first() {
    let follower = MockServer::start().await;
    let leader = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meta/file-info-map"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(serde_json::json!({"error": "not_leader"})),
        )
        .expect(1)
        .mount(&follower)
        .await;
    Mock::given(method("POST"))
        .and(path("/meta/file-info-map"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"file_info_map": {}})),
        )
        .expect(3)
        .mount(&leader)
        .await;

    let client = MetaStoreClient::new(vec![follower.uri(), leader.uri()], TIMEOUT).unwrap();
    for _ in 0..3 {
        assert!(client.get_file_info_map().await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_exhaustion_returns_no_leader() {
    let a = MockServer::start().await;
    let b = MockServer::start().await;
    let c = MockServer::start().await;
    for server in [&a, &b, &c] {
        mount_not_leader(server, "/meta/update-file").await;
    }

    let client = MetaStoreClient::new(vec![a.uri(), b.uri(), c.uri()], TIMEOUT).unwrap();
    assert_eq!(
        client.update_file(&record("a.txt", 1, b"x")).await.unwrap_err(),
        StoreError::NoLeader { tried: 3 }
    );
}

#[tokio::test]
async fn test_no_endpoints_returns_no_leader() {
    let client = MetaStoreClient::new(Vec::new(), TIMEOUT).unwrap();
    assert_eq!(
        client.get_file_info_map().await.unwrap_err(),
        StoreError::NoLeader { tried: 0 }
    );
}

#[tokio::test]
async fn test_other_failures_abort_without_trying_next() {
    let broken = MockServer::start().await;
    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meta/file-info-map"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            serde_json::json!({"error": "internal", "message": "disk on fire"}),
        ))
        .mount(&broken)
        .await;
    Mock::given(method("POST"))
        .and(path("/meta/file-info-map"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"file_info_map": {}})),
        )
        .expect(0)
        .mount(&healthy)
        .await;

    let client = MetaStoreClient::new(vec![broken.uri(), healthy.uri()], TIMEOUT).unwrap();
    let err = client.get_file_info_map().await.unwrap_err();
    assert!(matches!(err, StoreError::Protocol(ref m) if m.contains("disk on fire")), "{err:?}");
}

#[tokio::test]
async fn test_503_without_not_leader_code_is_not_a_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meta/file-info-map"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let client = MetaStoreClient::new(vec![server.uri()], TIMEOUT).unwrap();
    let err = client.get_file_info_map().await.unwrap_err();
    assert!(matches!(err, StoreError::Protocol(_)), "{err:?}");
}

#[tokio::test]
async fn test_minus_one_is_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meta/update-file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"version": -1})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/meta/file-info-map"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "file_info_map": {
                "a.txt": {"filename": "a.txt", "version": 4, "block_hash_list": ["0"]}
            }
        })))
        .mount(&server)
        .await;

    let client = MetaStoreClient::new(vec![server.uri()], TIMEOUT).unwrap();
    assert_eq!(
        client.update_file(&record("a.txt", 1, b"x")).await.unwrap(),
        UpdateOutcome::Rejected
    );

    let map = client.get_file_info_map().await.unwrap();
    let remote = map.values().next().unwrap();
    assert_eq!(remote.version, v(4));
    assert!(remote.is_tombstone());
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/block/has"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"hashes": []}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = BlockStoreClient::new(&server.uri(), Duration::from_millis(200)).unwrap();
    let err = client.has_blocks(&[]).await.unwrap_err();
    assert_eq!(
        err,
        StoreError::Timeout {
            endpoint: server.uri()
        }
    );
}

#[tokio::test]
async fn test_block_404_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/block/get"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"error": "not_found"})))
        .mount(&server)
        .await;

    let client = BlockStoreClient::new(&server.uri(), TIMEOUT).unwrap();
    let hash = BlockHash::of(b"gone");
    assert_eq!(
        client.get_block(&hash).await.unwrap_err(),
        StoreError::NotFound(hash)
    );
}

#[tokio::test]
async fn test_block_with_wrong_content_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/block/get"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": "aGkh", "size": 3})),
        )
        .mount(&server)
        .await;

    let client = BlockStoreClient::new(&server.uri(), TIMEOUT).unwrap();
    let err = client.get_block(&BlockHash::of(b"other")).await.unwrap_err();
    assert!(matches!(err, StoreError::Protocol(_)), "{err:?}");
}

#[tokio::test]
async fn test_malformed_response_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/meta/block-store-addr"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = MetaStoreClient::new(vec![server.uri()], TIMEOUT).unwrap();
    assert!(matches!(
        client.get_block_store_addr().await.unwrap_err(),
        StoreError::Protocol(_)
    ));
}
