//! Client ↔ server over a loopback listener.

use nest_directory::server::{router, KeyStore};
use nest_directory::{DirectoryClient, DirectoryError, KeyRecord};

async fn spawn_directory() -> (DirectoryClient, KeyStore) {
    let store = KeyStore::new();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let app = router(store.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (DirectoryClient::new(format!("http://{addr}")), store)
}

fn payload_with_kid(kid: &str) -> String {
    let mut claims = nest_codec::ClaimSet::new();
    claims.insert("iss".into(), serde_json::json!("spiffe://example.org/wl"));
    claims.insert("kid".into(), serde_json::json!(kid));
    nest_codec::encode_claims(&claims)
}

#[tokio::test]
async fn publish_then_fetch() {
    let (client, _store) = spawn_directory().await;
    let record = KeyRecord::new_ec256("c29tZS1raWQ", "-----BEGIN EC PUBLIC KEY-----\nAAAA\n");
    let ack = client.add_key(&record).await.expect("add key");
    assert!(ack.contains("stored"));

    let records = client
        .get_keys(&payload_with_kid("c29tZS1raWQ"))
        .await
        .expect("get keys");
    assert_eq!(records, vec![record]);
}

#[tokio::test]
async fn rotation_keeps_every_record() {
    let (client, _store) = spawn_directory().await;
    for pem in ["pem-one", "pem-two", "pem-three"] {
        client
            .add_key(&KeyRecord::new_ec256("rot", pem))
            .await
            .expect("add key");
    }
    let records = client.get_keys_by_kid("rot").await.expect("get keys");
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].pem().unwrap(), "pem-three");
}

#[tokio::test]
async fn unknown_kid_is_no_keys() {
    let (client, _store) = spawn_directory().await;
    let err = client.get_keys_by_kid("missing").await.unwrap_err();
    assert!(matches!(err, DirectoryError::NoKeys(kid) if kid == "missing"));
}

#[tokio::test]
async fn unreachable_directory_is_reported() {
    // Nothing listens on this port.
    let client = DirectoryClient::new("http://127.0.0.1:1");
    let err = client.get_keys_by_kid("kid").await.unwrap_err();
    assert!(matches!(err, DirectoryError::Unreachable(_)));
}

#[tokio::test]
async fn payload_without_kid_is_rejected() {
    let (client, _store) = spawn_directory().await;
    let mut claims = nest_codec::ClaimSet::new();
    claims.insert("iss".into(), serde_json::json!("spiffe://example.org/wl"));
    let payload = nest_codec::encode_claims(&claims);
    let err = client.get_keys(&payload).await.unwrap_err();
    assert!(matches!(err, DirectoryError::MissingKid));
}
