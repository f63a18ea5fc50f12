//! End-to-end tests against a gateway on an ephemeral port
//!
//! Every test uses the in-memory store so presigned URLs are inspected
//! rather than followed.

use bytes::Bytes;
use futures::StreamExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use syncgate_cli::{serve, AppState, GatewayConfig};
use syncgate_store::{FlexibleObjectStore, MemoryObjectStore, ObjectStore};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const PRIVATE_PEM: &str = include_str!("fixtures/jwt_rs256_private.pem");
const PUBLIC_PEM: &str = include_str!("fixtures/jwt_rs256_public.pem");

struct TestServer {
    base: String,
    store: MemoryObjectStore,
    client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    async fn start(config: GatewayConfig) -> Self {
        let store = MemoryObjectStore::default();
        let state = Arc::new(
            AppState::with_store(config, FlexibleObjectStore::memory(store.clone())).unwrap(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            serve(listener, state, async {
                rx.await.ok();
            })
            .await
            .unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            store,
            client: reqwest::Client::new(),
            shutdown: Some(tx),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post(&self, route: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/v1/storage/{}", route)))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn seed(&self, key: &str, body: &'static [u8]) {
        self.store.put(key, Bytes::from_static(body), None).await.unwrap();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn self_hosted_config() -> GatewayConfig {
    GatewayConfig {
        shared_secret: Some("T".to_string()),
        jwt_public_key: Some(PUBLIC_PEM.to_string()),
        min_poll_interval_ms: 10,
        ..Default::default()
    }
}

fn cloud_token(sub: &str, extra: Value) -> String {
    let mut claims = json!({
        "sub": sub,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    if let (Some(map), Some(extra)) = (claims.as_object_mut(), extra.as_object()) {
        map.extend(extra.clone());
    }
    encode(
        &Header::new(Algorithm::RS256),
        &claims,
        &EncodingKey::from_rsa_pem(PRIVATE_PEM.as_bytes()).unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_health_and_ready_are_public() {
    let server = TestServer::start(self_hosted_config()).await;

    let health = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let ready = server.client.get(server.url("/ready")).send().await.unwrap();
    assert_eq!(ready.status(), StatusCode::OK);
    let body: Value = ready.json().await.unwrap();
    assert_eq!(body, json!({"status": "ready", "storage": "ok"}));
}

#[tokio::test]
async fn test_shared_secret_presign_download() {
    let server = TestServer::start(self_hosted_config()).await;

    let ok = server
        .post("presign-download", "T", json!({"key": "a/b.txt"}))
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
    let body: Value = ok.json().await.unwrap();
    assert!(body["url"].as_str().unwrap().contains("a/b.txt"));
    assert!(body["expiresAt"].is_string());

    let denied = server
        .post("presign-download", "wrong", json!({"key": "a/b.txt"}))
        .await;
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
    let body: Value = denied.json().await.unwrap();
    assert!(body.get("url").is_none());
    assert_eq!(body["error"]["kind"], "unauthenticated");
}

#[tokio::test]
async fn test_missing_authorization_header() {
    let server = TestServer::start(self_hosted_config()).await;

    let response = server
        .client
        .post(server.url("/v1/storage/stat"))
        .json(&json!({"key": "a"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = TestServer::start(self_hosted_config()).await;

    let response = server
        .client
        .post(server.url("/v1/storage/stat"))
        .header("x-request-id", "client-req-1")
        .bearer_auth("T")
        .json(&json!({"key": "../escape"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()["x-request-id"], "client-req-1");

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "forbidden");
    assert_eq!(body["error"]["requestId"], "client-req-1");
    assert_eq!(body["error"]["retryable"], false);
}

#[tokio::test]
async fn test_malformed_body_is_invalid_argument() {
    let server = TestServer::start(self_hosted_config()).await;

    let response = server.post("stat", "T", json!({"notKey": 1})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "invalidArgument");

    let response = server
        .post("presign-upload", "T", json!({"key": "a", "expiresIn": -1}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_empty_prefix() {
    let server = TestServer::start(self_hosted_config()).await;

    let response = server.post("list", "T", json!({"prefix": "p/"})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"objects": [], "isTruncated": false}));
}

#[tokio::test]
async fn test_delete_twice() {
    let server = TestServer::start(self_hosted_config()).await;
    server.seed("notes/a.json", b"{}").await;

    let request = json!({"key": "notes/a.json", "tombstoneKey": "tombstones/notes/a.json"});

    let first: Value = server.post("delete", "T", request.clone()).await.json().await.unwrap();
    assert_eq!(first, json!({"deleted": true, "tombstoneCreated": true}));

    let second: Value = server.post("delete", "T", request).await.json().await.unwrap();
    assert_eq!(second, json!({"deleted": false, "tombstoneCreated": true}));

    let tombstone: Value =
        serde_json::from_slice(&server.store.contents("tombstones/notes/a.json").unwrap()).unwrap();
    assert_eq!(tombstone["originalKey"], "notes/a.json");
}

#[tokio::test]
async fn test_delete_prefix() {
    let server = TestServer::start(self_hosted_config()).await;
    server.seed("backups/1", b"x").await;
    server.seed("backups/2", b"x").await;
    server.seed("keep", b"x").await;

    let response = server
        .post("delete-prefix", "T", json!({"prefix": "backups/"}))
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"deletedCount": 2, "tombstoneCreated": true}));
    assert!(server.store.contents("keep").is_some());
    assert!(server.store.contents("tombstones/backups.json").is_some());
}

#[tokio::test]
async fn test_cloud_tenant_isolation() {
    let server = TestServer::start(self_hosted_config()).await;
    server.seed("users/u1/profiles/p.json", b"hello").await;
    server.seed("users/u2/profiles/q.json", b"secret").await;

    let token = cloud_token("u1", json!({}));

    let stat: Value = server
        .post("stat", &token, json!({"key": "profiles/p.json"}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(stat["exists"], true);
    assert_eq!(stat["size"], 5);

    let list: Value = server
        .post("list", &token, json!({"prefix": ""}))
        .await
        .json()
        .await
        .unwrap();
    let keys: Vec<&str> = list["objects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["profiles/p.json"]);

    let escape = server
        .post("stat", &token, json!({"key": "../u2/profiles/q.json"}))
        .await;
    assert_eq!(escape.status(), StatusCode::FORBIDDEN);

    let team = server
        .post("stat", &token, json!({"key": "x", "useTeam": true}))
        .await;
    assert_eq!(team.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cloud_team_prefix() {
    let server = TestServer::start(self_hosted_config()).await;
    server.seed("teams/t1/shared.json", b"{}").await;

    let token = cloud_token("u1", json!({"teamPrefix": "teams/t1/", "profileLimit": 3}));
    let stat: Value = server
        .post("stat", &token, json!({"key": "shared.json", "useTeam": true}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(stat["exists"], true);
}

#[tokio::test]
async fn test_expired_cloud_token() {
    let server = TestServer::start(self_hosted_config()).await;
    let token = cloud_token("u1", json!({"exp": chrono::Utc::now().timestamp() - 3600}));

    let response = server.post("stat", &token, json!({"key": "a"})).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_batch_presign() {
    let server = TestServer::start(self_hosted_config()).await;
    let token = cloud_token("u1", json!({}));

    let ok: Value = server
        .post(
            "presign-upload-batch",
            &token,
            json!({"items": [{"key": "b"}, {"key": "a", "contentType": "text/plain"}]}),
        )
        .await
        .json()
        .await
        .unwrap();
    let items = ok["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["key"], "b");
    assert!(items[0]["url"].as_str().unwrap().contains("users/u1/b"));
    assert_eq!(items[1]["key"], "a");

    let rejected = server
        .post(
            "presign-download-batch",
            &token,
            json!({"keys": ["fine", "../u2/stolen"]}),
        )
        .await;
    assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
    let body: Value = rejected.json().await.unwrap();
    assert!(body.get("items").is_none());
}

#[tokio::test]
async fn test_rate_limit_per_tenant() {
    let config = GatewayConfig {
        rate_limit_rps: 1,
        ..self_hosted_config()
    };
    let server = TestServer::start(config).await;

    let first = server.post("stat", "T", json!({"key": "a"})).await;
    assert_eq!(first.status(), StatusCode::OK);
    let second = server.post("stat", "T", json!({"key": "a"})).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    // Another tenant has its own budget
    let token = cloud_token("u1", json!({}));
    let other = server.post("stat", &token, json!({"key": "a"})).await;
    assert_eq!(other.status(), StatusCode::OK);
}

async fn read_until(response: reqwest::Response, needle: &str) -> bool {
    let mut stream = response.bytes_stream();
    let mut seen = String::new();
    let found = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(Ok(chunk)) = stream.next().await {
            seen.push_str(&String::from_utf8_lossy(&chunk));
            if seen.contains(needle) {
                return true;
            }
        }
        false
    })
    .await;
    matches!(found, Ok(true))
}

#[tokio::test]
async fn test_subscribe_reports_delete() {
    let server = TestServer::start(self_hosted_config()).await;
    server.seed("users/u1/a.json", b"x").await;
    let token = cloud_token("u1", json!({}));

    let response = server
        .client
        .get(server.url("/v1/storage/subscribe?intervalMs=20"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let deleted: Value = server
        .post("delete", &token, json!({"key": "a.json"}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(deleted["deleted"], true);

    assert!(read_until(response, "\"type\":\"delete\",\"key\":\"a.json\"").await);
}

#[tokio::test]
async fn test_subscribe_requires_auth() {
    let server = TestServer::start(self_hosted_config()).await;
    let response = server
        .client
        .get(server.url("/v1/storage/subscribe"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_shutdown_closes_streams() {
    let mut server = TestServer::start(self_hosted_config()).await;

    let response = server
        .client
        .get(server.url("/v1/storage/subscribe?intervalMs=20"))
        .bearer_auth("T")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    server.stop();
    let mut stream = response.bytes_stream();
    let ended = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(Ok(_)) = stream.next().await {}
    })
    .await;
    assert!(ended.is_ok());
}
