//! Shared test harness: boots the full bridge in-process on ephemeral
//! ports, with a static identity table covering every gate combination.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tidebridge::channel::{Broadcaster, ConsumerGateway};
use tidebridge::config::Config;
use tidebridge::db::Database;
use tidebridge::http::{AppState, router};

pub const CONSUMER_TOKEN: &str = "consumer-token-0123456789abcdef";

/// Moderator, no second factor.
pub const STAFF_BEARER: &str = "staff-bearer";
/// Admin with a second factor enrolled; step-up gate applies.
pub const ADMIN_2FA_BEARER: &str = "admin-2fa-bearer";
/// Admin on the owner allow-list.
pub const OWNER_BEARER: &str = "owner-bearer";
/// Plain member, not staff.
pub const USER_BEARER: &str = "user-bearer";

const TEST_CONFIG: &str = r#"
[server]
http_listen = "127.0.0.1:18080"
consumer_listen = "127.0.0.1:18081"

[database]
path = ":memory:"

[security]
step_up_secret = "fA8cR2mQ9xW4zL7pJ1kV6nB3tY5hD0gS"
step_up_ttl_secs = 3600
consumer_token = "consumer-token-0123456789abcdef"

[security.rate_limits]
sensitive_per_minute = 600
sensitive_burst = 100

[policy]
owners = ["web-owner"]

[[policy.rules]]
prefix = "op"
owner_only = true

[link]
code_ttl_secs = 900
sync_command = "sync {player}"

[[identity.tokens]]
token = "staff-bearer"
id = "web-staff"
display_name = "Mod"
role = "moderator"

[[identity.tokens]]
token = "admin-2fa-bearer"
id = "web-admin"
display_name = "Admin"
role = "admin"
second_factor_enabled = true

[[identity.tokens]]
token = "owner-bearer"
id = "web-owner"
display_name = "Owner"
role = "admin"

[[identity.tokens]]
token = "user-bearer"
id = "web-user"
display_name = "Steve"
role = "user"
"#;

pub struct TestServer {
    pub http_addr: SocketAddr,
    pub ws_addr: SocketAddr,
    pub client: reqwest::Client,
    pub db: Database,
}

impl TestServer {
    /// Boot the bridge with the standard test config.
    pub async fn spawn() -> Self {
        let config: Config = toml::from_str(TEST_CONFIG).expect("test config parses");
        let config = Arc::new(config);

        tidebridge::metrics::init();

        let db = Database::new(":memory:").await.expect("in-memory database");
        let broadcaster = Broadcaster::new();
        let state = AppState::new(config.clone(), db.clone(), broadcaster.clone());

        let gateway = ConsumerGateway::bind(
            "127.0.0.1:0".parse().unwrap(),
            CONSUMER_TOKEN.to_string(),
            broadcaster,
        )
        .await
        .expect("bind consumer listener");
        let ws_addr = gateway.local_addr().expect("consumer addr");
        tokio::spawn(gateway.run());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind http listener");
        let http_addr = listener.local_addr().expect("http addr");
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.expect("http server");
        });

        Self {
            http_addr,
            ws_addr,
            client: reqwest::Client::new(),
            db,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.http_addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.ws_addr)
    }

    pub async fn post_json(
        &self,
        path: &str,
        bearer: &str,
        body: serde_json::Value,
    ) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(bearer)
            .json(&body)
            .send()
            .await
            .expect("request")
    }

    pub async fn get(&self, path: &str, bearer: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(bearer)
            .send()
            .await
            .expect("request")
    }

    /// Mint a step-up token for the 2FA admin through the API.
    pub async fn step_up_token(&self) -> String {
        let resp = self
            .post_json("/bridge/stepup", ADMIN_2FA_BEARER, serde_json::json!({}))
            .await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.expect("json body");
        body["token"].as_str().expect("token field").to_string()
    }
}

/// Extract the stable error code from an error response body.
pub async fn error_code(resp: reqwest::Response) -> String {
    let body: serde_json::Value = resp.json().await.expect("error body is json");
    body["code"].as_str().expect("code field").to_string()
}
