//! End-to-end queue lifecycle: enqueue over HTTP, drain as the consumer,
//! acknowledge, and observe status transitions.

mod common;

use common::{CONSUMER_TOKEN, STAFF_BEARER, TestServer, error_code};
use serde_json::json;
use tidebridge::db::Database;

#[tokio::test]
async fn enqueue_drain_acknowledge() {
    let server = TestServer::spawn().await;

    let resp = server
        .post_json("/bridge/queue", STAFF_BEARER, json!({"command": "mute Steve 10m"}))
        .await;
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    let first_id = body["id"].as_i64().unwrap();

    let resp = server
        .post_json("/bridge/queue", STAFF_BEARER, json!({"command": "kick Steve"}))
        .await;
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    let second_id = body["id"].as_i64().unwrap();
    assert!(second_id > first_id);

    // Consumer drains oldest-first.
    let resp = server.get("/bridge/pending", CONSUMER_TOKEN).await;
    assert_eq!(resp.status(), 200);
    let pending: serde_json::Value = resp.json().await.unwrap();
    let commands: Vec<&str> = pending
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["command"].as_str().unwrap())
        .collect();
    assert_eq!(commands, ["mute Steve 10m", "kick Steve"]);

    // Acknowledge the first; it leaves the pending set.
    let resp = server
        .post_json(
            &format!("/bridge/executed/{}", first_id),
            CONSUMER_TOKEN,
            json!({}),
        )
        .await;
    assert_eq!(resp.status(), 200);

    let resp = server.get("/bridge/pending", CONSUMER_TOKEN).await;
    let pending: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["id"].as_i64().unwrap(), second_id);
}

#[tokio::test]
async fn status_poll_tracks_execution() {
    let server = TestServer::spawn().await;

    let resp = server
        .post_json("/bridge/queue", STAFF_BEARER, json!({"command": "ban Griefer"}))
        .await;
    let body: serde_json::Value = resp.json().await.unwrap();
    let id = body["id"].as_i64().unwrap();

    let resp = server
        .get(&format!("/bridge/queue/{}", id), STAFF_BEARER)
        .await;
    assert_eq!(resp.status(), 200);
    let status: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(status["executed"], false);
    assert!(status["executed_at"].is_null());

    server
        .post_json(&format!("/bridge/executed/{}", id), CONSUMER_TOKEN, json!({}))
        .await;

    let resp = server
        .get(&format!("/bridge/queue/{}", id), STAFF_BEARER)
        .await;
    let status: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(status["executed"], true);
    assert!(status["executed_at"].is_i64());
}

#[tokio::test]
async fn acknowledging_twice_is_rejected() {
    let server = TestServer::spawn().await;

    let resp = server
        .post_json("/bridge/queue", STAFF_BEARER, json!({"command": "tp Steve spawn"}))
        .await;
    let body: serde_json::Value = resp.json().await.unwrap();
    let id = body["id"].as_i64().unwrap();

    let path = format!("/bridge/executed/{}", id);
    let resp = server.post_json(&path, CONSUMER_TOKEN, json!({})).await;
    assert_eq!(resp.status(), 200);

    // The pending -> executed transition is one-way.
    let resp = server.post_json(&path, CONSUMER_TOKEN, json!({})).await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn unknown_record_status_is_not_found() {
    let server = TestServer::spawn().await;
    let resp = server.get("/bridge/queue/99999", STAFF_BEARER).await;
    assert_eq!(resp.status(), 404);
    assert_eq!(error_code(resp).await, "not_found");
}

#[tokio::test]
async fn empty_command_is_rejected() {
    let server = TestServer::spawn().await;
    let resp = server
        .post_json("/bridge/queue", STAFF_BEARER, json!({"command": "   "}))
        .await;
    assert_eq!(resp.status(), 400);
    assert_eq!(error_code(resp).await, "bad_request");
}

#[tokio::test]
async fn queue_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.db");
    let path = path.to_str().unwrap();

    {
        let db = Database::new(path).await.unwrap();
        db.commands().enqueue("give Steve diamond 1").await.unwrap();
    }

    let db = Database::new(path).await.unwrap();
    let pending = db.commands().pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].command, "give Steve diamond 1");
}
