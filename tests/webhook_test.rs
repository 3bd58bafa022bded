//! Webhook ingestion tests: acknowledgement contract, user upserts, and
//! trigger routing through to the provider API.

mod common;

use common::{api_path, TestEnvironment, TEST_TOKEN};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use botdesk::storage::commands::{create_command, CommandInput};
use botdesk::storage::get_connection;
use botdesk::storage::types::{MediaKind, ParseMode, TriggerKind};
use botdesk::storage::users::{get_user_by_telegram_id, set_blocked, search_users, StatusFilter};
use botdesk::telegram::webhook::{router, WebhookState};
use botdesk::telegram::ApiClient;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn webhook_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/telegram/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse body")
}

fn state_for(env: &TestEnvironment, base_url: &str) -> WebhookState {
    WebhookState {
        db: Arc::clone(&env.db),
        api: Arc::new(ApiClient::with_base_url(Some(TEST_TOKEN.to_string()), base_url)),
        media: Arc::clone(&env.media),
    }
}

fn message_update(chat_id: i64, from_id: i64, text: &str, username: Option<&str>) -> String {
    json!({
        "update_id": 1,
        "message": {
            "message_id": 10,
            "chat": {"id": chat_id, "type": "private"},
            "text": text,
            "from": {
                "id": from_id,
                "first_name": "Ann",
                "username": username,
                "is_bot": false
            }
        }
    })
    .to_string()
}

fn seed_command(env: &TestEnvironment, trigger: &str, kind: TriggerKind, response: &str) {
    let conn = get_connection(&env.db).unwrap();
    create_command(
        &conn,
        &CommandInput {
            trigger,
            trigger_kind: kind,
            response,
            parse_mode: ParseMode::None,
            media_kind: MediaKind::None,
            media_path: None,
            buttons: None,
            is_active: true,
        },
    )
    .unwrap();
}

#[tokio::test]
async fn test_non_message_update_is_acknowledged_and_ignored() {
    let env = TestEnvironment::new();
    let app = router(state_for(&env, "http://127.0.0.1:1"));

    let response = app
        .oneshot(webhook_request(r#"{"update_id": 5, "callback_query": {}}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await, json!({"ok": true}));

    let conn = get_connection(&env.db).unwrap();
    assert!(search_users(&conn, None, StatusFilter::Any, 10).unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_body_still_gets_acknowledged() {
    let env = TestEnvironment::new();
    let app = router(state_for(&env, "http://127.0.0.1:1"));

    let response = app.oneshot(webhook_request("this is not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await, json!({"ok": true}));
}

#[tokio::test]
async fn test_matched_command_sends_rendered_response() {
    let env = TestEnvironment::new();
    seed_command(&env, "/start", TriggerKind::Command, "Hi {first_name} (@{username})");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .and(body_partial_json(json!({
            "chat_id": 77,
            "text": "Hi Ann (@ann1)"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let app = router(state_for(&env, &server.uri()));
    let response = app
        .oneshot(webhook_request(&message_update(77, 42, "/start@mybot extra", Some("ann1"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Sender also landed in the directory
    let conn = get_connection(&env.db).unwrap();
    let user = get_user_by_telegram_id(&conn, 42).unwrap().expect("upserted");
    assert_eq!(user.first_name.as_deref(), Some("Ann"));
    assert!(user.last_activity_at.is_some());
}

#[tokio::test]
async fn test_unmatched_text_is_silent() {
    let env = TestEnvironment::new();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(0)
        .mount(&server)
        .await;

    let app = router(state_for(&env, &server.uri()));
    let response = app
        .oneshot(webhook_request(&message_update(77, 42, "nothing configured", None)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_blocked_sender_gets_no_outbound_traffic() {
    let env = TestEnvironment::new();
    seed_command(&env, "/start", TriggerKind::Command, "Welcome");

    let user_id = env.seed_user(42, "Ann", Some("ann1"));
    {
        let conn = get_connection(&env.db).unwrap();
        set_blocked(&conn, user_id, true).unwrap();
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(0)
        .mount(&server)
        .await;

    let app = router(state_for(&env, &server.uri()));
    let response = app
        .oneshot(webhook_request(&message_update(77, 42, "/start", Some("ann1"))))
        .await
        .unwrap();

    // Still acknowledged; silence is internal
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await, json!({"ok": true}));
}

#[tokio::test]
async fn test_repeat_messages_refresh_the_same_directory_row() {
    let env = TestEnvironment::new();
    let app = router(state_for(&env, "http://127.0.0.1:1"));

    let first = app
        .clone()
        .oneshot(webhook_request(&message_update(77, 42, "hello", Some("ann1"))))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(webhook_request(&message_update(77, 42, "hello again", Some("ann_two"))))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);

    let conn = get_connection(&env.db).unwrap();
    let all = search_users(&conn, None, StatusFilter::Any, 10).unwrap();
    assert_eq!(all.len(), 1, "idempotent upsert keyed on telegram_id");
    assert_eq!(all[0].username.as_deref(), Some("ann_two"));
}
