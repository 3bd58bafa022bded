//! Common test utilities
//!
//! This module is shared across all integration tests

use std::sync::Arc;
use std::time::Duration;

use botdesk::broadcast::Dispatcher;
use botdesk::core::throttle::Throttle;
use botdesk::storage::broadcasts::{get_progress, BroadcastProgress};
use botdesk::storage::types::BroadcastStatus;
use botdesk::storage::users::{upsert_user, UserProfile};
use botdesk::storage::{create_pool, get_connection, DbPool, MediaStore};
use botdesk::telegram::ApiClient;
use tempfile::TempDir;

pub const TEST_TOKEN: &str = "1234567890:TEST-TOKEN-TEST-TOKEN-TEST-TOKEN-TEST";

/// Scratch database + media store living for the duration of one test.
pub struct TestEnvironment {
    #[allow(dead_code)]
    dir: TempDir,
    pub db: Arc<DbPool>,
    pub media: Arc<MediaStore>,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("test.sqlite");
        let pool = create_pool(db_path.to_str().expect("utf-8 path")).expect("create pool");
        let media = MediaStore::new(dir.path().join("media"));
        Self {
            dir,
            db: Arc::new(pool),
            media: Arc::new(media),
        }
    }

    /// Inserts an unblocked directory user and returns its row id.
    #[allow(dead_code)]
    pub fn seed_user(&self, telegram_id: i64, first_name: &str, username: Option<&str>) -> i64 {
        let conn = get_connection(&self.db).expect("get connection");
        upsert_user(
            &conn,
            telegram_id,
            &UserProfile {
                first_name: Some(first_name),
                username,
                ..Default::default()
            },
        )
        .expect("seed user")
        .id
    }

    /// API client pointed at a wiremock server, credential set.
    #[allow(dead_code)]
    pub fn api_client(&self, base_url: &str) -> Arc<ApiClient> {
        Arc::new(ApiClient::with_base_url(Some(TEST_TOKEN.to_string()), base_url))
    }

    /// Dispatcher with a fast throttle so tests finish promptly.
    #[allow(dead_code)]
    pub fn dispatcher(&self, api: Arc<ApiClient>) -> Dispatcher {
        let mut dispatcher = Dispatcher::new(Arc::clone(&self.db), api, Arc::clone(&self.media));
        dispatcher.throttle = Throttle::new(Duration::from_millis(1));
        dispatcher
    }
}

/// Path every bot API call hits on the mock server with the test credential.
#[allow(dead_code)]
pub fn api_path(method: &str) -> String {
    format!("/bot{TEST_TOKEN}/{method}")
}

/// Polls the job until it leaves `processing`, panicking after the deadline
/// so a hung dispatcher fails fast.
#[allow(dead_code)]
pub async fn wait_for_terminal_status(db: &Arc<DbPool>, broadcast_id: i64) -> BroadcastProgress {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        {
            let conn = get_connection(db).expect("get connection");
            if let Some(progress) = get_progress(&conn, broadcast_id).expect("read progress") {
                if matches!(progress.status, BroadcastStatus::Completed | BroadcastStatus::Failed) {
                    return progress;
                }
            }
        }
        assert!(
            tokio::time::Instant::now() <= deadline,
            "broadcast {broadcast_id} never reached a terminal status"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
