use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: botdesk.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "botdesk.sqlite".to_string()));

/// Root directory for uploaded media files
/// Read from MEDIA_ROOT environment variable
/// Default: media
pub static MEDIA_ROOT: Lazy<String> = Lazy::new(|| env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string()));

/// Bot token fallback when the settings store holds none
/// Read from BOT_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| env::var("BOT_TOKEN").unwrap_or_else(|_| String::new()));

/// Telegram Bot API base URL
/// Read from TELEGRAM_API_URL environment variable; overriding it points the
/// client at a local Bot API server or a test double.
pub static TELEGRAM_API_URL: Lazy<String> =
    Lazy::new(|| env::var("TELEGRAM_API_URL").unwrap_or_else(|_| "https://api.telegram.org".to_string()));

/// HTTP listen port for the webhook + admin server
/// Read from HTTP_PORT environment variable
/// Default: 8080
pub static HTTP_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("HTTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
});

/// Broadcast dispatch configuration
pub mod dispatch {
    use super::Duration;

    /// Maximum number of in-flight sends across all broadcast jobs
    pub const MAX_CONCURRENT_SENDS: usize = 8;

    /// Minimum spacing between outbound sends (milliseconds).
    /// 35 ms keeps aggregate throughput just under Telegram's ~30 msg/s cap.
    pub const SEND_INTERVAL_MS: u64 = 35;

    /// Interval between queue polls (in milliseconds)
    pub const CHECK_INTERVAL_MS: u64 = 100;

    /// Queue poll interval duration
    pub fn check_interval() -> Duration {
        Duration::from_millis(CHECK_INTERVAL_MS)
    }

    /// Inter-send spacing duration
    pub fn send_interval() -> Duration {
        Duration::from_millis(SEND_INTERVAL_MS)
    }
}

/// Retry configuration for outbound provider calls
pub mod retry {
    use super::Duration;

    /// Maximum number of attempts per recipient before counting as failed
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Fixed delay between retry attempts (in milliseconds)
    pub const RETRY_DELAY_MS: u64 = 500;

    /// Retry delay duration
    pub fn delay() -> Duration {
        Duration::from_millis(RETRY_DELAY_MS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Timeout for outbound provider calls (in seconds)
    pub const TIMEOUT_SECS: u64 = 30;

    /// Outbound request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}

/// Media upload configuration
pub mod media {
    /// Maximum accepted upload size (20 MiB, matching the Bot API file cap)
    pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_interval_stays_under_provider_cap() {
        // 30 msg/s means at least ~33 ms between sends
        assert!(dispatch::send_interval() >= Duration::from_millis(34));
    }

    #[test]
    fn test_retry_budget_is_small() {
        assert!(retry::MAX_ATTEMPTS <= 3);
        assert!(retry::delay() < Duration::from_secs(2));
    }
}
