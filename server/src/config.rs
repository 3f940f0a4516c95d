use std::time::Duration;

pub const PORTFOLIO_FEED_URL: &str = "https://api.ringside.gg/v1/leaderboard/portfolios";
pub const PICKS_FEED_BASE_URL: &str = "https://api.ringside.gg/v1/participants";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_POLL_BACKOFF_CAP_SECS: u64 = 480; // 8 minutes
pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const DEFAULT_PICK_CACHE_TTL_SECS: i64 = 300; // 5 minutes
pub const MAX_PICK_CACHE_ENTRIES: usize = 256;
pub const DEFAULT_DB_PATH: &str = "ringside.db";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 3;
pub const SERVER_PORT: u16 = 3000;

// Snapshot retention
pub const DEFAULT_RETENTION_DAYS: i64 = 90;
pub const RETENTION_CHECK_SECS: u64 = 86400; // daily

pub fn portfolio_feed_url() -> String {
    std::env::var("PORTFOLIO_FEED_URL")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| PORTFOLIO_FEED_URL.to_string())
}

pub fn picks_feed_base_url() -> String {
    std::env::var("PICKS_FEED_BASE_URL")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| PICKS_FEED_BASE_URL.to_string())
}

pub fn poll_interval() -> Duration {
    std::env::var("POLL_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS))
}

pub fn poll_backoff_cap() -> Duration {
    std::env::var("POLL_BACKOFF_CAP_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_POLL_BACKOFF_CAP_SECS))
}

pub fn page_size() -> usize {
    std::env::var("LEADERBOARD_PAGE_SIZE")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

pub fn pick_cache_ttl_secs() -> i64 {
    std::env::var("PICK_CACHE_TTL_SECS")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_PICK_CACHE_TTL_SECS)
}

pub fn db_path() -> String {
    std::env::var("RANKS_DB_PATH")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
}

pub fn db_max_connections() -> u32 {
    std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
}

pub fn upstream_http_timeout() -> Duration {
    std::env::var("UPSTREAM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS))
}

pub fn upstream_connect_timeout() -> Duration {
    std::env::var("UPSTREAM_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS))
}

pub fn retention_days() -> i64 {
    std::env::var("RETENTION_DAYS")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_RETENTION_DAYS)
}
