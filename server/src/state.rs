use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ringside_shared::{Pick, RankedEntry};
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::config::{
    page_size, picks_feed_base_url, portfolio_feed_url, upstream_connect_timeout,
    upstream_http_timeout,
};
use crate::store::RankStore;

/// Most recent successfully ranked leaderboard; swapped wholesale by a poll
/// cycle, never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct LiveLeaderboard {
    pub poll_seq: u64,
    pub refreshed_at: Option<String>,
    pub entries: Vec<RankedEntry>,
    pub last_error: Option<String>,
}

impl LiveLeaderboard {
    /// The served ranking predates the latest (failed) poll attempt.
    pub fn stale(&self) -> bool {
        self.last_error.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct CachedPickList {
    pub picks: Vec<Pick>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AppState {
    pub leaderboard: Arc<RwLock<LiveLeaderboard>>,
    /// Exclusive poll gate: whoever holds it owns the in-flight cycle.
    /// Triggers that fail to take it are coalesced away.
    pub poll_gate: Arc<Mutex<()>>,
    /// Set while a visible (user-triggered) cycle is in flight.
    pub refreshing: Arc<AtomicBool>,
    pub pick_cache: Arc<DashMap<String, CachedPickList>>,
    pub http_client: reqwest::Client,
    /// Rank history store. None if the database could not be opened; rank
    /// deltas then degrade to `same`.
    pub store: Option<Arc<dyn RankStore>>,
    pub portfolio_feed_url: String,
    pub picks_feed_base_url: String,
    pub page_size: usize,
    pub observability: Arc<ObservabilityCounters>,
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    polls_total: AtomicU64,
    poll_failures_total: AtomicU64,
    coalesced_refreshes_total: AtomicU64,
    snapshot_write_failures_total: AtomicU64,
    history_degraded_polls_total: AtomicU64,
    leaderboard_requests_total: AtomicU64,
    pick_cache_hits_total: AtomicU64,
    pick_cache_misses_total: AtomicU64,
    pick_feed_errors_total: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct ObservabilitySnapshot {
    pub polls_total: u64,
    pub poll_failures_total: u64,
    pub coalesced_refreshes_total: u64,
    pub snapshot_write_failures_total: u64,
    pub history_degraded_polls_total: u64,
    pub leaderboard_requests_total: u64,
    pub pick_cache_hits_total: u64,
    pub pick_cache_misses_total: u64,
    pub pick_feed_errors_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            polls_total: self.polls_total.load(Ordering::Relaxed),
            poll_failures_total: self.poll_failures_total.load(Ordering::Relaxed),
            coalesced_refreshes_total: self.coalesced_refreshes_total.load(Ordering::Relaxed),
            snapshot_write_failures_total: self
                .snapshot_write_failures_total
                .load(Ordering::Relaxed),
            history_degraded_polls_total: self.history_degraded_polls_total.load(Ordering::Relaxed),
            leaderboard_requests_total: self.leaderboard_requests_total.load(Ordering::Relaxed),
            pick_cache_hits_total: self.pick_cache_hits_total.load(Ordering::Relaxed),
            pick_cache_misses_total: self.pick_cache_misses_total.load(Ordering::Relaxed),
            pick_feed_errors_total: self.pick_feed_errors_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_poll(&self) {
        self.polls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll_failure(&self) {
        self.poll_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced_refresh(&self) {
        self.coalesced_refreshes_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_write_failure(&self) {
        self.snapshot_write_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_history_degraded_poll(&self) {
        self.history_degraded_polls_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_leaderboard_request(&self) {
        self.leaderboard_requests_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pick_cache_hit(&self) {
        self.pick_cache_hits_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pick_cache_miss(&self) {
        self.pick_cache_misses_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pick_feed_error(&self) {
        self.pick_feed_errors_total.fetch_add(1, Ordering::Relaxed);
    }
}

impl AppState {
    pub fn new(store: Option<Arc<dyn RankStore>>) -> Self {
        let request_timeout = upstream_http_timeout();
        let connect_timeout = upstream_connect_timeout();
        let http_client = reqwest::Client::builder()
            .user_agent("ringside/0.1")
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .or_else(|e| {
                warn!(
                    error = %e,
                    "failed to build configured HTTP client, retrying without custom user-agent"
                );
                reqwest::Client::builder()
                    .timeout(request_timeout)
                    .connect_timeout(connect_timeout)
                    .build()
            })
            .unwrap_or_else(|e| {
                panic!("failed to build timeout-configured HTTP client: {e}");
            });
        Self {
            leaderboard: Arc::new(RwLock::new(LiveLeaderboard::default())),
            poll_gate: Arc::new(Mutex::new(())),
            refreshing: Arc::new(AtomicBool::new(false)),
            pick_cache: Arc::new(DashMap::new()),
            http_client,
            store,
            portfolio_feed_url: portfolio_feed_url(),
            picks_feed_base_url: picks_feed_base_url(),
            page_size: page_size(),
            observability: Arc::new(ObservabilityCounters::default()),
        }
    }
}
