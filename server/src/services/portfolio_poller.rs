use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use ringside_shared::{PortfolioRecord, RefreshMode};
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{poll_backoff_cap, poll_interval};
use crate::error::{LeaderboardError, Result};
use crate::ranking::{observations, rank_portfolios};
use crate::state::AppState;

pub async fn run(state: AppState) {
    let interval = poll_interval();
    let backoff_cap = poll_backoff_cap();
    let mut failure_streak: u32 = 0;

    loop {
        match begin_poll(&state, RefreshMode::Silent) {
            Some(handle) => match handle.await {
                Ok(Ok(_)) => failure_streak = 0,
                Ok(Err(_)) => failure_streak = failure_streak.saturating_add(1),
                Err(e) => {
                    error!(error = %e, "poll task failed to complete");
                    failure_streak = failure_streak.saturating_add(1);
                }
            },
            // A visible refresh owns the gate; keep the current cadence.
            None => {}
        }

        tokio::time::sleep(backoff_delay(interval, failure_streak, backoff_cap)).await;
    }
}

/// Try to take the poll gate and run one cycle on its own task. Returns
/// `None` when a cycle is already in flight: the trigger is coalesced
/// (dropped, counted), never queued. The task owns the gate for the whole
/// cycle, so an initiator that goes away cannot leave partial state behind.
pub fn begin_poll(state: &AppState, mode: RefreshMode) -> Option<JoinHandle<Result<usize>>> {
    let gate = match state.poll_gate.clone().try_lock_owned() {
        Ok(gate) => gate,
        Err(_) => {
            state.observability.record_coalesced_refresh();
            return None;
        }
    };
    Some(tokio::spawn(run_cycle_task(state.clone(), mode, gate)))
}

async fn run_cycle_task(
    state: AppState,
    mode: RefreshMode,
    _gate: OwnedMutexGuard<()>,
) -> Result<usize> {
    if mode == RefreshMode::Visible {
        state.refreshing.store(true, Ordering::Relaxed);
    }
    let fetch = fetch_portfolio_feed(
        state.http_client.clone(),
        state.portfolio_feed_url.clone(),
    );
    let result = poll_cycle_with(&state, fetch).await;
    if mode == RefreshMode::Visible {
        state.refreshing.store(false, Ordering::Relaxed);
    }
    result
}

/// One full cycle against an arbitrary feed source: fetch, rank, persist,
/// publish. A failed cycle records the error on the live leaderboard and
/// leaves its entries untouched.
async fn poll_cycle_with<F>(state: &AppState, fetch: F) -> Result<usize>
where
    F: Future<Output = Result<PortfolioFeed>>,
{
    let outcome = run_ranking_cycle(state, fetch).await;
    match &outcome {
        Ok(_) => state.observability.record_poll(),
        Err(e) => {
            state.observability.record_poll_failure();
            match e {
                LeaderboardError::DuplicateParticipant(_) => {
                    error!(error = %e, "poll cycle rejected; previous ranking retained");
                }
                _ => warn!(error = %e, "poll cycle failed; previous ranking retained"),
            }
            let mut live = state.leaderboard.write().await;
            live.last_error = Some(e.to_string());
        }
    }
    outcome
}

async fn run_ranking_cycle<F>(state: &AppState, fetch: F) -> Result<usize>
where
    F: Future<Output = Result<PortfolioFeed>>,
{
    let feed = fetch.await?;

    if let Some(claimed) = feed.total_participants
        && claimed != feed.entries.len() as u64
    {
        warn!(
            claimed,
            ranked = feed.entries.len(),
            "feed total_participants disagrees with entry count; ranked count wins"
        );
    }

    // Prior snapshots drive rank deltas. A store failure degrades every
    // delta to `same` for this cycle instead of failing the ranking.
    let (prior, history_available) = match state.store.as_deref() {
        Some(store) => match store.list().await {
            Ok(pairs) => (pairs.into_iter().collect::<HashMap<_, _>>(), true),
            Err(e) => {
                state.observability.record_history_degraded_poll();
                warn!(error = %e, "rank store unavailable; deltas degrade to `same` this poll");
                (HashMap::new(), false)
            }
        },
        None => {
            state.observability.record_history_degraded_poll();
            (HashMap::new(), false)
        }
    };

    let entries = rank_portfolios(feed.entries, &prior)?;

    // Snapshot writes must land before the cycle finishes so the next poll
    // never computes deltas against a half-applied batch. A write failure
    // does not un-publish the ranking.
    if history_available && let Some(store) = state.store.as_deref() {
        let snapshot_writes = observations(&entries);
        if let Err(e) = store.put_all(&snapshot_writes, Utc::now()).await {
            state.observability.record_snapshot_write_failure();
            warn!(error = %e, "failed to persist rank snapshots; continuing with live update");
        }
    }

    let count = entries.len();
    let poll_seq = {
        let mut live = state.leaderboard.write().await;
        live.poll_seq += 1;
        live.refreshed_at = Some(Utc::now().to_rfc3339());
        live.entries = entries;
        live.last_error = None;
        live.poll_seq
    };
    info!(participants = count, poll_seq, "published refreshed leaderboard");
    Ok(count)
}

/// Delay before the next scheduled poll: the base interval, doubling per
/// consecutive failure beyond the first, capped.
fn backoff_delay(interval: Duration, failure_streak: u32, cap: Duration) -> Duration {
    if failure_streak == 0 {
        return interval;
    }
    let exponent = failure_streak.saturating_sub(1).min(16);
    interval.saturating_mul(2u32.saturating_pow(exponent)).min(cap)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PortfolioFeed {
    pub entries: Vec<PortfolioRecord>,
    pub total_participants: Option<u64>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPortfolioFeed {
    #[serde(default)]
    entries: Vec<RawPortfolioRecord>,
    #[serde(default)]
    total_participants: Option<u64>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPortfolioRecord {
    participant_id: String,
    #[serde(default)]
    balance: f64,
    #[serde(default)]
    total_invested: f64,
    #[serde(default)]
    total_won: f64,
    #[serde(default)]
    total_lost: f64,
    #[serde(default)]
    active_picks_value: f64,
    #[serde(default)]
    total_picks: u32,
    #[serde(default)]
    win_rate: f64,
    #[serde(default)]
    member_since: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<RawPortfolioRecord> for PortfolioRecord {
    fn from(value: RawPortfolioRecord) -> Self {
        Self {
            participant_id: value.participant_id.trim().to_string(),
            balance: value.balance,
            total_invested: value.total_invested,
            total_won: value.total_won,
            total_lost: value.total_lost,
            active_picks_value: value.active_picks_value,
            total_picks: value.total_picks,
            win_rate: value.win_rate,
            member_since: value.member_since,
        }
    }
}

async fn fetch_portfolio_feed(client: reqwest::Client, url: String) -> Result<PortfolioFeed> {
    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|e| LeaderboardError::Network(format!("request failed: {e}")))?;
    let status = resp.status();
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| LeaderboardError::Network(format!("failed to read response body: {e}")))?;

    if !status.is_success() {
        let preview = String::from_utf8_lossy(&bytes)
            .chars()
            .take(200)
            .collect::<String>();
        return Err(LeaderboardError::Network(format!(
            "upstream status {status}; body preview: {preview}"
        )));
    }

    parse_portfolio_feed(bytes.as_ref()).map_err(|e| {
        let preview = String::from_utf8_lossy(&bytes)
            .chars()
            .take(200)
            .collect::<String>();
        LeaderboardError::Network(format!(
            "failed to decode portfolio feed: {e}; body preview: {preview}"
        ))
    })
}

fn parse_portfolio_feed(bytes: &[u8]) -> std::result::Result<PortfolioFeed, serde_json::Error> {
    let raw: RawPortfolioFeed = serde_json::from_slice(bytes)?;
    Ok(PortfolioFeed {
        entries: raw.entries.into_iter().map(PortfolioRecord::from).collect(),
        total_participants: raw.total_participants,
    })
}
