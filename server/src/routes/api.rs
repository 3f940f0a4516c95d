use std::fmt::Write as _;
use std::sync::atomic::Ordering;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tracing::warn;

use ringside_shared::{
    DerivedStats, LeaderboardPage, Pick, PickStatus, RefreshMode, RefreshOutcome, derive_stats,
};

use crate::config::{MAX_PICK_CACHE_ENTRIES, pick_cache_ttl_secs};
use crate::pager::Pager;
use crate::services::portfolio_poller;
use crate::state::{AppState, CachedPickList, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const MAX_PARTICIPANT_ID_LEN: usize = 64;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (participants, poll_seq, stale) = {
        let live = state.leaderboard.read().await;
        (live.entries.len(), live.poll_seq, live.stale())
    };
    let observability = state.observability.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "participants": participants,
        "poll_seq": poll_seq,
        "stale": stale,
        "refreshing": state.refreshing.load(Ordering::Relaxed),
        "pick_cache_size": state.pick_cache.len(),
        "history_available": state.store.is_some(),
        "observability": {
            "polls_total": observability.polls_total,
            "poll_failures_total": observability.poll_failures_total,
            "coalesced_refreshes_total": observability.coalesced_refreshes_total,
            "snapshot_write_failures_total": observability.snapshot_write_failures_total,
            "history_degraded_polls_total": observability.history_degraded_polls_total,
            "leaderboard_requests_total": observability.leaderboard_requests_total,
            "pick_cache_hits_total": observability.pick_cache_hits_total,
            "pick_cache_misses_total": observability.pick_cache_misses_total,
            "pick_feed_errors_total": observability.pick_feed_errors_total,
        }
    }))
}

#[derive(serde::Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default = "default_page")]
    pub page: usize,
}

fn default_page() -> usize {
    1
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
    headers: HeaderMap,
) -> Response {
    state.observability.record_leaderboard_request();

    let pager = Pager::new(state.page_size);
    let live = state.leaderboard.read().await;
    let (slice, page) = pager.page(&live.entries, query.page);

    let etag = leaderboard_etag(live.poll_seq, page, pager.page_size(), live.stale());
    if if_none_match_matches(&headers, &etag) {
        return not_modified_response("public, max-age=5", Some(etag.as_str()));
    }

    let body = LeaderboardPage {
        entries: slice.to_vec(),
        page,
        total_pages: pager.total_pages(live.entries.len()),
        total_participants: live.entries.len(),
        refreshed_at: live.refreshed_at.clone(),
        stale: live.stale(),
    };
    match serde_json::to_vec(&body) {
        Ok(json) => json_bytes_response(json, "public, max-age=5", Some(etag.as_str())),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

#[derive(serde::Serialize)]
pub struct ParticipantStatsResponse {
    pub participant_id: String,
    pub rank: u32,
    pub portfolio_value: f64,
    pub stats: DerivedStats,
}

pub async fn get_participant_stats(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ParticipantStatsResponse>, StatusCode> {
    let id = normalize_participant_id(&raw_id)?.to_owned();

    let ranked = {
        let live = state.leaderboard.read().await;
        live.entries
            .iter()
            .find(|entry| entry.portfolio.participant_id == id)
            .cloned()
    };
    let Some(entry) = ranked else {
        return Err(StatusCode::NOT_FOUND);
    };

    // Pick-level detail is an enrichment; record-only stats are still valid
    // when the pick feed is unavailable.
    let picks = load_pick_list(&state, &id).await;
    let stats = derive_stats(&entry.portfolio, picks.as_deref());

    Ok(Json(ParticipantStatsResponse {
        participant_id: id,
        rank: entry.rank,
        portfolio_value: entry.portfolio_value,
        stats,
    }))
}

#[derive(serde::Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub mode: RefreshMode,
}

pub async fn refresh(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> Json<RefreshOutcome> {
    let Some(handle) = portfolio_poller::begin_poll(&state, query.mode) else {
        return Json(RefreshOutcome {
            started: false,
            error: None,
        });
    };

    let outcome = match handle.await {
        Ok(Ok(_)) => RefreshOutcome {
            started: true,
            error: None,
        },
        Ok(Err(e)) => RefreshOutcome {
            started: true,
            error: Some(e.to_string()),
        },
        Err(e) => RefreshOutcome {
            started: true,
            error: Some(format!("refresh task failed to complete: {e}")),
        },
    };
    Json(outcome)
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let participants = state.leaderboard.read().await.entries.len();
    let pick_cache_size = state.pick_cache.len();
    let history_available = state.store.is_some();
    let refreshing = state.refreshing.load(Ordering::Relaxed);
    let observability = state.observability.snapshot();

    let body = render_prometheus_metrics(
        participants,
        pick_cache_size,
        history_available,
        refreshing,
        observability,
    );

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

fn render_prometheus_metrics(
    participants: usize,
    pick_cache_size: usize,
    history_available: bool,
    refreshing: bool,
    observability: ObservabilitySnapshot,
) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        "# HELP ringside_leaderboard_participants Current number of ranked participants."
    );
    let _ = writeln!(body, "# TYPE ringside_leaderboard_participants gauge");
    let _ = writeln!(body, "ringside_leaderboard_participants {participants}");

    let _ = writeln!(
        body,
        "# HELP ringside_pick_cache_size Current number of pick lists in cache."
    );
    let _ = writeln!(body, "# TYPE ringside_pick_cache_size gauge");
    let _ = writeln!(body, "ringside_pick_cache_size {pick_cache_size}");

    let _ = writeln!(
        body,
        "# HELP ringside_history_available Whether rank history storage is available (1 or 0)."
    );
    let _ = writeln!(body, "# TYPE ringside_history_available gauge");
    let _ = writeln!(
        body,
        "ringside_history_available {}",
        u8::from(history_available)
    );

    let _ = writeln!(
        body,
        "# HELP ringside_refresh_in_flight Whether a visible refresh is currently running (1 or 0)."
    );
    let _ = writeln!(body, "# TYPE ringside_refresh_in_flight gauge");
    let _ = writeln!(body, "ringside_refresh_in_flight {}", u8::from(refreshing));

    let _ = writeln!(
        body,
        "# HELP ringside_polls_total Total successful poll cycles."
    );
    let _ = writeln!(body, "# TYPE ringside_polls_total counter");
    let _ = writeln!(body, "ringside_polls_total {}", observability.polls_total);

    let _ = writeln!(
        body,
        "# HELP ringside_poll_failures_total Total failed poll cycles."
    );
    let _ = writeln!(body, "# TYPE ringside_poll_failures_total counter");
    let _ = writeln!(
        body,
        "ringside_poll_failures_total {}",
        observability.poll_failures_total
    );

    let _ = writeln!(
        body,
        "# HELP ringside_coalesced_refreshes_total Total refresh triggers dropped while a poll was in flight."
    );
    let _ = writeln!(body, "# TYPE ringside_coalesced_refreshes_total counter");
    let _ = writeln!(
        body,
        "ringside_coalesced_refreshes_total {}",
        observability.coalesced_refreshes_total
    );

    let _ = writeln!(
        body,
        "# HELP ringside_snapshot_write_failures_total Total failures while persisting rank snapshots."
    );
    let _ = writeln!(body, "# TYPE ringside_snapshot_write_failures_total counter");
    let _ = writeln!(
        body,
        "ringside_snapshot_write_failures_total {}",
        observability.snapshot_write_failures_total
    );

    let _ = writeln!(
        body,
        "# HELP ringside_history_degraded_polls_total Total poll cycles ranked without prior snapshots."
    );
    let _ = writeln!(body, "# TYPE ringside_history_degraded_polls_total counter");
    let _ = writeln!(
        body,
        "ringside_history_degraded_polls_total {}",
        observability.history_degraded_polls_total
    );

    let _ = writeln!(
        body,
        "# HELP ringside_leaderboard_requests_total Total leaderboard API requests."
    );
    let _ = writeln!(body, "# TYPE ringside_leaderboard_requests_total counter");
    let _ = writeln!(
        body,
        "ringside_leaderboard_requests_total {}",
        observability.leaderboard_requests_total
    );

    let _ = writeln!(
        body,
        "# HELP ringside_pick_cache_hits_total Total pick lists served from cache."
    );
    let _ = writeln!(body, "# TYPE ringside_pick_cache_hits_total counter");
    let _ = writeln!(
        body,
        "ringside_pick_cache_hits_total {}",
        observability.pick_cache_hits_total
    );

    let _ = writeln!(
        body,
        "# HELP ringside_pick_cache_misses_total Total pick lists fetched upstream."
    );
    let _ = writeln!(body, "# TYPE ringside_pick_cache_misses_total counter");
    let _ = writeln!(
        body,
        "ringside_pick_cache_misses_total {}",
        observability.pick_cache_misses_total
    );

    let _ = writeln!(
        body,
        "# HELP ringside_pick_feed_errors_total Total upstream failures while fetching pick lists."
    );
    let _ = writeln!(body, "# TYPE ringside_pick_feed_errors_total counter");
    let _ = writeln!(
        body,
        "ringside_pick_feed_errors_total {}",
        observability.pick_feed_errors_total
    );

    body
}

async fn load_pick_list(state: &AppState, participant_id: &str) -> Option<Vec<Pick>> {
    if let Some(cached) = state.pick_cache.get(participant_id) {
        let age = Utc::now()
            .signed_duration_since(cached.fetched_at)
            .num_seconds();
        if age < pick_cache_ttl_secs() {
            state.observability.record_pick_cache_hit();
            return Some(cached.picks.clone());
        }
    }
    state.observability.record_pick_cache_miss();

    let Some(url) = pick_list_url(&state.picks_feed_base_url, participant_id) else {
        state.observability.record_pick_feed_error();
        warn!(
            participant_id,
            "could not build pick feed URL; serving record-only stats"
        );
        return None;
    };

    let resp = match state.http_client.get(url).send().await {
        Ok(resp) if resp.status().is_success() => resp,
        Ok(resp) => {
            state.observability.record_pick_feed_error();
            warn!(
                participant_id,
                status = %resp.status(),
                "pick feed returned an error status; serving record-only stats"
            );
            return None;
        }
        Err(e) => {
            state.observability.record_pick_feed_error();
            warn!(
                participant_id,
                error = %e,
                "pick feed unreachable; serving record-only stats"
            );
            return None;
        }
    };

    let bytes = match resp.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            state.observability.record_pick_feed_error();
            warn!(
                participant_id,
                error = %e,
                "failed to read pick feed body; serving record-only stats"
            );
            return None;
        }
    };

    let (picks, unknown_statuses) = match parse_pick_list(bytes.as_ref()) {
        Ok(parsed) => parsed,
        Err(e) => {
            state.observability.record_pick_feed_error();
            warn!(
                participant_id,
                error = %e,
                "failed to decode pick feed; serving record-only stats"
            );
            return None;
        }
    };
    if unknown_statuses > 0 {
        warn!(
            participant_id,
            unknown_statuses, "unrecognized pick statuses treated as pending"
        );
    }

    cache_pick_payload(state, participant_id.to_owned(), picks.clone());
    Some(picks)
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPick {
    #[serde(default)]
    stake: f64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    odds_american: Option<i32>,
    #[serde(default)]
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Parse a pick feed payload, a bare JSON array of pick records.
/// Unrecognized statuses are counted and treated as pending rather than
/// failing the whole list.
fn parse_pick_list(bytes: &[u8]) -> Result<(Vec<Pick>, usize), serde_json::Error> {
    let raw: Vec<RawPick> = serde_json::from_slice(bytes)?;
    let mut unknown = 0_usize;
    let picks = raw
        .into_iter()
        .map(|pick| {
            let status = PickStatus::parse(&pick.status).unwrap_or_else(|| {
                unknown += 1;
                PickStatus::Pending
            });
            Pick {
                stake: pick.stake,
                status,
                odds_american: pick.odds_american,
                created_at: pick.created_at,
            }
        })
        .collect();
    Ok((picks, unknown))
}

fn normalize_participant_id(id: &str) -> Result<&str, StatusCode> {
    let trimmed = id.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_PARTICIPANT_ID_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    if trimmed
        .chars()
        .any(|ch| ch.is_control() || matches!(ch, '/' | '\\' | '?' | '#'))
    {
        return Err(StatusCode::BAD_REQUEST);
    }

    Ok(trimmed)
}

fn pick_list_url(base: &str, participant_id: &str) -> Option<reqwest::Url> {
    let mut url = reqwest::Url::parse(base).ok()?;
    url.path_segments_mut()
        .ok()?
        .push(participant_id)
        .push("picks");
    Some(url)
}

fn cache_pick_payload(state: &AppState, participant_id: String, picks: Vec<Pick>) {
    if !state.pick_cache.contains_key(&participant_id) {
        while state.pick_cache.len() >= MAX_PICK_CACHE_ENTRIES {
            if !evict_oldest_pick_entry(state) {
                break;
            }
        }
    }

    state.pick_cache.insert(
        participant_id,
        CachedPickList {
            picks,
            fetched_at: Utc::now(),
        },
    );
}

fn evict_oldest_pick_entry(state: &AppState) -> bool {
    let Some(oldest_id) = state
        .pick_cache
        .iter()
        .min_by_key(|entry| entry.value().fetched_at)
        .map(|entry| entry.key().clone())
    else {
        return false;
    };
    state.pick_cache.remove(&oldest_id).is_some()
}

fn leaderboard_etag(poll_seq: u64, page: usize, page_size: usize, stale: bool) -> String {
    let suffix = if stale { "-stale" } else { "" };
    format!("\"leaderboard-{poll_seq}-p{page}-s{page_size}{suffix}\"")
}

fn json_bytes_response(body: Vec<u8>, cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn not_modified_response(cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn normalize_etag(candidate: &str) -> &str {
    candidate.strip_prefix("W/").unwrap_or(candidate).trim()
}

fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Ok(raw) = value.to_str() else {
        return false;
    };

    raw.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || normalize_etag(candidate) == normalize_etag(etag)
    })
}
