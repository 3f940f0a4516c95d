use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::config::pick_cache_ttl_secs;
use crate::state::AppState;

const EVICTION_INTERVAL_SECS: u64 = 300; // 5 minutes

pub async fn run(state: AppState) {
    let mut interval = tokio::time::interval(Duration::from_secs(EVICTION_INTERVAL_SECS));
    let ttl_secs = pick_cache_ttl_secs();

    loop {
        interval.tick().await;

        let evicted = evict_expired(&state, ttl_secs);
        if evicted > 0 {
            info!(
                "evicted {evicted} stale pick cache entries ({} remaining)",
                state.pick_cache.len()
            );
        }
    }
}

fn evict_expired(state: &AppState, ttl_secs: i64) -> usize {
    let before = state.pick_cache.len();
    let now = Utc::now();

    state.pick_cache.retain(|_, cached| {
        now.signed_duration_since(cached.fetched_at).num_seconds() < ttl_secs
    });

    // Request handlers insert into the cache while the sweep runs.
    before.saturating_sub(state.pick_cache.len())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::evict_expired;
    use crate::state::{AppState, CachedPickList};

    #[test]
    fn evicts_only_entries_past_the_ttl() {
        let state = AppState::new(None);
        state.pick_cache.insert(
            "dormant".to_string(),
            CachedPickList {
                picks: Vec::new(),
                fetched_at: Utc::now() - Duration::seconds(600),
            },
        );
        state.pick_cache.insert(
            "active".to_string(),
            CachedPickList {
                picks: Vec::new(),
                fetched_at: Utc::now(),
            },
        );

        assert_eq!(evict_expired(&state, 300), 1);
        assert!(state.pick_cache.contains_key("active"));
        assert!(!state.pick_cache.contains_key("dormant"));
        assert_eq!(evict_expired(&state, 300), 0);
    }
}
