use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot-store export form: one `(participant_id, snapshot)` pair per
/// participant, kept as a pair list so no storage backend's key-ordering
/// assumptions leak into the format.
pub type SnapshotPairs = Vec<(String, RankSnapshot)>;

/// One participant's authoritative financial state, as reported by the
/// portfolio feed on every poll.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioRecord {
    pub participant_id: String,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub total_invested: f64,
    #[serde(default)]
    pub total_won: f64,
    #[serde(default)]
    pub total_lost: f64,
    #[serde(default)]
    pub active_picks_value: f64,
    #[serde(default)]
    pub total_picks: u32,
    #[serde(default)]
    pub win_rate: f64,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_since: Option<DateTime<Utc>>,
}

impl PortfolioRecord {
    /// Balance plus the potential payout of unsettled picks. Always derived
    /// locally; any upstream-precomputed value may be stale.
    pub fn portfolio_value(&self) -> f64 {
        self.balance + self.active_picks_value
    }
}

/// Direction a participant's rank moved since the previous poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankChange {
    Up,
    Down,
    Same,
}

/// A portfolio record placed into the current ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub portfolio: PortfolioRecord,
    pub portfolio_value: f64,
    pub rank: u32,
    pub rank_change: RankChange,
    pub highest_rank: u32,
}

/// Persisted rank history for one participant. `last_rank` is the most
/// recent observation; `best_rank` is a running minimum over every poll the
/// participant appeared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankSnapshot {
    pub last_rank: u32,
    pub best_rank: u32,
}

impl RankSnapshot {
    pub const fn first_observation(rank: u32) -> Self {
        RankSnapshot {
            last_rank: rank,
            best_rank: rank,
        }
    }

    /// Fold a new rank observation into the snapshot.
    pub const fn advanced(self, rank: u32) -> Self {
        RankSnapshot {
            last_rank: rank,
            best_rank: if rank < self.best_rank {
                rank
            } else {
                self.best_rank
            },
        }
    }
}

/// One page of the ranked leaderboard, as served to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardPage {
    pub entries: Vec<RankedEntry>,
    pub page: usize,
    pub total_pages: usize,
    pub total_participants: usize,
    pub refreshed_at: Option<String>,
    pub stale: bool,
}

/// Whether a refresh was asked for by the user (loading UI shown) or by the
/// background timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    Visible,
    Silent,
}

impl Default for RefreshMode {
    fn default() -> Self {
        RefreshMode::Visible
    }
}

/// Result of a refresh request: either a cycle ran (with its error, if it
/// failed) or the trigger was dropped because a poll was already in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshOutcome {
    pub started: bool,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{PortfolioRecord, RankChange, RankSnapshot, SnapshotPairs};

    #[test]
    fn portfolio_value_adds_balance_and_active_picks() {
        let record = PortfolioRecord {
            participant_id: "p1".into(),
            balance: 120.5,
            active_picks_value: 30.0,
            ..PortfolioRecord::default()
        };
        assert_eq!(record.portfolio_value(), 150.5);
    }

    #[test]
    fn best_rank_only_ever_improves() {
        let snapshot = RankSnapshot::first_observation(4)
            .advanced(2)
            .advanced(9)
            .advanced(3);
        assert_eq!(snapshot.last_rank, 3);
        assert_eq!(snapshot.best_rank, 2);
    }

    #[test]
    fn snapshot_pairs_serialize_as_pair_list() {
        let pairs: SnapshotPairs = vec![
            ("alpha".into(), RankSnapshot::first_observation(1)),
            (
                "beta".into(),
                RankSnapshot {
                    last_rank: 5,
                    best_rank: 2,
                },
            ),
        ];
        let json = serde_json::to_value(&pairs).expect("pairs should serialize");
        assert_eq!(
            json,
            serde_json::json!([
                ["alpha", { "last_rank": 1, "best_rank": 1 }],
                ["beta", { "last_rank": 5, "best_rank": 2 }],
            ])
        );
    }

    #[test]
    fn rank_change_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(RankChange::Up).expect("serialize"),
            serde_json::json!("up")
        );
        assert_eq!(
            serde_json::to_value(RankChange::Same).expect("serialize"),
            serde_json::json!("same")
        );
    }
}
