use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Settlement state of a single prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickStatus {
    Pending,
    Won,
    Lost,
    Refunded,
}

impl PickStatus {
    /// Case-insensitive parse of an upstream status string. Returns `None`
    /// for unrecognized values so the caller decides how to tolerate them.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(PickStatus::Pending),
            "won" => Some(PickStatus::Won),
            "lost" => Some(PickStatus::Lost),
            "refunded" => Some(PickStatus::Refunded),
            _ => None,
        }
    }

    pub const fn is_settled(self) -> bool {
        matches!(self, PickStatus::Won | PickStatus::Lost)
    }
}

/// One prediction a participant staked coins on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub stake: f64,
    pub status: PickStatus,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odds_american: Option<i32>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
