use std::collections::{HashMap, HashSet};

use ringside_shared::{PortfolioRecord, RankChange, RankSnapshot, RankedEntry, SnapshotPairs};

use crate::error::{LeaderboardError, Result};

/// Build the ranked leaderboard for one poll from the feed's portfolio
/// records and the previously persisted snapshot map.
///
/// Ordering is total: descending portfolio value, then ascending participant
/// id, so equal-valued entries cannot swap places between polls. Ranks are
/// 1-based with no gaps. A participant absent from `prior` is a first
/// observation: delta `same`, best rank equal to the current rank.
pub fn rank_portfolios(
    records: Vec<PortfolioRecord>,
    prior: &HashMap<String, RankSnapshot>,
) -> Result<Vec<RankedEntry>> {
    ensure_unique_ids(&records)?;

    let mut valued: Vec<(f64, PortfolioRecord)> = records
        .into_iter()
        .map(|record| (record.portfolio_value(), record))
        .collect();
    valued.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| a.1.participant_id.cmp(&b.1.participant_id))
    });

    Ok(valued
        .into_iter()
        .enumerate()
        .map(|(idx, (portfolio_value, portfolio))| {
            let rank = u32::try_from(idx + 1).unwrap_or(u32::MAX);
            let (rank_change, highest_rank) =
                delta_against(prior.get(&portfolio.participant_id).copied(), rank);
            RankedEntry {
                portfolio,
                portfolio_value,
                rank,
                rank_change,
                highest_rank,
            }
        })
        .collect())
}

/// The snapshot writes a freshly ranked leaderboard implies.
pub fn observations(entries: &[RankedEntry]) -> SnapshotPairs {
    entries
        .iter()
        .map(|entry| {
            (
                entry.portfolio.participant_id.clone(),
                RankSnapshot {
                    last_rank: entry.rank,
                    best_rank: entry.highest_rank,
                },
            )
        })
        .collect()
}

fn ensure_unique_ids(records: &[PortfolioRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.participant_id.as_str()) {
            return Err(LeaderboardError::DuplicateParticipant(
                record.participant_id.clone(),
            ));
        }
    }
    Ok(())
}

fn delta_against(prior: Option<RankSnapshot>, rank: u32) -> (RankChange, u32) {
    match prior {
        None => (RankChange::Same, rank),
        Some(snapshot) => {
            let change = if rank < snapshot.last_rank {
                RankChange::Up
            } else if rank > snapshot.last_rank {
                RankChange::Down
            } else {
                RankChange::Same
            };
            (change, snapshot.best_rank.min(rank))
        }
    }
}
