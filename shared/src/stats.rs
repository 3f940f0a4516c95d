use serde::{Deserialize, Serialize};

use crate::picks::{Pick, PickStatus};
use crate::portfolio::PortfolioRecord;

/// Performance numbers shown on a participant's dashboard card.
///
/// `win_rate` is absent rather than 0 when neither the authoritative record
/// nor the pick list can answer it: a participant with no settled picks has
/// no win rate, which is not the same thing as a 0% one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedStats {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_rate: Option<f64>,
    pub roi: f64,
    pub profit_loss: f64,
    pub average_stake: f64,
}

/// Reconcile a participant's display stats from the authoritative record and
/// an optional pick list. Authoritative fields win when populated; a zero is
/// treated as unpopulated and triggers the pick-level fallback. Refunded
/// picks are voided stakes and count toward nothing. Never fails: every
/// indeterminate ratio resolves to its documented default.
pub fn derive_stats(record: &PortfolioRecord, picks: Option<&[Pick]>) -> DerivedStats {
    let win_rate = if record.win_rate > 0.0 {
        Some(record.win_rate)
    } else {
        picks.and_then(win_rate_from_picks)
    };

    let profit_loss = record.total_won - effective_total_lost(record, picks);

    let roi = if record.total_invested > 0.0 {
        profit_loss / record.total_invested * 100.0
    } else {
        0.0
    };

    let average_stake = picks.map(average_stake_from_picks).unwrap_or(0.0);

    DerivedStats {
        win_rate,
        roi,
        profit_loss,
        average_stake,
    }
}

/// Win percentage over settled (won or lost) picks, or `None` when nothing
/// has settled yet.
fn win_rate_from_picks(picks: &[Pick]) -> Option<f64> {
    let won = picks
        .iter()
        .filter(|pick| pick.status == PickStatus::Won)
        .count();
    let settled = picks.iter().filter(|pick| pick.status.is_settled()).count();
    if settled == 0 {
        return None;
    }
    Some(won as f64 / settled as f64 * 100.0)
}

/// Authoritative `total_lost` when populated, otherwise the summed stakes of
/// lost picks. Upstream reports 0 both for "nothing lost yet" and "not
/// computed yet"; the two are deliberately not distinguished.
fn effective_total_lost(record: &PortfolioRecord, picks: Option<&[Pick]>) -> f64 {
    if record.total_lost > 0.0 {
        return record.total_lost;
    }
    picks
        .map(|picks| {
            picks
                .iter()
                .filter(|pick| pick.status == PickStatus::Lost)
                .map(|pick| pick.stake)
                .sum()
        })
        .unwrap_or(0.0)
}

/// Mean stake over non-refunded picks, or 0 when there are none.
fn average_stake_from_picks(picks: &[Pick]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0u32;
    for pick in picks {
        if pick.status == PickStatus::Refunded {
            continue;
        }
        sum += pick.stake;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    sum / f64::from(count)
}

#[cfg(test)]
mod tests {
    use super::derive_stats;
    use crate::picks::{Pick, PickStatus};
    use crate::portfolio::PortfolioRecord;

    fn record(total_invested: f64, total_won: f64, total_lost: f64) -> PortfolioRecord {
        PortfolioRecord {
            participant_id: "p1".into(),
            balance: 500.0,
            total_invested,
            total_won,
            total_lost,
            ..PortfolioRecord::default()
        }
    }

    fn pick(stake: f64, status: PickStatus) -> Pick {
        Pick {
            stake,
            status,
            odds_american: None,
            created_at: None,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff < 1e-9,
            "expected {expected}, got {actual} (diff: {diff})"
        );
    }

    #[test]
    fn authoritative_win_rate_wins_when_populated() {
        let mut record = record(100.0, 0.0, 0.0);
        record.win_rate = 62.5;
        let picks = [pick(10.0, PickStatus::Lost), pick(10.0, PickStatus::Lost)];
        let stats = derive_stats(&record, Some(&picks));
        assert_eq!(stats.win_rate, Some(62.5));
    }

    #[test]
    fn win_rate_falls_back_to_settled_pick_ratio() {
        let record = record(100.0, 0.0, 0.0);
        let picks = [
            pick(10.0, PickStatus::Won),
            pick(10.0, PickStatus::Won),
            pick(10.0, PickStatus::Lost),
            pick(10.0, PickStatus::Pending),
        ];
        let stats = derive_stats(&record, Some(&picks));
        assert_close(stats.win_rate.expect("two settled picks"), 200.0 / 3.0);
    }

    #[test]
    fn win_rate_absent_without_settled_picks() {
        let record = record(100.0, 0.0, 0.0);
        let picks = [
            pick(10.0, PickStatus::Pending),
            pick(25.0, PickStatus::Refunded),
        ];
        assert_eq!(derive_stats(&record, Some(&picks)).win_rate, None);
        assert_eq!(derive_stats(&record, None).win_rate, None);
    }

    #[test]
    fn all_lost_yields_zero_win_rate_not_absent() {
        let record = record(100.0, 0.0, 0.0);
        let picks = [pick(10.0, PickStatus::Lost), pick(15.0, PickStatus::Lost)];
        assert_eq!(derive_stats(&record, Some(&picks)).win_rate, Some(0.0));
    }

    #[test]
    fn profit_loss_uses_lost_stake_fallback_when_total_lost_unpopulated() {
        let record = record(200.0, 100.0, 0.0);
        let picks = [pick(50.0, PickStatus::Lost), pick(20.0, PickStatus::Pending)];
        let stats = derive_stats(&record, Some(&picks));
        assert_close(stats.profit_loss, 50.0);
    }

    #[test]
    fn profit_loss_keeps_populated_total_lost() {
        let record = record(200.0, 100.0, 80.0);
        let picks = [pick(50.0, PickStatus::Lost)];
        let stats = derive_stats(&record, Some(&picks));
        assert_close(stats.profit_loss, 20.0);
    }

    #[test]
    fn adding_a_refunded_pick_changes_no_stat() {
        let record = record(200.0, 100.0, 0.0);
        let picks = [
            pick(50.0, PickStatus::Lost),
            pick(30.0, PickStatus::Won),
            pick(10.0, PickStatus::Pending),
        ];
        let mut with_refund = picks.to_vec();
        with_refund.push(pick(9_999.0, PickStatus::Refunded));

        let base = derive_stats(&record, Some(&picks));
        let refunded = derive_stats(&record, Some(&with_refund));
        assert_eq!(base.win_rate, refunded.win_rate);
        assert_close(refunded.profit_loss, base.profit_loss);
        assert_close(refunded.roi, base.roi);
        assert_close(refunded.average_stake, base.average_stake);
    }

    #[test]
    fn roi_zero_without_investment() {
        let record = record(0.0, 100.0, 40.0);
        let stats = derive_stats(&record, None);
        assert_close(stats.roi, 0.0);
        assert_close(stats.profit_loss, 60.0);
    }

    #[test]
    fn roi_reflects_fallback_profit_loss() {
        let record = record(200.0, 100.0, 0.0);
        let picks = [pick(50.0, PickStatus::Lost)];
        let stats = derive_stats(&record, Some(&picks));
        assert_close(stats.roi, 25.0);
    }

    #[test]
    fn average_stake_ignores_refunded_picks() {
        let record = record(100.0, 0.0, 0.0);
        let picks = [
            pick(10.0, PickStatus::Won),
            pick(30.0, PickStatus::Pending),
            pick(500.0, PickStatus::Refunded),
        ];
        let stats = derive_stats(&record, Some(&picks));
        assert_close(stats.average_stake, 20.0);
    }

    #[test]
    fn average_stake_zero_without_picks() {
        let record = record(100.0, 0.0, 0.0);
        assert_close(derive_stats(&record, None).average_stake, 0.0);
        assert_close(derive_stats(&record, Some(&[])).average_stake, 0.0);
    }

    #[test]
    fn serialized_stats_omit_absent_win_rate() {
        let record = record(100.0, 0.0, 0.0);
        let stats = derive_stats(&record, None);
        let json = serde_json::to_value(&stats).expect("stats should serialize");
        let object = json.as_object().expect("stats serialize to an object");
        assert!(!object.contains_key("win_rate"));
        assert!(object.contains_key("roi"));
    }
}
