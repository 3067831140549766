use crate::scheduler::FairnessHistory;
use crate::state::SegmentId;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FairnessEntry {
    pub green_cycles: i32,
    pub percentage: f64,
}

/// Share of green credits per segment, rounded half to even at one decimal.
pub fn fairness_report(history: &FairnessHistory) -> BTreeMap<SegmentId, FairnessEntry> {
    let total: i64 = history.values().map(|&credit| i64::from(credit)).sum();
    let divisor = if total == 0 { 1.0 } else { total as f64 };

    history
        .iter()
        .map(|(&id, &credit)| {
            let percentage = 100.0 * f64::from(credit) / divisor;
            (
                id,
                FairnessEntry {
                    green_cycles: credit,
                    percentage: round_one_decimal(percentage),
                },
            )
        })
        .collect()
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_splits_credits_by_share() {
        let history = FairnessHistory::from([(1, 4), (2, 6)]);

        let report = fairness_report(&history);

        assert_eq!(
            report,
            BTreeMap::from([
                (
                    1,
                    FairnessEntry {
                        green_cycles: 4,
                        percentage: 40.0
                    }
                ),
                (
                    2,
                    FairnessEntry {
                        green_cycles: 6,
                        percentage: 60.0
                    }
                ),
            ])
        );
    }

    #[test]
    fn report_rounds_to_one_decimal() {
        let history = FairnessHistory::from([(1, 1), (2, 1), (3, 1)]);

        let report = fairness_report(&history);

        assert_eq!(report[&1].percentage, 33.3);
        assert_eq!(report[&3].green_cycles, 1);
    }

    #[test]
    fn exact_halves_round_to_even() {
        let history = FairnessHistory::from([(1, 1), (2, 15)]);

        let report = fairness_report(&history);

        assert_eq!(report[&1].percentage, 6.2);
        assert_eq!(report[&2].percentage, 93.8);
    }

    #[test]
    fn zero_credits_report_zero_percent() {
        let history = FairnessHistory::from([(1, 0), (4, 0)]);

        let report = fairness_report(&history);

        assert_eq!(report.len(), 2);
        assert!(report.values().all(|entry| entry.percentage == 0.0));
    }

    #[test]
    fn empty_history_gives_empty_report() {
        assert!(fairness_report(&FairnessHistory::new()).is_empty());
    }
}
