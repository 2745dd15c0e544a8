//! Portfolio-level figures derived from snapshots and their diffs.

use crate::diff::{ChangeStatus, Comparison, DiffEntry, SnapshotDiff, round2};
use crate::error::{Form13fError, Result};
use crate::holdings::{Cik, FilingDate, HoldingRecord};
use crate::options::SummaryOptions;
use crate::parsing::utils::normalize_whitespace;
use crate::snapshot::Snapshot;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

/// Number of positions per movement category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionCounts {
    pub total: usize,
    pub new: usize,
    pub closed: usize,
    pub changed: usize,
    pub unchanged: usize,
    /// Positions whose share count went up, new positions included.
    pub increased: usize,
    /// Positions whose share count went down, closed positions included.
    pub decreased: usize,
}

/// Aggregate view of one snapshot and its diff against the snapshot before it.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    pub fund: Cik,
    pub filing_date: FilingDate,
    pub previous_date: FilingDate,
    /// Thousands of dollars.
    pub total_value: u64,
    pub counts: PositionCounts,
    pub top_holdings: Vec<HoldingRecord>,
    /// Share of total value held in the largest positions, in percent.
    pub concentration_pct: f64,
    pub biggest_increases: Vec<DiffEntry>,
    pub biggest_decreases: Vec<DiffEntry>,
}

/// Summarizes `current` with the default options.
pub fn summarize(current: &Snapshot, diff: &SnapshotDiff) -> PortfolioSummary {
    summarize_with(current, diff, &SummaryOptions::default())
}

pub fn summarize_with(
    current: &Snapshot,
    diff: &SnapshotDiff,
    options: &SummaryOptions,
) -> PortfolioSummary {
    let counts = PositionCounts {
        total: current.len(),
        new: diff.count(ChangeStatus::New),
        closed: diff.count(ChangeStatus::Closed),
        changed: diff.count(ChangeStatus::Changed),
        unchanged: diff.count(ChangeStatus::Unchanged),
        increased: diff.entries().iter().filter(|e| e.shares_change > 0).count(),
        decreased: diff.entries().iter().filter(|e| e.shares_change < 0).count(),
    };

    let ranked = ranked_by_value(current);

    let mut increases: Vec<&DiffEntry> = diff.entries().iter().collect();
    increases.sort_by_key(|e| Reverse(e.value_change));
    let mut decreases: Vec<&DiffEntry> = diff.entries().iter().collect();
    decreases.sort_by_key(|e| e.value_change);

    PortfolioSummary {
        fund: current.fund(),
        filing_date: current.filing_date(),
        previous_date: diff.previous_date(),
        total_value: current.total_value(),
        counts,
        top_holdings: ranked.iter().take(options.top_n).map(|h| (*h).clone()).collect(),
        concentration_pct: concentration(current, options.concentration_top),
        biggest_increases: increases.into_iter().take(options.movers).cloned().collect(),
        biggest_decreases: decreases.into_iter().take(options.movers).cloned().collect(),
    }
}

/// Holdings by value descending; equal values keep reported order.
fn ranked_by_value(snapshot: &Snapshot) -> Vec<&HoldingRecord> {
    let mut ranked: Vec<&HoldingRecord> = snapshot.holdings().collect();
    ranked.sort_by_key(|h| Reverse(h.value_thousands));
    ranked
}

/// Percentage of total value held in the `top` largest positions.
///
/// Zero for an empty or zero-valued snapshot.
pub fn concentration(snapshot: &Snapshot, top: usize) -> f64 {
    let total = snapshot.total_value();
    if total == 0 {
        return 0.0;
    }
    let top_value = ranked_by_value(snapshot)
        .iter()
        .take(top)
        .fold(0u64, |sum, h| sum.saturating_add(h.value_thousands));
    top_value as f64 / total as f64 * 100.0
}

/// Turnover between one snapshot and the next.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnoverPoint {
    /// Filing date of the later snapshot.
    pub filing_date: FilingDate,
    pub accession_number: String,
    /// Σ |value change| / total value of the earlier snapshot, in percent.
    pub turnover_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnoverSeries {
    pub fund: Cik,
    pub points: Vec<TurnoverPoint>,
}

impl TurnoverSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Mean turnover across all transitions.
    pub fn average(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points.iter().map(|p| p.turnover_pct).sum::<f64>() / self.points.len() as f64
    }
}

/// Turnover for every consecutive pair of a chronological history.
///
/// # Errors
///
/// Returns `Form13fError::HistoryOutOfOrder` if a snapshot is older than the
/// one before it. The history is never re-sorted here.
pub fn turnover(history: &[Snapshot]) -> Result<Comparison<TurnoverSeries>> {
    ensure_chronological(history)?;

    if history.len() < 2 {
        return Ok(Comparison::InsufficientHistory);
    }

    let points = history
        .windows(2)
        .map(|pair| {
            let (earlier, later) = (&pair[0], &pair[1]);
            let diff = SnapshotDiff::between(earlier, later);
            let base = earlier.total_value();
            let turnover_pct = if base == 0 {
                0.0
            } else {
                diff.absolute_value_change() as f64 / base as f64 * 100.0
            };
            TurnoverPoint {
                filing_date: later.filing_date(),
                accession_number: later.accession_number().to_string(),
                turnover_pct,
            }
        })
        .collect();

    Ok(Comparison::Ready(TurnoverSeries {
        fund: history[0].fund(),
        points,
    }))
}

fn ensure_chronological(history: &[Snapshot]) -> Result<()> {
    match history
        .windows(2)
        .position(|pair| pair[1].chronological_cmp(&pair[0]).is_lt())
    {
        Some(index) => Err(Form13fError::HistoryOutOfOrder { position: index + 1 }),
        None => Ok(()),
    }
}

/// Total portfolio value per filing, in history order.
pub fn value_series(history: &[Snapshot]) -> Vec<(FilingDate, u64)> {
    history
        .iter()
        .map(|s| (s.filing_date(), s.total_value()))
        .collect()
}

/// Share of total value per issuer name.
#[derive(Debug, Clone, PartialEq)]
pub struct Weight {
    pub issuer_name: String,
    /// Thousands of dollars.
    pub value: u64,
    /// Percent of the snapshot total, two decimals.
    pub pct: f64,
}

/// Holdings grouped by issuer name, largest first, at most `limit` entries.
///
/// Several share classes of one issuer are reported as one weight.
pub fn weights(snapshot: &Snapshot, limit: usize) -> Vec<Weight> {
    let total = snapshot.total_value();
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, u64> = HashMap::new();

    for holding in snapshot.holdings() {
        let name = normalize_whitespace(&holding.issuer_name);
        match grouped.get_mut(&name) {
            Some(value) => *value = value.saturating_add(holding.value_thousands),
            None => {
                grouped.insert(name.clone(), holding.value_thousands);
                order.push(name);
            }
        }
    }

    let mut weights: Vec<Weight> = order
        .into_iter()
        .map(|name| {
            let value = grouped.get(&name).copied().unwrap_or(0);
            let pct = if total == 0 {
                0.0
            } else {
                round2(value as f64 / total as f64 * 100.0)
            };
            Weight {
                issuer_name: name,
                value,
                pct,
            }
        })
        .collect();

    weights.sort_by_key(|w| Reverse(w.value));
    weights.truncate(limit);
    weights
}

/// Headline figures for a fund's whole history.
#[derive(Debug, Clone, PartialEq)]
pub struct FundOverview {
    pub fund: Cik,
    pub first_date: FilingDate,
    pub last_date: FilingDate,
    pub filings: usize,
    /// Distinct issuer names across every snapshot.
    pub unique_issuers: usize,
    /// Value of the latest snapshot, in dollars.
    pub latest_value_usd: u64,
    /// `latest_value_usd / unique_issuers`, zero when there are no issuers.
    pub average_position_usd: f64,
    /// Top-10 concentration of the latest snapshot.
    pub concentration_pct: f64,
}

/// Overview of a chronological history; `None` when it is empty.
pub fn overview(history: &[Snapshot]) -> Option<FundOverview> {
    let first = history.first()?;
    let last = history.last()?;

    let unique_issuers = history
        .iter()
        .flat_map(|s| s.holdings())
        .map(|h| normalize_whitespace(&h.issuer_name).to_uppercase())
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>()
        .len();

    let latest_value_usd = last.total_value().saturating_mul(1000);
    let average_position_usd = if unique_issuers == 0 {
        0.0
    } else {
        latest_value_usd as f64 / unique_issuers as f64
    };

    Some(FundOverview {
        fund: last.fund(),
        first_date: first.filing_date(),
        last_date: last.filing_date(),
        filings: history.len(),
        unique_issuers,
        latest_value_usd,
        average_position_usd,
        concentration_pct: concentration(last, SummaryOptions::default().concentration_top),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(accession: &str, date: &str, records: Vec<HoldingRecord>) -> Snapshot {
        Snapshot::new(
            Cik::new(42),
            FilingDate::parse_exact(date).unwrap(),
            accession,
            records,
        )
    }

    fn holdings(values: &[u64]) -> Vec<HoldingRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| HoldingRecord::new(format!("ISSUER {i}"), format!("{i:09}"), *v, *v))
            .collect()
    }

    #[test]
    fn summary_counts_and_rankings() {
        let previous = snapshot(
            "1",
            "2024-02-14",
            vec![
                HoldingRecord::new("A", "A1", 100, 10),
                HoldingRecord::new("B", "B1", 80, 8),
            ],
        );
        let current = snapshot(
            "2",
            "2024-05-15",
            vec![
                HoldingRecord::new("A", "A1", 150, 12),
                HoldingRecord::new("C", "C1", 150, 1),
            ],
        );
        let diff = SnapshotDiff::between(&previous, &current);
        let summary = summarize(&current, &diff);

        assert_eq!(summary.total_value, 300);
        assert_eq!(summary.counts.new, 1);
        assert_eq!(summary.counts.closed, 1);
        assert_eq!(summary.counts.changed, 1);
        assert_eq!(summary.counts.increased, 2);
        assert_eq!(summary.counts.decreased, 1);

        // ties keep reported order
        assert_eq!(summary.top_holdings[0].issuer_name, "A");
        assert_eq!(summary.top_holdings[1].issuer_name, "C");

        assert_eq!(summary.biggest_increases[0].issuer_name, "C");
        assert_eq!(summary.biggest_decreases[0].issuer_name, "B");
        assert_eq!(summary.concentration_pct, 100.0);
    }

    #[test]
    fn concentration_uses_top_ten_only() {
        let current = snapshot("1", "2024-02-14", holdings(&[10; 20]));
        assert!((concentration(&current, 10) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn concentration_zero_for_empty_portfolio() {
        let empty = snapshot("1", "2024-02-14", vec![]);
        assert_eq!(concentration(&empty, 10), 0.0);

        let zero_valued = snapshot("1", "2024-02-14", holdings(&[0, 0]));
        assert_eq!(concentration(&zero_valued, 10), 0.0);
    }

    #[test]
    fn turnover_series() {
        let history = vec![
            snapshot("1", "2023-11-14", vec![HoldingRecord::new("A", "A1", 100, 1)]),
            snapshot(
                "2",
                "2024-02-14",
                vec![
                    HoldingRecord::new("A", "A1", 150, 1),
                    HoldingRecord::new("B", "B1", 50, 1),
                ],
            ),
            snapshot("3", "2024-05-15", vec![HoldingRecord::new("B", "B1", 50, 1)]),
        ];

        let series = turnover(&history).unwrap().ready().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.points[0].turnover_pct, 100.0);
        assert_eq!(series.points[0].filing_date, history[1].filing_date());
        assert_eq!(series.points[1].turnover_pct, 75.0);
        assert!((series.average() - 87.5).abs() < 1e-9);
    }

    #[test]
    fn turnover_zero_base_is_zero() {
        let history = vec![
            snapshot("1", "2023-11-14", vec![]),
            snapshot("2", "2024-02-14", vec![HoldingRecord::new("A", "A1", 100, 1)]),
        ];
        let series = turnover(&history).unwrap().ready().unwrap();
        assert_eq!(series.points[0].turnover_pct, 0.0);
    }

    #[test]
    fn turnover_needs_two_snapshots() {
        let single = vec![snapshot("1", "2023-11-14", holdings(&[1]))];
        assert_eq!(turnover(&single).unwrap(), Comparison::InsufficientHistory);
        assert_eq!(turnover(&[]).unwrap(), Comparison::InsufficientHistory);
    }

    #[test]
    fn turnover_rejects_unsorted_history() {
        let history = vec![
            snapshot("2", "2024-02-14", holdings(&[1])),
            snapshot("1", "2023-11-14", holdings(&[1])),
        ];
        assert!(matches!(
            turnover(&history),
            Err(Form13fError::HistoryOutOfOrder { position: 1 })
        ));
    }

    #[test]
    fn weights_group_by_issuer() {
        let current = snapshot(
            "1",
            "2024-02-14",
            vec![
                HoldingRecord::new("ALPHABET INC", "02079K305", 30, 1),
                HoldingRecord::new("APPLE INC", "037833100", 60, 1),
                HoldingRecord::new("ALPHABET INC", "02079K107", 10, 1),
            ],
        );

        let weights = weights(&current, 20);
        assert_eq!(weights.len(), 2);
        assert_eq!(weights[0].issuer_name, "APPLE INC");
        assert_eq!(weights[0].pct, 60.0);
        assert_eq!(weights[1].value, 40);
        assert_eq!(weights[1].pct, 40.0);
    }

    #[test]
    fn overview_of_history() {
        let history = vec![
            snapshot("1", "2023-11-14", vec![HoldingRecord::new("A", "A1", 100, 1)]),
            snapshot(
                "2",
                "2024-02-14",
                vec![
                    HoldingRecord::new("A", "A1", 150, 1),
                    HoldingRecord::new("B", "B1", 50, 1),
                ],
            ),
        ];

        let summary = overview(&history).unwrap();
        assert_eq!(summary.filings, 2);
        assert_eq!(summary.unique_issuers, 2);
        assert_eq!(summary.latest_value_usd, 200_000);
        assert_eq!(summary.average_position_usd, 100_000.0);
        assert!(overview(&[]).is_none());
    }

    #[test]
    fn value_series_follows_history() {
        let history = vec![
            snapshot("1", "2023-11-14", holdings(&[1, 2])),
            snapshot("2", "2024-02-14", holdings(&[5])),
        ];
        let series = value_series(&history);
        assert_eq!(series.iter().map(|(_, v)| *v).collect::<Vec<_>>(), vec![3, 5]);
    }
}
