//! Position-level comparison of two snapshots of the same fund.
//!
//! The comparison is a full outer join on [`IdentityKey`]. A key missing on
//! one side counts as zero value and zero shares there, so every key present
//! in either snapshot yields exactly one [`DiffEntry`].

use crate::holdings::{Cik, FilingDate, HoldingRecord, IdentityKey};
use crate::snapshot::Snapshot;
use serde::Serialize;
use std::fmt;

/// Result of an operation that needs more than one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison<T> {
    Ready(T),
    /// Fewer snapshots than the operation needs.
    InsufficientHistory,
}

impl<T> Comparison<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Comparison::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Comparison::Ready(value) => Some(value),
            Comparison::InsufficientHistory => None,
        }
    }

    pub fn as_ref(&self) -> Comparison<&T> {
        match self {
            Comparison::Ready(value) => Comparison::Ready(value),
            Comparison::InsufficientHistory => Comparison::InsufficientHistory,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Comparison<U> {
        match self {
            Comparison::Ready(value) => Comparison::Ready(f(value)),
            Comparison::InsufficientHistory => Comparison::InsufficientHistory,
        }
    }
}

/// How a position moved between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeStatus {
    /// Only in the current snapshot.
    New,
    /// Only in the previous snapshot.
    Closed,
    /// In both, with a different value or share count.
    Changed,
    Unchanged,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::New => "NEW",
            ChangeStatus::Closed => "CLOSED",
            ChangeStatus::Changed => "CHANGED",
            ChangeStatus::Unchanged => "UNCHANGED",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One identity key's movement between two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    pub key: IdentityKey,
    pub issuer_name: String,
    pub cusip: String,
    pub security_class: String,
    pub status: ChangeStatus,
    pub value_current: u64,
    pub value_previous: u64,
    pub value_change: i64,
    /// `value_change / value_previous * 100`, two decimals. `None` when there
    /// was no previous value to compare against.
    pub value_change_pct: Option<f64>,
    pub shares_current: u64,
    pub shares_previous: u64,
    pub shares_change: i64,
}

impl DiffEntry {
    fn build(
        key: &IdentityKey,
        previous: Option<&HoldingRecord>,
        current: Option<&HoldingRecord>,
    ) -> Option<Self> {
        let descriptor = current.or(previous)?;

        let value_current = current.map_or(0, |h| h.value_thousands);
        let value_previous = previous.map_or(0, |h| h.value_thousands);
        let shares_current = current.map_or(0, |h| h.shares);
        let shares_previous = previous.map_or(0, |h| h.shares);

        let status = match (previous, current) {
            (None, Some(_)) => ChangeStatus::New,
            (Some(_), None) => ChangeStatus::Closed,
            _ if value_current != value_previous || shares_current != shares_previous => {
                ChangeStatus::Changed
            }
            _ => ChangeStatus::Unchanged,
        };

        let value_change = signed_delta(value_current, value_previous);
        let value_change_pct = if value_previous == 0 {
            None
        } else {
            Some(round2(value_change as f64 / value_previous as f64 * 100.0))
        };

        Some(Self {
            key: key.clone(),
            issuer_name: descriptor.issuer_name.clone(),
            cusip: descriptor.cusip.clone(),
            security_class: descriptor.security_class.clone(),
            status,
            value_current,
            value_previous,
            value_change,
            value_change_pct,
            shares_current,
            shares_previous,
            shares_change: signed_delta(shares_current, shares_previous),
        })
    }
}

/// `current - previous`, clamped to the `i64` range.
fn signed_delta(current: u64, previous: u64) -> i64 {
    let delta = i128::from(current) - i128::from(previous);
    i64::try_from(delta).unwrap_or(if delta < 0 { i64::MIN } else { i64::MAX })
}

/// Rounds to two decimal places, the precision used for every reported
/// percentage.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Every position movement between two snapshots of one fund.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotDiff {
    fund: Cik,
    previous_date: FilingDate,
    current_date: FilingDate,
    previous_accession: String,
    current_accession: String,
    entries: Vec<DiffEntry>,
}

impl SnapshotDiff {
    /// Compares `current` against `previous`.
    ///
    /// Entries follow the current snapshot's order, then positions closed since
    /// `previous` in the order they appeared there.
    pub fn between(previous: &Snapshot, current: &Snapshot) -> Self {
        if previous.fund() != current.fund() {
            tracing::warn!(
                "Comparing snapshots of different funds: {} and {}",
                previous.fund(),
                current.fund()
            );
        }

        let mut entries = Vec::with_capacity(current.len().max(previous.len()));

        for (key, record) in current.entries() {
            entries.extend(DiffEntry::build(key, previous.get(key), Some(record)));
        }
        for (key, record) in previous.entries() {
            if !current.contains(key) {
                entries.extend(DiffEntry::build(key, Some(record), None));
            }
        }

        Self {
            fund: current.fund(),
            previous_date: previous.filing_date(),
            current_date: current.filing_date(),
            previous_accession: previous.accession_number().to_string(),
            current_accession: current.accession_number().to_string(),
            entries,
        }
    }

    pub fn fund(&self) -> Cik {
        self.fund
    }

    pub fn previous_date(&self) -> FilingDate {
        self.previous_date
    }

    pub fn current_date(&self) -> FilingDate {
        self.current_date
    }

    pub fn previous_accession(&self) -> &str {
        &self.previous_accession
    }

    pub fn current_accession(&self) -> &str {
        &self.current_accession
    }

    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&DiffEntry> {
        self.entries.iter().find(|e| &e.key == key)
    }

    pub fn with_status(&self, status: ChangeStatus) -> impl Iterator<Item = &DiffEntry> {
        self.entries.iter().filter(move |e| e.status == status)
    }

    pub fn count(&self, status: ChangeStatus) -> usize {
        self.with_status(status).count()
    }

    /// Σ |value change| over every entry, in thousands of dollars.
    pub fn absolute_value_change(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |total, e| total.saturating_add(e.value_change.unsigned_abs()))
    }
}

/// Diffs `current` against `previous`, or reports that there is nothing to
/// compare against.
pub fn diff(previous: Option<&Snapshot>, current: &Snapshot) -> Comparison<SnapshotDiff> {
    match previous {
        Some(previous) => Comparison::Ready(SnapshotDiff::between(previous, current)),
        None => Comparison::InsufficientHistory,
    }
}

/// Diff between the last two snapshots of a chronological history.
pub fn latest_diff(history: &[Snapshot]) -> Comparison<SnapshotDiff> {
    match history {
        [.., previous, current] => Comparison::Ready(SnapshotDiff::between(previous, current)),
        _ => Comparison::InsufficientHistory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(accession: &str, date: &str, records: Vec<HoldingRecord>) -> Snapshot {
        Snapshot::new(
            Cik::new(1),
            FilingDate::parse_exact(date).unwrap(),
            accession,
            records,
        )
    }

    fn cusip(value: &str) -> IdentityKey {
        IdentityKey::Cusip(value.to_string())
    }

    #[test]
    fn deltas_beyond_i64_are_clamped() {
        let previous = snapshot(
            "P",
            "2024-02-14",
            vec![HoldingRecord::new("GONE", "G00000001", u64::MAX, u64::MAX)],
        );
        let current = snapshot(
            "C",
            "2024-05-15",
            vec![HoldingRecord::new("HUGE", "H00000001", 10_000_000_000_000_000_000, 1)],
        );

        let diff = SnapshotDiff::between(&previous, &current);
        let huge = diff.get(&cusip("H00000001")).unwrap();
        assert_eq!(huge.status, ChangeStatus::New);
        assert_eq!(huge.value_change, i64::MAX);
        let gone = diff.get(&cusip("G00000001")).unwrap();
        assert_eq!(gone.value_change, i64::MIN);
        assert_eq!(gone.shares_change, i64::MIN);
        assert_eq!(diff.absolute_value_change(), u64::MAX);
    }

    #[test]
    fn tags_every_key_once() {
        let previous = snapshot(
            "P",
            "2024-02-14",
            vec![
                HoldingRecord::new("A", "A00000001", 100, 10),
                HoldingRecord::new("B", "B00000001", 50, 5),
                HoldingRecord::new("C", "C00000001", 20, 2),
            ],
        );
        let current = snapshot(
            "C",
            "2024-05-15",
            vec![
                HoldingRecord::new("A", "A00000001", 150, 12),
                HoldingRecord::new("C", "C00000001", 20, 2),
                HoldingRecord::new("D", "D00000001", 30, 3),
            ],
        );

        let diff = SnapshotDiff::between(&previous, &current);
        let statuses: Vec<_> = diff.entries().iter().map(|e| (e.cusip.as_str(), e.status)).collect();

        assert_eq!(
            statuses,
            vec![
                ("A00000001", ChangeStatus::Changed),
                ("C00000001", ChangeStatus::Unchanged),
                ("D00000001", ChangeStatus::New),
                ("B00000001", ChangeStatus::Closed),
            ]
        );

        let a = diff.get(&cusip("A00000001")).unwrap();
        assert_eq!(a.value_change, 50);
        assert_eq!(a.value_change_pct, Some(50.0));
        assert_eq!(a.shares_change, 2);

        let b = diff.get(&cusip("B00000001")).unwrap();
        assert_eq!((b.value_current, b.value_change), (0, -50));
        assert_eq!(b.value_change_pct, Some(-100.0));

        let d = diff.get(&cusip("D00000001")).unwrap();
        assert_eq!(d.value_previous, 0);
        assert_eq!(d.value_change_pct, None);
    }

    #[test]
    fn shares_only_change_is_changed() {
        let previous = snapshot("P", "2024-02-14", vec![HoldingRecord::new("A", "A1", 100, 10)]);
        let current = snapshot("C", "2024-05-15", vec![HoldingRecord::new("A", "A1", 100, 11)]);

        let diff = SnapshotDiff::between(&previous, &current);
        assert_eq!(diff.entries()[0].status, ChangeStatus::Changed);
        assert_eq!(diff.entries()[0].value_change_pct, Some(0.0));
    }

    #[test]
    fn percentage_is_rounded() {
        let previous = snapshot("P", "2024-02-14", vec![HoldingRecord::new("A", "A1", 3, 1)]);
        let current = snapshot("C", "2024-05-15", vec![HoldingRecord::new("A", "A1", 4, 1)]);

        let diff = SnapshotDiff::between(&previous, &current);
        assert_eq!(diff.entries()[0].value_change_pct, Some(33.33));
    }

    #[test]
    fn closed_from_zero_value_has_no_percentage() {
        let previous = snapshot("P", "2024-02-14", vec![HoldingRecord::new("A", "A1", 0, 1)]);
        let current = snapshot("C", "2024-05-15", vec![]);

        let diff = SnapshotDiff::between(&previous, &current);
        assert_eq!(diff.entries()[0].status, ChangeStatus::Closed);
        assert_eq!(diff.entries()[0].value_change_pct, None);
    }

    #[test]
    fn name_fallback_matches_across_snapshots() {
        let previous = snapshot("P", "2024-02-14", vec![HoldingRecord::new("Private Fund LP", "", 10, 1)]);
        let current = snapshot("C", "2024-05-15", vec![HoldingRecord::new("PRIVATE  FUND LP", "", 10, 1)]);

        let diff = SnapshotDiff::between(&previous, &current);
        assert_eq!(diff.entries().len(), 1);
        assert_eq!(diff.entries()[0].status, ChangeStatus::Unchanged);
    }

    #[test]
    fn missing_previous_is_insufficient_history() {
        let current = snapshot("C", "2024-05-15", vec![HoldingRecord::new("A", "A1", 1, 1)]);
        assert_eq!(diff(None, &current), Comparison::InsufficientHistory);
        assert_eq!(latest_diff(std::slice::from_ref(&current)), Comparison::InsufficientHistory);
        assert_eq!(latest_diff(&[]), Comparison::InsufficientHistory);
    }

    #[test]
    fn latest_diff_uses_last_pair() {
        let history = vec![
            snapshot("1", "2023-11-14", vec![HoldingRecord::new("A", "A1", 1, 1)]),
            snapshot("2", "2024-02-14", vec![HoldingRecord::new("A", "A1", 2, 1)]),
            snapshot("3", "2024-05-15", vec![HoldingRecord::new("A", "A1", 4, 1)]),
        ];

        let diff = latest_diff(&history).ready().unwrap();
        assert_eq!(diff.previous_accession(), "2");
        assert_eq!(diff.current_accession(), "3");
        assert_eq!(diff.entries()[0].value_change, 2);
    }
}
