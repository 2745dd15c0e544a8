//! Per-fund snapshots of reported holdings.

use crate::holdings::{Cik, FilingDate, HoldingRecord, IdentityKey};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Holdings reported by one fund in one filing.
///
/// Holdings are unique by [`IdentityKey`]. Records sharing a key are merged
/// when the snapshot is built: amounts are summed and the text fields of the
/// first record are kept. Records with no identity at all are dropped. Both
/// cases are logged, neither is an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    fund: Cik,
    filing_date: FilingDate,
    accession_number: String,
    holdings: Vec<(IdentityKey, HoldingRecord)>,
    index: HashMap<IdentityKey, usize>,
}

impl Snapshot {
    pub fn new(
        fund: Cik,
        filing_date: FilingDate,
        accession_number: impl Into<String>,
        records: impl IntoIterator<Item = HoldingRecord>,
    ) -> Self {
        let accession_number = accession_number.into();
        let mut holdings: Vec<(IdentityKey, HoldingRecord)> = Vec::new();
        let mut index: HashMap<IdentityKey, usize> = HashMap::new();

        for record in records {
            let Some(key) = record.identity_key() else {
                tracing::warn!(
                    "Dropping holding without CUSIP or issuer name from {} ({})",
                    accession_number,
                    fund
                );
                continue;
            };

            match index.get(&key).copied() {
                Some(position) => {
                    tracing::warn!(
                        "Duplicate holding {} in {} ({}); consolidating",
                        key,
                        accession_number,
                        fund
                    );
                    let existing: &mut HoldingRecord = &mut holdings[position].1;
                    let merge = |total: &mut u64, amount: u64| *total = total.saturating_add(amount);
                    merge(&mut existing.value_thousands, record.value_thousands);
                    merge(&mut existing.shares, record.shares);
                    merge(&mut existing.voting_sole, record.voting_sole);
                    merge(&mut existing.voting_shared, record.voting_shared);
                    merge(&mut existing.voting_none, record.voting_none);
                }
                None => {
                    index.insert(key.clone(), holdings.len());
                    holdings.push((key, record));
                }
            }
        }

        Self {
            fund,
            filing_date,
            accession_number,
            holdings,
            index,
        }
    }

    pub fn fund(&self) -> Cik {
        self.fund
    }

    pub fn filing_date(&self) -> FilingDate {
        self.filing_date
    }

    pub fn accession_number(&self) -> &str {
        &self.accession_number
    }

    /// Holdings in the order they were first reported.
    pub fn holdings(&self) -> impl Iterator<Item = &HoldingRecord> {
        self.holdings.iter().map(|(_, record)| record)
    }

    /// Holdings paired with their identity keys, in reported order.
    pub fn entries(&self) -> impl Iterator<Item = (&IdentityKey, &HoldingRecord)> {
        self.holdings.iter().map(|(key, record)| (key, record))
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&HoldingRecord> {
        self.index.get(key).map(|&position| &self.holdings[position].1)
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    /// Sum of reported values, in thousands of dollars. Saturates at `u64::MAX`.
    pub fn total_value(&self) -> u64 {
        self.holdings()
            .fold(0u64, |total, h| total.saturating_add(h.value_thousands))
    }

    /// Chronological order: filing date, then accession number.
    pub fn chronological_cmp(&self, other: &Snapshot) -> Ordering {
        self.filing_date
            .cmp(&other.filing_date)
            .then_with(|| self.accession_number.cmp(&other.accession_number))
    }
}

/// Snapshots grouped per fund, each history kept in chronological order.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    funds: BTreeMap<Cik, Vec<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a snapshot to its fund's history.
    ///
    /// One snapshot exists per accession number; inserting the same accession
    /// again replaces the earlier snapshot.
    pub fn insert(&mut self, snapshot: Snapshot) {
        let history = self.funds.entry(snapshot.fund()).or_default();

        if let Some(existing) = history
            .iter_mut()
            .find(|s| s.accession_number() == snapshot.accession_number())
        {
            tracing::warn!(
                "Replacing snapshot {} for fund {}",
                snapshot.accession_number(),
                snapshot.fund()
            );
            *existing = snapshot;
        } else {
            history.push(snapshot);
        }

        history.sort_by(|a, b| a.chronological_cmp(b));
    }

    /// Chronological history of one fund; empty for unknown funds.
    pub fn history(&self, fund: Cik) -> &[Snapshot] {
        self.funds.get(&fund).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn latest(&self, fund: Cik) -> Option<&Snapshot> {
        self.history(fund).last()
    }

    /// Funds in CIK order.
    pub fn funds(&self) -> impl Iterator<Item = Cik> + '_ {
        self.funds.keys().copied()
    }

    /// Every snapshot of every fund, funds in CIK order.
    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.funds.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.funds.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.funds.is_empty()
    }
}

impl FromIterator<Snapshot> for SnapshotStore {
    fn from_iter<I: IntoIterator<Item = Snapshot>>(iter: I) -> Self {
        let mut store = SnapshotStore::new();
        for snapshot in iter {
            store.insert(snapshot);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(text: &str) -> FilingDate {
        FilingDate::parse_exact(text).unwrap()
    }

    #[test]
    fn duplicates_are_consolidated() {
        let snapshot = Snapshot::new(
            Cik::new(1),
            date("2024-02-14"),
            "0000000001-24-000001",
            vec![
                HoldingRecord::new("ACME", "000000001", 10, 100),
                HoldingRecord::new("OTHER", "000000002", 5, 50),
                HoldingRecord::new("ACME CLASS B", "000000001", 7, 30),
            ],
        );

        assert_eq!(snapshot.len(), 2);
        let acme = snapshot
            .get(&IdentityKey::Cusip("000000001".to_string()))
            .unwrap();
        assert_eq!(acme.issuer_name, "ACME");
        assert_eq!(acme.value_thousands, 17);
        assert_eq!(acme.shares, 130);
        assert_eq!(snapshot.total_value(), 22);
    }

    #[test]
    fn oversized_amounts_saturate() {
        let snapshot = Snapshot::new(
            Cik::new(1),
            date("2024-02-14"),
            "0000000001-24-000001",
            vec![
                HoldingRecord::new("BIG", "000000001", u64::MAX - 1, u64::MAX),
                HoldingRecord::new("BIG", "000000001", 10, 10),
                HoldingRecord::new("HUGE", "000000002", u64::MAX, 1),
            ],
        );

        let big = snapshot
            .get(&IdentityKey::Cusip("000000001".to_string()))
            .unwrap();
        assert_eq!(big.value_thousands, u64::MAX);
        assert_eq!(big.shares, u64::MAX);
        assert_eq!(snapshot.total_value(), u64::MAX);
    }

    #[test]
    fn records_without_identity_are_dropped() {
        let snapshot = Snapshot::new(
            Cik::new(1),
            date("2024-02-14"),
            "0000000001-24-000001",
            vec![HoldingRecord::new("", "", 10, 100)],
        );
        assert!(snapshot.is_empty());
    }

    #[test]
    fn store_keeps_histories_sorted() {
        let fund = Cik::new(7);
        let later = Snapshot::new(fund, date("2024-05-15"), "0000000007-24-000002", vec![]);
        let earlier = Snapshot::new(fund, date("2024-02-14"), "0000000007-24-000001", vec![]);

        let store: SnapshotStore = vec![later, earlier].into_iter().collect();
        let history = store.history(fund);

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].accession_number(), "0000000007-24-000001");
        assert_eq!(store.latest(fund).unwrap().accession_number(), "0000000007-24-000002");
        assert!(store.history(Cik::new(8)).is_empty());
    }

    #[test]
    fn same_accession_replaces() {
        let fund = Cik::new(7);
        let mut store = SnapshotStore::new();
        store.insert(Snapshot::new(fund, date("2024-02-14"), "A", vec![]));
        store.insert(Snapshot::new(
            fund,
            date("2024-02-14"),
            "A",
            vec![HoldingRecord::new("X", "000000009", 1, 1)],
        ));

        assert_eq!(store.len(), 1);
        assert_eq!(store.history(fund)[0].len(), 1);
    }
}
