//! Invariants of the diff and metrics layers over generated portfolios.

use form13f::diff::{self, ChangeStatus, Comparison, SnapshotDiff};
use form13f::metrics::{self, concentration, summarize};
use form13f::{Cik, FilingDate, HoldingRecord, Snapshot};
use std::collections::HashSet;

const FUND: Cik = Cik::new(1067983);

fn date(text: &str) -> FilingDate {
    text.parse().unwrap()
}

/// Random portfolio drawn from a fixed universe of 30 CUSIPs, so consecutive
/// snapshots overlap.
fn random_snapshot(rng: &mut fastrand::Rng, accession: &str, filing_date: &str) -> Snapshot {
    let positions = rng.usize(0..20);
    let records = (0..positions).map(|_| {
        let id = rng.u32(0..30);
        HoldingRecord::new(
            format!("ISSUER {}", id),
            format!("{:09}", id),
            rng.u64(0..5_000),
            rng.u64(0..100_000),
        )
    });
    Snapshot::new(FUND, date(filing_date), accession, records.collect::<Vec<_>>())
}

fn random_history(seed: u64, len: usize) -> Vec<Snapshot> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..len)
        .map(|i| {
            let accession = format!("0001067983-{:02}-{:06}", 20 + i / 4, i);
            let filing_date = format!("{}-{:02}-15", 2020 + i / 4, (i % 4) * 3 + 2);
            random_snapshot(&mut rng, &accession, &filing_date)
        })
        .collect()
}

#[test]
fn self_diff_is_all_unchanged() {
    for seed in 0..50 {
        let snapshot = &random_history(seed, 1)[0];
        let diff = SnapshotDiff::between(snapshot, snapshot);

        assert_eq!(diff.entries().len(), snapshot.len());
        assert!(diff.entries().iter().all(|e| e.status == ChangeStatus::Unchanged));
        assert!(diff.entries().iter().all(|e| e.value_change == 0 && e.shares_change == 0));
    }
}

#[test]
fn diff_covers_every_key_exactly_once() {
    for seed in 0..50 {
        let history = random_history(seed, 2);
        let (previous, current) = (&history[0], &history[1]);
        let diff = SnapshotDiff::between(previous, current);

        let expected: HashSet<_> = previous.entries().chain(current.entries()).map(|(k, _)| k.clone()).collect();
        let keys: Vec<_> = diff.entries().iter().map(|e| e.key.clone()).collect();
        let unique: HashSet<_> = keys.iter().cloned().collect();

        assert_eq!(keys.len(), unique.len(), "seed {}", seed);
        assert_eq!(unique, expected, "seed {}", seed);

        for entry in diff.entries() {
            let expected_status = match (previous.contains(&entry.key), current.contains(&entry.key)) {
                (false, true) => ChangeStatus::New,
                (true, false) => ChangeStatus::Closed,
                _ if entry.value_change != 0 || entry.shares_change != 0 => ChangeStatus::Changed,
                _ => ChangeStatus::Unchanged,
            };
            assert_eq!(entry.status, expected_status);
            assert_eq!(
                entry.value_change,
                entry.value_current as i64 - entry.value_previous as i64
            );
        }
    }
}

#[test]
fn concentration_stays_within_bounds() {
    for seed in 0..50 {
        let snapshot = &random_history(seed, 1)[0];
        let pct = concentration(snapshot, 10);
        assert!((0.0..=100.0 + 1e-9).contains(&pct), "seed {}: {}", seed, pct);
        if snapshot.len() <= 10 && snapshot.total_value() > 0 {
            assert!((pct - 100.0).abs() < 1e-9);
        }
    }
}

#[test]
fn turnover_is_never_negative() {
    for seed in 0..20 {
        let history = random_history(seed, 6);
        let series = metrics::turnover(&history).unwrap().ready().unwrap();

        assert_eq!(series.len(), 5);
        assert!(series.points.iter().all(|p| p.turnover_pct >= 0.0));
        assert_eq!(series.points[0].filing_date, history[1].filing_date());
    }
}

#[test]
fn worked_example_new_and_changed_positions() {
    let previous = Snapshot::new(FUND, date("2023-05-15"), "p", vec![HoldingRecord::new("A", "cusip1", 100, 10)]);
    let current = Snapshot::new(FUND, date("2023-08-14"), "c", vec![
        HoldingRecord::new("A", "cusip1", 150, 10),
        HoldingRecord::new("B", "cusip2", 50, 5),
    ]);

    let diff = diff::diff(Some(&previous), &current).ready().unwrap();
    let entries = diff.entries();
    assert_eq!(entries.len(), 2);

    assert_eq!(entries[0].status, ChangeStatus::Changed);
    assert_eq!(entries[0].value_change, 50);
    assert_eq!(entries[0].value_change_pct, Some(50.0));

    assert_eq!(entries[1].status, ChangeStatus::New);
    assert_eq!(entries[1].value_change, 50);
    assert_eq!(entries[1].value_change_pct, None);

    let summary = summarize(&current, &diff);
    assert_eq!(summary.total_value, 200);
    assert_eq!(summary.counts.new, 1);
    assert_eq!(summary.counts.increased, 1);
    assert_eq!(summary.top_holdings[0].issuer_name, "A");
}

#[test]
fn worked_example_single_snapshot_has_insufficient_history() {
    let only = Snapshot::new(FUND, date("2023-05-15"), "p", vec![HoldingRecord::new("A", "cusip1", 100, 10)]);

    assert!(matches!(diff::diff(None, &only), Comparison::InsufficientHistory));
    assert!(matches!(
        diff::latest_diff(std::slice::from_ref(&only)),
        Comparison::InsufficientHistory
    ));
    assert!(matches!(
        metrics::turnover(std::slice::from_ref(&only)),
        Ok(Comparison::InsufficientHistory)
    ));
}

#[test]
fn csv_roundtrip_preserves_positions() {
    for seed in 0..10 {
        let history = random_history(seed, 3);
        let mut buffer = Vec::new();
        form13f::report::write_holdings_to(&mut buffer, &history).unwrap();

        let restored = form13f::report::read_holdings_from(buffer.as_slice()).unwrap();
        let non_empty: Vec<&Snapshot> = history.iter().filter(|s| !s.is_empty()).collect();
        assert_eq!(restored.len(), non_empty.len());

        for (original, restored) in non_empty.iter().zip(&restored) {
            assert_eq!(original.accession_number(), restored.accession_number());
            for (key, record) in original.entries() {
                let back = restored.get(key).unwrap();
                assert_eq!(
                    (&back.issuer_name, &back.cusip, back.value_thousands, back.shares),
                    (&record.issuer_name, &record.cusip, record.value_thousands, record.shares)
                );
            }
        }
    }
}
