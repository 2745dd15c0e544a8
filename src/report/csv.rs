//! CSV tables with fixed column sets.
//!
//! The holdings table uses the column headings of the SEC's own 13F
//! information table listing, so exports open cleanly next to EDGAR data.

use crate::diff::{ChangeStatus, SnapshotDiff, round2};
use crate::error::{Form13fError, Result};
use crate::holdings::{Cik, FilingDate, FilingMetadata, HoldingRecord, PutCall};
use crate::metrics::TurnoverSeries;
use crate::snapshot::Snapshot;
use ::csv::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct HoldingRow {
    #[serde(rename = "NAME OF ISSUER")]
    issuer_name: String,
    #[serde(rename = "TITLE OF CLASS")]
    security_class: String,
    #[serde(rename = "CUSIP")]
    cusip: String,
    #[serde(rename = "VALUE (x$1000)")]
    value_thousands: u64,
    #[serde(rename = "SHRS OR PRN AMT")]
    shares: u64,
    #[serde(rename = "SH/PRN")]
    share_type: String,
    #[serde(rename = "PUT/CALL")]
    put_call: String,
    #[serde(rename = "INVESTMENT DISCRETION")]
    investment_discretion: String,
    #[serde(rename = "OTHER MANAGER")]
    other_manager: String,
    #[serde(rename = "VOTING AUTHORITY SOLE")]
    voting_sole: u64,
    #[serde(rename = "VOTING AUTHORITY SHARED")]
    voting_shared: u64,
    #[serde(rename = "VOTING AUTHORITY NONE")]
    voting_none: u64,
    #[serde(rename = "Filing Date")]
    filing_date: String,
    #[serde(rename = "Accession Number")]
    accession_number: String,
    #[serde(rename = "CIK")]
    cik: Cik,
}

impl HoldingRow {
    fn new(snapshot: &Snapshot, record: &HoldingRecord) -> Self {
        Self {
            issuer_name: record.issuer_name.clone(),
            security_class: record.security_class.clone(),
            cusip: record.cusip.clone(),
            value_thousands: record.value_thousands,
            shares: record.shares,
            share_type: record.share_type.clone(),
            put_call: record.put_call.map(|pc| pc.as_str().to_string()).unwrap_or_default(),
            investment_discretion: record.investment_discretion.clone(),
            other_manager: record.other_manager.clone().unwrap_or_default(),
            voting_sole: record.voting_sole,
            voting_shared: record.voting_shared,
            voting_none: record.voting_none,
            filing_date: snapshot.filing_date().to_string(),
            accession_number: snapshot.accession_number().to_string(),
            cik: snapshot.fund(),
        }
    }

    fn into_record(self) -> HoldingRecord {
        let other_manager = Some(self.other_manager).filter(|m| !m.trim().is_empty());
        HoldingRecord {
            issuer_name: self.issuer_name,
            cusip: self.cusip,
            security_class: self.security_class,
            value_thousands: self.value_thousands,
            shares: self.shares,
            share_type: self.share_type,
            investment_discretion: self.investment_discretion,
            voting_sole: self.voting_sole,
            voting_shared: self.voting_shared,
            voting_none: self.voting_none,
            put_call: PutCall::parse(&self.put_call),
            other_manager,
        }
    }
}

/// Writes the holdings of every snapshot as one table, sorted by filing date
/// and then issuer name.
pub fn write_holdings_to<'a, W, I>(writer: W, snapshots: I) -> Result<()>
where
    W: io::Write,
    I: IntoIterator<Item = &'a Snapshot>,
{
    let mut rows: Vec<(FilingDate, HoldingRow)> = snapshots
        .into_iter()
        .flat_map(|snapshot| {
            snapshot
                .holdings()
                .map(move |record| (snapshot.filing_date(), HoldingRow::new(snapshot, record)))
        })
        .collect();
    rows.sort_by(|(date_a, row_a), (date_b, row_b)| {
        date_a
            .cmp(date_b)
            .then_with(|| row_a.issuer_name.cmp(&row_b.issuer_name))
    });

    let mut writer = Writer::from_writer(writer);
    if rows.is_empty() {
        writer.write_record(HOLDING_COLUMNS)?;
    }
    for (_, row) in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

const HOLDING_COLUMNS: [&str; 15] = [
    "NAME OF ISSUER",
    "TITLE OF CLASS",
    "CUSIP",
    "VALUE (x$1000)",
    "SHRS OR PRN AMT",
    "SH/PRN",
    "PUT/CALL",
    "INVESTMENT DISCRETION",
    "OTHER MANAGER",
    "VOTING AUTHORITY SOLE",
    "VOTING AUTHORITY SHARED",
    "VOTING AUTHORITY NONE",
    "Filing Date",
    "Accession Number",
    "CIK",
];

pub fn write_holdings<'a, I>(path: &Path, snapshots: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Snapshot>,
{
    write_holdings_to(fs::File::create(path)?, snapshots)
}

/// Rebuilds snapshots from a holdings table.
///
/// Rows are grouped by CIK and accession number. The result is ordered by
/// fund, then chronologically, ready to be used as a history.
///
/// The table is written in issuer-name order, so each rebuilt snapshot lists
/// its holdings by issuer name rather than in reported order. Holdings and
/// amounts are unchanged, but top-N ties that were broken by reported order
/// may rank differently after a reload.
pub fn read_holdings_from<R: io::Read>(reader: R) -> Result<Vec<Snapshot>> {
    let mut groups: BTreeMap<(Cik, String), (FilingDate, Vec<HoldingRecord>)> = BTreeMap::new();

    for row in Reader::from_reader(reader).deserialize::<HoldingRow>() {
        let row = row?;
        let filing_date: FilingDate = row.filing_date.parse()?;
        let group = groups
            .entry((row.cik, row.accession_number.clone()))
            .or_insert_with(|| (filing_date, Vec::new()));
        if group.0 != filing_date {
            return Err(Form13fError::InvalidResponse(format!(
                "Accession {} appears with filing dates {} and {}",
                row.accession_number, group.0, filing_date
            )));
        }
        group.1.push(row.into_record());
    }

    let mut snapshots: Vec<Snapshot> = groups
        .into_iter()
        .map(|((cik, accession), (date, records))| Snapshot::new(cik, date, accession, records))
        .collect();
    snapshots.sort_by(|a, b| a.fund().cmp(&b.fund()).then_with(|| a.chronological_cmp(b)));
    Ok(snapshots)
}

pub fn read_holdings(path: &Path) -> Result<Vec<Snapshot>> {
    read_holdings_from(fs::File::open(path)?)
}

#[derive(Debug, Serialize)]
struct ChangeRow<'a> {
    name: &'a str,
    cusip: &'a str,
    #[serde(rename = "type")]
    security_class: &'a str,
    status: ChangeStatus,
    value_current: u64,
    value_prev: u64,
    value_change: i64,
    value_change_pct: Option<f64>,
    shares_current: u64,
    shares_prev: u64,
    shares_change: i64,
}

/// Writes one row per diff entry. An undefined percentage is an empty cell.
pub fn write_changes_to<W: io::Write>(writer: W, diff: &SnapshotDiff) -> Result<()> {
    let mut writer = Writer::from_writer(writer);
    for entry in diff.entries() {
        writer.serialize(ChangeRow {
            name: &entry.issuer_name,
            cusip: &entry.cusip,
            security_class: &entry.security_class,
            status: entry.status,
            value_current: entry.value_current,
            value_prev: entry.value_previous,
            value_change: entry.value_change,
            value_change_pct: entry.value_change_pct,
            shares_current: entry.shares_current,
            shares_prev: entry.shares_previous,
            shares_change: entry.shares_change,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_changes(path: &Path, diff: &SnapshotDiff) -> Result<()> {
    write_changes_to(fs::File::create(path)?, diff)
}

#[derive(Debug, Serialize)]
struct TurnoverRow {
    date: String,
    turnover: f64,
}

pub fn write_turnover_to<W: io::Write>(writer: W, series: &TurnoverSeries) -> Result<()> {
    let mut writer = Writer::from_writer(writer);
    for point in &series.points {
        writer.serialize(TurnoverRow {
            date: point.filing_date.to_string(),
            turnover: round2(point.turnover_pct),
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_turnover(path: &Path, series: &TurnoverSeries) -> Result<()> {
    write_turnover_to(fs::File::create(path)?, series)
}

/// Writes filing metadata with the submissions API column names.
pub fn write_metadata(path: &Path, filings: &[FilingMetadata]) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    for filing in filings {
        writer.serialize(filing)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_metadata(path: &Path) -> Result<Vec<FilingMetadata>> {
    let mut reader = Reader::from_path(path)?;
    let mut filings = Vec::new();
    for filing in reader.deserialize() {
        filings.push(filing?);
    }
    Ok(filings)
}

/// One zero-padded CIK per line.
pub fn write_cik_list(path: &Path, ciks: &[Cik]) -> Result<()> {
    let mut content = String::with_capacity(ciks.len() * 11);
    for cik in ciks {
        content.push_str(&cik.to_string());
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}
