//! Sequential collection of 13F histories for a list of funds.
//!
//! Each fund gets its own `fund_<cik>/` directory holding the raw information
//! tables (`filing_<accession>/form13fInfoTable.xml`), the filing metadata and
//! the per-fund exports. A fund that fails, or reports no holdings at all, has
//! its directory removed so the output only contains usable data.

use crate::diff::{Comparison, latest_diff};
use crate::error::{Form13fError, Result};
use crate::holdings::{Cik, FilingDate, FilingMetadata};
use crate::metrics;
use crate::options::{FilingOptions, SummaryOptions};
use crate::parsing::information_table::InformationTableParser;
use crate::report;
use crate::snapshot::Snapshot;
use crate::traits::FilingOperations;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const INFO_TABLE_FILE: &str = "form13fInfoTable.xml";
pub const METADATA_FILE: &str = "form13f_metadata.csv";
pub const HOLDINGS_FILE: &str = "all_13f_holdings.csv";
pub const CHANGES_FILE: &str = "position_changes.csv";
pub const TURNOVER_FILE: &str = "turnover.csv";
pub const REPORT_FILE: &str = "report.html";

/// Reads a CIK list: one CIK per line, padded or not.
///
/// Blank lines and `#` comments are ignored. Lines that are not a CIK are
/// logged and skipped, as are repeats of a CIK already listed.
pub fn read_cik_list(path: &Path) -> Result<Vec<Cik>> {
    let content = fs::read_to_string(path)?;
    let mut ciks: Vec<Cik> = Vec::new();

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<Cik>() {
            Ok(cik) if ciks.contains(&cik) => {
                tracing::debug!("Ignoring repeated CIK {} on line {}", cik, number + 1);
            }
            Ok(cik) => ciks.push(cik),
            Err(e) => tracing::warn!("Skipping line {} of {}: {}", number + 1, path.display(), e),
        }
    }

    Ok(ciks)
}

/// Directory name used for one fund.
pub fn fund_dir_name(cik: Cik) -> String {
    format!("fund_{}", cik)
}

/// Directory name used for one filing inside a fund directory.
pub fn filing_dir_name(accession_number: &str) -> String {
    format!("filing_{}", accession_number)
}

/// Snapshots and metadata gathered for one fund.
#[derive(Debug, Clone)]
pub struct FundCollection {
    pub fund: Cik,
    /// Chronological.
    pub history: Vec<Snapshot>,
    /// Metadata of the filings that made it into `history`.
    pub metadata: Vec<FilingMetadata>,
    /// Accession numbers that could not be downloaded or parsed.
    pub skipped: Vec<String>,
}

impl FundCollection {
    pub fn holdings_count(&self) -> usize {
        self.history.iter().map(Snapshot::len).sum()
    }
}

/// Downloads and parses the 13F filings of one fund.
pub struct FundCollector<'a, C: FilingOperations + Sync> {
    client: &'a C,
    parser: InformationTableParser,
    filing_options: FilingOptions,
}

impl<'a, C: FilingOperations + Sync> FundCollector<'a, C> {
    pub fn new(client: &'a C, filing_options: FilingOptions) -> Self {
        Self {
            client,
            parser: InformationTableParser::default(),
            filing_options,
        }
    }

    pub fn with_parser(mut self, parser: InformationTableParser) -> Self {
        self.parser = parser;
        self
    }

    /// Collects every matching filing of `cik`.
    ///
    /// A filing whose information table cannot be downloaded or parsed is
    /// logged and skipped. When `store` is given, raw XML goes to
    /// `store/filing_<accession>/form13fInfoTable.xml` and the metadata of the
    /// collected filings to `store/form13f_metadata.csv`.
    ///
    /// # Errors
    ///
    /// Fails when the filing list itself cannot be retrieved or `store` cannot
    /// be written.
    pub async fn collect(&self, cik: Cik, store: Option<&Path>) -> Result<FundCollection> {
        let filings = self
            .client
            .filings(cik, Some(self.filing_options.clone()))
            .await?;
        tracing::info!("Found {} 13F filings for {}", filings.len(), cik);

        let mut collected: Vec<(Snapshot, FilingMetadata)> = Vec::with_capacity(filings.len());
        let mut skipped = Vec::new();

        for filing in &filings {
            let accession = filing.accession_number.as_str();

            let document = match self.client.information_table(cik, accession).await {
                Ok(document) => document,
                Err(e) => {
                    tracing::warn!("Skipping filing {} of {}: {}", accession, cik, e);
                    skipped.push(accession.to_string());
                    continue;
                }
            };

            let records = match self.parser.parse(&document.content) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!("Skipping filing {} of {}: {}", accession, cik, e);
                    skipped.push(accession.to_string());
                    continue;
                }
            };

            if let Some(store) = store {
                let filing_dir = store.join(filing_dir_name(accession));
                fs::create_dir_all(&filing_dir)?;
                fs::write(filing_dir.join(INFO_TABLE_FILE), &document.content)?;
            }

            let metadata = filing.metadata();
            tracing::debug!(
                "Parsed {} holdings from {} ({})",
                records.len(),
                document.file_name,
                metadata.filing_date
            );
            collected.push((
                Snapshot::new(cik, metadata.filing_date(), accession, records),
                metadata,
            ));
        }

        collected.sort_by(|(a, _), (b, _)| a.chronological_cmp(b));
        let (history, metadata): (Vec<_>, Vec<_>) = collected.into_iter().unzip();

        if let Some(store) = store {
            if !metadata.is_empty() {
                report::write_metadata(&store.join(METADATA_FILE), &metadata)?;
            }
        }

        Ok(FundCollection {
            fund: cik,
            history,
            metadata,
            skipped,
        })
    }
}

/// Rebuilds a fund's history from a directory written by [`FundCollector`].
///
/// The CIK is read from the `fund_<cik>` directory name. Filing dates come
/// from the metadata file when it lists the accession number, otherwise from
/// the accession number's year. Unreadable filings are logged and skipped.
pub fn load_fund_dir(dir: &Path) -> Result<Vec<Snapshot>> {
    let fund = dir
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix("fund_"))
        .ok_or_else(|| {
            Form13fError::ConfigError(format!("{} is not a fund_<cik> directory", dir.display()))
        })?
        .parse::<Cik>()?;

    let metadata_path = dir.join(METADATA_FILE);
    let filing_dates: HashMap<String, FilingDate> = if metadata_path.exists() {
        report::read_metadata(&metadata_path)?
            .into_iter()
            .map(|m| (m.accession_number.clone(), m.filing_date()))
            .collect()
    } else {
        HashMap::new()
    };

    let parser = InformationTableParser::default();
    let mut history = Vec::new();

    for entry in WalkDir::new(dir).min_depth(2).max_depth(2) {
        let entry = entry.map_err(|e| Form13fError::FileError(e.into()))?;
        if entry.file_name() != INFO_TABLE_FILE {
            continue;
        }

        let Some(accession) = entry
            .path()
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix("filing_"))
        else {
            continue;
        };

        let filing_date = match filing_dates.get(accession) {
            Some(date) => *date,
            None => match FilingDate::from_accession_number(accession) {
                Some(date) => {
                    tracing::warn!(
                        "No metadata for {}; using year {} from the accession number",
                        accession,
                        date.year()
                    );
                    date
                }
                None => {
                    tracing::warn!("Cannot date filing {}, skipping", accession);
                    continue;
                }
            },
        };

        let content = fs::read(entry.path())?;
        match parser.parse(&content) {
            Ok(records) => history.push(Snapshot::new(fund, filing_date, accession, records)),
            Err(e) => tracing::warn!("Skipping {}: {}", entry.path().display(), e),
        }
    }

    history.sort_by(Snapshot::chronological_cmp);
    Ok(history)
}

/// Writes the per-fund exports next to the raw filings.
pub fn write_fund_reports(dir: &Path, history: &[Snapshot], summary: &SummaryOptions) -> Result<()> {
    report::write_holdings(&dir.join(HOLDINGS_FILE), history)?;

    if let Comparison::Ready(diff) = latest_diff(history) {
        report::write_changes(&dir.join(CHANGES_FILE), &diff)?;
    }
    if let Comparison::Ready(series) = metrics::turnover(history)? {
        report::write_turnover(&dir.join(TURNOVER_FILE), &series)?;
    }
    report::write_html(&dir.join(REPORT_FILE), history, summary)?;
    Ok(())
}

/// Options for [`BatchRunner`].
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    pub filing_options: FilingOptions,
    pub summary: SummaryOptions,
    /// Write the per-fund CSV and HTML exports.
    pub fund_reports: bool,
}

impl BatchOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            filing_options: FilingOptions::default(),
            summary: SummaryOptions::default(),
            fund_reports: true,
        }
    }

    pub fn with_filing_options(mut self, filing_options: FilingOptions) -> Self {
        self.filing_options = filing_options;
        self
    }

    pub fn with_summary(mut self, summary: SummaryOptions) -> Self {
        self.summary = summary;
        self
    }

    pub fn with_fund_reports(mut self, fund_reports: bool) -> Self {
        self.fund_reports = fund_reports;
        self
    }
}

/// What happened to one fund of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundStatus {
    Collected {
        filings: usize,
        holdings: usize,
        skipped_filings: usize,
    },
    /// No filing produced any holdings.
    Empty,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundOutcome {
    pub fund: Cik,
    pub status: FundStatus,
}

/// Outcome of [`BatchRunner::run`].
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub funds: Vec<FundOutcome>,
    /// Combined holdings file, when any fund produced holdings.
    pub combined_csv: Option<PathBuf>,
    pub total_holdings: usize,
}

impl BatchReport {
    pub fn collected(&self) -> usize {
        self.funds
            .iter()
            .filter(|f| matches!(f.status, FundStatus::Collected { .. }))
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FundOutcome> {
        self.funds
            .iter()
            .filter(|f| !matches!(f.status, FundStatus::Collected { .. }))
    }
}

/// Runs [`FundCollector`] over a list of funds, one at a time.
pub struct BatchRunner<'a, C: FilingOperations + Sync> {
    collector: FundCollector<'a, C>,
    options: BatchOptions,
}

impl<'a, C: FilingOperations + Sync> BatchRunner<'a, C> {
    pub fn new(client: &'a C, options: BatchOptions) -> Self {
        Self {
            collector: FundCollector::new(client, options.filing_options.clone()),
            options,
        }
    }

    /// Processes every fund and writes the combined
    /// `all_13f_holdings_<timestamp>.csv` when anything was collected.
    ///
    /// A failing fund never stops the batch. `on_fund` is called after each
    /// fund, for progress reporting.
    ///
    /// # Errors
    ///
    /// Only failures to create the output directory or write the combined file
    /// are returned.
    pub async fn run<F>(&self, ciks: &[Cik], mut on_fund: F) -> Result<BatchReport>
    where
        F: FnMut(&FundOutcome),
    {
        fs::create_dir_all(&self.options.output_dir)?;

        let mut report = BatchReport::default();
        let mut collected: Vec<Snapshot> = Vec::new();

        for &cik in ciks {
            let fund_dir = self.options.output_dir.join(fund_dir_name(cik));
            let status = match self.run_fund(cik, &fund_dir).await {
                Ok(collection) if collection.holdings_count() == 0 => {
                    tracing::info!("No holdings found for {}, removing {}", cik, fund_dir.display());
                    remove_fund_dir(&fund_dir);
                    FundStatus::Empty
                }
                Ok(collection) => {
                    let status = FundStatus::Collected {
                        filings: collection.history.len(),
                        holdings: collection.holdings_count(),
                        skipped_filings: collection.skipped.len(),
                    };
                    tracing::info!(
                        "Collected {} holdings across {} filings for {}",
                        collection.holdings_count(),
                        collection.history.len(),
                        cik
                    );
                    report.total_holdings += collection.holdings_count();
                    collected.extend(collection.history);
                    status
                }
                Err(e) => {
                    tracing::error!("Error processing {}: {}", cik, e);
                    remove_fund_dir(&fund_dir);
                    FundStatus::Failed(e.to_string())
                }
            };

            let outcome = FundOutcome { fund: cik, status };
            on_fund(&outcome);
            report.funds.push(outcome);
        }

        if !collected.is_empty() {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            let path = self
                .options
                .output_dir
                .join(format!("all_13f_holdings_{}.csv", timestamp));
            report::write_holdings(&path, &collected)?;
            tracing::info!("Wrote {} holdings to {}", report.total_holdings, path.display());
            report.combined_csv = Some(path);
        }

        Ok(report)
    }

    async fn run_fund(&self, cik: Cik, fund_dir: &Path) -> Result<FundCollection> {
        fs::create_dir_all(fund_dir)?;
        let collection = self.collector.collect(cik, Some(fund_dir)).await?;
        if self.options.fund_reports && collection.holdings_count() > 0 {
            write_fund_reports(fund_dir, &collection.history, &self.options.summary)?;
        }
        Ok(collection)
    }
}

fn remove_fund_dir(dir: &Path) {
    if dir.exists() {
        if let Err(e) = fs::remove_dir_all(dir) {
            tracing::warn!("Could not remove {}: {}", dir.display(), e);
        }
    }
}
