//! Trait definitions for the remote operations of the crate.
//!
//! `SecClient` implements one trait per feature area: retrieving 13F filings
//! and their information tables, and resolving company names to CIKs. The
//! batch runner and the resolver are written against these traits, so tests
//! can swap in a client pointed at a mock server.

use super::error::Result;
#[cfg(feature = "filings")]
use super::filings::{DetailedFiling, DirectoryResponse, InformationTableDocument, Submission};
#[cfg(feature = "filings")]
use super::holdings::Cik;
#[cfg(feature = "filings")]
use super::options::FilingOptions;
#[cfg(feature = "resolver")]
use super::resolver::{CikMatch, CompanyTicker, LookupDataEntry};
use async_trait::async_trait;

/// Operations for discovering 13F filings and downloading their holdings.
///
/// Filing discovery goes through the submissions API, which lists a filer's
/// recent filings. Documents are read from the EDGAR archives.
#[cfg(feature = "filings")]
#[async_trait]
pub trait FilingOperations {
    /// Retrieves the submissions record for a filer.
    async fn submissions(&self, cik: Cik) -> Result<Submission>;
    /// Every recent filing of the filer, in the order the SEC lists them (newest first).
    async fn recent_filings(&self, cik: Cik) -> Result<Vec<DetailedFiling>>;
    /// Recent filings filtered by form type, filing date, offset and limit.
    async fn filings(&self, cik: Cik, opts: Option<FilingOptions>) -> Result<Vec<DetailedFiling>>;
    /// Retrieves the archive listing of one filing.
    async fn filing_directory(&self, cik: Cik, accession_number: &str) -> Result<DirectoryResponse>;
    /// Downloads the XML information table of one 13F filing.
    async fn information_table(
        &self,
        cik: Cik,
        accession_number: &str,
    ) -> Result<InformationTableDocument>;
}

/// Operations for finding the CIK of a company from its name.
#[cfg(feature = "resolver")]
#[async_trait]
pub trait CikOperations {
    /// Retrieves the SEC ticker directory (`company_tickers.json`).
    async fn company_tickers(&self) -> Result<Vec<CompanyTicker>>;
    /// Retrieves the bulk name to CIK listing (`cik-lookup-data.txt`).
    async fn cik_lookup_data(&self) -> Result<Vec<LookupDataEntry>>;
    /// Queries the EDGAR company lookup form. `Ok(None)` when nothing matched.
    async fn lookup_cik(&self, company_name: &str) -> Result<Option<CikMatch>>;
}
