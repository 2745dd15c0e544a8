//! # form13f - SEC Form 13F-HR holdings, snapshots and portfolio changes
//!
//! Institutional investment managers report their equity holdings to the SEC
//! every quarter on Form 13F-HR. This crate downloads those filings, parses
//! the XML information table into typed [`HoldingRecord`]s, keeps one
//! [`Snapshot`] per filing and compares consecutive snapshots of a fund.
//!
//! ## Features
//!
//! - **Rate-limited HTTP client** - Complies with SEC.gov fair access rules
//! - **Filing operations** (`filings`) - Submissions lookup, 13F filtering and
//!   information table download, plus the sequential [`batch`] runner
//! - **CIK resolution** (`resolver`) - Company name to CIK with a resumable cache
//! - **Analytics** - Position diffs, concentration, turnover and weights
//! - **Reports** - CSV exports and a single-page HTML report
//!
//! ## Basic Usage
//!
//! ```no_run
//! use form13f::diff::{Comparison, latest_diff};
//! use form13f::batch::FundCollector;
//! use form13f::{Cik, FilingOptions, SecClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // SEC.gov requires a user agent identifying the caller
//!     let client = SecClient::new("YourAppName contact@example.com")?;
//!     let cik: Cik = "1067983".parse()?;
//!
//!     let collection = FundCollector::new(&client, FilingOptions::new().with_limit(2))
//!         .collect(cik, None)
//!         .await?;
//!
//!     if let Comparison::Ready(diff) = latest_diff(&collection.history) {
//!         for entry in diff.entries() {
//!             println!("{} {} {}", entry.status, entry.issuer_name, entry.value_change);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
pub mod parsing;

pub mod diff;
pub mod holdings;
pub mod metrics;
pub mod report;
pub mod snapshot;

mod options;

#[cfg(any(feature = "filings", feature = "resolver"))]
mod traits;

#[cfg(feature = "filings")]
pub mod batch;
#[cfg(feature = "filings")]
mod filings;
#[cfg(feature = "resolver")]
pub mod resolver;

// Core functionality (always available)
pub use config::{SecConfig, SecUrls};
pub use core::SecClient;
pub use error::{Form13fError, Result};

pub use diff::{ChangeStatus, Comparison, DiffEntry, SnapshotDiff};
pub use holdings::{Cik, DatePrecision, FilingDate, FilingMetadata, HoldingRecord, IdentityKey, PutCall};
pub use metrics::{PortfolioSummary, TurnoverSeries};
pub use options::{FORM_13F_HR, SummaryOptions};
pub use snapshot::{Snapshot, SnapshotStore};

#[cfg(feature = "filings")]
pub use filings::{
    DetailedFiling, Directory, DirectoryItem, DirectoryResponse, InformationTableDocument, Submission,
};
#[cfg(feature = "filings")]
pub use options::FilingOptions;
#[cfg(feature = "filings")]
pub use traits::FilingOperations;

#[cfg(feature = "resolver")]
pub use options::ResolverOptions;
#[cfg(feature = "resolver")]
pub use resolver::{CikCache, CikResolver, CompanyTicker};
#[cfg(feature = "resolver")]
pub use traits::CikOperations;

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
