//! Holding records and the identifiers they are keyed by.
//!
//! A [`HoldingRecord`] is one row of a 13F information table. Records are
//! matched across filings by their [`IdentityKey`]: the CUSIP when the filer
//! reported one, otherwise the normalized issuer name.

use crate::error::{Form13fError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// SEC Central Index Key.
///
/// Displayed zero-padded to ten digits, the form used by the submissions API
/// and by the CIK list files. Archive paths use the unpadded form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cik(u64);

impl Cik {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    /// `1291422` rather than `0001291422`.
    pub fn unpadded(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for Cik {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0>10}", self.0)
    }
}

impl FromStr for Cik {
    type Err = Form13fError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("CIK")
            .or_else(|| trimmed.strip_prefix("cik"))
            .unwrap_or(trimmed);

        if digits.is_empty() || digits.len() > 10 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(Form13fError::InvalidCik(s.to_string()));
        }

        digits
            .parse::<u64>()
            .map(Cik)
            .map_err(|_| Form13fError::InvalidCik(s.to_string()))
    }
}

impl TryFrom<String> for Cik {
    type Error = Form13fError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Cik> for String {
    fn from(cik: Cik) -> Self {
        cik.to_string()
    }
}

/// Option flag of a reported position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PutCall {
    Put,
    Call,
}

impl PutCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            PutCall::Put => "Put",
            PutCall::Call => "Call",
        }
    }

    /// Case-insensitive; empty or unknown text means "no option flag".
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "put" => Some(PutCall::Put),
            "call" => Some(PutCall::Call),
            _ => None,
        }
    }
}

impl fmt::Display for PutCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported position in one filing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub issuer_name: String,
    pub cusip: String,
    pub security_class: String,
    /// Reported market value in thousands of dollars.
    pub value_thousands: u64,
    /// Share count, or principal amount when `share_type` is `PRN`.
    pub shares: u64,
    pub share_type: String,
    pub investment_discretion: String,
    pub voting_sole: u64,
    pub voting_shared: u64,
    pub voting_none: u64,
    pub put_call: Option<PutCall>,
    pub other_manager: Option<String>,
}

impl HoldingRecord {
    /// Record with the required columns set and everything else empty.
    pub fn new(
        issuer_name: impl Into<String>,
        cusip: impl Into<String>,
        value_thousands: u64,
        shares: u64,
    ) -> Self {
        Self {
            issuer_name: issuer_name.into(),
            cusip: cusip.into(),
            security_class: String::new(),
            value_thousands,
            shares,
            share_type: "SH".to_string(),
            investment_discretion: String::new(),
            voting_sole: 0,
            voting_shared: 0,
            voting_none: 0,
            put_call: None,
            other_manager: None,
        }
    }

    pub fn with_security_class(mut self, security_class: impl Into<String>) -> Self {
        self.security_class = security_class.into();
        self
    }

    /// `None` when the record carries neither a CUSIP nor an issuer name.
    pub fn identity_key(&self) -> Option<IdentityKey> {
        IdentityKey::for_record(self)
    }
}

/// Key used to match positions across snapshots.
///
/// CUSIP is authoritative. The issuer name is only used when the CUSIP is
/// missing, so a renamed issuer with a stable CUSIP stays the same position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityKey {
    Cusip(String),
    Name(String),
}

impl IdentityKey {
    pub fn for_record(record: &HoldingRecord) -> Option<Self> {
        let cusip = record.cusip.trim();
        if !cusip.is_empty() {
            return Some(IdentityKey::Cusip(cusip.to_ascii_uppercase()));
        }

        let name = crate::parsing::utils::normalize_whitespace(&record.issuer_name);
        if !name.is_empty() {
            return Some(IdentityKey::Name(name.to_uppercase()));
        }

        None
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Cusip(cusip) => write!(f, "cusip:{}", cusip),
            IdentityKey::Name(name) => write!(f, "name:{}", name),
        }
    }
}

/// How precisely a [`FilingDate`] is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DatePrecision {
    /// Only the year is known; the date is January 1 of that year.
    Year,
    Day,
}

/// Date a filing was made, with its precision.
///
/// Filing metadata gives the exact day. When only the accession number is
/// available (`0001291422-23-000004`), the two-digit year is all there is and
/// the date degrades to January 1 of that year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilingDate {
    date: NaiveDate,
    precision: DatePrecision,
}

impl FilingDate {
    pub const fn exact(date: NaiveDate) -> Self {
        Self {
            date,
            precision: DatePrecision::Day,
        }
    }

    /// Parses `YYYY-MM-DD` as found in the submissions API and metadata exports.
    pub fn parse_exact(text: &str) -> Result<Self> {
        NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
            .map(Self::exact)
            .map_err(|e| Form13fError::InvalidResponse(format!("Invalid filing date '{}': {}", text, e)))
    }

    /// Year-only date from the middle segment of an accession number.
    ///
    /// EDGAR accession numbers started in the 1990s, so two-digit years from 90
    /// upwards belong to the 1900s.
    pub fn from_accession_number(accession_number: &str) -> Option<Self> {
        let year_part = accession_number.split('-').nth(1)?;
        if year_part.len() != 2 {
            return None;
        }
        let yy: i32 = year_part.parse().ok()?;
        let year = if yy >= 90 { 1900 + yy } else { 2000 + yy };
        let date = NaiveDate::from_ymd_opt(year, 1, 1)?;
        Some(Self {
            date,
            precision: DatePrecision::Year,
        })
    }

    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    pub const fn precision(&self) -> DatePrecision {
        self.precision
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

impl fmt::Display for FilingDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            DatePrecision::Day => write!(f, "{}", self.date.format("%Y-%m-%d")),
            DatePrecision::Year => write!(f, "{}", self.date.year()),
        }
    }
}

impl PartialOrd for FilingDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FilingDate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then(self.precision.cmp(&other.precision))
    }
}

/// Accepts both display forms: `YYYY-MM-DD` and a bare `YYYY`.
impl FromStr for FilingDate {
    type Err = Form13fError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
            let date = trimmed
                .parse::<i32>()
                .ok()
                .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
                .ok_or_else(|| Form13fError::InvalidResponse(format!("Invalid filing year '{}'", s)))?;
            return Ok(Self {
                date,
                precision: DatePrecision::Year,
            });
        }
        Self::parse_exact(trimmed)
    }
}

/// Descriptive fields of one filing, as exported next to the raw documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingMetadata {
    #[serde(rename = "accessionNumber")]
    pub accession_number: String,
    #[serde(rename = "filingDate")]
    pub filing_date: NaiveDate,
    #[serde(rename = "reportDate", default)]
    pub report_date: Option<String>,
    pub form: String,
    #[serde(rename = "fileNumber", default)]
    pub file_number: Option<String>,
    #[serde(default)]
    pub size: u64,
}

impl FilingMetadata {
    pub fn filing_date(&self) -> FilingDate {
        FilingDate::exact(self.filing_date)
    }
}
