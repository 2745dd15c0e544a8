//! Company name to CIK resolution with a resumable on-disk cache.
//!
//! Names are looked up in three places, cheapest first: the SEC ticker
//! directory, the bulk `cik-lookup-data.txt` listing, and finally the EDGAR
//! company lookup form. Every outcome, including "not found", is recorded in a
//! [`CikCache`], which is saved through a [`Checkpoint`] as work progresses so
//! an interrupted run picks up where it stopped.

use super::SecClient;
use super::error::{Form13fError, Result};
use super::holdings::Cik;
use super::options::ResolverOptions;
use super::traits::CikOperations;
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Cache value recorded for names that no strategy could resolve.
pub const NOT_FOUND: &str = "NOT_FOUND";

/// Legal-form suffixes dropped before names are compared.
const LEGAL_SUFFIXES: &[&str] = &[
    "LLC",
    "LP",
    "INC",
    "INCORPORATED",
    "CORP",
    "CORPORATION",
    "LTD",
    "LIMITED",
];

/// Mapping between stock ticker symbols and company CIKs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompanyTicker {
    #[serde(rename = "cik_str", deserialize_with = "crate::parsing::utils::deserialize_cik_number")]
    pub cik: u64,
    pub ticker: String,
    pub title: String,
}

/// One line of the bulk name to CIK listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupDataEntry {
    pub name: String,
    pub cik: Cik,
}

/// Company returned by a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CikMatch {
    pub cik: Cik,
    pub name: String,
}

#[derive(Debug)]
enum ResolverUrlType {
    CompanyTickers,
    LookupData,
    LookupForm,
}

impl SecClient {
    fn build_resolver_url(&self, url_type: ResolverUrlType) -> String {
        match url_type {
            ResolverUrlType::CompanyTickers => format!("{}/company_tickers.json", self.files_url),
            ResolverUrlType::LookupData => format!("{}/cik-lookup-data.txt", self.archives_url),
            ResolverUrlType::LookupForm => format!("{}/cik_lookup", self.cgi_url),
        }
    }
}

#[async_trait]
impl CikOperations for SecClient {
    async fn company_tickers(&self) -> Result<Vec<CompanyTicker>> {
        let url = self.build_resolver_url(ResolverUrlType::CompanyTickers);
        let response = self.get(&url).await?;
        let map: HashMap<String, CompanyTicker> = serde_json::from_str(&response)?;
        let mut tickers: Vec<CompanyTicker> = map.into_values().collect();
        tickers.sort_by_key(|t| t.cik);
        Ok(tickers)
    }

    async fn cik_lookup_data(&self) -> Result<Vec<LookupDataEntry>> {
        let url = self.build_resolver_url(ResolverUrlType::LookupData);
        let response = self.get(&url).await?;
        Ok(parse_lookup_data(&response))
    }

    async fn lookup_cik(&self, company_name: &str) -> Result<Option<CikMatch>> {
        let url = self.build_resolver_url(ResolverUrlType::LookupForm);
        let html = self.post_form(&url, &[("company", company_name)]).await?;
        Ok(parse_lookup_html(&html))
    }
}

/// Parses `cik-lookup-data.txt`.
///
/// Lines are `NAME:CIK:`; the name itself may contain colons. Tab-separated
/// `CIK<TAB>NAME` lines are accepted as well. Unreadable lines are skipped.
pub fn parse_lookup_data(content: &str) -> Vec<LookupDataEntry> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }

            if let Some((cik, name)) = line.split_once('\t') {
                let cik = cik.parse::<Cik>().ok()?;
                return Some(LookupDataEntry {
                    name: name.trim().to_string(),
                    cik,
                });
            }

            let (name, cik) = line.trim_end_matches(':').rsplit_once(':')?;
            Some(LookupDataEntry {
                name: name.trim().to_string(),
                cik: cik.parse().ok()?,
            })
        })
        .collect()
}

/// Extracts the first match from the HTML returned by the lookup form.
///
/// Results are listed inside `<pre>` blocks as a link to the company page,
/// whose text is the CIK, followed by the company name.
pub fn parse_lookup_html(html: &str) -> Option<CikMatch> {
    let document = Html::parse_document(html);
    let sel_pre = Selector::parse("pre").ok()?;
    let sel_link = Selector::parse("a").ok()?;

    for block in document.select(&sel_pre) {
        let block_text: String = block.text().collect();

        for link in block.select(&sel_link) {
            let href = link.value().attr("href").unwrap_or_default();
            if !href.contains("CIK=") {
                continue;
            }

            let cik_text = link.text().collect::<String>().trim().to_string();
            let Ok(cik) = cik_text.parse::<Cik>() else {
                continue;
            };

            let name = block_text
                .split(cik_text.as_str())
                .nth(1)
                .and_then(|rest| rest.lines().map(str::trim).find(|l| !l.is_empty()))
                .unwrap_or_default()
                .to_string();

            return Some(CikMatch { cik, name });
        }
    }

    None
}

/// Canonical form used to compare company names.
///
/// Upper-cases, spells `&` as `AND`, removes periods and commas and drops
/// legal-form suffixes such as `LLC`, `L.P.` or `INC`.
pub fn normalize_company_name(name: &str) -> String {
    let upper = name.to_uppercase().replace('&', " AND ");
    let cleaned: String = upper.chars().filter(|c| *c != '.' && *c != ',').collect();

    cleaned
        .split_whitespace()
        .filter(|token| !LEGAL_SUFFIXES.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Outcome recorded for one company name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEntry {
    Found(Cik),
    NotFound,
}

/// Resolved names, persisted as `name<TAB>CIK` lines with `NOT_FOUND` for
/// names that could not be resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CikCache {
    entries: BTreeMap<String, CacheEntry>,
}

impl CikCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a cache file; a missing file is an empty cache.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut cache = Self::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let (Some(name), Some(value)) = (record.get(0), record.get(1)) else {
                tracing::warn!("Ignoring cache line {}: expected name and CIK", line + 1);
                continue;
            };
            let name = name.trim();
            let value = value.trim();
            if name.is_empty() {
                continue;
            }

            let entry = if value == NOT_FOUND {
                CacheEntry::NotFound
            } else {
                match value.parse::<Cik>() {
                    Ok(cik) => CacheEntry::Found(cik),
                    Err(e) => {
                        tracing::warn!("Ignoring cache line {}: {}", line + 1, e);
                        continue;
                    }
                }
            };
            cache.entries.insert(name.to_string(), entry);
        }
        Ok(cache)
    }

    pub fn to_tsv(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(Vec::new());

        for (name, entry) in &self.entries {
            let value = match entry {
                CacheEntry::Found(cik) => cik.to_string(),
                CacheEntry::NotFound => NOT_FOUND.to_string(),
            };
            writer.write_record([name.as_str(), value.as_str()])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| Form13fError::FileError(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| Form13fError::InvalidResponse(e.to_string()))
    }

    /// Writes the cache to a sibling temporary file, then renames it over
    /// `path`, so readers never see a half-written cache.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, self.to_tsv()?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<CacheEntry> {
        self.entries.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(name.into(), entry);
    }

    /// Resolved names with their CIKs, in name order.
    pub fn found(&self) -> impl Iterator<Item = (&str, Cik)> {
        self.entries.iter().filter_map(|(name, entry)| match entry {
            CacheEntry::Found(cik) => Some((name.as_str(), *cik)),
            CacheEntry::NotFound => None,
        })
    }

    pub fn not_found_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e, CacheEntry::NotFound))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Distinct resolved CIKs in ascending order.
pub fn extract_valid_ciks(cache: &CikCache) -> Vec<Cik> {
    let mut ciks: Vec<Cik> = cache.found().map(|(_, cik)| cik).collect();
    ciks.sort();
    ciks.dedup();
    ciks
}

/// Save point for resolver progress.
pub trait Checkpoint {
    fn checkpoint(&mut self, cache: &CikCache) -> Result<()>;
}

/// Saves the cache to a file at every checkpoint.
#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Checkpoint for FileCheckpoint {
    fn checkpoint(&mut self, cache: &CikCache) -> Result<()> {
        cache.save(&self.path)?;
        tracing::debug!("Saved {} cache entries to {}", cache.len(), self.path.display());
        Ok(())
    }
}

/// Counts reported by [`CikResolver::resolve_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    /// Names already settled by the cache.
    pub skipped: usize,
    pub found: usize,
    pub not_found: usize,
}

impl ResolveSummary {
    pub fn looked_up(&self) -> usize {
        self.found + self.not_found
    }
}

/// Resolves company names to CIKs through a [`CikOperations`] client.
pub struct CikResolver<'a, C: CikOperations + Sync> {
    client: &'a C,
    options: ResolverOptions,
    tickers: Option<Vec<(String, Cik)>>,
    lookup_data: Option<Vec<(String, Cik)>>,
}

impl<'a, C: CikOperations + Sync> CikResolver<'a, C> {
    pub fn new(client: &'a C, options: ResolverOptions) -> Self {
        Self {
            client,
            options,
            tickers: None,
            lookup_data: None,
        }
    }

    /// Resolves every name not already settled in `cache`.
    ///
    /// A failed lookup is recorded as not found and never aborts the run.
    /// `checkpoint` is called after every `checkpoint_every` lookups and once
    /// more at the end.
    ///
    /// # Errors
    ///
    /// Only checkpoint failures are returned.
    pub async fn resolve_all<I, S>(
        &mut self,
        names: I,
        cache: &mut CikCache,
        checkpoint: &mut dyn Checkpoint,
    ) -> Result<ResolveSummary>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut summary = ResolveSummary::default();
        let every = self.options.checkpoint_every.max(1);

        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }

            match cache.get(name) {
                Some(CacheEntry::Found(_)) => {
                    summary.skipped += 1;
                    continue;
                }
                Some(CacheEntry::NotFound) if !self.options.retry_not_found => {
                    summary.skipped += 1;
                    continue;
                }
                _ => {}
            }

            match self.resolve(name).await {
                Some(cik) => {
                    tracing::info!("Resolved {} -> {}", name, cik);
                    cache.insert(name, CacheEntry::Found(cik));
                    summary.found += 1;
                }
                None => {
                    tracing::info!("No CIK found for {}", name);
                    cache.insert(name, CacheEntry::NotFound);
                    summary.not_found += 1;
                }
            }

            if summary.looked_up() % every == 0 {
                checkpoint.checkpoint(cache)?;
            }
        }

        checkpoint.checkpoint(cache)?;
        Ok(summary)
    }

    /// Tries every enabled strategy in order. Remote failures are logged and
    /// the next strategy is tried.
    pub async fn resolve(&mut self, name: &str) -> Option<Cik> {
        let normalized = normalize_company_name(name);
        if normalized.is_empty() {
            return None;
        }

        if self.options.use_ticker_directory {
            if self.tickers.is_none() {
                self.tickers = Some(match self.client.company_tickers().await {
                    Ok(tickers) => tickers
                        .into_iter()
                        .map(|t| (normalize_company_name(&t.title), Cik::new(t.cik)))
                        .collect(),
                    Err(e) => {
                        tracing::warn!("Ticker directory unavailable: {}", e);
                        Vec::new()
                    }
                });
            }
            if let Some(cik) = self.tickers.as_deref().and_then(|t| best_match(t, &normalized)) {
                return Some(cik);
            }
        }

        if self.options.use_lookup_data {
            if self.lookup_data.is_none() {
                self.lookup_data = Some(match self.client.cik_lookup_data().await {
                    Ok(entries) => entries
                        .into_iter()
                        .map(|e| (normalize_company_name(&e.name), e.cik))
                        .collect(),
                    Err(e) => {
                        tracing::warn!("CIK lookup data unavailable: {}", e);
                        Vec::new()
                    }
                });
            }
            if let Some(cik) = self
                .lookup_data
                .as_deref()
                .and_then(|entries| best_match(entries, &normalized))
            {
                return Some(cik);
            }
        }

        match self.client.lookup_cik(name).await {
            Ok(found) => found.map(|m| m.cik),
            Err(e) => {
                tracing::warn!("CIK lookup failed for {}: {}", name, e);
                None
            }
        }
    }
}

/// Exact match on the normalized name, otherwise the first entry whose name
/// contains it.
fn best_match(entries: &[(String, Cik)], normalized: &str) -> Option<Cik> {
    entries
        .iter()
        .find(|(name, _)| name == normalized)
        .or_else(|| entries.iter().find(|(name, _)| name.contains(normalized)))
        .map(|(_, cik)| *cik)
}
