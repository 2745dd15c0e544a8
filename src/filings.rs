use super::SecClient;
use super::error::{Form13fError, Result};
use super::holdings::{Cik, FilingMetadata};
use super::options::FilingOptions;
use super::traits::FilingOperations;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;

/// File names tried, in order, before falling back to the filing directory.
const INFORMATION_TABLE_CANDIDATES: &[&str] = &["form13fInfoTable.xml", "infotable.xml"];

/// Cover page of a 13F filing; never contains holdings.
const PRIMARY_DOCUMENT: &str = "primary_doc.xml";

#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub cik: String,
    pub name: String,
    #[serde(rename = "entityType", default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub tickers: Vec<String>,
    pub filings: FilingsData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilingsData {
    pub recent: RecentFilings,
    #[serde(default)]
    pub files: Vec<FilingFile>,
}

/// Older filings are paginated into separate files by the submissions API.
#[derive(Debug, Clone, Deserialize)]
pub struct FilingFile {
    pub name: String,
    #[serde(rename = "filingCount")]
    pub filing_count: u64,
    #[serde(rename = "filingFrom")]
    pub filing_from: String,
    #[serde(rename = "filingTo")]
    pub filing_to: String,
}

/// Column-oriented listing of recent filings: index `i` of every vector
/// describes the same filing.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentFilings {
    #[serde(rename = "accessionNumber")]
    pub accession_number: Vec<String>,
    #[serde(rename = "filingDate")]
    pub filing_date: Vec<String>,
    #[serde(rename = "reportDate")]
    pub report_date: Option<Vec<String>>,
    #[serde(rename = "acceptanceDateTime")]
    pub acceptance_date_time: Option<Vec<String>>,
    pub form: Vec<String>,
    #[serde(rename = "fileNumber")]
    pub file_number: Option<Vec<String>>,
    pub size: Option<Vec<u64>>,
    #[serde(rename = "primaryDocument")]
    pub primary_document: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct DetailedFiling {
    pub accession_number: String,
    pub filing_date: NaiveDate,
    pub report_date: Option<String>,
    pub acceptance_date_time: Option<DateTime<FixedOffset>>,
    pub form: String,
    pub file_number: Option<String>,
    pub size: u64,
    pub primary_document: Option<String>,
}

impl DetailedFiling {
    pub fn metadata(&self) -> FilingMetadata {
        FilingMetadata {
            accession_number: self.accession_number.clone(),
            filing_date: self.filing_date,
            report_date: self.report_date.clone(),
            form: self.form.clone(),
            file_number: self.file_number.clone(),
            size: self.size,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryResponse {
    pub directory: Directory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Directory {
    pub item: Vec<DirectoryItem>,
    pub name: String,
    #[serde(rename = "parent-dir", default)]
    pub parent_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryItem {
    #[serde(rename = "last-modified", default)]
    pub last_modified: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub size: String,
}

/// Raw information table as downloaded from the archives.
#[derive(Debug, Clone)]
pub struct InformationTableDocument {
    pub url: String,
    pub file_name: String,
    pub content: Vec<u8>,
}

impl RecentFilings {
    fn get_vec_item_at<T: Clone>(&self, vec_opt: &Option<Vec<T>>, idx: usize) -> Option<T> {
        vec_opt.as_ref().and_then(|v| v.get(idx).cloned())
    }

    pub fn len(&self) -> usize {
        self.accession_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accession_number.is_empty()
    }
}

impl TryFrom<(&RecentFilings, usize)> for DetailedFiling {
    type Error = Form13fError;

    fn try_from((recent, idx): (&RecentFilings, usize)) -> Result<Self> {
        let column = |values: &Vec<String>, name: &str| -> Result<String> {
            values.get(idx).cloned().ok_or_else(|| {
                Form13fError::InvalidResponse(format!("Missing {} for filing {}", name, idx))
            })
        };

        let accession_number = column(&recent.accession_number, "accessionNumber")?;
        let filing_date_text = column(&recent.filing_date, "filingDate")?;
        let filing_date = NaiveDate::parse_from_str(&filing_date_text, "%Y-%m-%d").map_err(|e| {
            Form13fError::InvalidResponse(format!(
                "Invalid filing date '{}' for {}: {}",
                filing_date_text, accession_number, e
            ))
        })?;

        let acceptance_date_time = recent
            .get_vec_item_at(&recent.acceptance_date_time, idx)
            .and_then(|text| DateTime::parse_from_rfc3339(&text).ok());

        Ok(DetailedFiling {
            form: column(&recent.form, "form")?,
            accession_number,
            filing_date,
            report_date: recent
                .get_vec_item_at(&recent.report_date, idx)
                .filter(|d| !d.is_empty()),
            acceptance_date_time,
            file_number: recent.get_vec_item_at(&recent.file_number, idx),
            size: recent.get_vec_item_at(&recent.size, idx).unwrap_or(0),
            primary_document: recent.get_vec_item_at(&recent.primary_document, idx),
        })
    }
}

#[derive(Debug)]
enum UrlType {
    Submission,
    FilingDirectory,
    FilingContent,
}

impl SecClient {
    fn build_url(&self, url_type: UrlType, cik: Cik, params: &[&str]) -> String {
        match url_type {
            UrlType::Submission => {
                format!("{}/submissions/CIK{}.json", self.data_url, cik)
            }
            UrlType::FilingDirectory => {
                let formatted_acc = params[0].replace('-', "");
                format!(
                    "{}/data/{}/{}/index.json",
                    self.archives_url,
                    cik.unpadded(),
                    formatted_acc
                )
            }
            UrlType::FilingContent => {
                let (acc_no, filename) = (params[0], params[1]);
                let formatted_acc = acc_no.replace('-', "");
                format!(
                    "{}/data/{}/{}/{}",
                    self.archives_url,
                    cik.unpadded(),
                    formatted_acc,
                    filename
                )
            }
        }
    }

    /// Downloads `file_name` from a filing and keeps it only if it holds
    /// `infoTable` entries.
    async fn try_information_table(
        &self,
        cik: Cik,
        accession_number: &str,
        file_name: &str,
    ) -> Result<Option<InformationTableDocument>> {
        let url = self.build_url(UrlType::FilingContent, cik, &[accession_number, file_name]);
        match self.get_bytes(&url).await {
            Ok(content) if looks_like_information_table(&content) => {
                Ok(Some(InformationTableDocument {
                    url,
                    file_name: file_name.to_string(),
                    content,
                }))
            }
            Ok(_) => {
                tracing::debug!("{} is not an information table", url);
                Ok(None)
            }
            Err(Form13fError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn looks_like_information_table(content: &[u8]) -> bool {
    content.windows(b"infoTable".len()).any(|w| w == b"infoTable")
}

/// Implementation of filing operations against the submissions API and the
/// EDGAR archives.
///
/// # Examples
///
/// ```no_run
/// # use form13f::{Cik, SecClient, FilingOperations, FilingOptions};
/// # async fn example() -> form13f::Result<()> {
/// let client = SecClient::new("research_app/1.0 (research@example.com)")?;
/// let cik: Cik = "1067983".parse()?;
///
/// let filings = client.filings(cik, Some(FilingOptions::new().with_limit(4))).await?;
/// for filing in &filings {
///     let table = client.information_table(cik, &filing.accession_number).await?;
///     println!("{} -> {}", filing.accession_number, table.url);
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// - `Form13fError::NotFound`: the filer, filing or document does not exist
/// - `Form13fError::InvalidResponse`: the response data is malformed
/// - Network-related errors during HTTP requests
#[async_trait]
impl FilingOperations for SecClient {
    async fn submissions(&self, cik: Cik) -> Result<Submission> {
        let url = self.build_url(UrlType::Submission, cik, &[]);
        let response = self.get(&url).await?;
        Ok(serde_json::from_str::<Submission>(&response)?)
    }

    /// Filings whose columns cannot be read are logged and left out.
    async fn recent_filings(&self, cik: Cik) -> Result<Vec<DetailedFiling>> {
        let submission = self.submissions(cik).await?;
        let recent = &submission.filings.recent;
        let mut detailed_filings = Vec::with_capacity(recent.len());

        for idx in 0..recent.len() {
            match DetailedFiling::try_from((recent, idx)) {
                Ok(filing) => detailed_filings.push(filing),
                Err(err) => tracing::warn!("Skipping filing {} of {}: {}", idx, cik, err),
            }
        }

        Ok(detailed_filings)
    }

    /// Retrieves recent filings and applies the filters of `opts`.
    ///
    /// Without options the defaults apply: 13F-HR only, no amendments, filed
    /// within the last seven years.
    async fn filings(&self, cik: Cik, opts: Option<FilingOptions>) -> Result<Vec<DetailedFiling>> {
        let opts = opts.unwrap_or_default();
        let mut all_filings = self.recent_filings(cik).await?;

        all_filings.retain(|filing| opts.matches_form(&filing.form));

        if let Some(cutoff) = opts.cutoff(chrono::Utc::now().date_naive()) {
            all_filings.retain(|filing| filing.filing_date >= cutoff);
        }

        if let Some(offset) = opts.offset {
            all_filings = all_filings.into_iter().skip(offset).collect();
        }

        if let Some(limit) = opts.limit {
            all_filings.truncate(limit);
        }

        Ok(all_filings)
    }

    async fn filing_directory(&self, cik: Cik, accession_number: &str) -> Result<DirectoryResponse> {
        let url = self.build_url(UrlType::FilingDirectory, cik, &[accession_number]);
        let response = self.get(&url).await?;
        Ok(serde_json::from_str::<DirectoryResponse>(&response)?)
    }

    /// Locates and downloads the information table of a filing.
    ///
    /// The conventional file names are tried first. Filers are free to name the
    /// attachment as they like, so the filing directory is listed next and
    /// every other XML document in it is tried, the cover page excepted.
    ///
    /// # Errors
    ///
    /// Returns `Form13fError::NotFound` if no document in the filing contains
    /// `infoTable` entries.
    async fn information_table(
        &self,
        cik: Cik,
        accession_number: &str,
    ) -> Result<InformationTableDocument> {
        for candidate in INFORMATION_TABLE_CANDIDATES {
            if let Some(document) = self
                .try_information_table(cik, accession_number, candidate)
                .await?
            {
                return Ok(document);
            }
        }

        let directory = self.filing_directory(cik, accession_number).await?;
        let others = directory.directory.item.iter().filter(|item| {
            let name = item.name.to_ascii_lowercase();
            name.ends_with(".xml")
                && name != PRIMARY_DOCUMENT
                && !INFORMATION_TABLE_CANDIDATES
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(&item.name))
        });

        for item in others {
            if let Some(document) = self
                .try_information_table(cik, accession_number, &item.name)
                .await?
            {
                return Ok(document);
            }
        }

        tracing::warn!("No information table found in {} ({})", accession_number, cik);
        Err(Form13fError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recent() -> RecentFilings {
        RecentFilings {
            accession_number: vec!["0001067983-24-000006".into(), "0001067983-24-000002".into()],
            filing_date: vec!["2024-05-15".into(), "not a date".into()],
            report_date: Some(vec!["2024-03-31".into(), "".into()]),
            acceptance_date_time: Some(vec!["2024-05-15T16:02:11.000Z".into()]),
            form: vec!["13F-HR".into(), "13F-HR".into()],
            file_number: None,
            size: Some(vec![1234, 99]),
            primary_document: None,
        }
    }

    #[test]
    fn detailed_filing_conversion() {
        let recent = recent();
        let filing = DetailedFiling::try_from((&recent, 0)).unwrap();

        assert_eq!(filing.accession_number, "0001067983-24-000006");
        assert_eq!(filing.filing_date, NaiveDate::from_ymd_opt(2024, 5, 15).unwrap());
        assert_eq!(filing.report_date.as_deref(), Some("2024-03-31"));
        assert!(filing.acceptance_date_time.is_some());
        assert_eq!(filing.size, 1234);

        let metadata = filing.metadata();
        assert_eq!(metadata.form, "13F-HR");
        assert_eq!(metadata.file_number, None);
    }

    #[test]
    fn invalid_filing_date_is_rejected() {
        let recent = recent();
        assert!(matches!(
            DetailedFiling::try_from((&recent, 1)),
            Err(Form13fError::InvalidResponse(_))
        ));
        assert!(DetailedFiling::try_from((&recent, 5)).is_err());
    }

    #[test]
    fn urls_use_padded_and_unpadded_ciks() {
        let client = SecClient::new("form13f tests tests@example.com").unwrap();
        let cik = Cik::new(1067983);

        assert_eq!(
            client.build_url(UrlType::Submission, cik, &[]),
            "https://data.sec.gov/submissions/CIK0001067983.json"
        );
        assert_eq!(
            client.build_url(UrlType::FilingDirectory, cik, &["0000950123-24-005678"]),
            "https://www.sec.gov/Archives/edgar/data/1067983/000095012324005678/index.json"
        );
        assert_eq!(
            client.build_url(
                UrlType::FilingContent,
                cik,
                &["0000950123-24-005678", "form13fInfoTable.xml"]
            ),
            "https://www.sec.gov/Archives/edgar/data/1067983/000095012324005678/form13fInfoTable.xml"
        );
    }

    #[test]
    fn sniffing_rejects_rendered_html() {
        assert!(looks_like_information_table(b"<ns1:infoTable>"));
        assert!(!looks_like_information_table(b"<html><body>FORM 13F</body></html>"));
    }
}
