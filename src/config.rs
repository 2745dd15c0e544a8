use std::time::Duration;

/// Configuration for the SEC client
#[derive(Debug, Clone)]
pub struct SecConfig {
    /// User agent string for HTTP requests. SEC.gov rejects anonymous clients.
    pub user_agent: String,
    /// Rate limit in requests per second
    pub rate_limit: u32,
    /// HTTP request timeout
    pub timeout: Duration,
    /// Base URLs for the SEC services used by the crate
    pub base_urls: SecUrls,
}

/// Base URLs for the SEC services used by the crate
#[derive(Debug, Clone)]
pub struct SecUrls {
    /// Base URL for EDGAR archives (filing documents, directory listings)
    pub archives: String,
    /// Base URL for the submissions API
    pub data: String,
    /// Base URL for SEC files (ticker directory)
    pub files: String,
    /// Base URL for the legacy cgi-bin endpoints (CIK lookup form)
    pub cgi: String,
}

impl Default for SecConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("form13f/{}", env!("CARGO_PKG_VERSION")),
            rate_limit: 10,
            timeout: Duration::from_secs(30),
            base_urls: SecUrls::default(),
        }
    }
}

impl SecConfig {
    /// Creates a new SecConfig with custom settings
    ///
    /// # Basic usage
    ///
    /// ```ignore
    /// use form13f::{SecClient, SecConfig};
    /// use std::time::Duration;
    ///
    /// let config = SecConfig::new("Research desk research@example.com", 5, Duration::from_secs(60), None);
    /// let client = SecClient::with_config(config)?;
    /// ```
    pub fn new(
        user_agent: impl Into<String>,
        rate_limit: u32,
        timeout: Duration,
        base_urls: Option<SecUrls>,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            rate_limit,
            timeout,
            base_urls: base_urls.unwrap_or_default(),
        }
    }

    /// Points every service at a single host. Used for mock servers in tests.
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.base_urls = SecUrls {
            archives: format!("{}/Archives/edgar", base),
            data: base.to_string(),
            files: format!("{}/files", base),
            cgi: format!("{}/cgi-bin", base),
        };
        self
    }
}

impl Default for SecUrls {
    fn default() -> Self {
        Self {
            archives: "https://www.sec.gov/Archives/edgar".to_string(),
            data: "https://data.sec.gov".to_string(),
            files: "https://www.sec.gov/files".to_string(),
            cgi: "https://www.sec.gov/cgi-bin".to_string(),
        }
    }
}
