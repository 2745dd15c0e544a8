use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState,
    state::NotKeyed,
};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::config::{SecConfig, SecUrls};
use super::error::{Form13fError, Result};

const MAX_RETRIES: u32 = 5;
const INITIAL_BACKOFF_MS: u64 = 1000; // 1 second

type Governor = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// HTTP client for the SEC endpoints used by the 13F pipeline.
///
/// Every request waits on a shared token bucket before it is sent, so a single
/// client can be cloned across the fetcher and the CIK resolver without either
/// of them exceeding SEC.gov's fair access limit (10 requests per second).
///
/// ```text
/// Token Bucket (capacity: rate_limit tokens)
/// ┌──────────────────────────┐
/// │ ████████████████████████ │  ← Tokens refill at rate_limit/sec
/// └──────────────────────────┘
///      ↓ consume on request
/// ```
///
/// Responses with HTTP 429 and transport failures are retried up to five times
/// with exponential backoff and jitter. HTTP 404 maps to
/// [`Form13fError::NotFound`], any other non-200 status to
/// [`Form13fError::InvalidResponse`] with a preview of the body.
///
/// # Examples
///
/// ```rust
/// # use form13f::SecClient;
/// let client = SecClient::new("my_app/1.0 (my@email.com)")?;
/// # Ok::<(), form13f::Form13fError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SecClient {
    /// HTTP client for making requests
    pub(crate) client: reqwest::Client,

    /// Token bucket rate limiter for SEC compliance
    pub(crate) rate_limiter: Arc<Governor>,

    pub(crate) archives_url: String,
    pub(crate) data_url: String,
    pub(crate) files_url: String,
    pub(crate) cgi_url: String,
}

impl SecClient {
    /// Creates a new client with the default rate limit (10 req/s), a 30 second
    /// timeout and the public SEC.gov base URLs.
    ///
    /// # Arguments
    ///
    /// * `user_agent` - Identifies your application to the SEC, in the form
    ///   "AppName/Version (contact@email.com)".
    pub fn new(user_agent: &str) -> Result<Self> {
        let config = SecConfig {
            user_agent: user_agent.to_string(),
            rate_limit: 10,
            timeout: Duration::from_secs(30),
            base_urls: SecUrls::default(),
        };
        Self::with_config(config)
    }

    /// Creates a client from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns `Form13fError::ConfigError` if the user agent is not a valid header
    /// value, the rate limit is zero, or the HTTP client cannot be built.
    pub fn with_config(config: SecConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| Form13fError::ConfigError(format!("Invalid user agent: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                Form13fError::ConfigError(format!("Failed to build HTTP client: {}", e))
            })?;

        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(config.rate_limit).ok_or_else(|| {
                Form13fError::ConfigError("Rate limit must be greater than zero".to_string())
            })?,
        )));

        Ok(SecClient {
            client,
            rate_limiter,
            archives_url: config.base_urls.archives,
            data_url: config.base_urls.data,
            files_url: config.base_urls.files,
            cgi_url: config.base_urls.cgi,
        })
    }

    /// Exponential backoff with ±20% jitter: `(2^retry × 1000ms) ± 20%`.
    fn calculate_backoff(retry: u32) -> Duration {
        let backoff_ms = INITIAL_BACKOFF_MS * (2_u64.pow(retry));
        let jitter = (backoff_ms as f64 * 0.2 * (fastrand::f64() - 0.5)) as i64;
        Duration::from_millis((backoff_ms as i64 + jitter) as u64)
    }

    /// Sends the request produced by `build` until it succeeds, fails permanently,
    /// or the retry budget is spent.
    async fn send<F>(&self, url: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder + Send,
    {
        let mut retries = 0;

        loop {
            self.rate_limiter.until_ready().await;

            match build().send().await {
                Ok(response) => match response.status() {
                    StatusCode::OK => return Ok(response),
                    StatusCode::NOT_FOUND => return Err(Form13fError::NotFound),
                    StatusCode::TOO_MANY_REQUESTS => {
                        if retries >= MAX_RETRIES {
                            return Err(Form13fError::RateLimitExceeded);
                        }

                        let wait = response
                            .headers()
                            .get("retry-after")
                            .and_then(|h| h.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .map(Duration::from_secs)
                            .unwrap_or_else(|| Self::calculate_backoff(retries));

                        tracing::warn!(
                            "Rate limit hit (429) for {}. Attempt {}/{}. Waiting for {:?} before retry.",
                            url,
                            retries + 1,
                            MAX_RETRIES + 1,
                            wait
                        );
                        sleep(wait).await;
                        retries += 1;
                    }
                    other_status => {
                        let error_body = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Failed to read error body".to_string());

                        return Err(Form13fError::InvalidResponse(format!(
                            "Unexpected status code: {} for URL: {}. Response preview: {}",
                            other_status,
                            url,
                            error_body.chars().take(200).collect::<String>()
                        )));
                    }
                },
                Err(e) => {
                    if retries >= MAX_RETRIES {
                        return Err(Form13fError::RequestError(e));
                    }
                    let wait = Self::calculate_backoff(retries);
                    tracing::warn!(
                        "Request failed for {}: {:?}. Attempt {}/{}. Retrying in {:?}.",
                        url,
                        e,
                        retries + 1,
                        MAX_RETRIES + 1,
                        wait
                    );
                    sleep(wait).await;
                    retries += 1;
                }
            }
        }
    }

    /// Fetches raw bytes, used for information table documents whose encoding
    /// is declared inside the XML prolog.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send(url, || self.client.get(url)).await?;
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(Form13fError::RequestError)
    }

    /// Fetches text content from a URL.
    ///
    /// For `.json` URLs the SEC occasionally answers with an HTML error page and a
    /// 200 status. A `text/html` body that does not look like JSON is reported as
    /// [`Form13fError::UnexpectedContentType`] instead of failing later in serde.
    pub async fn get(&self, url: &str) -> Result<String> {
        let response = self.send(url, || self.client.get(url)).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|val| val.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(Form13fError::RequestError)?;

        if url.ends_with(".json") {
            if let Some(ct) = content_type.filter(|ct| ct.to_lowercase().contains("text/html")) {
                let trimmed = body.trim_start();
                if trimmed.starts_with('{') || trimmed.starts_with('[') {
                    tracing::warn!(
                        "Received text/html content-type for .json URL, but content appears to be JSON: {}",
                        url
                    );
                    return Ok(body);
                }
                return Err(Form13fError::UnexpectedContentType {
                    url: url.to_string(),
                    expected_pattern: "application/json".to_string(),
                    got_content_type: ct,
                    content_preview: body.chars().take(200).collect(),
                });
            }
        }

        Ok(body)
    }

    /// Posts an url-encoded form and returns the response text.
    #[cfg(feature = "resolver")]
    pub async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String> {
        let body = serde_urlencoded::to_string(form)
            .map_err(|e| Form13fError::InvalidResponse(e.to_string()))?;

        let response = self
            .send(url, || {
                self.client
                    .post(url)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(body.clone())
            })
            .await?;

        response.text().await.map_err(Form13fError::RequestError)
    }

    /// Base URL for EDGAR archives.
    pub fn archives_url(&self) -> &str {
        &self.archives_url
    }

    /// Base URL for the submissions API.
    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    /// Base URL for SEC files.
    pub fn files_url(&self) -> &str {
        &self.files_url
    }

    /// Base URL for the cgi-bin endpoints.
    pub fn cgi_url(&self) -> &str {
        &self.cgi_url
    }
}
