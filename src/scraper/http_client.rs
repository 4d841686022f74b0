use async_trait::async_trait;
use reqwest::{header::{HeaderMap, HeaderName, HeaderValue}, Client};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::HttpConfig;
use crate::error::{ScrapeError, ScrapeResult};
use super::fetcher::HeaderBundle;
use super::rate_limiter::RateLimiter;

/// Status and body of a plain page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
}

impl PageResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Source of public page HTML, fetched outside the browser session
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get_page(&self, url: &str) -> ScrapeResult<PageResponse>;
}

#[async_trait]
impl<T: PageSource + ?Sized> PageSource for Arc<T> {
    async fn get_page(&self, url: &str) -> ScrapeResult<PageResponse> {
        (**self).get_page(url).await
    }
}

/// HTTP client wrapper with retry logic and per-host pacing.
///
/// Requests are stateless: no cookie jar, only the static header bundle.
pub struct HttpClient {
    client: Client,
    config: HttpConfig,
    rate_limiter: RateLimiter,
}

impl HttpClient {
    /// Create a client that sends `headers` with every request
    pub fn new(config: &HttpConfig, headers: &HeaderBundle) -> ScrapeResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("Accept", HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"));
        for (name, value) in headers {
            // Authority is an HTTP/2 pseudo header, reqwest derives it from the URL
            if name.eq_ignore_ascii_case("authority") {
                continue;
            }
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(header_name), Ok(header_value)) => {
                    default_headers.insert(header_name, header_value);
                }
                _ => warn!("Skipping invalid header {}", name),
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .default_headers(default_headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ScrapeError::config(format!("Failed to build HTTP client: {}", e)))?;

        info!("HTTP client initialized");

        Ok(Self {
            client,
            config: config.clone(),
            rate_limiter: RateLimiter::new(Duration::from_millis(config.per_host_delay_ms)),
        })
    }

    /// GET with retries on transport errors and 5xx responses.
    ///
    /// Any other non-success status is returned to the caller as-is.
    pub async fn get(&self, url: &str) -> ScrapeResult<PageResponse> {
        let parsed = Url::parse(url)
            .map_err(|e| ScrapeError::network(format!("Invalid URL {}: {}", url, e)))?;
        let host = parsed.host_str().unwrap_or("unknown").to_string();
        let attempts = self.config.max_retries.max(1);

        let mut last_error = None;

        for attempt in 1..=attempts {
            self.rate_limiter.wait_for_host(&host).await;
            debug!("HTTP GET attempt {} for: {}", attempt, url);

            match self.make_request(&parsed).await {
                Ok(response) if response.status >= 500 && attempt < attempts => {
                    warn!("Server error {} for {}, retrying...", response.status, url);
                    last_error = Some(ScrapeError::network(format!("Server error: {}", response.status)));
                }
                Ok(response) => {
                    debug!("HTTP GET {} for: {}", response.status, url);
                    return Ok(response);
                }
                Err(e) => {
                    warn!("HTTP request failed for {} (attempt {}): {}", url, attempt, e);
                    last_error = Some(e);
                }
            }

            if attempt < attempts {
                let delay = Duration::from_secs(self.config.retry_delay_seconds * attempt as u64);
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| ScrapeError::network("All retry attempts failed")))
    }

    async fn make_request(&self, url: &Url) -> ScrapeResult<PageResponse> {
        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(PageResponse { status, body })
    }
}

#[async_trait]
impl PageSource for HttpClient {
    async fn get_page(&self, url: &str) -> ScrapeResult<PageResponse> {
        self.get(url).await
    }
}
