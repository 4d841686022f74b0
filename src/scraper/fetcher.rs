use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::ScrapeResult;

/// Static request headers sent with every API and page request
pub type HeaderBundle = BTreeMap<String, String>;

/// Header bundle mimicking a same-origin XHR from the platform's web app
pub fn api_headers(base_url: &str, user_agent: &str) -> HeaderBundle {
    let origin = format!("{}/", base_url.trim_end_matches('/'));
    let authority = url::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    [
        ("Origin", origin.clone()),
        ("Referer", origin),
        ("Sec-Fetch-Dest", "empty".to_string()),
        ("Sec-Fetch-Mode", "cors".to_string()),
        ("Sec-Fetch-Site", "same-origin".to_string()),
        ("Cache-Control", "no-cache".to_string()),
        ("Pragma", "no-cache".to_string()),
        ("Authority", authority),
        ("User-Agent", user_agent.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Body of a session-proxied fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    /// Body decoded as JSON
    Json(Value),
    /// Body that was not valid JSON, unmodified
    Raw(String),
}

impl FetchResult {
    pub fn from_body(body: String) -> Self {
        match serde_json::from_str(&body) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Raw(body),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }
}

/// Execution context of a live browser page.
///
/// Requests issued through it carry the page's cookies, TLS identity and
/// JS runtime, exactly like the platform's own web app.
#[async_trait]
pub trait PageContext: Send + Sync {
    /// GET `url` from inside the page and return the body text
    async fn fetch_text(&self, url: &str, headers: &HeaderBundle) -> ScrapeResult<String>;
}

/// Issues API calls through a borrowed live session.
///
/// The borrow ties every fetch to the session's lifetime: once the session
/// has been handed to teardown no fetcher can still reference it.
pub struct AuthenticatedFetcher<'s, P: PageContext + ?Sized> {
    session: &'s P,
    headers: HeaderBundle,
}

impl<'s, P: PageContext + ?Sized> AuthenticatedFetcher<'s, P> {
    pub fn new(session: &'s P, headers: HeaderBundle) -> Self {
        Self { session, headers }
    }

    pub async fn fetch(&self, url: &str) -> ScrapeResult<FetchResult> {
        debug!("Session fetch: {}", url);
        let body = self.session.fetch_text(url, &self.headers).await?;
        Ok(FetchResult::from_body(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use std::sync::Mutex;

    struct RecordingPage {
        body: ScrapeResult<String>,
        seen: Mutex<Vec<(String, HeaderBundle)>>,
    }

    #[async_trait]
    impl PageContext for RecordingPage {
        async fn fetch_text(&self, url: &str, headers: &HeaderBundle) -> ScrapeResult<String> {
            self.seen.lock().unwrap().push((url.to_string(), headers.clone()));
            self.body.clone()
        }
    }

    #[tokio::test]
    async fn test_fetch_decodes_json() {
        let page = RecordingPage {
            body: Ok(r#"{"statusCode":0,"itemList":[]}"#.to_string()),
            seen: Mutex::new(Vec::new()),
        };
        let fetcher = AuthenticatedFetcher::new(&page, api_headers("https://www.tiktok.com", "UA"));

        let result = fetcher.fetch("https://www.tiktok.com/api/x/").await.unwrap();
        assert_eq!(result.as_json().unwrap()["statusCode"], 0);

        let seen = page.seen.lock().unwrap();
        assert_eq!(seen[0].0, "https://www.tiktok.com/api/x/");
        assert_eq!(seen[0].1.get("Authority").map(String::as_str), Some("www.tiktok.com"));
    }

    #[tokio::test]
    async fn test_fetch_keeps_raw_text() {
        let page = RecordingPage {
            body: Ok("<html>blocked</html>".to_string()),
            seen: Mutex::new(Vec::new()),
        };
        let fetcher = AuthenticatedFetcher::new(&page, HeaderBundle::new());

        let result = fetcher.fetch("https://www.tiktok.com/api/x/").await.unwrap();
        assert_eq!(result, FetchResult::Raw("<html>blocked</html>".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let page = RecordingPage {
            body: Err(ScrapeError::session_fetch("https://www.tiktok.com/api/x/", "Failed to fetch")),
            seen: Mutex::new(Vec::new()),
        };
        let fetcher = AuthenticatedFetcher::new(&page, HeaderBundle::new());

        let err = fetcher.fetch("https://www.tiktok.com/api/x/").await.unwrap_err();
        assert!(matches!(err, ScrapeError::SessionFetch { .. }));
    }

    #[test]
    fn test_api_headers() {
        let headers = api_headers("https://www.tiktok.com", "Mozilla/5.0");
        assert_eq!(headers.get("Origin").map(String::as_str), Some("https://www.tiktok.com/"));
        assert_eq!(headers.get("User-Agent").map(String::as_str), Some("Mozilla/5.0"));
        assert_eq!(headers.len(), 9);
    }
}
