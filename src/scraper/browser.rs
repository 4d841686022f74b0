#[cfg(feature = "browser")]
use async_trait::async_trait;
#[cfg(feature = "browser")]
use playwright::{api::{Browser, BrowserContext, DocumentLoadState, Page, Viewport}, Playwright};
#[cfg(feature = "browser")]
use serde::Serialize;
#[cfg(feature = "browser")]
use std::collections::BTreeMap;
#[cfg(feature = "browser")]
use std::future::Future;
#[cfg(feature = "browser")]
use std::time::Duration;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use crate::config::{BrowserConfig, ScraperConfig};
#[cfg(feature = "browser")]
use crate::error::{ScrapeError, ScrapeResult};
#[cfg(feature = "browser")]
use super::fetcher::{HeaderBundle, PageContext};
#[cfg(feature = "browser")]
use super::fingerprint::{Fingerprint, FINGERPRINT_PROBE};
#[cfg(feature = "browser")]
use super::session::{LiveSession, SessionLauncher};

/// Runs a GET from inside the page so the request carries the page's own
/// cookies and client identity
#[cfg(feature = "browser")]
const SESSION_FETCH_SCRIPT: &str = r#"async ({ url, headers }) => {
    const response = await fetch(url, { method: 'GET', headers });
    return await response.text();
}"#;

#[cfg(feature = "browser")]
#[derive(Serialize)]
struct FetchArgs<'a> {
    url: &'a str,
    headers: &'a HeaderBundle,
}

/// Launches Playwright-driven Chromium sessions
#[cfg(feature = "browser")]
pub struct PlaywrightLauncher {
    browser: BrowserConfig,
    scraper: ScraperConfig,
}

#[cfg(feature = "browser")]
impl PlaywrightLauncher {
    pub fn new(browser: &BrowserConfig, scraper: &ScraperConfig) -> Self {
        Self {
            browser: browser.clone(),
            scraper: scraper.clone(),
        }
    }

    fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.browser.navigation_timeout_seconds)
    }

    fn launch_args(&self) -> Vec<String> {
        let mut args = vec![format!("--user-agent={}", self.scraper.user_agent)];
        args.extend(self.browser.extra_args.iter().cloned());
        args
    }

    async fn open_page(&self, browser: &Browser) -> ScrapeResult<(BrowserContext, Page)> {
        let device = &self.browser.device;
        debug!("Emulating device {}", device.name);

        let context = bounded(
            self.navigation_timeout(),
            "browser context",
            browser
                .context_builder()
                .user_agent(&self.scraper.user_agent)
                .viewport(Some(Viewport {
                    width: device.viewport_width,
                    height: device.viewport_height,
                }))
                .device_scale_factor(device.device_scale_factor)
                .is_mobile(device.is_mobile)
                .has_touch(device.has_touch)
                .bypass_csp(true)
                .locale(&self.scraper.locale)
                .timezone_id(&self.scraper.timezone)
                .build(),
        )
        .await?;

        let page = bounded(self.navigation_timeout(), "new page", context.new_page()).await?;

        Ok((context, page))
    }

    async fn bootstrap(&self, browser: &Browser) -> ScrapeResult<(BrowserContext, Page, Fingerprint, BTreeMap<String, String>)> {
        let (context, page) = self.open_page(browser).await?;

        info!("Navigating to seed page {}", self.scraper.seed_url);
        bounded(
            self.navigation_timeout(),
            "seed navigation",
            page.goto_builder(&self.scraper.seed_url)
                .wait_until(DocumentLoadState::NetworkIdle)
                .goto(),
        )
        .await?;

        let probe: serde_json::Value = bounded(
            Duration::from_secs(self.browser.evaluate_timeout_seconds),
            "fingerprint probe",
            page.evaluate::<(), serde_json::Value>(FINGERPRINT_PROBE, ()),
        )
        .await?;
        let fingerprint = Fingerprint::from_probe(probe)?;

        let cookies = bounded(self.navigation_timeout(), "cookie capture", context.cookies(&[]))
            .await?
            .into_iter()
            .map(|cookie| (cookie.name, cookie.value))
            .collect();

        Ok((context, page, fingerprint, cookies))
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl SessionLauncher for PlaywrightLauncher {
    type Session = BrowserSession;

    async fn launch(&self) -> ScrapeResult<(Fingerprint, BrowserSession)> {
        info!("Starting browser instance");

        let playwright = bounded(self.navigation_timeout(), "Playwright driver start", Playwright::initialize()).await?;

        if self.browser.install_browsers {
            playwright
                .prepare()
                .map_err(|e| ScrapeError::bootstrap(format!("Failed to install browsers: {}", e)))?;
        }

        let browser = bounded(
            self.navigation_timeout(),
            "browser launch",
            playwright
                .chromium()
                .launcher()
                .headless(self.browser.headless)
                .args(&self.launch_args())
                .launch(),
        )
        .await?;

        match self.bootstrap(&browser).await {
            Ok((context, page, fingerprint, cookies)) => {
                info!("Browser ready as {} ({}x{})", fingerprint.platform, fingerprint.screen_width, fingerprint.screen_height);
                let session = BrowserSession {
                    _playwright: playwright,
                    browser,
                    _context: context,
                    page,
                    cookies,
                    evaluate_timeout: Duration::from_secs(self.browser.evaluate_timeout_seconds),
                    close_timeout: self.navigation_timeout(),
                };
                Ok((fingerprint, session))
            }
            Err(e) => {
                if let Err(close_err) = close_browser(&browser, self.navigation_timeout()).await {
                    warn!("Failed to close browser after bootstrap error: {}", close_err);
                }
                Err(e)
            }
        }
    }
}

/// Live Playwright page plus the objects keeping it alive
#[cfg(feature = "browser")]
pub struct BrowserSession {
    _playwright: Playwright,
    browser: Browser,
    _context: BrowserContext,
    page: Page,
    cookies: BTreeMap<String, String>,
    evaluate_timeout: Duration,
    close_timeout: Duration,
}

// Ensure BrowserSession is Send + Sync
#[cfg(feature = "browser")]
unsafe impl Send for BrowserSession {}
#[cfg(feature = "browser")]
unsafe impl Sync for BrowserSession {}

#[cfg(feature = "browser")]
#[async_trait]
impl PageContext for BrowserSession {
    async fn fetch_text(&self, url: &str, headers: &HeaderBundle) -> ScrapeResult<String> {
        let args = FetchArgs { url, headers };
        match tokio::time::timeout(
            self.evaluate_timeout,
            self.page.evaluate::<FetchArgs<'_>, String>(SESSION_FETCH_SCRIPT, args),
        )
        .await
        {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(e)) => Err(ScrapeError::session_fetch(url, e.to_string())),
            Err(_) => Err(ScrapeError::timeout(format!("session fetch {}", url))),
        }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl LiveSession for BrowserSession {
    fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    async fn teardown(self) -> ScrapeResult<()> {
        info!("Closing browser instance");
        close_browser(&self.browser, self.close_timeout).await
    }
}

#[cfg(feature = "browser")]
async fn close_browser(browser: &Browser, limit: Duration) -> ScrapeResult<()> {
    match tokio::time::timeout(limit, browser.close()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ScrapeError::internal(format!("Failed to close browser: {}", e))),
        Err(_) => Err(ScrapeError::internal("Browser close timed out")),
    }
}

/// Await a Playwright call with a deadline, folding both failure kinds into
/// bootstrap errors. A bootstrap step that never settles is as fatal as one
/// that fails.
#[cfg(feature = "browser")]
async fn bounded<T, E, F>(limit: Duration, operation: &str, future: F) -> ScrapeResult<T>
where
    E: std::fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ScrapeError::bootstrap(format!("{} failed: {}", operation, e))),
        Err(_) => Err(ScrapeError::bootstrap(format!("{} timed out", operation))),
    }
}


// Stub implementation when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct PlaywrightLauncher;

#[cfg(not(feature = "browser"))]
impl PlaywrightLauncher {
    pub fn new(_browser: &crate::config::BrowserConfig, _scraper: &crate::config::ScraperConfig) -> Self {
        Self
    }
}

#[cfg(not(feature = "browser"))]
pub struct BrowserSession {
    cookies: std::collections::BTreeMap<String, String>,
}

#[cfg(not(feature = "browser"))]
#[async_trait::async_trait]
impl super::session::SessionLauncher for PlaywrightLauncher {
    type Session = BrowserSession;

    async fn launch(&self) -> crate::error::ScrapeResult<(super::fingerprint::Fingerprint, BrowserSession)> {
        Err(crate::error::ScrapeError::bootstrap("Browser feature not enabled"))
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait::async_trait]
impl super::fetcher::PageContext for BrowserSession {
    async fn fetch_text(&self, url: &str, _headers: &super::fetcher::HeaderBundle) -> crate::error::ScrapeResult<String> {
        Err(crate::error::ScrapeError::session_fetch(url, "Browser feature not enabled"))
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait::async_trait]
impl super::session::LiveSession for BrowserSession {
    fn cookies(&self) -> &std::collections::BTreeMap<String, String> {
        &self.cookies
    }

    async fn teardown(self) -> crate::error::ScrapeResult<()> {
        Ok(())
    }
}
