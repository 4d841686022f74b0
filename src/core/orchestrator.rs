use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::ScraperConfig;
use crate::core::job_manager::ProgressSink;
use crate::core::records::PostRecord;
use crate::error::ScrapeResult;
use crate::export::{ResultLocator, RowExporter};
use crate::logging::{LogContext, PerformanceLogger};
use crate::scraper::{
    api_headers, AuthenticatedFetcher, CommentThread, Fingerprint, LiveSession, PageSource, PlatformApi,
    PostItem, SessionLauncher, StateExtractor,
};
use crate::{log_info, log_warn};

/// Deadline for closing the session when none is configured
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// One end-to-end scrape job: bootstrap, collect tag posts, enrich them
/// with comments, export, tear down
pub struct Orchestrator<L, S, E>
where
    L: SessionLauncher,
    S: PageSource,
    E: RowExporter,
{
    launcher: L,
    extractor: StateExtractor<S>,
    exporter: E,
    config: ScraperConfig,
    teardown_timeout: Duration,
}

impl<L, S, E> Orchestrator<L, S, E>
where
    L: SessionLauncher,
    S: PageSource,
    E: RowExporter,
{
    pub fn new(launcher: L, pages: S, exporter: E, config: ScraperConfig) -> Self {
        Self {
            extractor: StateExtractor::new(pages, config.base_url.clone()),
            launcher,
            exporter,
            config,
            teardown_timeout: DEFAULT_TEARDOWN_TIMEOUT,
        }
    }

    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = timeout;
        self
    }

    /// Run the job to a terminal state.
    ///
    /// Once a session exists it is torn down on every exit path, including
    /// a panic in the collection phase, before the outcome is reported.
    pub async fn run<K: ProgressSink>(self, sink: &K) {
        sink.log("[=>] Scraping task started...".to_string()).await;
        sink.log("[=>] Starting browser instance".to_string()).await;

        let launched = AssertUnwindSafe(self.launcher.launch()).catch_unwind().await;
        let (fingerprint, session) = match launched {
            Ok(Ok(launched)) => launched,
            Ok(Err(e)) => {
                sink.fail(e.to_string()).await;
                return;
            }
            Err(_) => {
                sink.fail("Browser launch panicked".to_string()).await;
                return;
            }
        };

        sink.log(format!("[*] Cookies: {:?}", session.cookies())).await;
        sink.log("[=>] Browser ready!".to_string()).await;
        sink.log("[=>] Starting scraping!".to_string()).await;

        let outcome = AssertUnwindSafe(self.collect_and_export(&fingerprint, &session, sink))
            .catch_unwind()
            .await;

        sink.log("[=>] Closing browser instance..".to_string()).await;
        match tokio::time::timeout(self.teardown_timeout, session.teardown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Browser teardown failed: {}", e),
            Err(_) => {
                warn!("Browser teardown did not finish within {:?}", self.teardown_timeout);
                sink.log("[!] Browser instance did not close in time".to_string()).await;
            }
        }

        match outcome {
            Ok(Ok(locator)) => {
                let line = format!(
                    "[=>] Scraping completed: download using this url: {}",
                    locator.download_url
                );
                sink.complete(locator, line).await;
            }
            Ok(Err(e)) => sink.fail(e.to_string()).await,
            Err(_) => sink.fail("Scrape task panicked".to_string()).await,
        }
    }

    async fn collect_and_export<K: ProgressSink>(
        &self,
        fingerprint: &Fingerprint,
        session: &L::Session,
        sink: &K,
    ) -> ScrapeResult<ResultLocator> {
        let headers = api_headers(&self.config.base_url, &self.config.user_agent);
        let api = PlatformApi::new(AuthenticatedFetcher::new(session, headers), fingerprint, &self.config);

        let posts = self.collect_tag_posts(&api, sink).await;
        let records = self.build_records(&posts, sink).await;

        sink.log("[=>] Scraping completed, please wait...".to_string()).await;

        let perf = PerformanceLogger::new(LogContext::new("orchestrator", "export"));
        match self.exporter.export_rows(&records).await {
            Ok(locator) => {
                perf.finish(&format!("Exported {} records", records.len()));
                Ok(locator)
            }
            Err(e) => {
                perf.finish_with_error("Export failed", &e);
                Err(e)
            }
        }
    }

    async fn collect_tag_posts<K: ProgressSink>(
        &self,
        api: &PlatformApi<'_, L::Session>,
        sink: &K,
    ) -> Vec<PostItem> {
        let mut posts = Vec::new();

        for target in &self.config.tags {
            let context = LogContext::new("orchestrator", "collect_tag").with_tag(target.tag.as_str());

            match api.tag_posts(&target.tag, target.target).await {
                Ok(Some(result)) if !result.items.is_empty() => {
                    if let Some(err) = result.stop.error() {
                        let context = context.clone().with_error_category(err.category());
                        log_warn!(context, error = %err, "Tag pagination stopped early");
                    }
                    log_info!(context, count = result.items.len(), "Tag collected");
                    sink.log(format!("[=>] Tag: {}, Count: {}", target.tag, result.items.len())).await;
                    posts.extend(result.items);
                }
                Ok(_) => {
                    sink.log(format!("[!] Failed to get {} tag posts", target.tag)).await;
                }
                Err(e) => {
                    let context = context.with_error_category(e.category());
                    log_warn!(context, error = %e, "Tag collection failed");
                    sink.log(format!("[!] Failed to get {} tag posts: {}", target.tag, e)).await;
                }
            }
        }

        posts
    }

    async fn build_records<K: ProgressSink>(&self, posts: &[PostItem], sink: &K) -> Vec<PostRecord> {
        let mut records = Vec::with_capacity(posts.len());

        for (index, post) in posts.iter().enumerate() {
            sink.log(format!("[=>] Post {}", index + 1)).await;

            let thread = self
                .extractor
                .comment_thread(&post.author.unique_id, &post.id)
                .await
                .and_then(|value| serde_json::from_value::<CommentThread>(value).ok());

            let comments = match thread {
                Some(thread) => thread.texts(),
                None => {
                    sink.log("[!] Failed to get comments for post".to_string()).await;
                    Vec::new()
                }
            };

            records.push(PostRecord::assemble(&self.config.base_url, post, comments, Utc::now()));
        }

        info!("Assembled {} records", records.len());
        records
    }
}
