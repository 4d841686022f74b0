use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod job_manager;
pub mod orchestrator;
pub mod records;

pub use job_manager::{JobManager, JobSnapshot, JobStatus, JobTracker, ProgressSink, SubmitOutcome};
pub use orchestrator::Orchestrator;
pub use records::PostRecord;

use crate::config::AppConfig;
use crate::export::ExportManager;
use crate::scraper::{api_headers, HttpClient, PlaywrightLauncher, StateExtractor};

/// Orchestrator wired to the production collaborators
pub type LiveOrchestrator = Orchestrator<PlaywrightLauncher, Arc<HttpClient>, Arc<ExportManager>>;

/// Core application state shared by the server and the CLI
pub struct TokScrape {
    config: AppConfig,
    jobs: JobManager,
    http: Arc<HttpClient>,
    export_manager: Arc<ExportManager>,
}

impl TokScrape {
    /// Initialize the core with all subsystems
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing TokScrape core");

        let headers = api_headers(&config.scraper.base_url, &config.scraper.user_agent);
        let http = Arc::new(HttpClient::new(&config.http, &headers)?);
        let export_manager = Arc::new(ExportManager::new(&config.export));

        Ok(Self {
            config,
            jobs: JobManager::new(),
            http,
            export_manager,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// A fresh orchestrator for one job
    pub fn orchestrator(&self) -> LiveOrchestrator {
        Orchestrator::new(
            PlaywrightLauncher::new(&self.config.browser, &self.config.scraper),
            self.http.clone(),
            self.export_manager.clone(),
            self.config.scraper.clone(),
        )
        .with_teardown_timeout(Duration::from_secs(self.config.browser.navigation_timeout_seconds))
    }

    pub fn state_extractor(&self) -> StateExtractor<Arc<HttpClient>> {
        StateExtractor::new(self.http.clone(), self.config.scraper.base_url.clone())
    }

    /// Start the scrape job in the background unless one is running
    pub async fn submit_job(&self) -> SubmitOutcome {
        let orchestrator = self.orchestrator();
        self.jobs
            .submit(move |tracker| async move { orchestrator.run(&tracker).await })
            .await
    }

    pub async fn poll_status(&self) -> JobSnapshot {
        self.jobs.snapshot().await
    }

    /// Path of a finished export in the export directory
    pub async fn find_export(&self, file_name: &str) -> Option<PathBuf> {
        self.export_manager.find_export(file_name).await
    }
}
