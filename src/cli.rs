use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use tokscrape::config::AppConfig;
use tokscrape::core::ProgressSink;
use tokscrape::export::ResultLocator;
use tokscrape::scraper::{
    api_headers, AuthenticatedFetcher, LiveSession, Paginated, PlatformApi, PlaywrightLauncher, SessionLauncher,
};
use tokscrape::TokScrape;

#[derive(Parser)]
#[command(name = "tokscrape-cli")]
#[command(about = "TokScrape Command Line Interface")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, help = "Enable verbose logging")]
    verbose: bool,

    #[arg(short, long, help = "Configuration file path")]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full tag scrape in the foreground and export the result
    Run,

    /// Fetch posts for one hashtag
    Tag {
        #[arg(help = "Hashtag name without '#'")]
        tag: String,

        #[arg(short = 'n', long, default_value_t = 30, help = "Number of posts")]
        count: usize,
    },

    /// Fetch the recommendation feed
    Feed {
        #[arg(short = 'n', long, default_value_t = 30, help = "Number of posts")]
        count: usize,
    },

    /// Search users by keyword
    Search {
        #[arg(help = "Search keyword")]
        keyword: String,

        #[arg(short = 'n', long, default_value_t = 10, help = "Number of users")]
        count: usize,
    },

    /// Search suggestions for a keyword
    Suggest {
        #[arg(help = "Search keyword")]
        keyword: String,
    },

    /// Fetch comments of a post through the API
    Comments {
        #[arg(help = "Post id")]
        post_id: String,

        #[arg(short = 'n', long, default_value_t = 20, help = "Number of comments")]
        count: usize,
    },

    /// Show a user's profile detail from the profile page state
    User {
        #[arg(help = "Username without '@'")]
        username: String,
    },

    /// Show a post's comment thread from the post page state
    Thread {
        #[arg(help = "Username without '@'")]
        username: String,

        #[arg(help = "Post id")]
        post_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = if cli.verbose { "debug" } else { "info" };
    std::env::set_var("RUST_LOG", format!("tokscrape={}", log_level));

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    info!("TokScrape CLI v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if let Some(config_path) = cli.config {
        AppConfig::load_from_file(&config_path).await?
    } else {
        AppConfig::load().await?
    };
    config.ensure_directories().await?;

    let app = TokScrape::new(config)?;

    match cli.command {
        Commands::Run => run_foreground(&app).await?,
        Commands::User { username } => {
            let detail = app.state_extractor().user_detail(&username).await;
            print_optional(&detail, "No user detail found")?;
        }
        Commands::Thread { username, post_id } => {
            let thread = app.state_extractor().comment_thread(&username, &post_id).await;
            print_optional(&thread, "No comment thread found")?;
        }
        command => with_session(&app, command).await?,
    }

    Ok(())
}

/// Prints job progress lines to stdout and keeps the failure summary, if any
#[derive(Default)]
struct ConsoleSink {
    failure: Mutex<Option<String>>,
}

impl ConsoleSink {
    /// Error when the job ended Failed
    async fn outcome(&self) -> Result<()> {
        match self.failure.lock().await.take() {
            Some(summary) => Err(anyhow::anyhow!("Scrape job failed: {}", summary)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProgressSink for ConsoleSink {
    async fn log(&self, line: String) {
        println!("{}", line);
    }

    async fn complete(&self, result: ResultLocator, line: String) {
        println!("{}", line);
        println!("Saved to: {}", result.path.display());
    }

    async fn fail(&self, summary: String) {
        eprintln!("[!] Scraping failed: {}", summary);
        *self.failure.lock().await = Some(summary);
    }
}

async fn run_foreground(app: &TokScrape) -> Result<()> {
    info!("Running scrape job in the foreground");
    let sink = ConsoleSink::default();
    app.orchestrator().run(&sink).await;
    sink.outcome().await
}

/// Launch a browser session, run one API command, and always tear the session down
async fn with_session(app: &TokScrape, command: Commands) -> Result<()> {
    let config = app.config();
    let launcher = PlaywrightLauncher::new(&config.browser, &config.scraper);
    let (fingerprint, session) = launcher.launch().await?;

    let headers = api_headers(&config.scraper.base_url, &config.scraper.user_agent);
    let api = PlatformApi::new(AuthenticatedFetcher::new(&session, headers), &fingerprint, &config.scraper);

    let outcome = run_api_command(&api, command).await;

    if let Err(e) = session.teardown().await {
        warn!("Browser teardown failed: {}", e);
    }

    outcome?;
    Ok(())
}

async fn run_api_command<P: LiveSession>(api: &PlatformApi<'_, P>, command: Commands) -> Result<()> {
    match command {
        Commands::Tag { tag, count } => match api.tag_posts(&tag, count).await? {
            Some(result) => print_paginated(&result)?,
            None => println!("Tag #{} not found", tag),
        },
        Commands::Feed { count } => print_paginated(&api.recommendations(count).await?)?,
        Commands::Search { keyword, count } => print_paginated(&api.search_users(&keyword, count).await?)?,
        Commands::Suggest { keyword } => {
            print_optional(&api.search_suggest(&keyword).await?, "No suggestions")?;
        }
        Commands::Comments { post_id, count } => print_paginated(&api.post_comments(&post_id, count).await?)?,
        Commands::Run | Commands::User { .. } | Commands::Thread { .. } => {}
    }
    Ok(())
}

fn print_paginated<T: Serialize>(result: &Paginated<T>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&result.items)?);
    if let Some(err) = result.stop.error() {
        warn!("Pagination stopped early after {} rounds: {}", result.rounds, err);
    }
    Ok(())
}

fn print_optional<T: Serialize>(value: &Option<T>, missing: &str) -> Result<()> {
    match value {
        Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
        None => println!("{}", missing),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_failed_job_is_an_error() {
        let sink = ConsoleSink::default();
        sink.log("[=>] Scraping task started...".to_string()).await;
        sink.fail("Browser session could not be established: timed out".to_string()).await;

        let err = sink.outcome().await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_completed_job_is_ok() {
        let sink = ConsoleSink::default();
        let locator = ResultLocator {
            file_name: "sample_fashion_posts-1.csv".to_string(),
            path: PathBuf::from("dumps/sample_fashion_posts-1.csv"),
            download_url: "http://127.0.0.1:8000/download/sample_fashion_posts-1.csv".to_string(),
        };
        sink.complete(locator, "[=>] Scraping completed".to_string()).await;

        assert!(sink.outcome().await.is_ok());
    }
}
