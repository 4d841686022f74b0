use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::export::ExportFormat;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub browser: BrowserConfig,
    pub http: HttpConfig,
    pub export: ExportConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

/// Platform identity and job targets.
///
/// These values only feed the session bootstrap and the query parameters;
/// pagination and extraction logic never read them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub language: String,
    pub locale: String,
    pub timezone: String,
    pub region: String,
    #[serde(default = "generate_device_id")]
    pub device_id: String,
    pub base_url: String,
    pub seed_url: String,
    pub user_agent: String,
    pub tags: Vec<TagTarget>,
    /// Items requested per API round
    pub page_size: usize,
    /// Hard cap on pagination rounds per endpoint call
    pub max_rounds: usize,
}

/// A hashtag and how many of its posts to collect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagTarget {
    pub tag: String,
    pub target: usize,
}

impl TagTarget {
    pub fn new(tag: impl Into<String>, target: usize) -> Self {
        Self { tag: tag.into(), target }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub install_browsers: bool,
    pub device: DeviceProfile,
    pub extra_args: Vec<String>,
    pub navigation_timeout_seconds: u64,
    pub evaluate_timeout_seconds: u64,
}

/// Mobile device emulation profile applied to the browser context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    pub viewport_width: i32,
    pub viewport_height: i32,
    pub device_scale_factor: f64,
    pub is_mobile: bool,
    pub has_touch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub request_timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_seconds: u64,
    pub per_host_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub format: ExportFormat,
    pub file_prefix: String,
    pub output_directory: PathBuf,
    pub download_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub json_format: bool,
    pub max_files: usize,
    pub log_directory: PathBuf,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            locale: "en-US".to_string(),
            timezone: "America/Chicago".to_string(),
            region: "US".to_string(),
            device_id: generate_device_id(),
            base_url: "https://www.tiktok.com".to_string(),
            seed_url: "https://www.tiktok.com/@redbull/video/7285391124246646049".to_string(),
            user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1".to_string(),
            tags: vec![
                TagTarget::new("fashion", 25),
                TagTarget::new("femaleoutfit", 25),
                TagTarget::new("fashionweek", 25),
                TagTarget::new("femalestreetwear", 25),
            ],
            page_size: 30,
            max_rounds: 50,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            install_browsers: true,
            device: DeviceProfile::default(),
            extra_args: Vec::new(),
            navigation_timeout_seconds: 60,
            evaluate_timeout_seconds: 30,
        }
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            name: "iPhone 14 Pro Max".to_string(),
            viewport_width: 430,
            viewport_height: 739,
            device_scale_factor: 3.0,
            is_mobile: true,
            has_touch: true,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 2,
            per_host_delay_ms: 500,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Csv,
            file_prefix: "sample_fashion_posts".to_string(),
            output_directory: PathBuf::from("dumps"),
            download_base_url: "http://127.0.0.1:8000/download".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: true,
            console_enabled: true,
            json_format: false,
            max_files: 5,
            log_directory: get_data_directory().join("logs"),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig::default(),
            browser: BrowserConfig::default(),
            http: HttpConfig::default(),
            export: ExportConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from default locations
    pub async fn load() -> Result<Self> {
        let config_path = get_config_path();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path).await?
        } else {
            info!("No configuration file found, using defaults");
            let config = Self::default();
            config.save().await?;
            config
        };

        ConfigOverrides::apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub async fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to default location
    pub async fn save(&self) -> Result<()> {
        let config_path = get_config_path();

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(&config_path, content).await?;

        info!("Configuration saved to: {}", config_path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scraper.seed_url.trim().is_empty() {
            return Err(anyhow::anyhow!("Scraper seed_url must be set"));
        }
        url::Url::parse(&self.scraper.seed_url)
            .map_err(|e| anyhow::anyhow!("Scraper seed_url is not a valid URL: {}", e))?;
        url::Url::parse(&self.scraper.base_url)
            .map_err(|e| anyhow::anyhow!("Scraper base_url is not a valid URL: {}", e))?;

        if self.scraper.user_agent.trim().is_empty() {
            return Err(anyhow::anyhow!("Scraper user_agent must be set"));
        }

        if self.scraper.device_id.is_empty() || !self.scraper.device_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(anyhow::anyhow!("Scraper device_id must be a decimal string"));
        }

        if self.scraper.page_size == 0 {
            return Err(anyhow::anyhow!("Scraper page_size must be > 0"));
        }

        if self.scraper.max_rounds == 0 {
            return Err(anyhow::anyhow!("Scraper max_rounds must be > 0"));
        }

        if self.scraper.tags.iter().any(|t| t.tag.trim().is_empty()) {
            return Err(anyhow::anyhow!("Scraper tags must not contain empty names"));
        }

        if self.browser.navigation_timeout_seconds == 0 || self.browser.evaluate_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("Browser timeouts must be > 0"));
        }

        if self.http.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("HTTP request_timeout_seconds must be > 0"));
        }

        if self.export.file_prefix.trim().is_empty() {
            return Err(anyhow::anyhow!("Export file_prefix must be set"));
        }

        if self.api.port == 0 {
            return Err(anyhow::anyhow!("API port must be > 0"));
        }

        Ok(())
    }

    /// Ensure all required directories exist
    pub async fn ensure_directories(&self) -> Result<()> {
        let mut dirs_to_create = vec![self.export.output_directory.clone()];
        if self.logging.file_enabled {
            dirs_to_create.push(self.logging.log_directory.clone());
        }

        for dir in dirs_to_create {
            if !dir.exists() {
                tokio::fs::create_dir_all(&dir).await?;
                info!("Created directory: {}", dir.display());
            }
        }

        Ok(())
    }
}

/// Random 19-digit decimal device id
pub fn generate_device_id() -> String {
    let id: u64 = rand::thread_rng().gen_range(1_000_000_000_000_000_000..=9_999_999_999_999_999_999);
    id.to_string()
}

/// Get the default data directory
fn get_data_directory() -> PathBuf {
    directories::ProjectDirs::from("com", "tokscrape", "tokscrape")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("data"))
}

/// Get the configuration file path
fn get_config_path() -> PathBuf {
    directories::ProjectDirs::from("com", "tokscrape", "tokscrape")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("config.toml"))
}

/// Environment-based configuration overrides
pub struct ConfigOverrides;

impl ConfigOverrides {
    /// Apply environment variable overrides to configuration
    pub fn apply(config: &mut AppConfig) {
        Self::apply_from(config, |key| std::env::var(key).ok());
    }

    fn apply_from(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
        // Scraper overrides
        if let Some(language) = lookup("TOKSCRAPE_LANGUAGE") {
            config.scraper.language = language;
        }
        if let Some(locale) = lookup("TOKSCRAPE_LOCALE") {
            config.scraper.locale = locale;
        }
        if let Some(timezone) = lookup("TOKSCRAPE_TIMEZONE") {
            config.scraper.timezone = timezone;
        }
        if let Some(device_id) = lookup("TOKSCRAPE_DEVICE_ID") {
            config.scraper.device_id = device_id;
        }
        if let Some(seed_url) = lookup("TOKSCRAPE_SEED_URL") {
            config.scraper.seed_url = seed_url;
        }
        if let Some(user_agent) = lookup("TOKSCRAPE_USER_AGENT") {
            config.scraper.user_agent = user_agent;
        }
        // Format: tag:count,tag:count
        if let Some(tags) = lookup("TOKSCRAPE_TAGS") {
            let parsed: Vec<TagTarget> = tags
                .split(',')
                .filter_map(|pair| {
                    let (tag, count) = pair.trim().split_once(':')?;
                    Some(TagTarget::new(tag.trim(), count.trim().parse().ok()?))
                })
                .collect();
            if !parsed.is_empty() {
                config.scraper.tags = parsed;
            }
        }
        if let Some(rounds) = lookup("TOKSCRAPE_MAX_ROUNDS").and_then(|v| v.parse().ok()) {
            config.scraper.max_rounds = rounds;
        }

        // Browser overrides
        if let Some(headless) = lookup("TOKSCRAPE_HEADLESS") {
            config.browser.headless = headless.to_lowercase() != "false";
        }

        // Export overrides
        if let Some(dir) = lookup("TOKSCRAPE_OUTPUT_DIR") {
            config.export.output_directory = PathBuf::from(dir);
        }

        // API overrides
        if let Some(host) = lookup("TOKSCRAPE_API_HOST") {
            config.api.host = host;
        }
        if let Some(port) = lookup("TOKSCRAPE_API_PORT").and_then(|v| v.parse().ok()) {
            config.api.port = port;
        }

        // Logging overrides
        if let Some(log_level) = lookup("TOKSCRAPE_LOG_LEVEL") {
            config.logging.level = log_level;
        }
    }
}
