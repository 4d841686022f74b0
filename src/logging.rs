use anyhow::Result;
use serde::Serialize;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::LoggingConfig;

/// Initialize logging system
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers = Vec::new();

    // Console layer
    if config.console_enabled {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_writer(std::io::stdout)
            .boxed();

        layers.push(console_layer);
    }

    // File layer
    if config.file_enabled {
        std::fs::create_dir_all(&config.log_directory)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("tokscrape")
            .filename_suffix("log")
            .max_log_files(config.max_files)
            .build(&config.log_directory)?;

        let file_layer = if config.json_format {
            fmt::layer()
                .json()
                .with_thread_ids(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(file_appender)
                .boxed()
        } else {
            fmt::layer()
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(file_appender)
                .boxed()
        };

        layers.push(file_layer);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .init();

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_enabled {
        info!("Log directory: {}", config.log_directory.display());
    }

    Ok(())
}

/// Structured logging context for job-level events
#[derive(Debug, Clone, Serialize)]
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub job_id: Option<String>,
    pub url: Option<String>,
    pub tag: Option<String>,
    pub duration_ms: Option<u64>,
    pub status: Option<String>,
    pub error_category: Option<String>,
}

impl LogContext {
    pub fn new(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            operation: operation.into(),
            job_id: None,
            url: None,
            tag: None,
            duration_ms: None,
            status: None,
            error_category: None,
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_duration(mut self, duration: std::time::Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_error_category(mut self, category: impl Into<String>) -> Self {
        self.error_category = Some(category.into());
        self
    }
}

/// Structured logging macros
#[macro_export]
macro_rules! log_info {
    ($context:expr, $($arg:tt)+) => {
        tracing::info!(
            component = %$context.component,
            operation = %$context.operation,
            job_id = ?$context.job_id,
            url = ?$context.url,
            tag = ?$context.tag,
            duration_ms = ?$context.duration_ms,
            status = ?$context.status,
            $($arg)+
        );
    };
}

#[macro_export]
macro_rules! log_warn {
    ($context:expr, $($arg:tt)+) => {
        tracing::warn!(
            component = %$context.component,
            operation = %$context.operation,
            job_id = ?$context.job_id,
            url = ?$context.url,
            tag = ?$context.tag,
            error_category = ?$context.error_category,
            $($arg)+
        );
    };
}

#[macro_export]
macro_rules! log_error {
    ($context:expr, $($arg:tt)+) => {
        tracing::error!(
            component = %$context.component,
            operation = %$context.operation,
            job_id = ?$context.job_id,
            url = ?$context.url,
            tag = ?$context.tag,
            duration_ms = ?$context.duration_ms,
            error_category = ?$context.error_category,
            $($arg)+
        );
    };
}

/// Times an operation and logs its outcome with the elapsed duration
pub struct PerformanceLogger {
    context: LogContext,
    start_time: std::time::Instant,
}

impl PerformanceLogger {
    pub fn new(context: LogContext) -> Self {
        Self {
            context,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn finish(self, message: &str) {
        let context = self.context
            .with_duration(self.start_time.elapsed())
            .with_status("ok");
        crate::log_info!(context, "{}", message);
    }

    pub fn finish_with_error(self, message: &str, error: &crate::error::ScrapeError) {
        let context = self.context
            .with_duration(self.start_time.elapsed())
            .with_status("error")
            .with_error_category(error.category());
        crate::log_error!(context, error = %error, "{}", message);
    }
}
