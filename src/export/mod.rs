use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub mod csv_exporter;
pub mod json_exporter;

use crate::config::ExportConfig;
use crate::core::records::PostRecord;
use crate::error::{ScrapeError, ScrapeResult};

/// Column headers, in export order
pub const COLUMNS: [&str; 13] = [
    "Post URL",
    "User",
    "Author Name",
    "Likes",
    "Views",
    "Shares",
    "Comments",
    "Comments Data",
    "Caption",
    "HashTags",
    "Music",
    "Date Posted",
    "Date Collected",
];

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Export format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid export format: {}", s)),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Where a finished export can be found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultLocator {
    pub file_name: String,
    pub path: PathBuf,
    pub download_url: String,
}

/// Persists the assembled rows of one job
#[async_trait]
pub trait RowExporter: Send + Sync {
    async fn export_rows(&self, records: &[PostRecord]) -> ScrapeResult<ResultLocator>;
}

#[async_trait]
impl<T: RowExporter + ?Sized> RowExporter for Arc<T> {
    async fn export_rows(&self, records: &[PostRecord]) -> ScrapeResult<ResultLocator> {
        (**self).export_rows(records).await
    }
}

/// `<prefix>-<unix-epoch-seconds>.<ext>`
pub fn result_file_name(prefix: &str, epoch_seconds: i64, extension: &str) -> String {
    format!("{}-{}.{}", prefix, epoch_seconds, extension)
}

/// Writes rows to the export directory in the configured format
pub struct ExportManager {
    config: ExportConfig,
}

impl ExportManager {
    pub fn new(config: &ExportConfig) -> Self {
        Self { config: config.clone() }
    }

    pub fn download_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.config.download_base_url.trim_end_matches('/'), file_name)
    }

    /// Path of an existing export file, if there is one with that name
    pub async fn find_export(&self, file_name: &str) -> Option<PathBuf> {
        let path = self.config.output_directory.join(file_name);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Some(path),
            _ => None,
        }
    }

    pub async fn export(&self, records: &[PostRecord], format: ExportFormat) -> ScrapeResult<ResultLocator> {
        tokio::fs::create_dir_all(&self.config.output_directory)
            .await
            .map_err(|e| ScrapeError::export(format!(
                "Cannot create {}: {}",
                self.config.output_directory.display(),
                e
            )))?;

        let file_name = result_file_name(
            &self.config.file_prefix,
            chrono::Utc::now().timestamp(),
            format.extension(),
        );
        let path = self.config.output_directory.join(&file_name);

        info!("Exporting {} records to {} as {}", records.len(), path.display(), format);
        let start_time = std::time::Instant::now();

        let file_size = match format {
            ExportFormat::Csv => csv_exporter::export_csv(records, &path).await?,
            ExportFormat::Json => json_exporter::export_json(records, &path).await?,
        };

        info!(
            "Export completed: {} records in {}ms, file size: {} bytes",
            records.len(),
            start_time.elapsed().as_millis(),
            file_size
        );

        Ok(ResultLocator {
            download_url: self.download_url(&file_name),
            file_name,
            path,
        })
    }
}

#[async_trait]
impl RowExporter for ExportManager {
    async fn export_rows(&self, records: &[PostRecord]) -> ScrapeResult<ResultLocator> {
        self.export(records, self.config.format).await
    }
}

/// Cell values of one record, aligned with [`COLUMNS`]
pub(crate) fn row_values(record: &PostRecord) -> [Value; 13] {
    [
        Value::from(record.url.as_str()),
        Value::from(record.user.as_str()),
        Value::from(record.author_name.as_str()),
        Value::from(record.likes),
        Value::from(record.views),
        Value::from(record.shares),
        Value::from(record.comment_count),
        Value::from(record.comment_texts.clone()),
        Value::from(record.caption.as_str()),
        Value::from(record.hashtags.as_str()),
        Value::from(record.music_title.as_str()),
        Value::from(
            record
                .posted_at
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
        ),
        Value::from(record.collected_at.format(DATE_FORMAT).to_string()),
    ]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::Path;
    use chrono::{TimeZone, Utc};

    pub(crate) fn sample_record(id: &str) -> PostRecord {
        PostRecord {
            url: format!("https://www.tiktok.com/@redbull/video/{}", id),
            user: "redbull".to_string(),
            author_name: "Red Bull".to_string(),
            likes: 10,
            views: 200,
            shares: 3,
            comment_count: 2,
            comment_texts: vec!["love it".to_string(), "where, from?".to_string()],
            caption: "street look ".to_string(),
            hashtags: "#fashion".to_string(),
            music_title: String::new(),
            posted_at: Utc.timestamp_opt(1_696_500_000, 0).single(),
            collected_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn config(dir: &Path, format: ExportFormat) -> ExportConfig {
        ExportConfig {
            format,
            file_prefix: "sample_fashion_posts".to_string(),
            output_directory: dir.join("dumps"),
            download_base_url: "http://127.0.0.1:8000/download/".to_string(),
        }
    }

    #[test]
    fn test_result_file_name() {
        assert_eq!(
            result_file_name("sample_fashion_posts", 1_700_000_000, "csv"),
            "sample_fashion_posts-1700000000.csv"
        );
    }

    #[test]
    fn test_format_parse_and_display() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xlsx".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Csv.to_string(), "csv");
    }

    #[test]
    fn test_row_values_alignment() {
        let values = row_values(&sample_record("1"));
        assert_eq!(values.len(), COLUMNS.len());
        assert_eq!(values[3], Value::from(10u64));
        assert_eq!(values[7], serde_json::json!(["love it", "where, from?"]));
        assert_eq!(values[11], Value::from("2023-10-05 10:00:00"));
    }

    #[tokio::test]
    async fn test_export_creates_directory_and_locator() {
        let temp = tempfile::tempdir().unwrap();
        let manager = ExportManager::new(&config(temp.path(), ExportFormat::Csv));

        let locator = manager.export_rows(&[sample_record("1")]).await.unwrap();

        assert!(locator.file_name.starts_with("sample_fashion_posts-"));
        assert!(locator.file_name.ends_with(".csv"));
        assert!(locator.path.exists());
        assert_eq!(
            locator.download_url,
            format!("http://127.0.0.1:8000/download/{}", locator.file_name)
        );
        assert_eq!(manager.find_export(&locator.file_name).await, Some(locator.path.clone()));
        assert!(manager.find_export("missing.csv").await.is_none());
    }

    #[tokio::test]
    async fn test_export_failure_is_export_error() {
        let temp = tempfile::tempdir().unwrap();
        let blocker = temp.path().join("dumps");
        std::fs::write(&blocker, "not a directory").unwrap();

        let manager = ExportManager::new(&config(temp.path(), ExportFormat::Csv));
        let err = manager.export_rows(&[sample_record("1")]).await.unwrap_err();
        assert_eq!(err.category(), "export");
    }
}
