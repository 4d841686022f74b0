use csv::WriterBuilder;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::core::records::PostRecord;
use crate::error::{ScrapeError, ScrapeResult};
use super::{row_values, COLUMNS};

/// Write records as CSV and return the file size in bytes.
///
/// `Comments Data` holds the comment texts as a JSON array.
pub async fn export_csv(records: &[PostRecord], output_path: &Path) -> ScrapeResult<u64> {
    debug!("Exporting {} records to CSV: {}", records.len(), output_path.display());

    let file = std::fs::File::create(output_path)
        .map_err(|e| ScrapeError::export(format!("Cannot create {}: {}", output_path.display(), e)))?;
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_writer(file);

    writer.write_record(COLUMNS).map_err(csv_error)?;

    for record in records {
        let row: Vec<String> = row_values(record).iter().map(cell_text).collect();
        writer.write_record(&row).map_err(csv_error)?;
    }

    writer
        .flush()
        .map_err(|e| ScrapeError::export(format!("CSV flush failed: {}", e)))?;
    drop(writer);

    let file_size = tokio::fs::metadata(output_path).await?.len();
    Ok(file_size)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn csv_error(err: csv::Error) -> ScrapeError {
    ScrapeError::export(format!("CSV write failed: {}", err))
}
