use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

use crate::core::records::PostRecord;
use crate::error::{ScrapeError, ScrapeResult};
use super::{row_values, COLUMNS};

/// Write records as a pretty-printed JSON array of column-keyed objects
pub async fn export_json(records: &[PostRecord], output_path: &Path) -> ScrapeResult<u64> {
    debug!("Exporting {} records to JSON: {}", records.len(), output_path.display());

    let rows: Vec<Value> = records
        .iter()
        .map(|record| {
            let row: Map<String, Value> = COLUMNS
                .iter()
                .map(|c| c.to_string())
                .zip(row_values(record))
                .collect();
            Value::Object(row)
        })
        .collect();

    let file = File::create(output_path)
        .map_err(|e| ScrapeError::export(format!("Cannot create {}: {}", output_path.display(), e)))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &rows)
        .map_err(|e| ScrapeError::export(format!("JSON write failed: {}", e)))?;

    let file_size = tokio::fs::metadata(output_path).await?.len();
    Ok(file_size)
}
