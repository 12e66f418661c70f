//! Batch scoring over uploaded CSV files.
//!
//! Each row is scored on its own; a row that cannot be read or parsed becomes
//! an error row with the same columns, so the output always has one line per
//! input row.

mod columns;
mod export;
pub(crate) mod normalizer;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use csv::StringRecord;
use tracing::{debug, info, warn};

use super::record::{ApplicationRecord, Field};
use super::service::ScoringService;
use columns::ColumnMap;
use normalizer::decode_upload;

pub use export::{BulkResultRow, RESULT_COLUMNS};

pub const PREVIEW_ROWS: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum BulkError {
    #[error("failed to write bulk results to {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid bulk csv: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, thiserror::Error)]
enum RowError {
    #[error("{0}")]
    Read(#[from] csv::Error),
    #[error("{field} is not numeric: '{value}'")]
    NotNumeric { field: Field, value: String },
}

/// Result of one upload: the persisted artifact plus every scored row.
#[derive(Debug, Clone)]
pub struct BulkOutcome {
    pub file_name: String,
    pub path: PathBuf,
    pub rows: Vec<BulkResultRow>,
}

impl BulkOutcome {
    pub fn preview(&self) -> &[BulkResultRow] {
        &self.rows[..self.rows.len().min(PREVIEW_ROWS)]
    }

    pub fn error_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_error()).count()
    }
}

/// Sequential scorer for CSV uploads.
pub struct BulkProcessor {
    service: Arc<ScoringService>,
    export_dir: PathBuf,
}

impl BulkProcessor {
    pub fn new(service: Arc<ScoringService>, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            service,
            export_dir: export_dir.into(),
        }
    }

    pub fn process(&self, bytes: &[u8]) -> Result<BulkOutcome, BulkError> {
        self.process_at(bytes, Utc::now())
    }

    /// Score every row of `bytes` and persist the results stamped with `now`.
    pub fn process_at(&self, bytes: &[u8], now: DateTime<Utc>) -> Result<BulkOutcome, BulkError> {
        let (text, fell_back) = decode_upload(bytes);
        if fell_back {
            warn!("bulk upload is not valid UTF-8; decoded as Latin-1");
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let columns = ColumnMap::resolve(reader.headers()?);
        let unmapped: Vec<Field> = Field::ordered()
            .into_iter()
            .filter(|field| !columns.is_mapped(*field))
            .collect();
        if !unmapped.is_empty() {
            debug!(?unmapped, "bulk upload lacks some columns; they read as blank");
        }

        let rows: Vec<BulkResultRow> = reader
            .records()
            .enumerate()
            .map(|(index, row)| self.score_row(&columns, index + 1, row))
            .collect();

        let file_name = format!("bulk_results_{}.csv", now.timestamp());
        let path = export::write_results(&self.export_dir, &file_name, &rows)?;
        let outcome = BulkOutcome {
            file_name,
            path,
            rows,
        };

        info!(
            rows = outcome.rows.len(),
            errors = outcome.error_count(),
            file = %outcome.file_name,
            "bulk upload scored"
        );
        Ok(outcome)
    }

    fn score_row(
        &self,
        columns: &ColumnMap,
        line: usize,
        row: Result<StringRecord, csv::Error>,
    ) -> BulkResultRow {
        let (record, checked) = match row {
            Ok(row) => {
                let record = columns.record(&row);
                let checked = check_numbers(&record);
                (record, checked)
            }
            Err(err) => (ApplicationRecord::default(), Err(RowError::from(err))),
        };

        match checked {
            Ok(()) => {
                let assessment = self.service.assess(&record);
                BulkResultRow::scored(&record, &assessment)
            }
            Err(err) => {
                warn!(row = line, error = %err, "bulk row failed");
                BulkResultRow::failed(&record, err)
            }
        }
    }
}

fn check_numbers(record: &ApplicationRecord) -> Result<(), RowError> {
    for field in [
        Field::WageRateOfPayFrom,
        Field::PrevailingWage,
        Field::TotalWorkerPositions,
    ] {
        if let Some(value) = record.get(field) {
            if record.number(field).is_none() {
                return Err(RowError::NotNumeric {
                    field,
                    value: value.to_string(),
                });
            }
        }
    }
    Ok(())
}
