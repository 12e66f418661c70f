//! Append-only log of single predictions, kept for later retraining.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};

use super::record::{ApplicationRecord, Field};

pub const PROBABILITY_COLUMN: &str = "predicted_prob";
pub const TIMESTAMP_COLUMN: &str = "timestamp";

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("failed to write submission log {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to encode submission row: {0}")]
    Csv(#[from] csv::Error),
    #[error("submission log unavailable: {0}")]
    Unavailable(String),
}

/// One logged prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub record: ApplicationRecord,
    pub probability: f64,
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(record: ApplicationRecord, probability: f64) -> Self {
        Self {
            record,
            probability,
            submitted_at: Utc::now(),
        }
    }

    fn row(&self) -> Vec<String> {
        Field::ordered()
            .into_iter()
            .map(|field| self.record.get(field).unwrap_or_default().to_string())
            .chain([
                self.probability.to_string(),
                self.submitted_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ])
            .collect()
    }
}

/// Sink for submissions; failures are reported but never block scoring.
pub trait SubmissionLog: Send + Sync {
    fn append(&self, submission: &Submission) -> Result<(), AuditError>;
}

/// CSV file that gains a header only when it is first created.
#[derive(Debug)]
pub struct CsvSubmissionLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvSubmissionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn header() -> Vec<&'static str> {
        Field::ordered()
            .into_iter()
            .map(Field::column)
            .chain([PROBABILITY_COLUMN, TIMESTAMP_COLUMN])
            .collect()
    }
}

impl SubmissionLog for CsvSubmissionLog {
    fn append(&self, submission: &Submission) -> Result<(), AuditError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AuditError::Unavailable("write lock poisoned".to_string()))?;
        let io_error = |source| AuditError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let is_new = fs::metadata(&self.path)
            .map(|metadata| metadata.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            writer.write_record(Self::header())?;
        }
        writer.write_record(submission.row())?;
        writer.flush().map_err(io_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(title: &str) -> Submission {
        Submission::new(
            ApplicationRecord::builder()
                .with(Field::JobTitle, title)
                .with(Field::EmployerName, "Acme, Inc.")
                .build(),
            0.42,
        )
    }

    #[test]
    fn writes_header_once_and_appends_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = CsvSubmissionLog::new(dir.path().join("data").join("submissions.csv"));

        log.append(&submission("Data Engineer")).expect("first append");
        log.append(&submission("Web Developer")).expect("second append");

        let mut reader = csv::Reader::from_path(log.path()).expect("reader");
        let headers = reader.headers().expect("headers").clone();
        assert_eq!(headers.len(), 24);
        assert_eq!(&headers[0], "VISA_CLASS");
        assert_eq!(&headers[23], TIMESTAMP_COLUMN);

        let rows: Vec<csv::StringRecord> = reader.records().map(|row| row.expect("row")).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "Data Engineer");
        assert_eq!(&rows[0][4], "Acme, Inc.");
        assert_eq!(&rows[1][22], "0.42");
        assert!(DateTime::parse_from_rfc3339(&rows[1][23]).is_ok());
    }
}
