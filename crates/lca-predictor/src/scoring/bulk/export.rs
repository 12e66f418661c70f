use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use super::BulkError;
use crate::scoring::record::{ApplicationRecord, Field};
use crate::scoring::service::Assessment;

pub const RESULT_COLUMNS: [&str; 11] = [
    "EMPLOYER_NAME",
    "JOB_TITLE",
    "OFFERED_WAGE",
    "FULL_TIME_POSITION",
    "probability_%",
    "recommendation",
    "score_wage",
    "score_compliance",
    "score_stability",
    "score_docs",
    "score_total",
];

/// One output line; success and error rows share this shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkResultRow {
    #[serde(rename = "EMPLOYER_NAME")]
    pub employer_name: String,
    #[serde(rename = "JOB_TITLE")]
    pub job_title: String,
    #[serde(rename = "OFFERED_WAGE")]
    pub offered_wage: String,
    #[serde(rename = "FULL_TIME_POSITION")]
    pub full_time_position: String,
    #[serde(rename = "probability_%", serialize_with = "probability_or_na")]
    pub probability_percent: Option<f64>,
    pub recommendation: String,
    pub score_wage: f64,
    pub score_compliance: f64,
    pub score_stability: f64,
    pub score_docs: f64,
    pub score_total: f64,
}

impl BulkResultRow {
    pub(crate) fn scored(record: &ApplicationRecord, assessment: &Assessment) -> Self {
        let scorecard = &assessment.scorecard;
        Self {
            full_time_position: record
                .get(Field::FullTimePosition)
                .unwrap_or("N")
                .to_string(),
            probability_percent: Some(assessment.probability_percent()),
            recommendation: assessment.outlook.label().to_string(),
            score_wage: scorecard.wage_score,
            score_compliance: scorecard.compliance_score,
            score_stability: scorecard.stability_score,
            score_docs: scorecard.documentation_score,
            score_total: scorecard.total_score,
            ..Self::identity(record)
        }
    }

    pub(crate) fn failed(record: &ApplicationRecord, message: impl std::fmt::Display) -> Self {
        Self {
            recommendation: format!("Error: {message}"),
            ..Self::identity(record)
        }
    }

    pub fn is_error(&self) -> bool {
        self.probability_percent.is_none()
    }

    fn identity(record: &ApplicationRecord) -> Self {
        let text = |field| record.get(field).unwrap_or_default().to_string();
        Self {
            employer_name: text(Field::EmployerName),
            job_title: text(Field::JobTitle),
            offered_wage: text(Field::WageRateOfPayFrom),
            full_time_position: text(Field::FullTimePosition),
            probability_percent: None,
            recommendation: String::new(),
            score_wage: 0.0,
            score_compliance: 0.0,
            score_stability: 0.0,
            score_docs: 0.0,
            score_total: 0.0,
        }
    }
}

fn probability_or_na<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(percent) => serializer.serialize_f64(*percent),
        None => serializer.serialize_str("N/A"),
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> BulkError {
    let path = path.to_path_buf();
    move |source| BulkError::Io { path, source }
}

/// Write `rows` under `dir`, creating it when missing.
pub(crate) fn write_results(
    dir: &Path,
    file_name: &str,
    rows: &[BulkResultRow],
) -> Result<PathBuf, BulkError> {
    fs::create_dir_all(dir).map_err(io_error(dir))?;
    let path = dir.join(file_name);
    let file = File::create(&path).map_err(io_error(&path))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(RESULT_COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(io_error(&path))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_rows_keep_identity_and_zero_scores() {
        let record = ApplicationRecord::builder()
            .with(Field::EmployerName, "Initech")
            .with(Field::WageRateOfPayFrom, "lots")
            .build();
        let row = BulkResultRow::failed(&record, "WAGE_RATE_OF_PAY_FROM is not numeric");

        assert!(row.is_error());
        assert_eq!(row.employer_name, "Initech");
        assert_eq!(row.offered_wage, "lots");
        assert_eq!(row.recommendation, "Error: WAGE_RATE_OF_PAY_FROM is not numeric");
        assert_eq!(row.score_total, 0.0);
    }

    #[test]
    fn writes_header_even_without_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_results(&dir.path().join("out"), "bulk_results_1.csv", &[])
            .expect("write results");

        let written = fs::read_to_string(path).expect("read back");
        assert_eq!(written.trim_end(), RESULT_COLUMNS.join(","));
    }

    #[test]
    fn missing_probability_serializes_as_na() {
        let row = BulkResultRow::failed(&ApplicationRecord::default(), "bad row");
        let json = serde_json::to_value(&row).expect("serialize");
        assert_eq!(json["probability_%"], "N/A");
        assert_eq!(json["recommendation"], "Error: bad row");
    }
}
