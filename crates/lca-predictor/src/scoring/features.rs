//! Turns a raw application into the model's fixed-order feature vector.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Datelike;
use serde::Serialize;
use tracing::debug;

use super::artifacts::{CategoricalEncoders, FeatureSchema, StandardScaler, MISSING_TOKEN};
use super::record::{ApplicationRecord, Field};
use super::status::StageStatus;

pub const BEGIN_YEAR: &str = "BEGIN_YEAR";
pub const BEGIN_MONTH: &str = "BEGIN_MONTH";
pub const END_YEAR: &str = "END_YEAR";
pub const END_MONTH: &str = "END_MONTH";
pub const DURATION_DAYS: &str = "DURATION_DAYS";

/// A single cell of the feature vector before numeric coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
}

impl FeatureValue {
    /// Numeric view used for inference. Tokens that survive encoding are
    /// mapped yes/no style first, then stripped down to their digits.
    pub fn coerce(&self) -> f64 {
        let value = match self {
            FeatureValue::Number(number) => *number,
            FeatureValue::Text(text) => coerce_token(text),
        };
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }
}

fn coerce_token(text: &str) -> f64 {
    let cleaned: String = text
        .trim()
        .to_ascii_uppercase()
        .chars()
        .filter(|ch| !matches!(ch, '[' | ']' | '"' | '\'' | ','))
        .collect();
    let cleaned = cleaned.trim();

    match cleaned {
        "Y" | "YES" | "TRUE" | "1" => return 1.0,
        "N" | "NO" | "FALSE" | "0" => return 0.0,
        _ => {}
    }

    let numeric: String = cleaned
        .chars()
        .filter(|ch| ch.is_ascii_digit() || matches!(ch, 'E' | '.' | '-' | '+'))
        .collect();
    numeric.parse::<f64>().unwrap_or(0.0)
}

/// Feature values in exactly the trained column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    columns: Vec<String>,
    values: Vec<FeatureValue>,
}

impl FeatureVector {
    pub fn new(columns: Vec<String>, values: Vec<FeatureValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&FeatureValue> {
        self.columns
            .iter()
            .position(|candidate| candidate == column)
            .map(|index| &self.values[index])
    }

    pub fn numeric(&self) -> Vec<f64> {
        self.values.iter().map(FeatureValue::coerce).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PreparedFeatures {
    pub vector: FeatureVector,
    pub status: StageStatus,
}

/// Applies the trained encoders and scaler to raw records.
#[derive(Debug, Clone)]
pub struct FeaturePreparer {
    schema: Arc<FeatureSchema>,
    encoders: Arc<CategoricalEncoders>,
    scaler: Option<Arc<StandardScaler>>,
}

impl FeaturePreparer {
    pub fn new(
        schema: Arc<FeatureSchema>,
        encoders: Arc<CategoricalEncoders>,
        scaler: Option<Arc<StandardScaler>>,
    ) -> Self {
        Self {
            schema,
            encoders,
            scaler,
        }
    }

    pub fn prepare(&self, record: &ApplicationRecord) -> PreparedFeatures {
        let mut row: HashMap<String, FeatureValue> = HashMap::new();
        let mut raw_fields: HashMap<&str, &str> = HashMap::new();
        let mut degradations = Vec::new();

        for column in self.schema.columns() {
            let field = Field::ordered().into_iter().find(|field| field.column() == column);
            let raw = field.and_then(|field| record.get(field)).unwrap_or(MISSING_TOKEN);
            if field.is_some() {
                raw_fields.insert(column.as_str(), raw);
            }
            row.insert(column.clone(), FeatureValue::Text(raw.to_string()));
        }

        for field in Field::ordered().into_iter().filter(|field| field.is_numeric()) {
            let value = record.number(field).unwrap_or(0.0);
            row.insert(field.column().to_string(), FeatureValue::Number(value));
        }

        for field in Field::ordered().into_iter().filter(|field| field.is_flag()) {
            let value = if record.flag(field) { 1.0 } else { 0.0 };
            row.insert(field.column().to_string(), FeatureValue::Number(value));
        }

        for (column, value) in date_features(record) {
            row.insert(column.to_string(), FeatureValue::Number(value));
        }

        // Encoded record fields read their raw text, even when a flag or
        // numeric pass already rewrote the cell.
        for (column, vocabulary) in self.encoders.iter() {
            let Some(cell) = row.get_mut(column) else {
                continue;
            };
            let code = match (raw_fields.get(column), &*cell) {
                (Some(raw), _) => vocabulary.encode(raw),
                (None, FeatureValue::Text(text)) => vocabulary.encode(text),
                (None, FeatureValue::Number(_)) => continue,
            };
            *cell = FeatureValue::Number(code as f64);
        }

        match self.scaler.as_deref() {
            Some(scaler) if scaler.columns().iter().all(|column| row.contains_key(column)) => {
                for (index, column) in scaler.columns().iter().enumerate() {
                    if let Some(cell) = row.get_mut(column) {
                        *cell = FeatureValue::Number(scaler.transform(index, cell.coerce()));
                    }
                }
            }
            Some(_) => degradations.push("scaler columns absent; scaling skipped".to_string()),
            None => degradations.push("no scaler artifact; scaling skipped".to_string()),
        }

        if self.schema.is_empty() {
            degradations.push("no feature metadata; vector is empty".to_string());
        }

        let columns = self.schema.columns().to_vec();
        let values = columns
            .iter()
            .map(|column| row.remove(column).unwrap_or(FeatureValue::Number(0.0)))
            .collect();

        let status = if degradations.is_empty() {
            StageStatus::Ok
        } else {
            debug!(reasons = ?degradations, "feature preparation degraded");
            StageStatus::Degraded(degradations.join("; "))
        };

        PreparedFeatures {
            vector: FeatureVector::new(columns, values),
            status,
        }
    }
}

/// Calendar features derived from the begin and end dates; zero when unparsable.
pub(crate) fn date_features(record: &ApplicationRecord) -> [(&'static str, f64); 5] {
    let begin = record.date(Field::BeginDate);
    let end = record.date(Field::EndDate);
    let duration = match (begin, end) {
        (Some(begin), Some(end)) => (end - begin).num_days() as f64,
        _ => 0.0,
    };

    [
        (BEGIN_YEAR, begin.map(|d| d.year() as f64).unwrap_or(0.0)),
        (BEGIN_MONTH, begin.map(|d| d.month() as f64).unwrap_or(0.0)),
        (END_YEAR, end.map(|d| d.year() as f64).unwrap_or(0.0)),
        (END_MONTH, end.map(|d| d.month() as f64).unwrap_or(0.0)),
        (DURATION_DAYS, duration),
    ]
}
