//! Raw application records and the shared normalizers every scoring stage uses.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Canonical application fields, named after the LCA disclosure columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    VisaClass,
    JobTitle,
    SocCode,
    SocTitle,
    EmployerName,
    EmployerState,
    WorksiteState,
    WorksiteCity,
    FullTimePosition,
    TotalWorkerPositions,
    WageRateOfPayFrom,
    WageUnitOfPay,
    PrevailingWage,
    NewEmployment,
    ContinuedEmployment,
    ChangeEmployer,
    H1bDependent,
    WillfulViolator,
    AgreeToLcStatement,
    BeginDate,
    EndDate,
    Email,
}

impl Field {
    pub const fn ordered() -> [Self; 22] {
        [
            Self::VisaClass,
            Self::JobTitle,
            Self::SocCode,
            Self::SocTitle,
            Self::EmployerName,
            Self::EmployerState,
            Self::WorksiteState,
            Self::WorksiteCity,
            Self::FullTimePosition,
            Self::TotalWorkerPositions,
            Self::WageRateOfPayFrom,
            Self::WageUnitOfPay,
            Self::PrevailingWage,
            Self::NewEmployment,
            Self::ContinuedEmployment,
            Self::ChangeEmployer,
            Self::H1bDependent,
            Self::WillfulViolator,
            Self::AgreeToLcStatement,
            Self::BeginDate,
            Self::EndDate,
            Self::Email,
        ]
    }

    pub const fn column(self) -> &'static str {
        match self {
            Self::VisaClass => "VISA_CLASS",
            Self::JobTitle => "JOB_TITLE",
            Self::SocCode => "SOC_CODE",
            Self::SocTitle => "SOC_TITLE",
            Self::EmployerName => "EMPLOYER_NAME",
            Self::EmployerState => "EMPLOYER_STATE",
            Self::WorksiteState => "WORKSITE_STATE",
            Self::WorksiteCity => "WORKSITE_CITY",
            Self::FullTimePosition => "FULL_TIME_POSITION",
            Self::TotalWorkerPositions => "TOTAL_WORKER_POSITIONS",
            Self::WageRateOfPayFrom => "WAGE_RATE_OF_PAY_FROM",
            Self::WageUnitOfPay => "WAGE_UNIT_OF_PAY",
            Self::PrevailingWage => "PREVAILING_WAGE",
            Self::NewEmployment => "NEW_EMPLOYMENT",
            Self::ContinuedEmployment => "CONTINUED_EMPLOYMENT",
            Self::ChangeEmployer => "CHANGE_EMPLOYER",
            Self::H1bDependent => "H_1B_DEPENDENT",
            Self::WillfulViolator => "WILLFUL_VIOLATOR",
            Self::AgreeToLcStatement => "AGREE_TO_LC_STATEMENT",
            Self::BeginDate => "BEGIN_DATE",
            Self::EndDate => "END_DATE",
            Self::Email => "EMAIL",
        }
    }

    /// Web form spelling accepted alongside the canonical column name.
    const fn form_name(self) -> Option<&'static str> {
        match self {
            Self::WageRateOfPayFrom => Some("wage"),
            Self::WageUnitOfPay => Some("wage_unit"),
            Self::H1bDependent => Some("h1b_dependent"),
            Self::AgreeToLcStatement => Some("agree_lc"),
            _ => None,
        }
    }

    /// Resolve a canonical column name (any case) or a form field name.
    pub fn from_key(key: &str) -> Option<Self> {
        let trimmed = key.trim();
        Self::ordered().into_iter().find(|field| {
            field.column().eq_ignore_ascii_case(trimmed)
                || field
                    .form_name()
                    .is_some_and(|name| name.eq_ignore_ascii_case(trimmed))
        })
    }

    pub const fn is_flag(self) -> bool {
        matches!(
            self,
            Self::FullTimePosition
                | Self::NewEmployment
                | Self::ContinuedEmployment
                | Self::ChangeEmployer
                | Self::H1bDependent
                | Self::WillfulViolator
                | Self::AgreeToLcStatement
        )
    }

    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::TotalWorkerPositions | Self::WageRateOfPayFrom | Self::PrevailingWage
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Immutable raw application. Blank values are stored as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRecord", into = "BTreeMap<String, String>")]
pub struct ApplicationRecord {
    values: BTreeMap<Field, String>,
}

impl ApplicationRecord {
    pub fn builder() -> ApplicationRecordBuilder {
        ApplicationRecordBuilder::default()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn has(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    pub fn flag(&self, field: Field) -> bool {
        is_truthy(self.get(field))
    }

    /// Permissively parsed numeric field; `None` when absent or unparsable.
    pub fn number(&self, field: Field) -> Option<f64> {
        self.get(field).and_then(parse_number)
    }

    pub fn date(&self, field: Field) -> Option<NaiveDate> {
        self.get(field).and_then(parse_date)
    }

    /// Whole days between begin and end date when both parse.
    pub fn duration_days(&self) -> Option<i64> {
        match (self.date(Field::BeginDate), self.date(Field::EndDate)) {
            (Some(begin), Some(end)) => Some((end - begin).num_days()),
            _ => None,
        }
    }

    /// Offered and prevailing wage for wage rules. An absent value reads as
    /// 0.0; a present but unparsable one disables the comparison.
    pub fn wage_pair(&self) -> Option<(f64, f64)> {
        let read = |field| match self.get(field) {
            None => Some(0.0),
            Some(raw) => parse_number(raw),
        };
        Some((read(Field::WageRateOfPayFrom)?, read(Field::PrevailingWage)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.values.iter().map(|(field, value)| (*field, value.as_str()))
    }
}

#[derive(Debug, Default)]
pub struct ApplicationRecordBuilder {
    values: BTreeMap<Field, String>,
}

impl ApplicationRecordBuilder {
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, trimmed.to_string());
        }
    }

    pub fn build(self) -> ApplicationRecord {
        ApplicationRecord {
            values: self.values,
        }
    }
}

/// JSON shape accepted on the wire: any object whose keys resolve to fields.
#[derive(Debug, Deserialize)]
struct RawRecord(BTreeMap<String, serde_json::Value>);

impl From<RawRecord> for ApplicationRecord {
    fn from(raw: RawRecord) -> Self {
        let mut builder = ApplicationRecord::builder();
        for (key, value) in raw.0 {
            let Some(field) = Field::from_key(&key) else {
                continue;
            };
            let text = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(text) => text,
                serde_json::Value::Bool(flag) => String::from(if flag { "Y" } else { "N" }),
                other => other.to_string(),
            };
            builder.set(field, text);
        }
        builder.build()
    }
}

impl From<ApplicationRecord> for BTreeMap<String, String> {
    fn from(record: ApplicationRecord) -> Self {
        record
            .values
            .into_iter()
            .map(|(field, value)| (field.column().to_string(), value))
            .collect()
    }
}

/// Boolean flag normalization shared by every component.
pub fn is_truthy(value: Option<&str>) -> bool {
    value
        .map(|raw| {
            matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "y" | "yes" | "true" | "1"
            )
        })
        .unwrap_or(false)
}

/// Lenient float parsing: drops currency and grouping characters first.
pub fn parse_number(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|ch| !matches!(ch, '$' | ',' | '[' | ']' | '"' | '\'') && !ch.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|number| number.is_finite())
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%Y%m%d",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

/// Lenient date parser covering the formats seen in disclosure exports.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc().date());
    }

    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
    {
        return Some(date);
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|dt| dt.date())
}

/// Flags derived once per record and read by rules, scorecard, and guides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RecordFlags {
    pub full_time: bool,
    pub h1b_dependent: bool,
    pub willful_violator: bool,
    pub agreed_to_lc: bool,
    pub wage_below_prevailing: bool,
    pub short_duration: bool,
}

impl RecordFlags {
    pub fn from_record(record: &ApplicationRecord) -> Self {
        let months = record
            .duration_days()
            .map(|days| days.max(0) / 30)
            .unwrap_or(0);

        Self {
            full_time: record.flag(Field::FullTimePosition),
            h1b_dependent: record.flag(Field::H1bDependent),
            willful_violator: record.flag(Field::WillfulViolator),
            agreed_to_lc: record.flag(Field::AgreeToLcStatement),
            wage_below_prevailing: record
                .wage_pair()
                .is_some_and(|(offered, prevailing)| prevailing > 0.0 && offered < prevailing),
            short_duration: months > 0 && months < 12,
        }
    }
}
