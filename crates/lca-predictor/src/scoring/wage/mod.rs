//! Wage benchmarks keyed by occupation code and worksite state.

mod builder;
mod units;

pub use builder::{build_index, BuildReport};
pub use units::{to_annual, PayUnit, UnknownPayUnit};

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const NOT_FOUND_MESSAGE: &str = "No benchmark found for SOC/state.";
pub const INVALID_WAGE_MESSAGE: &str = "Invalid offered wage.";

#[derive(Debug, thiserror::Error)]
pub enum WageIndexError {
    #[error("failed to access wage index {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed wage index row: {0}")]
    Csv(#[from] csv::Error),
    #[error("wage index lists {occupation_code}/{state} more than once")]
    DuplicateKey {
        occupation_code: String,
        state: String,
    },
    #[error("wage index row {row} has a blank occupation code or state")]
    BlankKey { row: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BenchmarkKey {
    pub occupation_code: String,
    pub state: String,
}

impl BenchmarkKey {
    pub fn new(occupation_code: &str, state: &str) -> Self {
        Self {
            occupation_code: occupation_code.trim().to_string(),
            state: state.trim().to_string(),
        }
    }
}

/// Annualized wage statistics for one key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WageBenchmarkEntry {
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
    pub n: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexRow {
    occupation_code: String,
    worksite_state: String,
    median_wage: f64,
    p25: f64,
    p75: f64,
    n: u64,
}

/// Read-only benchmark table built offline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WageBenchmarkIndex {
    entries: BTreeMap<BenchmarkKey, WageBenchmarkEntry>,
}

impl WageBenchmarkIndex {
    pub fn from_entries<I>(entries: I) -> Result<Self, WageIndexError>
    where
        I: IntoIterator<Item = (BenchmarkKey, WageBenchmarkEntry)>,
    {
        let mut index = Self::default();
        for (row, (key, entry)) in entries.into_iter().enumerate() {
            index.insert(row + 1, key, entry)?;
        }
        Ok(index)
    }

    fn insert(
        &mut self,
        row: usize,
        key: BenchmarkKey,
        entry: WageBenchmarkEntry,
    ) -> Result<(), WageIndexError> {
        if key.occupation_code.is_empty() || key.state.is_empty() {
            return Err(WageIndexError::BlankKey { row });
        }
        match self.entries.entry(key) {
            Entry::Occupied(occupied) => Err(WageIndexError::DuplicateKey {
                occupation_code: occupied.key().occupation_code.clone(),
                state: occupied.key().state.clone(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(())
            }
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, WageIndexError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut index = Self::default();

        for (row, record) in csv_reader.deserialize::<IndexRow>().enumerate() {
            let record = record?;
            let key = BenchmarkKey::new(&record.occupation_code, &record.worksite_state);
            index.insert(
                row + 1,
                key,
                WageBenchmarkEntry {
                    median: record.median_wage,
                    p25: record.p25,
                    p75: record.p75,
                    n: record.n,
                },
            )?;
        }

        Ok(index)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, WageIndexError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| WageIndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::from_reader(file)?;
        info!(path = %path.display(), benchmarks = index.len(), "loaded wage benchmark index");
        Ok(index)
    }

    /// Like [`load`](Self::load) but an absent file yields an empty index.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Result<Self, WageIndexError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "wage index missing; every comparison will report no benchmark");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), WageIndexError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for (key, entry) in &self.entries {
            csv_writer.serialize(IndexRow {
                occupation_code: key.occupation_code.clone(),
                worksite_state: key.state.clone(),
                median_wage: entry.median,
                p25: entry.p25,
                p75: entry.p75,
                n: entry.n,
            })?;
        }
        csv_writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), WageIndexError> {
        let path = path.as_ref();
        let io_error = |source| WageIndexError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let file = File::create(path).map_err(io_error)?;
        self.write_csv(file)
    }

    pub fn get(&self, occupation_code: &str, state: &str) -> Option<&WageBenchmarkEntry> {
        self.entries.get(&BenchmarkKey::new(occupation_code, state))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BenchmarkKey, &WageBenchmarkEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compare an offered wage against the benchmark for its occupation and state.
    pub fn compare(
        &self,
        occupation_code: &str,
        state: &str,
        offered_value: f64,
        offered_unit: &str,
    ) -> WageComparison {
        let Some(entry) = self.get(occupation_code, state) else {
            return WageComparison::not_found(NOT_FOUND_MESSAGE);
        };
        let Some(offered_yearly) = to_annual(offered_value, offered_unit) else {
            return WageComparison::not_found(INVALID_WAGE_MESSAGE);
        };

        let ratio = (entry.median != 0.0).then(|| offered_yearly / entry.median);
        WageComparison {
            found: true,
            message: None,
            benchmark: Some(BenchmarkMatch {
                offered_yearly: round_to(offered_yearly, 2),
                median: round_to(entry.median, 2),
                p25: round_to(entry.p25, 2),
                p75: round_to(entry.p75, 2),
                n: entry.n,
                ratio: ratio.map(|ratio| round_to(ratio, 3)),
                verdict: WageVerdict::from_ratio(ratio),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WageVerdict {
    #[serde(rename = "Below median")]
    BelowMedian,
    #[serde(rename = "Meets median")]
    MeetsMedian,
    #[serde(rename = "Above median")]
    AboveMedian,
}

impl WageVerdict {
    /// The below-median band is checked first, so 0.99 <= ratio < 1.0 reads
    /// as below median.
    pub fn from_ratio(ratio: Option<f64>) -> Self {
        match ratio {
            Some(ratio) if ratio < 1.0 => WageVerdict::BelowMedian,
            Some(ratio) if (0.99..=1.05).contains(&ratio) => WageVerdict::MeetsMedian,
            _ => WageVerdict::AboveMedian,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            WageVerdict::BelowMedian => "Below median",
            WageVerdict::MeetsMedian => "Meets median",
            WageVerdict::AboveMedian => "Above median",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkMatch {
    pub offered_yearly: f64,
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
    pub n: u64,
    pub ratio: Option<f64>,
    pub verdict: WageVerdict,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WageComparison {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<BenchmarkMatch>,
}

impl WageComparison {
    fn not_found(message: &str) -> Self {
        Self {
            found: false,
            message: Some(message.to_string()),
            benchmark: None,
        }
    }
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
