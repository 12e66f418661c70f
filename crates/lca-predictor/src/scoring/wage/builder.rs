use std::collections::BTreeMap;
use std::io::Read;

use csv::{ByteRecord, StringRecord};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use super::units::to_annual;
use super::{BenchmarkKey, WageBenchmarkEntry, WageBenchmarkIndex, WageIndexError};
use crate::scoring::bulk::normalizer::decode_upload;
use crate::scoring::record::parse_number;

const MIN_ANNUAL_WAGE: f64 = 5_000.0;
const MAX_ANNUAL_WAGE: f64 = 1_000_000.0;

/// Counters reported after an offline index build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_malformed: usize,
    pub rows_latin1: usize,
    pub groups: usize,
}

#[derive(Debug, Deserialize)]
struct DisclosureRow {
    #[serde(rename = "SOC_CODE", default, deserialize_with = "empty_string_as_none")]
    soc_code: Option<String>,
    #[serde(rename = "WORKSITE_STATE", default, deserialize_with = "empty_string_as_none")]
    worksite_state: Option<String>,
    #[serde(
        rename = "WAGE_RATE_OF_PAY_FROM",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    wage: Option<String>,
    #[serde(rename = "WAGE_UNIT_OF_PAY", default, deserialize_with = "empty_string_as_none")]
    unit: Option<String>,
}

impl DisclosureRow {
    fn into_sample(self) -> Option<(BenchmarkKey, f64)> {
        let annual = to_annual(parse_number(self.wage.as_deref()?)?, self.unit.as_deref()?)?;
        if annual <= MIN_ANNUAL_WAGE || annual >= MAX_ANNUAL_WAGE {
            return None;
        }
        Some((BenchmarkKey::new(&self.soc_code?, &self.worksite_state?), annual))
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// Aggregate raw disclosure rows into a benchmark index.
///
/// Rows with a blank key, an unknown pay unit, or an annual wage outside
/// (5,000, 1,000,000) are dropped. Extra columns are ignored. Cells that
/// are not UTF-8 are read as Latin-1, and rows that still fail to parse are
/// counted as malformed instead of aborting the build.
pub fn build_index<R: Read>(reader: R) -> Result<(WageBenchmarkIndex, BuildReport), WageIndexError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut groups: BTreeMap<BenchmarkKey, Vec<f64>> = BTreeMap::new();
    let mut report = BuildReport::default();

    let (headers, _) = decode_record(csv_reader.byte_headers()?);
    let mut raw = ByteRecord::new();

    loop {
        match csv_reader.read_byte_record(&mut raw) {
            Ok(false) => break,
            Ok(true) => {}
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                report.rows_read += 1;
                report.rows_malformed += 1;
                warn!(error = %err, "skipping malformed disclosure row");
                continue;
            }
        }
        report.rows_read += 1;

        let (record, fell_back) = decode_record(&raw);
        if fell_back {
            report.rows_latin1 += 1;
        }
        let row = match record.deserialize::<DisclosureRow>(Some(&headers)) {
            Ok(row) => row,
            Err(err) => {
                report.rows_malformed += 1;
                warn!(error = %err, "skipping malformed disclosure row");
                continue;
            }
        };
        if let Some((key, annual)) = row.into_sample() {
            report.rows_kept += 1;
            groups.entry(key).or_default().push(annual);
        }
    }

    let entries = groups.into_iter().map(|(key, mut wages)| {
        wages.sort_by(f64::total_cmp);
        let entry = WageBenchmarkEntry {
            median: percentile(&wages, 50.0),
            p25: percentile(&wages, 25.0),
            p75: percentile(&wages, 75.0),
            n: wages.len() as u64,
        };
        (key, entry)
    });
    let index = WageBenchmarkIndex::from_entries(entries)?;
    report.groups = index.len();

    if report.rows_latin1 > 0 {
        warn!(rows = report.rows_latin1, "some disclosure rows were decoded as Latin-1");
    }
    info!(
        rows_read = report.rows_read,
        rows_kept = report.rows_kept,
        rows_malformed = report.rows_malformed,
        groups = report.groups,
        "built wage benchmark index"
    );
    Ok((index, report))
}

fn decode_record(raw: &ByteRecord) -> (StringRecord, bool) {
    let mut fell_back = false;
    let fields: Vec<String> = raw
        .iter()
        .map(|field| {
            let (text, latin1) = decode_upload(field);
            fell_back |= latin1;
            text.into_owned()
        })
        .collect();
    (StringRecord::from(fields), fell_back)
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}
