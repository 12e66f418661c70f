use serde::Serialize;

use super::record::{ApplicationRecord, Field, RecordFlags};
use super::wage::round_to;

const DOCUMENTED_FIELDS: [Field; 6] = [
    Field::JobTitle,
    Field::EmployerName,
    Field::WorksiteState,
    Field::WageRateOfPayFrom,
    Field::BeginDate,
    Field::EndDate,
];

/// Model-independent strength breakdown. Every score lies in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scorecard {
    pub wage_score: f64,
    pub wage_note: String,
    pub compliance_score: f64,
    pub stability_score: f64,
    pub documentation_score: f64,
    pub total_score: f64,
}

/// Score `record`. `duration_days` overrides the span derived from its dates.
pub fn score(record: &ApplicationRecord, duration_days: Option<i64>) -> Scorecard {
    let flags = RecordFlags::from_record(record);
    let offered = record.number(Field::WageRateOfPayFrom).unwrap_or(0.0);
    let prevailing = record.number(Field::PrevailingWage).unwrap_or(0.0);

    let (wage, wage_note) = wage_score(offered, prevailing);

    let mut compliance = 100.0;
    if flags.willful_violator {
        compliance -= 60.0;
    }
    if flags.h1b_dependent {
        compliance -= 20.0;
    }
    if !flags.agreed_to_lc {
        compliance -= 30.0;
    }
    let compliance = f64::clamp(compliance, 0.0, 100.0);

    let duration = duration_days
        .or_else(|| record.duration_days())
        .unwrap_or(0)
        .max(0);
    let mut stability = 50.0 + if flags.full_time { 20.0 } else { -10.0 };
    if duration >= 365 {
        stability += 20.0;
    } else if duration >= 180 {
        stability += 10.0;
    }
    let stability = f64::clamp(stability, 0.0, 100.0);

    let missing = DOCUMENTED_FIELDS
        .iter()
        .filter(|field| !record.has(**field))
        .count();
    let documentation = (100.0 - 10.0 * missing as f64).max(0.0);

    let total = wage * 0.35 + compliance * 0.25 + stability * 0.20 + documentation * 0.20;

    Scorecard {
        wage_score: round_to(wage, 1),
        wage_note,
        compliance_score: round_to(compliance, 1),
        stability_score: round_to(stability, 1),
        documentation_score: round_to(documentation, 1),
        total_score: round_to(total, 1),
    }
}

fn wage_score(offered: f64, prevailing: f64) -> (f64, String) {
    if prevailing <= 0.0 {
        let score = if offered >= 100_000.0 {
            70.0
        } else if offered > 0.0 {
            40.0
        } else {
            0.0
        };
        return (score, "Prevailing wage not available".to_string());
    }

    let ratio = offered / prevailing;
    let score = if ratio < 0.8 {
        (40.0 * ratio / 0.8).max(0.0)
    } else if ratio < 1.0 {
        40.0 + 30.0 * (ratio - 0.8) / 0.2
    } else {
        (70.0 + 30.0 * ((ratio - 1.0) / 0.5).min(1.0)).min(100.0)
    };

    let note = format!(
        "Offered/median ratio = {ratio:.2} (median={})",
        group_thousands(prevailing)
    );
    (score, note)
}

/// `1234567.8` -> `"1,234,568"`.
fn group_thousands(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if value < 0.0 {
        grouped.insert(0, '-');
    }
    grouped
}
