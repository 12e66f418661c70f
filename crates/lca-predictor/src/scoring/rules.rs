use serde::Serialize;

use super::record::{ApplicationRecord, RecordFlags};

/// Deterministic corrections applied on top of the model probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    WageBelowPrevailing,
    WageWellAbovePrevailing,
    NotFullTime,
    H1bDependent,
    WillfulViolator,
    LcStatementNotAgreed,
}

impl RuleKind {
    pub const fn multiplier(self) -> f64 {
        match self {
            RuleKind::WageBelowPrevailing => 0.75,
            RuleKind::WageWellAbovePrevailing => 1.05,
            RuleKind::NotFullTime => 0.8,
            RuleKind::H1bDependent => 0.85,
            RuleKind::WillfulViolator => 0.8,
            RuleKind::LcStatementNotAgreed => 0.7,
        }
    }

    pub const fn note(self) -> &'static str {
        match self {
            RuleKind::WageBelowPrevailing => "Offered wage is below prevailing wage (-25%).",
            RuleKind::WageWellAbovePrevailing => {
                "Offered wage significantly exceeds prevailing wage (+5%)."
            }
            RuleKind::NotFullTime => "Not a full-time position (-20%).",
            RuleKind::H1bDependent => "Employer is H-1B dependent (-15%).",
            RuleKind::WillfulViolator => "Employer flagged as willful violator (-20%).",
            RuleKind::LcStatementNotAgreed => "Labor Condition Statement not agreed (-30%).",
        }
    }

    pub const fn suggestion(self) -> Option<&'static str> {
        match self {
            RuleKind::WageBelowPrevailing => {
                Some("Increase offered wage closer to or above the prevailing wage.")
            }
            RuleKind::WageWellAbovePrevailing => None,
            RuleKind::NotFullTime => Some("Convert to a full-time role if possible."),
            RuleKind::H1bDependent => {
                Some("Reduce dependency on H-1B workforce or justify dependency clearly.")
            }
            RuleKind::WillfulViolator => {
                Some("Ensure full compliance and file corrective documentation.")
            }
            RuleKind::LcStatementNotAgreed => Some("Agree to LC statement before filing."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedRule {
    pub rule: RuleKind,
    pub multiplier: f64,
    pub note: &'static str,
}

/// Adjusted probability plus the trail of rules that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleAdjustment {
    pub base_probability: f64,
    pub probability: f64,
    pub applied: Vec<AppliedRule>,
    pub suggestions: Vec<&'static str>,
}

impl RuleAdjustment {
    pub fn notes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.applied.iter().map(|applied| applied.note)
    }
}

/// Multiplier above which an offered wage counts as well above prevailing.
const WELL_ABOVE_PREVAILING: f64 = 1.2;

pub fn adjust(record: &ApplicationRecord, base_probability: f64) -> RuleAdjustment {
    let flags = RecordFlags::from_record(record);
    let base = if base_probability.is_finite() {
        base_probability
    } else {
        0.0
    };

    let mut triggered = Vec::new();
    if flags.wage_below_prevailing {
        triggered.push(RuleKind::WageBelowPrevailing);
    } else if record.wage_pair().is_some_and(|(offered, prevailing)| {
        prevailing > 0.0 && offered >= WELL_ABOVE_PREVAILING * prevailing
    }) {
        triggered.push(RuleKind::WageWellAbovePrevailing);
    }
    if !flags.full_time {
        triggered.push(RuleKind::NotFullTime);
    }
    if flags.h1b_dependent {
        triggered.push(RuleKind::H1bDependent);
    }
    if flags.willful_violator {
        triggered.push(RuleKind::WillfulViolator);
    }
    if !flags.agreed_to_lc {
        triggered.push(RuleKind::LcStatementNotAgreed);
    }

    let probability = triggered
        .iter()
        .fold(base, |probability, rule| probability * rule.multiplier())
        .clamp(0.0, 1.0);

    RuleAdjustment {
        base_probability: base,
        probability,
        suggestions: triggered.iter().filter_map(|rule| rule.suggestion()).collect(),
        applied: triggered
            .into_iter()
            .map(|rule| AppliedRule {
                rule,
                multiplier: rule.multiplier(),
                note: rule.note(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::record::Field;

    fn compliant() -> ApplicationRecord {
        ApplicationRecord::builder()
            .with(Field::FullTimePosition, "Y")
            .with(Field::AgreeToLcStatement, "Y")
            .with(Field::WageRateOfPayFrom, "100000")
            .with(Field::PrevailingWage, "95000")
            .build()
    }

    #[test]
    fn compliant_record_is_untouched() {
        let adjustment = adjust(&compliant(), 0.82);
        assert_eq!(adjustment.probability, 0.82);
        assert!(adjustment.applied.is_empty());
        assert!(adjustment.suggestions.is_empty());
    }

    #[test]
    fn penalties_compound_in_order() {
        let record = ApplicationRecord::builder()
            .with(Field::WageRateOfPayFrom, "70000")
            .with(Field::PrevailingWage, "80000")
            .with(Field::H1bDependent, "yes")
            .with(Field::WillfulViolator, "true")
            .build();

        let adjustment = adjust(&record, 0.9);
        let kinds: Vec<_> = adjustment.applied.iter().map(|applied| applied.rule).collect();
        assert_eq!(
            kinds,
            [
                RuleKind::WageBelowPrevailing,
                RuleKind::NotFullTime,
                RuleKind::H1bDependent,
                RuleKind::WillfulViolator,
                RuleKind::LcStatementNotAgreed,
            ]
        );
        let expected = 0.9 * 0.75 * 0.8 * 0.85 * 0.8 * 0.7;
        assert!((adjustment.probability - expected).abs() < 1e-12);
        assert_eq!(adjustment.suggestions.len(), 5);
        assert_eq!(
            adjustment.notes().next(),
            Some("Offered wage is below prevailing wage (-25%).")
        );
    }

    #[test]
    fn generous_wage_bonus_is_clamped() {
        let record = ApplicationRecord::builder()
            .with(Field::FullTimePosition, "Y")
            .with(Field::AgreeToLcStatement, "Y")
            .with(Field::WageRateOfPayFrom, "120000")
            .with(Field::PrevailingWage, "100000")
            .build();

        let adjustment = adjust(&record, 0.98);
        assert_eq!(adjustment.probability, 1.0);
        assert_eq!(adjustment.applied[0].rule, RuleKind::WageWellAbovePrevailing);
        assert!(adjustment.suggestions.is_empty());
    }

    #[test]
    fn non_finite_base_is_zero() {
        let adjustment = adjust(&compliant(), f64::NAN);
        assert_eq!(adjustment.base_probability, 0.0);
        assert_eq!(adjustment.probability, 0.0);
    }

    #[test]
    fn probability_stays_in_unit_interval() {
        let flags = ["Y", "N"];
        for full_time in flags {
            for dependent in flags {
                for agreed in flags {
                    let record = ApplicationRecord::builder()
                        .with(Field::FullTimePosition, full_time)
                        .with(Field::H1bDependent, dependent)
                        .with(Field::AgreeToLcStatement, agreed)
                        .with(Field::WageRateOfPayFrom, "200000")
                        .with(Field::PrevailingWage, "100000")
                        .build();
                    for base in [0.0, 0.3, 0.97, 1.0] {
                        let probability = adjust(&record, base).probability;
                        assert!((0.0..=1.0).contains(&probability));
                    }
                }
            }
        }
    }
}
