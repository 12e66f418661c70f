use csv::StringRecord;

use super::normalizer::normalize_header;
use crate::scoring::record::{ApplicationRecord, Field};

/// Accepted upload headers per field, most specific first.
const ALIASES: &[(Field, &[&str])] = &[
    (Field::VisaClass, &["VISA_CLASS", "VISA", "VISA_CLASS_"]),
    (Field::JobTitle, &["JOB_TITLE", "TITLE"]),
    (Field::SocCode, &["SOC_CODE"]),
    (Field::SocTitle, &["SOC_TITLE"]),
    (Field::EmployerName, &["EMPLOYER_NAME", "EMPLOYER", "COMPANY"]),
    (
        Field::EmployerState,
        &["EMPLOYER_STATE", "EMPLOYER_ST", "EMPLOYERSTATE"],
    ),
    (Field::WorksiteState, &["WORKSITE_STATE"]),
    (Field::WorksiteCity, &["WORKSITE_CITY"]),
    (
        Field::FullTimePosition,
        &["FULL_TIME_POSITION", "FULL_TIME", "FULLTIME_POSITION"],
    ),
    (
        Field::TotalWorkerPositions,
        &["TOTAL_WORKER_POSITIONS", "NUM_POSITIONS", "POSITIONS"],
    ),
    (
        Field::WageRateOfPayFrom,
        &[
            "WAGE_RATE_OF_PAY_FROM",
            "WAGE_RATE_OF_PAY",
            "OFFERED_WAGE",
            "WAGE",
        ],
    ),
    (Field::WageUnitOfPay, &["WAGE_UNIT_OF_PAY", "WAGE_UNIT"]),
    (Field::PrevailingWage, &["PREVAILING_WAGE", "PREVAILING", "PW"]),
    (Field::NewEmployment, &["NEW_EMPLOYMENT"]),
    (Field::ContinuedEmployment, &["CONTINUED_EMPLOYMENT"]),
    (Field::ChangeEmployer, &["CHANGE_EMPLOYER"]),
    (Field::H1bDependent, &["H_1B_DEPENDENT", "H1B_DEPENDENT"]),
    (Field::WillfulViolator, &["WILLFUL_VIOLATOR"]),
    (
        Field::AgreeToLcStatement,
        &["AGREE_TO_LC_STATEMENT", "AGREE_TO_LC"],
    ),
    (Field::BeginDate, &["BEGIN_DATE"]),
    (Field::EndDate, &["END_DATE"]),
    (Field::Email, &["EMAIL", "EMAIL_ADDRESS", "CONTACT_EMAIL"]),
];

/// Column positions per field, resolved once for an upload's header row.
#[derive(Debug, Clone, Default)]
pub(crate) struct ColumnMap {
    positions: Vec<(Field, Vec<usize>)>,
}

impl ColumnMap {
    pub fn resolve(headers: &StringRecord) -> Self {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();

        let positions = ALIASES
            .iter()
            .map(|(field, names)| {
                let columns = names
                    .iter()
                    .flat_map(|name| {
                        normalized
                            .iter()
                            .enumerate()
                            .filter(move |(_, header)| header.as_str() == *name)
                            .map(|(index, _)| index)
                    })
                    .collect();
                (*field, columns)
            })
            .collect();

        Self { positions }
    }

    /// First non-blank value among the columns aliased to `field`.
    pub fn value<'r>(&self, row: &'r StringRecord, field: Field) -> Option<&'r str> {
        self.positions
            .iter()
            .find(|(candidate, _)| *candidate == field)
            .into_iter()
            .flat_map(|(_, columns)| columns.iter())
            .filter_map(|index| row.get(*index))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    pub fn record(&self, row: &StringRecord) -> ApplicationRecord {
        let mut builder = ApplicationRecord::builder();
        for (field, _) in &self.positions {
            if let Some(value) = self.value(row, *field) {
                builder.set(*field, value);
            }
        }
        builder.build()
    }

    pub fn is_mapped(&self, field: Field) -> bool {
        self.positions
            .iter()
            .any(|(candidate, columns)| *candidate == field && !columns.is_empty())
    }
}
