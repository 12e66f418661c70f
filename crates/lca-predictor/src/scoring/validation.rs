use super::record::{ApplicationRecord, Field};

pub const SHORT_TITLE_NOTE: &str = "Job title is short/unusual.";
pub const STATE_CODE_NOTE: &str = "State should be 2-letter code (e.g., CA, NY).";
pub const VALIDATIONS_OK: &str = "Basic validations OK.";

/// Cheap sanity checks on the free-text fields of a submission.
pub fn basic_notes(record: &ApplicationRecord) -> Vec<&'static str> {
    let mut notes = Vec::new();

    let title_len = record
        .get(Field::JobTitle)
        .map(|title| title.chars().count())
        .unwrap_or(0);
    if title_len < 3 {
        notes.push(SHORT_TITLE_NOTE);
    }

    if let Some(state) = record.get(Field::EmployerState) {
        if state.chars().count() != 2 {
            notes.push(STATE_CODE_NOTE);
        }
    }

    if notes.is_empty() {
        notes.push(VALIDATIONS_OK);
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_record_passes() {
        let record = ApplicationRecord::builder()
            .with(Field::JobTitle, "Data Scientist")
            .with(Field::EmployerState, "NY")
            .build();
        assert_eq!(basic_notes(&record), [VALIDATIONS_OK]);
    }

    #[test]
    fn flags_short_title_and_long_state() {
        let record = ApplicationRecord::builder()
            .with(Field::JobTitle, "QA")
            .with(Field::EmployerState, "Texas")
            .build();
        assert_eq!(basic_notes(&record), [SHORT_TITLE_NOTE, STATE_CODE_NOTE]);
    }

    #[test]
    fn missing_state_is_not_an_error() {
        let record = ApplicationRecord::builder()
            .with(Field::JobTitle, "Engineer")
            .build();
        assert_eq!(basic_notes(&record), [VALIDATIONS_OK]);
        assert_eq!(basic_notes(&ApplicationRecord::default()), [SHORT_TITLE_NOTE]);
    }
}
