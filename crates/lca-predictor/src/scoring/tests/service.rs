use std::sync::Arc;

use super::common::*;
use crate::scoring::artifacts::ArtifactBundle;
use crate::scoring::model::AttributionSource;
use crate::scoring::recommendations::GuideCatalogue;
use crate::scoring::record::{ApplicationRecord, Field};
use crate::scoring::service::{Outlook, ScoringService};
use crate::scoring::status::StageStatus;
use crate::scoring::validation::{SHORT_TITLE_NOTE, VALIDATIONS_OK};
use crate::scoring::wage::{WageBenchmarkIndex, WageVerdict, NOT_FOUND_MESSAGE};

#[test]
fn compliant_record_scores_as_likely_approved() {
    let assessment = service().assess(&compliant_record());

    assert_eq!(assessment.features, StageStatus::Ok);
    assert_eq!(assessment.inference.status, StageStatus::Ok);
    assert!((assessment.inference.probability - sigmoid(1.0)).abs() < 1e-9);
    assert!((assessment.probability() - sigmoid(1.0) * 1.05).abs() < 1e-9);
    assert_eq!(assessment.probability_percent(), 76.76);
    assert_eq!(assessment.outlook, Outlook::LikelyApproved);

    assert_eq!(assessment.attribution.source, AttributionSource::TreeShap);
    let top = assessment
        .attribution
        .contributions
        .iter()
        .next()
        .expect("one contribution");
    assert_eq!(top.feature, "FULL_TIME_POSITION");
    assert!((top.weight - 1.0).abs() < 1e-9);

    assert_eq!(assessment.recommendations, [FULL_TIME_TIP]);
    assert_eq!(assessment.validation, [VALIDATIONS_OK]);
    assert!((assessment.scorecard.total_score - 91.7).abs() < 1e-9);
}

#[test]
fn part_time_record_merges_rule_attribution_and_guide_advice() {
    let assessment = service().assess(&part_time_record());

    assert!((assessment.inference.probability - sigmoid(-1.0)).abs() < 1e-9);
    assert!((assessment.probability() - sigmoid(-1.0) * 1.05 * 0.8).abs() < 1e-9);
    assert_eq!(assessment.outlook, Outlook::LikelyDenied);
    assert_eq!(
        assessment.recommendations,
        [
            "Convert to a full-time role if possible.",
            FULL_TIME_TIP,
            FULL_TIME_GUIDE,
        ]
    );
}

#[test]
fn empty_record_still_produces_a_bounded_assessment() {
    let assessment = service().assess(&ApplicationRecord::default());

    assert!(assessment.inference.status.is_ok());
    assert!((0.0..=1.0).contains(&assessment.probability()));
    assert!(assessment.probability() < assessment.inference.probability);
    assert_eq!(assessment.validation, [SHORT_TITLE_NOTE]);
    assert_eq!(assessment.scorecard.documentation_score, 40.0);
}

#[test]
fn missing_model_reports_failed_inference_instead_of_erroring() {
    let service = ScoringService::new(
        ArtifactBundle::empty(),
        WageBenchmarkIndex::default(),
        GuideCatalogue::default(),
    );
    let assessment = service.assess(&compliant_record());

    assert!(!service.is_model_loaded());
    assert!(assessment.inference.status.is_failed());
    assert_eq!(assessment.inference.probability, 0.0);
    assert_eq!(assessment.probability(), 0.0);
    assert_eq!(assessment.attribution.source, AttributionSource::Zero);
    assert!(assessment.attribution.contributions.is_empty());
    assert_eq!(assessment.outlook, Outlook::LikelyDenied);
    assert!(assessment.scorecard.total_score > 90.0);
}

#[test]
fn assess_is_deterministic() {
    let service = service();
    let record = part_time_record();
    let first = service.assess(&record);
    let second = service.assess(&record);

    assert_eq!(first.probability(), second.probability());
    assert_eq!(first.scorecard, second.scorecard);
    assert_eq!(first.recommendations, second.recommendations);
}

#[test]
fn predict_appends_to_the_submission_log() {
    let (service, submissions) = shared_service_with_log();
    let assessment = service.predict(compliant_record());

    let rows = submissions.rows.lock().expect("lock");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record.get(Field::EmployerName), Some("Initech"));
    assert_eq!(rows[0].probability, assessment.probability());
}

#[test]
fn submission_log_failures_do_not_fail_predictions() {
    let service = service().with_submission_log(Arc::new(FailingSubmissions));
    let assessment = service.predict(compliant_record());
    assert_eq!(assessment.outlook, Outlook::LikelyApproved);
}

#[test]
fn compare_wage_reads_the_benchmark_index() {
    let service = service();

    let found = service.compare_wage("15-1252", "FL", 120_000.0, "Year");
    assert!(found.found);
    let benchmark = found.benchmark.expect("benchmark present");
    assert_eq!(benchmark.ratio, Some(1.2));
    assert_eq!(benchmark.verdict, WageVerdict::AboveMedian);
    assert_eq!(benchmark.n, 42);

    let missing = service.compare_wage("99-9999", "ZZ", 50_000.0, "Year");
    assert!(!missing.found);
    assert_eq!(missing.message.as_deref(), Some(NOT_FOUND_MESSAGE));
}
