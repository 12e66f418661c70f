//! Approval scoring for labor condition applications.
//!
//! A raw [`ApplicationRecord`] flows through feature preparation, model
//! inference, attribution, rule adjustment, the scorecard, and the
//! recommendation composer. Every stage reports a [`StageStatus`] so callers
//! can tell a genuine low probability from a fallback value.

pub mod artifacts;
pub mod audit;
pub mod bulk;
pub mod features;
pub mod model;
pub mod recommendations;
pub mod record;
pub mod router;
pub mod rules;
pub mod scorecard;
pub mod service;
pub mod status;
pub mod validation;
pub mod wage;

#[cfg(test)]
mod tests;

pub use artifacts::{ArtifactBundle, ArtifactError};
pub use audit::{AuditError, CsvSubmissionLog, Submission, SubmissionLog};
pub use bulk::{BulkError, BulkOutcome, BulkProcessor, BulkResultRow};
pub use features::{FeaturePreparer, FeatureValue, FeatureVector};
pub use recommendations::{GuideCatalogue, RecommendationComposer, NOTHING_TO_SUGGEST};
pub use record::{is_truthy, parse_date, parse_number, ApplicationRecord, Field, RecordFlags};
pub use router::scoring_router;
pub use rules::RuleAdjustment;
pub use scorecard::Scorecard;
pub use service::{Assessment, Outlook, ScoringInitError, ScoringService};
pub use status::StageStatus;
pub use wage::{WageBenchmarkIndex, WageComparison, WageIndexError, WageVerdict};
