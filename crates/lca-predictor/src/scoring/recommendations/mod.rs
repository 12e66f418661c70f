mod guides;
mod tips;

pub use guides::{GuideCatalogue, GuideFlag, MAX_GUIDE_SNIPPETS};
pub use tips::{attribution_tips, tip_for_feature, MAX_ATTRIBUTION_TIPS};

use std::collections::HashSet;
use std::sync::Arc;

use super::model::AttributionMap;
use super::record::RecordFlags;

/// Shown by outer surfaces when an assessment has nothing to suggest.
pub const NOTHING_TO_SUGGEST: &str = "Everything looks good!";

/// Merges rule, attribution, and guide advice into one ordered list.
#[derive(Debug, Clone, Default)]
pub struct RecommendationComposer {
    guides: Arc<GuideCatalogue>,
}

impl RecommendationComposer {
    pub fn new(guides: Arc<GuideCatalogue>) -> Self {
        Self { guides }
    }

    pub fn compose(
        &self,
        rule_suggestions: &[&str],
        attribution: &AttributionMap,
        flags: &RecordFlags,
    ) -> Vec<String> {
        let snippets = self.guides.suggest(&GuideFlag::active(flags));

        let mut seen = HashSet::new();
        rule_suggestions
            .iter()
            .map(|suggestion| suggestion.to_string())
            .chain(attribution_tips(attribution))
            .chain(snippets)
            .filter(|suggestion| seen.insert(suggestion.clone()))
            .collect()
    }
}
