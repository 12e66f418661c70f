use crate::scoring::model::AttributionMap;

/// Features considered when turning attribution into advice.
pub const MAX_ATTRIBUTION_TIPS: usize = 5;

const KEYWORD_TIPS: &[(&str, &str)] = &[
    (
        "WAGE",
        "Increase offered wage to at least match or exceed the prevailing wage.",
    ),
    (
        "FULL_TIME",
        "Ensure the role is full-time to improve visa approval chances.",
    ),
    (
        "H_1B_DEPENDENT",
        "Try applying through an employer that is not H-1B dependent.",
    ),
    (
        "WILLFUL_VIOLATOR",
        "Ensure employer has a clean compliance record and no violations.",
    ),
    (
        "AGREE_TO_LC",
        "Make sure to agree to all Labor Condition (LC) statements before filing.",
    ),
    (
        "DURATION",
        "Consider requesting a longer employment duration for better stability.",
    ),
    (
        "CHANGE_EMPLOYER",
        "Minimize frequent employer changes to show job consistency.",
    ),
    (
        "NEW_EMPLOYMENT",
        "Provide strong documentation for new employment cases.",
    ),
    (
        "CONTINUED_EMPLOYMENT",
        "Highlight continued employment history for stronger approval odds.",
    ),
    (
        "STATE",
        "Double-check employer and worksite state consistency.",
    ),
];

/// Advice for one feature name; the first matching keyword wins.
pub fn tip_for_feature(feature: &str) -> String {
    let upper = feature.to_ascii_uppercase();
    KEYWORD_TIPS
        .iter()
        .find(|(keyword, _)| upper.contains(keyword))
        .map(|(_, tip)| (*tip).to_string())
        .unwrap_or_else(|| format!("Review and verify accuracy for '{}'.", title_case(feature)))
}

/// Tips for the strongest non-zero contributions.
pub fn attribution_tips(attribution: &AttributionMap) -> Vec<String> {
    attribution
        .iter()
        .filter(|entry| entry.weight > 0.0)
        .take(MAX_ATTRIBUTION_TIPS)
        .map(|entry| tip_for_feature(&entry.feature))
        .collect()
}

/// `SOC_TITLE` -> `Soc Title`.
fn title_case(feature: &str) -> String {
    feature
        .replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_map_to_tips() {
        assert_eq!(
            tip_for_feature("PREVAILING_WAGE"),
            "Increase offered wage to at least match or exceed the prevailing wage."
        );
        assert_eq!(
            tip_for_feature("CONTINUED_EMPLOYMENT"),
            "Highlight continued employment history for stronger approval odds."
        );
        assert_eq!(
            tip_for_feature("worksite_state"),
            "Double-check employer and worksite state consistency."
        );
    }

    #[test]
    fn unknown_features_are_title_cased() {
        assert_eq!(
            tip_for_feature("SOC_TITLE"),
            "Review and verify accuracy for 'Soc Title'."
        );
    }

    #[test]
    fn only_top_non_zero_features_are_used() {
        let attribution = AttributionMap::from_weights(
            [
                ("JOB_TITLE", 0.0),
                ("A", 0.7),
                ("B", 0.6),
                ("C", 0.5),
                ("D", 0.4),
                ("E", 0.3),
                ("F", 0.2),
            ]
            .map(|(feature, weight)| (feature.to_string(), weight)),
        );
        let tips = attribution_tips(&attribution);
        assert_eq!(tips.len(), MAX_ATTRIBUTION_TIPS);
        assert_eq!(tips[0], "Review and verify accuracy for 'A'.");
        assert!(!tips.iter().any(|tip| tip.contains("'F'") || tip.contains("Job Title")));
    }
}
