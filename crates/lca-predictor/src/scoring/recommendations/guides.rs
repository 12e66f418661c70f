use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::{info, warn};

use crate::scoring::record::RecordFlags;

/// Guide snippets kept per assessment.
pub const MAX_GUIDE_SNIPPETS: usize = 6;

/// Risk flags that select guide snippets, in selection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuideFlag {
    WageBelowPrevailing,
    NotFullTime,
    H1bDependent,
    WillfulViolator,
    NoLcAgreement,
    ShortDuration,
}

impl GuideFlag {
    pub const fn key(self) -> &'static str {
        match self {
            GuideFlag::WageBelowPrevailing => "wage_below_prev",
            GuideFlag::NotFullTime => "not_full_time",
            GuideFlag::H1bDependent => "h1b_dependent",
            GuideFlag::WillfulViolator => "willful_violator",
            GuideFlag::NoLcAgreement => "no_lc_agree",
            GuideFlag::ShortDuration => "short_duration",
        }
    }

    pub fn active(flags: &RecordFlags) -> Vec<GuideFlag> {
        [
            (GuideFlag::WageBelowPrevailing, flags.wage_below_prevailing),
            (GuideFlag::NotFullTime, !flags.full_time),
            (GuideFlag::H1bDependent, flags.h1b_dependent),
            (GuideFlag::WillfulViolator, flags.willful_violator),
            (GuideFlag::NoLcAgreement, !flags.agreed_to_lc),
            (GuideFlag::ShortDuration, flags.short_duration),
        ]
        .into_iter()
        .filter_map(|(flag, on)| on.then_some(flag))
        .collect()
    }
}

/// Flag-keyed advice loaded from a JSON document on first use.
#[derive(Debug, Default)]
pub struct GuideCatalogue {
    path: Option<PathBuf>,
    guides: OnceLock<HashMap<String, Vec<String>>>,
}

impl GuideCatalogue {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            guides: OnceLock::new(),
        }
    }

    pub fn from_map(guides: HashMap<String, Vec<String>>) -> Self {
        Self {
            path: None,
            guides: OnceLock::from(guides),
        }
    }

    fn guides(&self) -> &HashMap<String, Vec<String>> {
        self.guides.get_or_init(|| match &self.path {
            Some(path) => load(path),
            None => HashMap::new(),
        })
    }

    /// Deduplicated snippets for the active flags, capped at six.
    pub fn suggest(&self, flags: &[GuideFlag]) -> Vec<String> {
        let guides = self.guides();
        let mut seen = HashSet::new();
        flags
            .iter()
            .filter_map(|flag| guides.get(flag.key()))
            .flatten()
            .filter(|snippet| seen.insert(snippet.as_str()))
            .take(MAX_GUIDE_SNIPPETS)
            .cloned()
            .collect()
    }
}

fn load(path: &Path) -> HashMap<String, Vec<String>> {
    let parsed = fs::read_to_string(path)
        .map_err(|err| err.to_string())
        .and_then(|raw| {
            serde_json::from_str::<HashMap<String, Vec<String>>>(&raw).map_err(|err| err.to_string())
        });

    match parsed {
        Ok(guides) => {
            info!(path = %path.display(), flags = guides.len(), "loaded guide catalogue");
            guides
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "guide catalogue unavailable; continuing without guides");
            HashMap::new()
        }
    }
}
