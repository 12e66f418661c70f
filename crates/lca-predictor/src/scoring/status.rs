use serde::Serialize;

/// Health of a pipeline stage, reported next to the value it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StageStatus {
    Ok,
    Degraded(String),
    Failed(String),
}

impl StageStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, StageStatus::Ok)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageStatus::Failed(_))
    }

    pub const fn label(&self) -> &'static str {
        match self {
            StageStatus::Ok => "ok",
            StageStatus::Degraded(_) => "degraded",
            StageStatus::Failed(_) => "failed",
        }
    }
}
