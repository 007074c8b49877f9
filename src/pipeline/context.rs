use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identifies one pipeline run in logs and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    #[must_use]
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }
}
