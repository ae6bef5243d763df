use chrono::{DateTime, Utc};

use crate::pipeline::StatusPipeline;

pub struct AppState {
    pub pipeline: StatusPipeline,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: StatusPipeline) -> Self {
        Self {
            pipeline,
            started_at: Utc::now(),
        }
    }
}
