use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMeta {
    pub app_name: String,
    pub version: String,
    pub tax_year: i32,

    /// Set whenever a statement is saved; `None` until the first computation.
    pub last_computed_at: Option<DateTime<Utc>>,
}
