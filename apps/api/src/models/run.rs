use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// One persisted autofill run. The raw `dom_html` column is stored but
/// never selected into this row — plans and summaries are what callers read.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AutofillRunRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_application_id: Uuid,
    pub page_url: String,
    pub dom_html_hash: Option<String>,
    pub status: String,
    pub plan_json: Option<Value>,
    pub plan_summary: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}
