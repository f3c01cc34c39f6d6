//! Run persistence — the contract the pipeline holds against storage.
//!
//! `RunStore` is the collaborator boundary: create a run in `running`
//! state, finalize it exactly once with plan + summary + terminal status,
//! and serve the completed-plan cache lookup. `PgRunStore` is the
//! production backend; tests use in-memory stubs.

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::autofill::fields::{AutofillPlanJson, AutofillPlanSummary, RunStatus};
use crate::errors::AppError;
use crate::models::run::AutofillRunRow;

/// SHA-256 hex digest of a captured DOM snapshot (or of the serialized
/// extracted-field list when no raw HTML was submitted).
pub fn dom_content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

pub struct CreateRunParams<'a> {
    pub user_id: Uuid,
    pub job_application_id: Uuid,
    pub page_url: &'a str,
    pub dom_html: Option<&'a str>,
    pub dom_html_hash: &'a str,
}

pub struct FeedbackParams<'a> {
    pub run_id: Uuid,
    pub job_application_id: Uuid,
    pub user_id: Uuid,
    pub question_signature: &'a str,
    pub correction: &'a str,
}

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Creates a run in `running` state and returns its id.
    async fn create_run(&self, params: &CreateRunParams<'_>) -> Result<Uuid, AppError>;

    /// The single state transition that finalizes a run. One atomic update;
    /// safe to retry as an idempotent overwrite on the same `run_id`.
    async fn update_run(
        &self,
        run_id: Uuid,
        plan_json: &AutofillPlanJson,
        plan_summary: &AutofillPlanSummary,
        status: RunStatus,
    ) -> Result<(), AppError>;

    async fn get_run(&self, run_id: Uuid, user_id: Uuid)
        -> Result<Option<AutofillRunRow>, AppError>;

    /// Completed-plan cache lookup. `dom_html_hash` narrows the match when
    /// the deployment keys its cache on DOM content.
    async fn get_completed_plan(
        &self,
        job_application_id: Uuid,
        user_id: Uuid,
        page_url: &str,
        dom_html_hash: Option<&str>,
    ) -> Result<Option<AutofillRunRow>, AppError>;

    /// Appends an audit event for a run.
    async fn record_event(
        &self,
        run_id: Uuid,
        user_id: Uuid,
        event_type: &str,
        payload: Option<&Value>,
    ) -> Result<(), AppError>;

    /// Records a user correction against one answered field.
    async fn record_feedback(&self, params: &FeedbackParams<'_>) -> Result<(), AppError>;
}

pub struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RUN_COLUMNS: &str = "id, user_id, job_application_id, page_url, dom_html_hash, status, \
                           plan_json, plan_summary, created_at, updated_at";

#[async_trait]
impl RunStore for PgRunStore {
    async fn create_run(&self, params: &CreateRunParams<'_>) -> Result<Uuid, AppError> {
        let run_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO autofill_runs
                (id, user_id, job_application_id, page_url, dom_html, dom_html_hash,
                 dom_captured_at, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), 'running', NOW())
            "#,
        )
        .bind(run_id)
        .bind(params.user_id)
        .bind(params.job_application_id)
        .bind(params.page_url)
        .bind(params.dom_html)
        .bind(params.dom_html_hash)
        .execute(&self.pool)
        .await?;

        info!("Created autofill run {run_id} for page {}", params.page_url);
        Ok(run_id)
    }

    async fn update_run(
        &self,
        run_id: Uuid,
        plan_json: &AutofillPlanJson,
        plan_summary: &AutofillPlanSummary,
        status: RunStatus,
    ) -> Result<(), AppError> {
        let plan_value = serde_json::to_value(plan_json)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize plan: {e}")))?;
        let summary_value = serde_json::to_value(plan_summary)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize summary: {e}")))?;

        let result = sqlx::query(
            r#"
            UPDATE autofill_runs
            SET plan_json = $2, plan_summary = $3, status = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .bind(&plan_value)
        .bind(&summary_value)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "No autofill run row updated for run_id={run_id}"
            )));
        }
        info!("Finalized autofill run {run_id} as {}", status.as_str());
        Ok(())
    }

    async fn get_run(
        &self,
        run_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AutofillRunRow>, AppError> {
        let row = sqlx::query_as::<_, AutofillRunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM autofill_runs WHERE id = $1 AND user_id = $2"
        ))
        .bind(run_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_completed_plan(
        &self,
        job_application_id: Uuid,
        user_id: Uuid,
        page_url: &str,
        dom_html_hash: Option<&str>,
    ) -> Result<Option<AutofillRunRow>, AppError> {
        let row = match dom_html_hash {
            Some(hash) => {
                sqlx::query_as::<_, AutofillRunRow>(&format!(
                    r#"
                    SELECT {RUN_COLUMNS} FROM autofill_runs
                    WHERE job_application_id = $1 AND user_id = $2 AND page_url = $3
                      AND dom_html_hash = $4
                      AND plan_json IS NOT NULL AND status = 'completed'
                    ORDER BY created_at DESC LIMIT 1
                    "#
                ))
                .bind(job_application_id)
                .bind(user_id)
                .bind(page_url)
                .bind(hash)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, AutofillRunRow>(&format!(
                    r#"
                    SELECT {RUN_COLUMNS} FROM autofill_runs
                    WHERE job_application_id = $1 AND user_id = $2 AND page_url = $3
                      AND plan_json IS NOT NULL AND status = 'completed'
                    ORDER BY created_at DESC LIMIT 1
                    "#
                ))
                .bind(job_application_id)
                .bind(user_id)
                .bind(page_url)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(row)
    }

    async fn record_event(
        &self,
        run_id: Uuid,
        user_id: Uuid,
        event_type: &str,
        payload: Option<&Value>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO autofill_events (run_id, user_id, event_type, payload, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(run_id)
        .bind(user_id)
        .bind(event_type)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_feedback(&self, params: &FeedbackParams<'_>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO autofill_feedback
                (run_id, job_application_id, user_id, question_signature, correction, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(params.run_id)
        .bind(params.job_application_id)
        .bind(params.user_id)
        .bind(params.question_signature)
        .bind(params.correction)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dom_content_hash_is_hex_sha256() {
        let hash = dom_content_hash("<form></form>");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_dom_content_hash_is_deterministic() {
        assert_eq!(dom_content_hash("<form></form>"), dom_content_hash("<form></form>"));
        assert_ne!(dom_content_hash("<form></form>"), dom_content_hash("<form> </form>"));
    }
}
