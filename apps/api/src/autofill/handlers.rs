//! Axum route handlers for the Autofill API.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::autofill::extract::RawExtractedField;
use crate::autofill::fields::{AutofillPlanJson, AutofillPlanSummary, RunStatus};
use crate::autofill::pipeline::{AutofillAgentInput, AutofillPipeline, PipelineSettings};
use crate::autofill::store::{dom_content_hash, CreateRunParams, FeedbackParams};
use crate::config::CacheKeyStrategy;
use crate::errors::AppError;
use crate::models::job::JobContext;
use crate::models::run::AutofillRunRow;
use crate::models::user::UserContext;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AutofillPlanRequest {
    pub user_id: Uuid,
    pub job_application_id: Uuid,
    pub page_url: String,
    pub dom_html: Option<String>,
    pub extracted_fields: Option<Vec<RawExtractedField>>,
    #[serde(default)]
    pub user: UserContext,
    #[serde(default)]
    pub job: JobContext,
    pub resume_profile: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct AutofillPlanResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub plan_json: AutofillPlanJson,
    pub plan_summary: AutofillPlanSummary,
    /// True when an existing completed plan was served instead of a new run.
    pub cached: bool,
}

#[derive(Debug, Deserialize)]
pub struct RunQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RunDetailResponse {
    pub run: AutofillRunRow,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub run_id: Uuid,
    pub job_application_id: Uuid,
    pub user_id: Uuid,
    pub question_signature: String,
    pub correction: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub status: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/autofill/plan
///
/// Full autofill pipeline: cache lookup → create run → extract fields →
/// generate answers → assemble + persist plan. A `failed` run still returns
/// a structurally valid plan; clients must not auto-submit from it.
pub async fn handle_generate_plan(
    State(state): State<AppState>,
    Json(request): Json<AutofillPlanRequest>,
) -> Result<Json<AutofillPlanResponse>, AppError> {
    if request.page_url.trim().is_empty() {
        return Err(AppError::Validation("page_url cannot be empty".to_string()));
    }
    if request.dom_html.is_none() && request.extracted_fields.is_none() {
        return Err(AppError::Validation(
            "one of dom_html or extracted_fields is required".to_string(),
        ));
    }

    let dom_html_hash = snapshot_hash(&request)?;

    // Best-effort cache: two racing requests may both miss and create two
    // runs. Runs are immutable and replay-idempotent, so that is fine.
    let cache_hash = match state.config.cache_key_strategy {
        CacheKeyStrategy::PageUrl => None,
        CacheKeyStrategy::DomHash => Some(dom_html_hash.as_str()),
    };
    let cached = state
        .store
        .get_completed_plan(
            request.job_application_id,
            request.user_id,
            &request.page_url,
            cache_hash,
        )
        .await?;
    if let Some(run) = cached {
        if let Some(response) = cached_plan_response(&run) {
            info!("Serving cached autofill plan from run {}", run.id);
            state
                .store
                .record_event(run.id, request.user_id, "plan_cache_hit", None)
                .await?;
            return Ok(Json(response));
        }
        warn!("Stored plan for run {} failed to decode; recomputing", run.id);
    }

    let run_id = state
        .store
        .create_run(&CreateRunParams {
            user_id: request.user_id,
            job_application_id: request.job_application_id,
            page_url: &request.page_url,
            dom_html: request.dom_html.as_deref(),
            dom_html_hash: &dom_html_hash,
        })
        .await?;

    let input = AutofillAgentInput {
        run_id,
        job_application_id: request.job_application_id,
        user_id: request.user_id,
        page_url: request.page_url,
        dom_html: request.dom_html,
        extracted_fields: request.extracted_fields,
        user: request.user,
        job: request.job,
        resume_profile: request.resume_profile,
    };

    let pipeline = AutofillPipeline {
        extractor: state.extractor.as_ref(),
        model: state.model.as_ref(),
        store: state.store.as_ref(),
        settings: PipelineSettings {
            strict_autofill_only: state.config.strict_autofill_only,
        },
    };
    let run_state = pipeline.execute(&input).await?;

    if !run_state.errors.is_empty() {
        warn!(
            "Autofill run {run_id} finished with errors: {:?}",
            run_state.errors
        );
    }

    let plan_json = run_state.plan_json.unwrap_or(AutofillPlanJson {
        run_id,
        page_url: input.page_url.clone(),
        fields: vec![],
    });
    let plan_summary = run_state.plan_summary.unwrap_or(AutofillPlanSummary {
        total_fields: 0,
        autofilled_fields: 0,
        suggested_fields: 0,
        skipped_fields: 0,
    });

    state
        .store
        .record_event(
            run_id,
            request.user_id,
            "plan_generated",
            Some(&json!({
                "status": run_state.status,
                "total_fields": plan_summary.total_fields,
            })),
        )
        .await?;

    Ok(Json(AutofillPlanResponse {
        run_id,
        status: run_state.status,
        plan_json,
        plan_summary,
        cached: false,
    }))
}

/// GET /api/v1/autofill/runs/:id
///
/// Returns the persisted run row: status, plan, and summary.
pub async fn handle_get_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Query(query): Query<RunQuery>,
) -> Result<Json<RunDetailResponse>, AppError> {
    let run = state
        .store
        .get_run(run_id, query.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Autofill run {run_id} not found")))?;
    Ok(Json(RunDetailResponse { run }))
}

/// POST /api/v1/autofill/feedback
///
/// Records a user correction for one answered field, keyed by the field's
/// question signature.
pub async fn handle_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    if request.question_signature.trim().is_empty() {
        return Err(AppError::Validation(
            "question_signature cannot be empty".to_string(),
        ));
    }

    state
        .store
        .record_feedback(&FeedbackParams {
            run_id: request.run_id,
            job_application_id: request.job_application_id,
            user_id: request.user_id,
            question_signature: &request.question_signature,
            correction: &request.correction,
        })
        .await?;

    Ok(Json(FeedbackResponse {
        status: "recorded".to_string(),
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Content hash of whichever snapshot the request carried: the raw DOM, or
/// the serialized extracted-field list.
fn snapshot_hash(request: &AutofillPlanRequest) -> Result<String, AppError> {
    if let Some(dom_html) = request.dom_html.as_deref() {
        return Ok(dom_content_hash(dom_html));
    }
    let serialized = serde_json::to_string(&request.extracted_fields)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash extracted fields: {e}")))?;
    Ok(dom_content_hash(&serialized))
}

fn cached_plan_response(run: &AutofillRunRow) -> Option<AutofillPlanResponse> {
    let plan_json: AutofillPlanJson =
        serde_json::from_value(run.plan_json.clone()?).ok()?;
    let plan_summary: AutofillPlanSummary =
        serde_json::from_value(run.plan_summary.clone()?).ok()?;
    Some(AutofillPlanResponse {
        run_id: run.id,
        status: RunStatus::Completed,
        plan_json,
        plan_summary,
        cached: true,
    })
}
