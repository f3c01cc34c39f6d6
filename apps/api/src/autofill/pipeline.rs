//! Run Orchestrator — the fixed linear pipeline behind every autofill run.
//!
//! Flow: initialize → extract_form_fields → generate_answers →
//!       assemble_autofill_plan (persist) → return.
//!
//! Each stage takes the accumulated `RunState` and returns a `StatePatch`;
//! an explicit sequential executor applies the patches in order. Stage
//! errors accumulate in `state.errors` instead of short-circuiting — the
//! assembler is the single place terminal status is decided.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::autofill::answers::{generate_answers, AnswerContext, AnswerModel};
use crate::autofill::extract::{ExtractionInput, FieldExtractionStrategy, RawExtractedField};
use crate::autofill::fields::{
    AutofillPlanJson, AutofillPlanSummary, FormField, FormFieldAnswer, RunStatus,
};
use crate::autofill::plan::{build_autofill_plan, summarize_autofill_plan};
use crate::autofill::store::RunStore;
use crate::errors::AppError;
use crate::models::job::JobContext;
use crate::models::user::UserContext;

/// The full input to one run. Identifiers are explicit fields on the unit
/// of work — never recovered through side lookups.
#[derive(Debug, Clone)]
pub struct AutofillAgentInput {
    pub run_id: Uuid,
    pub job_application_id: Uuid,
    pub user_id: Uuid,
    pub page_url: String,
    pub dom_html: Option<String>,
    pub extracted_fields: Option<Vec<RawExtractedField>>,
    pub user: UserContext,
    pub job: JobContext,
    pub resume_profile: Option<Value>,
}

/// Accumulated pipeline state. Stages never mutate it directly — they
/// return a `StatePatch` the executor applies.
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: Uuid,
    pub page_url: String,
    pub form_fields: Vec<FormField>,
    pub answers: BTreeMap<String, FormFieldAnswer>,
    pub plan_json: Option<AutofillPlanJson>,
    pub plan_summary: Option<AutofillPlanSummary>,
    pub status: RunStatus,
    pub errors: Vec<String>,
}

/// Partial-state update returned by each stage. `errors` entries append;
/// every other member replaces when present.
#[derive(Debug, Default)]
pub struct StatePatch {
    pub form_fields: Option<Vec<FormField>>,
    pub answers: Option<BTreeMap<String, FormFieldAnswer>>,
    pub plan_json: Option<AutofillPlanJson>,
    pub plan_summary: Option<AutofillPlanSummary>,
    pub status: Option<RunStatus>,
    pub errors: Vec<String>,
}

impl RunState {
    fn apply(&mut self, patch: StatePatch) {
        if let Some(form_fields) = patch.form_fields {
            self.form_fields = form_fields;
        }
        if let Some(answers) = patch.answers {
            self.answers = answers;
        }
        if let Some(plan_json) = patch.plan_json {
            self.plan_json = Some(plan_json);
        }
        if let Some(plan_summary) = patch.plan_summary {
            self.plan_summary = Some(plan_summary);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.errors.extend(patch.errors);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub strict_autofill_only: bool,
}

/// The sequential executor. Holds the three collaborator capabilities a
/// run needs; `execute` drives the four stages in order.
pub struct AutofillPipeline<'a> {
    pub extractor: &'a dyn FieldExtractionStrategy,
    pub model: &'a dyn AnswerModel,
    pub store: &'a dyn RunStore,
    pub settings: PipelineSettings,
}

impl AutofillPipeline<'_> {
    /// Runs the pipeline to a terminal `RunState`.
    ///
    /// Only precondition violations raise; once the pipeline starts, stage
    /// failures accumulate and the returned state is always structurally
    /// valid (possibly with an empty plan and `status = failed`).
    pub async fn execute(&self, input: &AutofillAgentInput) -> Result<RunState, AppError> {
        if input.page_url.trim().is_empty() {
            return Err(AppError::Validation("page_url cannot be empty".to_string()));
        }
        if input.dom_html.is_none() && input.extracted_fields.is_none() {
            return Err(AppError::Validation(
                "one of dom_html or extracted_fields is required".to_string(),
            ));
        }

        let mut state = initialize(input);
        let patch = self.extract_form_fields(input);
        state.apply(patch);
        let patch = self.generate_answers(input, &state).await;
        state.apply(patch);
        let patch = self.assemble_autofill_plan(&state).await;
        state.apply(patch);
        Ok(state)
    }

    fn extract_form_fields(&self, input: &AutofillAgentInput) -> StatePatch {
        let extraction_input = ExtractionInput {
            dom_html: input.dom_html.as_deref(),
            extracted_fields: input.extracted_fields.as_deref(),
        };
        match self.extractor.extract(extraction_input) {
            Ok(form_fields) => {
                info!(
                    "Extracted {} form fields for run {}",
                    form_fields.len(),
                    input.run_id
                );
                StatePatch {
                    form_fields: Some(form_fields),
                    ..StatePatch::default()
                }
            }
            Err(e) => StatePatch {
                form_fields: Some(vec![]),
                errors: vec![format!("Error in extract_form_fields: {e}")],
                ..StatePatch::default()
            },
        }
    }

    async fn generate_answers(&self, input: &AutofillAgentInput, state: &RunState) -> StatePatch {
        if state.form_fields.is_empty() {
            warn!("generate_answers: no form fields for run {}", input.run_id);
            return StatePatch {
                answers: Some(BTreeMap::new()),
                ..StatePatch::default()
            };
        }

        let ctx = AnswerContext {
            page_url: &input.page_url,
            user: &input.user,
            job: &input.job,
            resume_profile: input.resume_profile.as_ref(),
        };

        match generate_answers(
            self.model,
            &state.form_fields,
            &ctx,
            self.settings.strict_autofill_only,
        )
        .await
        {
            Ok(answers) => StatePatch {
                answers: Some(answers),
                ..StatePatch::default()
            },
            // Never a partial map: a failed generation leaves the answer
            // map empty and the assembler marks the run failed.
            Err(e) => StatePatch {
                answers: Some(BTreeMap::new()),
                errors: vec![format!("Error in generate_answers: {e}")],
                ..StatePatch::default()
            },
        }
    }

    async fn assemble_autofill_plan(&self, state: &RunState) -> StatePatch {
        let plan_json = build_autofill_plan(
            &state.form_fields,
            &state.answers,
            state.run_id,
            &state.page_url,
            self.settings.strict_autofill_only,
        );
        let plan_summary = summarize_autofill_plan(&plan_json);

        let mut errors: Vec<String> = Vec::new();
        let mut status = if state.errors.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };

        if let Err(e) = self
            .store
            .update_run(state.run_id, &plan_json, &plan_summary, status)
            .await
        {
            // Persistence failure still returns the in-memory plan; the
            // caller must not trust it for future cache lookups.
            errors.push(format!("Error in assemble_autofill_plan: {e}"));
            status = RunStatus::Failed;
        }

        StatePatch {
            plan_json: Some(plan_json),
            plan_summary: Some(plan_summary),
            status: Some(status),
            errors,
            ..StatePatch::default()
        }
    }
}

fn initialize(input: &AutofillAgentInput) -> RunState {
    info!("Initializing autofill pipeline for run {}", input.run_id);
    RunState {
        run_id: input.run_id,
        page_url: input.page_url.clone(),
        form_fields: vec![],
        answers: BTreeMap::new(),
        plan_json: None,
        plan_summary: None,
        status: RunStatus::Running,
        errors: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autofill::fields::{
        AnswerAction, FormField, InputType, LlmAnswerItem, LlmAnswersResponse,
    };
    use crate::autofill::store::{CreateRunParams, FeedbackParams};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct StubExtractor(Result<Vec<FormField>, String>);

    impl FieldExtractionStrategy for StubExtractor {
        fn extract(&self, _input: ExtractionInput<'_>) -> Result<Vec<FormField>, AppError> {
            self.0
                .clone()
                .map_err(AppError::Validation)
        }
    }

    struct StubModel(Result<LlmAnswersResponse, String>);

    #[async_trait]
    impl AnswerModel for StubModel {
        async fn answer_fields(
            &self,
            _prompt: &str,
            _system: &str,
        ) -> Result<LlmAnswersResponse, AppError> {
            self.0.clone().map_err(AppError::Llm)
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        fail_update: bool,
        finalized: Mutex<Vec<(Uuid, RunStatus)>>,
    }

    #[async_trait]
    impl RunStore for MemoryStore {
        async fn create_run(&self, _params: &CreateRunParams<'_>) -> Result<Uuid, AppError> {
            Ok(Uuid::new_v4())
        }

        async fn update_run(
            &self,
            run_id: Uuid,
            _plan_json: &AutofillPlanJson,
            _plan_summary: &AutofillPlanSummary,
            status: RunStatus,
        ) -> Result<(), AppError> {
            if self.fail_update {
                return Err(AppError::NotFound("no row".to_string()));
            }
            self.finalized.lock().unwrap().push((run_id, status));
            Ok(())
        }

        async fn get_run(
            &self,
            _run_id: Uuid,
            _user_id: Uuid,
        ) -> Result<Option<crate::models::run::AutofillRunRow>, AppError> {
            Ok(None)
        }

        async fn get_completed_plan(
            &self,
            _job_application_id: Uuid,
            _user_id: Uuid,
            _page_url: &str,
            _dom_html_hash: Option<&str>,
        ) -> Result<Option<crate::models::run::AutofillRunRow>, AppError> {
            Ok(None)
        }

        async fn record_event(
            &self,
            _run_id: Uuid,
            _user_id: Uuid,
            _event_type: &str,
            _payload: Option<&Value>,
        ) -> Result<(), AppError> {
            Ok(())
        }

        async fn record_feedback(&self, _params: &FeedbackParams<'_>) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn form_field(signature: &str) -> FormField {
        FormField {
            question_signature: signature.to_string(),
            label: signature.to_string(),
            input_type: InputType::Text,
            options: None,
            selector: None,
            required: false,
        }
    }

    fn answer_item(value: Value) -> LlmAnswerItem {
        serde_json::from_value(json!({
            "value": value,
            "action": "autofill",
            "confidence": 0.9,
            "source": "profile",
        }))
        .unwrap()
    }

    fn input() -> AutofillAgentInput {
        AutofillAgentInput {
            run_id: Uuid::new_v4(),
            job_application_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            page_url: "https://jobs.example.com/apply".to_string(),
            dom_html: Some("<form></form>".to_string()),
            extracted_fields: None,
            user: UserContext::default(),
            job: JobContext::default(),
            resume_profile: None,
        }
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            strict_autofill_only: true,
        }
    }

    #[tokio::test]
    async fn test_happy_path_completes_and_persists() {
        let extractor = StubExtractor(Ok(vec![form_field("email"), form_field("phone")]));
        let model = StubModel(Ok(LlmAnswersResponse {
            answers: [
                ("email".to_string(), answer_item(json!("a@b.com"))),
                ("phone".to_string(), answer_item(json!("555-0100"))),
            ]
            .into_iter()
            .collect(),
        }));
        let store = MemoryStore::default();

        let pipeline = AutofillPipeline {
            extractor: &extractor,
            model: &model,
            store: &store,
            settings: settings(),
        };
        let state = pipeline.execute(&input()).await.unwrap();

        assert_eq!(state.status, RunStatus::Completed);
        assert!(state.errors.is_empty());
        let plan = state.plan_json.unwrap();
        assert_eq!(plan.fields.len(), 2);
        assert_eq!(plan.fields[0].value, json!("a@b.com"));
        let summary = state.plan_summary.unwrap();
        assert_eq!(summary.total_fields, 2);
        assert_eq!(summary.autofilled_fields, 2);

        let finalized = store.finalized.lock().unwrap();
        assert_eq!(finalized.len(), 1);
        assert_eq!(finalized[0].1, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_extraction_error_flows_to_failed_terminal_state() {
        let extractor = StubExtractor(Err("no extracted_fields provided".to_string()));
        let model = StubModel(Err("must not be reached".to_string()));
        let store = MemoryStore::default();

        let pipeline = AutofillPipeline {
            extractor: &extractor,
            model: &model,
            store: &store,
            settings: settings(),
        };
        let state = pipeline.execute(&input()).await.unwrap();

        // Extraction failed, answer generation saw zero fields (no model
        // call), and assembly still produced a structurally valid plan.
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.errors.len(), 1);
        assert!(state.form_fields.is_empty());
        assert!(state.answers.is_empty());
        let plan = state.plan_json.unwrap();
        assert!(plan.fields.is_empty());
        assert_eq!(state.plan_summary.unwrap().total_fields, 0);

        // The failed terminal status was still persisted.
        let finalized = store.finalized.lock().unwrap();
        assert_eq!(finalized[0].1, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_model_failure_yields_skip_plan_and_failed_status() {
        let extractor = StubExtractor(Ok(vec![form_field("email")]));
        let model = StubModel(Err("response violates the expected schema".to_string()));
        let store = MemoryStore::default();

        let pipeline = AutofillPipeline {
            extractor: &extractor,
            model: &model,
            store: &store,
            settings: settings(),
        };
        let state = pipeline.execute(&input()).await.unwrap();

        assert_eq!(state.status, RunStatus::Failed);
        let plan = state.plan_json.unwrap();
        // Totality holds even with an empty answer map.
        assert_eq!(plan.fields.len(), 1);
        assert_eq!(plan.fields[0].action, AnswerAction::Skip);
        assert_eq!(state.plan_summary.unwrap().skipped_fields, 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_still_returns_plan() {
        let extractor = StubExtractor(Ok(vec![form_field("email")]));
        let model = StubModel(Ok(LlmAnswersResponse {
            answers: [("email".to_string(), answer_item(json!("a@b.com")))]
                .into_iter()
                .collect(),
        }));
        let store = MemoryStore {
            fail_update: true,
            ..MemoryStore::default()
        };

        let pipeline = AutofillPipeline {
            extractor: &extractor,
            model: &model,
            store: &store,
            settings: settings(),
        };
        let state = pipeline.execute(&input()).await.unwrap();

        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.errors.len(), 1);
        assert!(state.plan_json.is_some());
        assert_eq!(state.plan_summary.unwrap().autofilled_fields, 1);
    }

    #[tokio::test]
    async fn test_empty_page_url_fails_fast() {
        let extractor = StubExtractor(Ok(vec![]));
        let model = StubModel(Err("unreached".to_string()));
        let store = MemoryStore::default();
        let pipeline = AutofillPipeline {
            extractor: &extractor,
            model: &model,
            store: &store,
            settings: settings(),
        };
        let mut bad_input = input();
        bad_input.page_url = "  ".to_string();
        assert!(pipeline.execute(&bad_input).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_both_inputs_fails_fast() {
        let extractor = StubExtractor(Ok(vec![]));
        let model = StubModel(Err("unreached".to_string()));
        let store = MemoryStore::default();
        let pipeline = AutofillPipeline {
            extractor: &extractor,
            model: &model,
            store: &store,
            settings: settings(),
        };
        let mut bad_input = input();
        bad_input.dom_html = None;
        bad_input.extracted_fields = None;
        assert!(pipeline.execute(&bad_input).await.is_err());
    }

    #[tokio::test]
    async fn test_replay_produces_identical_plan() {
        let extractor = StubExtractor(Ok(vec![form_field("email"), form_field("phone")]));
        let model = StubModel(Ok(LlmAnswersResponse {
            answers: [
                ("email".to_string(), answer_item(json!("a@b.com"))),
                ("phone".to_string(), answer_item(json!("555-0100"))),
            ]
            .into_iter()
            .collect(),
        }));
        let store = MemoryStore::default();
        let pipeline = AutofillPipeline {
            extractor: &extractor,
            model: &model,
            store: &store,
            settings: settings(),
        };

        let run_input = input();
        let first = pipeline.execute(&run_input).await.unwrap();
        let second = pipeline.execute(&run_input).await.unwrap();
        assert_eq!(
            serde_json::to_string(&first.plan_json).unwrap(),
            serde_json::to_string(&second.plan_json).unwrap()
        );
    }
}
