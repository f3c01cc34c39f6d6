//! Answer Generator — produces exactly one `FormFieldAnswer` per extracted
//! `FormField`.
//!
//! File-upload fields are answered deterministically; every other field is
//! answered in a single batched call through the `AnswerModel` trait, then
//! normalized: confidence clamped, option-constrained values matched against
//! the field's declared option set.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::autofill::fields::{
    AnswerAction, AnswerSource, FormField, FormFieldAnswer, InputType, LlmAnswersResponse,
};
use crate::autofill::prompts::{build_answers_prompt, ANSWERS_SYSTEM};
use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::models::job::JobContext;
use crate::models::user::UserContext;

const COVER_LETTER_HINTS: &[&str] = &["cover letter", "cover_letter", "coverletter"];

/// The answer capability. Implement this to swap model backends without
/// touching the pipeline; tests use deterministic stubs.
///
/// Carried in `AppState` as `Arc<dyn AnswerModel>`.
#[async_trait]
pub trait AnswerModel: Send + Sync {
    async fn answer_fields(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<LlmAnswersResponse, AppError>;
}

/// Production backend: one batched Claude call through the shared client.
pub struct ClaudeAnswerModel {
    llm: LlmClient,
}

impl ClaudeAnswerModel {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AnswerModel for ClaudeAnswerModel {
    async fn answer_fields(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<LlmAnswersResponse, AppError> {
        self.llm
            .call_json::<LlmAnswersResponse>(prompt, system)
            .await
            .map_err(|e| AppError::Llm(format!("Answer generation call failed: {e}")))
    }
}

/// Condensed context forwarded to the answer model. The raw DOM snapshot is
/// deliberately excluded.
pub struct AnswerContext<'a> {
    pub page_url: &'a str,
    pub user: &'a UserContext,
    pub job: &'a JobContext,
    pub resume_profile: Option<&'a Value>,
}

/// Generates the full `{signature -> answer}` map for `fields`.
///
/// A model failure (transport, malformed response, schema violation)
/// returns `Err` — never a partial map.
pub async fn generate_answers(
    model: &dyn AnswerModel,
    fields: &[FormField],
    ctx: &AnswerContext<'_>,
    strict_autofill_only: bool,
) -> Result<BTreeMap<String, FormFieldAnswer>, AppError> {
    let mut answers: BTreeMap<String, FormFieldAnswer> = BTreeMap::new();

    // File inputs are resolved without the model: the filler interprets the
    // sentinel values as "attach the named document".
    let mut model_fields: Vec<&FormField> = Vec::new();
    for field in fields {
        if field.input_type == InputType::File {
            answers.insert(field.question_signature.clone(), file_field_answer(field));
        } else {
            model_fields.push(field);
        }
    }

    if model_fields.is_empty() {
        return Ok(answers);
    }

    let prompt = build_answers_prompt(&model_fields, ctx, strict_autofill_only);
    debug!("Answer generation prompt: {prompt}");

    let response = model.answer_fields(&prompt, ANSWERS_SYSTEM).await?;

    for field in model_fields {
        let answer = match response.answers.get(&field.question_signature) {
            Some(item) => {
                let mut action = item.action;
                if strict_autofill_only && action == AnswerAction::Suggest {
                    action = AnswerAction::Autofill;
                }
                let mut value = item.value.clone();
                if field.input_type.is_option_constrained() {
                    if let Some(options) = field.options.as_deref() {
                        if let Some(matched) = match_option(&value, options) {
                            value = Value::String(matched);
                        }
                    }
                }
                FormFieldAnswer {
                    value,
                    source: item.source.unwrap_or(AnswerSource::Llm),
                    confidence: item.confidence.clamp(0.0, 1.0),
                    action,
                }
            }
            // The contract forbids omissions, but a missing key must never
            // drop the field.
            None => FormFieldAnswer {
                value: Value::Null,
                source: AnswerSource::Unknown,
                confidence: 0.0,
                action: AnswerAction::Autofill,
            },
        };
        answers.insert(field.question_signature.clone(), answer);
    }

    let (autofilled, suggested, skipped) =
        answers
            .values()
            .fold((0u32, 0u32, 0u32), |(a, s, k), answer| match answer.action {
                AnswerAction::Autofill => (a + 1, s, k),
                AnswerAction::Suggest => (a, s + 1, k),
                AnswerAction::Skip => (a, s, k + 1),
            });
    info!(
        "Generated answers for {} fields (autofill={autofilled}, suggest={suggested}, skip={skipped})",
        answers.len()
    );

    Ok(answers)
}

fn file_field_answer(field: &FormField) -> FormFieldAnswer {
    let label = field.label.to_lowercase();
    if COVER_LETTER_HINTS.iter().any(|hint| label.contains(hint)) {
        FormFieldAnswer {
            value: Value::String("cover_letter".to_string()),
            source: AnswerSource::Profile,
            confidence: 0.0,
            action: AnswerAction::Skip,
        }
    } else {
        FormFieldAnswer {
            value: Value::String("resume".to_string()),
            source: AnswerSource::Profile,
            confidence: 1.0,
            action: AnswerAction::Autofill,
        }
    }
}

/// Normalized comparison form: lowercased, whitespace collapsed, everything
/// outside `[a-z0-9 ]` dropped.
fn norm_option_text(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Matches a model value against a field's option set: exact normalized
/// match first, then the option with the longest normalized substring
/// overlap. `None` means the raw value is kept as-is.
fn match_option(value: &Value, options: &[String]) -> Option<String> {
    let target = norm_option_text(&value_as_text(value)?);
    if target.is_empty() {
        return None;
    }

    for option in options {
        if norm_option_text(option) == target {
            return Some(option.clone());
        }
    }

    let mut best: Option<&String> = None;
    let mut best_len = 0;
    for option in options {
        let norm_option = norm_option_text(option);
        if norm_option.is_empty() {
            continue;
        }
        if (target.contains(&norm_option) || norm_option.contains(&target))
            && norm_option.len() > best_len
        {
            best_len = norm_option.len();
            best = Some(option);
        }
    }
    best.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autofill::fields::LlmAnswerItem;
    use serde_json::json;

    struct StaticModel(LlmAnswersResponse);

    #[async_trait]
    impl AnswerModel for StaticModel {
        async fn answer_fields(
            &self,
            _prompt: &str,
            _system: &str,
        ) -> Result<LlmAnswersResponse, AppError> {
            Ok(self.0.clone())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl AnswerModel for FailingModel {
        async fn answer_fields(
            &self,
            _prompt: &str,
            _system: &str,
        ) -> Result<LlmAnswersResponse, AppError> {
            Err(AppError::Llm("response violates the expected schema".to_string()))
        }
    }

    struct UnreachableModel;

    #[async_trait]
    impl AnswerModel for UnreachableModel {
        async fn answer_fields(
            &self,
            _prompt: &str,
            _system: &str,
        ) -> Result<LlmAnswersResponse, AppError> {
            panic!("model must not be called for file-only field sets");
        }
    }

    fn field(signature: &str, input_type: InputType) -> FormField {
        FormField {
            question_signature: signature.to_string(),
            label: signature.to_string(),
            input_type,
            options: None,
            selector: None,
            required: false,
        }
    }

    fn item(value: Value, action: AnswerAction, confidence: f64) -> LlmAnswerItem {
        serde_json::from_value(json!({
            "value": value,
            "action": action,
            "confidence": confidence,
            "source": "llm",
        }))
        .unwrap()
    }

    fn response(entries: Vec<(&str, LlmAnswerItem)>) -> LlmAnswersResponse {
        LlmAnswersResponse {
            answers: entries
                .into_iter()
                .map(|(sig, item)| (sig.to_string(), item))
                .collect(),
        }
    }

    fn test_ctx<'a>(user: &'a UserContext, job: &'a JobContext) -> AnswerContext<'a> {
        AnswerContext {
            page_url: "https://jobs.example.com/apply",
            user,
            job,
            resume_profile: None,
        }
    }

    #[tokio::test]
    async fn test_file_fields_answered_without_model() {
        let mut resume = field("resume_upload", InputType::File);
        resume.label = "Resume/CV".to_string();
        let mut cover = field("cover_upload", InputType::File);
        cover.label = "Cover Letter (optional)".to_string();

        let user = UserContext::default();
        let job = JobContext::default();
        let answers = generate_answers(
            &UnreachableModel,
            &[resume, cover],
            &test_ctx(&user, &job),
            true,
        )
        .await
        .unwrap();

        let resume_answer = &answers["resume_upload"];
        assert_eq!(resume_answer.value, json!("resume"));
        assert_eq!(resume_answer.action, AnswerAction::Autofill);
        assert_eq!(resume_answer.confidence, 1.0);
        assert_eq!(resume_answer.source, AnswerSource::Profile);

        let cover_answer = &answers["cover_upload"];
        assert_eq!(cover_answer.value, json!("cover_letter"));
        assert_eq!(cover_answer.action, AnswerAction::Skip);
        assert_eq!(cover_answer.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_every_field_gets_exactly_one_answer() {
        let fields = vec![
            field("email", InputType::Email),
            field("linkedin_url", InputType::Url),
        ];
        // The model omits linkedin_url; it must still appear, defaulted.
        let model = StaticModel(response(vec![(
            "email",
            item(json!("a@b.com"), AnswerAction::Autofill, 0.9),
        )]));

        let user = UserContext::default();
        let job = JobContext::default();
        let answers = generate_answers(&model, &fields, &test_ctx(&user, &job), true)
            .await
            .unwrap();

        assert_eq!(answers.len(), 2);
        let defaulted = &answers["linkedin_url"];
        assert!(defaulted.value.is_null());
        assert_eq!(defaulted.source, AnswerSource::Unknown);
        assert_eq!(defaulted.confidence, 0.0);
        assert_eq!(defaulted.action, AnswerAction::Autofill);
    }

    #[tokio::test]
    async fn test_confidence_is_clamped() {
        let fields = vec![field("email", InputType::Email)];
        let model = StaticModel(response(vec![(
            "email",
            item(json!("a@b.com"), AnswerAction::Autofill, 3.5),
        )]));
        let user = UserContext::default();
        let job = JobContext::default();
        let answers = generate_answers(&model, &fields, &test_ctx(&user, &job), true)
            .await
            .unwrap();
        assert_eq!(answers["email"].confidence, 1.0);
    }

    #[tokio::test]
    async fn test_fuzzy_option_match_on_radio() {
        let mut relocate = field("relocate", InputType::Radio);
        relocate.options = Some(vec!["Yes".to_string(), "No".to_string()]);
        let model = StaticModel(response(vec![(
            "relocate",
            item(json!("yes please"), AnswerAction::Autofill, 0.7),
        )]));
        let user = UserContext::default();
        let job = JobContext::default();
        let answers = generate_answers(&model, &[relocate], &test_ctx(&user, &job), true)
            .await
            .unwrap();
        assert_eq!(answers["relocate"].value, json!("Yes"));
    }

    #[tokio::test]
    async fn test_unmatched_option_value_is_kept_raw() {
        let mut degree = field("degree", InputType::Select);
        degree.options = Some(vec!["Bachelor's".to_string(), "Master's".to_string()]);
        let model = StaticModel(response(vec![(
            "degree",
            item(json!("Bootcamp"), AnswerAction::Autofill, 0.4),
        )]));
        let user = UserContext::default();
        let job = JobContext::default();
        let answers = generate_answers(&model, &[degree], &test_ctx(&user, &job), true)
            .await
            .unwrap();
        assert_eq!(answers["degree"].value, json!("Bootcamp"));
    }

    #[tokio::test]
    async fn test_strict_mode_collapses_suggest() {
        let fields = vec![field("salary", InputType::Number)];
        let model = StaticModel(response(vec![(
            "salary",
            item(json!(150000), AnswerAction::Suggest, 0.6),
        )]));
        let user = UserContext::default();
        let job = JobContext::default();
        let answers = generate_answers(&model, &fields, &test_ctx(&user, &job), true)
            .await
            .unwrap();
        assert_eq!(answers["salary"].action, AnswerAction::Autofill);
    }

    #[tokio::test]
    async fn test_relaxed_mode_preserves_suggest() {
        let fields = vec![field("salary", InputType::Number)];
        let model = StaticModel(response(vec![(
            "salary",
            item(json!(150000), AnswerAction::Suggest, 0.6),
        )]));
        let user = UserContext::default();
        let job = JobContext::default();
        let answers = generate_answers(&model, &fields, &test_ctx(&user, &job), false)
            .await
            .unwrap();
        assert_eq!(answers["salary"].action, AnswerAction::Suggest);
    }

    #[tokio::test]
    async fn test_model_failure_is_not_a_partial_map() {
        let fields = vec![
            field("email", InputType::Email),
            field("resume_upload", InputType::File),
        ];
        let user = UserContext::default();
        let job = JobContext::default();
        let result = generate_answers(&FailingModel, &fields, &test_ctx(&user, &job), true).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_norm_option_text() {
        assert_eq!(norm_option_text("  Yes,  please! "), "yes please");
        assert_eq!(norm_option_text("U.S. Citizen"), "us citizen");
        assert_eq!(norm_option_text("---"), "");
    }

    #[test]
    fn test_match_option_exact_beats_fuzzy() {
        let options = vec!["No".to_string(), "No sponsorship needed".to_string()];
        assert_eq!(match_option(&json!("no"), &options), Some("No".to_string()));
    }

    #[test]
    fn test_match_option_longest_overlap_wins() {
        let options = vec!["Male".to_string(), "Female".to_string()];
        // "male" is a substring of the normalized "female"; the longer
        // normalized option wins the overlap fallback.
        assert_eq!(
            match_option(&json!("fem"), &options),
            Some("Female".to_string())
        );
    }

    #[test]
    fn test_match_option_null_and_empty() {
        let options = vec!["Yes".to_string()];
        assert_eq!(match_option(&Value::Null, &options), None);
        assert_eq!(match_option(&json!("!!!"), &options), None);
    }

    #[test]
    fn test_match_option_boolean_value() {
        let options = vec!["True".to_string(), "False".to_string()];
        assert_eq!(
            match_option(&json!(true), &options),
            Some("True".to_string())
        );
    }
}
