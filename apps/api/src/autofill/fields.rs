//! Shared data model for the autofill pipeline.
//!
//! A `FormField` is one detected input control; a `FormFieldAnswer` is the
//! single answer bound to its `question_signature`; the plan types are the
//! joined terminal artifact handed to the browser-side filler.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Classified input control type. ARIA combobox widgets (JS select
/// replacements) classify as `Select` even though they are not native
/// `<select>` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Textarea,
    Select,
    Radio,
    Checkbox,
    Date,
    Number,
    Email,
    Password,
    File,
    Tel,
    Url,
    Hidden,
    Unknown,
}

impl InputType {
    /// Fields whose answers must resolve to one of a declared option set.
    pub fn is_option_constrained(self) -> bool {
        matches!(self, InputType::Select | InputType::Radio | InputType::Checkbox)
    }
}

/// What the downstream UI will attempt for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerAction {
    Autofill,
    Suggest,
    Skip,
}

/// Provenance tag recording which input produced an answer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    Profile,
    Resume,
    Jd,
    Llm,
    Unknown,
}

/// Lifecycle status of a persisted autofill run. A run transitions exactly
/// once from `Running` to a terminal status and is immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

/// One detected input control.
///
/// Invariant: `question_signature` is unique within the extracted set, and
/// the list order is the order the plan will preserve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub question_signature: String,
    pub label: String,
    pub input_type: InputType,
    /// Present only for select/radio/checkbox-like fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// DOM locator hint for the browser-side filler; unused by this core.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub required: bool,
}

/// One answer bound to a `question_signature`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormFieldAnswer {
    pub value: Value,
    pub source: AnswerSource,
    /// Clamped to [0.0, 1.0].
    pub confidence: f64,
    pub action: AnswerAction,
}

/// A `FormField` joined with its matched answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanField {
    pub question_signature: String,
    pub label: String,
    pub input_type: InputType,
    pub required: bool,
    pub action: AnswerAction,
    pub value: Value,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// The pipeline's terminal artifact. Field order follows extraction order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutofillPlanJson {
    pub run_id: Uuid,
    pub page_url: String,
    pub fields: Vec<PlanField>,
}

/// Pure aggregate over `PlanField.action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutofillPlanSummary {
    pub total_fields: u32,
    pub autofilled_fields: u32,
    pub suggested_fields: u32,
    pub skipped_fields: u32,
}

/// One entry of the answer model's structured response.
///
/// Defaults make a sparse entry decodable, but the prompt contract requires
/// the model to emit every field explicitly.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmAnswerItem {
    #[serde(default)]
    pub value: Value,
    #[serde(default = "default_action")]
    pub action: AnswerAction,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub source: Option<AnswerSource>,
}

fn default_action() -> AnswerAction {
    AnswerAction::Autofill
}

/// The answer model's full structured response: one entry per submitted
/// field signature. `BTreeMap` keeps iteration deterministic.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmAnswersResponse {
    pub answers: BTreeMap<String, LlmAnswerItem>,
}
