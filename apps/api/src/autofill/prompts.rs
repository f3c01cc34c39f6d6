// All LLM prompt constants and builders for the Autofill module.

use serde_json::json;

use crate::autofill::answers::AnswerContext;
use crate::autofill::fields::FormField;

/// System prompt for batched answer generation — enforces JSON-only output.
pub const ANSWERS_SYSTEM: &str =
    "You are an expert job-application assistant filling out an application form \
    on behalf of a candidate. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Builds the single batched answer-generation prompt: a JSON object
/// carrying the condensed user/job context, the optional resume profile,
/// and a descriptor for every non-file field.
pub fn build_answers_prompt(
    fields: &[&FormField],
    ctx: &AnswerContext<'_>,
    strict_autofill_only: bool,
) -> String {
    let field_count = fields.len();

    let fields_spec: Vec<serde_json::Value> = fields
        .iter()
        .map(|f| {
            json!({
                "question_signature": f.question_signature,
                "label": f.label,
                "input_type": f.input_type,
                "required": f.required,
                "options": f.options.clone().unwrap_or_default(),
            })
        })
        .collect();

    let action_rule = if strict_autofill_only {
        "MANDATORY: Set action='autofill' for ALL fields. Never use 'skip' or 'suggest'."
    } else {
        "Set action='autofill' for fields you can answer; use action='suggest' for \
         answers the candidate should review. Never use 'skip'."
    };

    let prompt_obj = json!({
        "task": format!(
            "Generate answers for ALL {field_count} job application form fields. \
             You MUST provide an answer for EVERY field."
        ),
        "critical_rules": [
            format!(
                "MANDATORY: Return exactly {field_count} answers - one for each field \
                 in form_fields. No field can be omitted."
            ),
            action_rule,
            "If you don't know an answer, still use action='autofill' with value='' \
             and confidence between 0.0-0.3.",
        ],
        "value_rules": [
            "For select/radio/checkbox with options: return EXACTLY one option string \
             from the provided list (case-sensitive match).",
            "For select/radio with no perfect match: pick the closest option, set \
             action='autofill' with lower confidence.",
            "For text/textarea: provide your best answer using user_ctx, resume_ctx, \
             or job_ctx data.",
            "For missing demographic/EEO info: use value='' with confidence=0.1 \
             (still action='autofill').",
            "Never invent sensitive data (SSN, bank details). Use empty string if \
             truly unknown.",
        ],
        "context": {
            "page_url": ctx.page_url,
            "user_ctx": ctx.user,
            "job_ctx": ctx.job,
            "resume_ctx": ctx.resume_profile,
        },
        "form_fields": fields_spec,
        "output_format": {
            "answers": {
                "<question_signature>": {
                    "value": "string|number|boolean|''",
                    "action": "autofill",
                    "confidence": "0.0-1.0",
                    "source": "profile|resume|jd|llm|unknown",
                }
            }
        },
        "final_reminder": format!(
            "You MUST return exactly {field_count} answer objects, keyed by \
             question_signature."
        ),
    });

    prompt_obj.to_string()
}
