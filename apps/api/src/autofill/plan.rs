//! Plan Assembler — the pure join of extracted fields and generated
//! answers into the ordered `AutofillPlanJson`, plus its summary aggregate.

use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use crate::autofill::fields::{
    AnswerAction, AnswerSource, AutofillPlanJson, AutofillPlanSummary, FormField, FormFieldAnswer,
    PlanField,
};

/// Fills in the "no answer" sentinel for fields the generator never
/// answered, and re-clamps/collapses defensively on the way into the plan.
pub fn normalize_answer(
    answer: Option<&FormFieldAnswer>,
    strict_autofill_only: bool,
) -> FormFieldAnswer {
    let Some(answer) = answer else {
        return FormFieldAnswer {
            value: Value::Null,
            source: AnswerSource::Unknown,
            confidence: 0.0,
            action: AnswerAction::Skip,
        };
    };

    let mut action = answer.action;
    if strict_autofill_only && action == AnswerAction::Suggest {
        action = AnswerAction::Autofill;
    }

    FormFieldAnswer {
        value: answer.value.clone(),
        source: answer.source,
        confidence: answer.confidence.clamp(0.0, 1.0),
        action,
    }
}

/// Joins fields and answers in `form_fields` order. Every extracted field
/// appears exactly once; answer-map entries without a field are ignored.
pub fn build_autofill_plan(
    form_fields: &[FormField],
    answers: &BTreeMap<String, FormFieldAnswer>,
    run_id: Uuid,
    page_url: &str,
    strict_autofill_only: bool,
) -> AutofillPlanJson {
    let fields = form_fields
        .iter()
        .map(|field| {
            let answer = normalize_answer(
                answers.get(&field.question_signature),
                strict_autofill_only,
            );
            PlanField {
                question_signature: field.question_signature.clone(),
                label: field.label.clone(),
                input_type: field.input_type,
                required: field.required,
                action: answer.action,
                value: answer.value,
                confidence: answer.confidence,
                selector: field.selector.clone(),
                options: field.options.clone(),
            }
        })
        .collect();

    AutofillPlanJson {
        run_id,
        page_url: page_url.to_string(),
        fields,
    }
}

pub fn summarize_autofill_plan(plan: &AutofillPlanJson) -> AutofillPlanSummary {
    let mut summary = AutofillPlanSummary {
        total_fields: plan.fields.len() as u32,
        autofilled_fields: 0,
        suggested_fields: 0,
        skipped_fields: 0,
    };
    for field in &plan.fields {
        match field.action {
            AnswerAction::Autofill => summary.autofilled_fields += 1,
            AnswerAction::Suggest => summary.suggested_fields += 1,
            AnswerAction::Skip => summary.skipped_fields += 1,
        }
    }
    summary
}
