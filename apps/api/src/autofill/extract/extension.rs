//! Ingestion of pre-extracted field descriptors from the browser extension.
//!
//! The extension's DOM walker ships camelCase descriptors with `{value,
//! label}` option pairs and an explicit `isCombobox` flag; this strategy
//! re-keys them into the canonical `FormField` shape.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::autofill::countries::enrich_country_fields;
use crate::autofill::extract::{clean_label, ExtractionInput, FieldExtractionStrategy};
use crate::autofill::fields::{FormField, InputType};
use crate::errors::AppError;

/// One field descriptor as captured by the extension's DOM walker.
/// Serializable so a descriptor list can stand in for the DOM snapshot
/// when computing a run's content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExtractedField {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub is_combobox: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub options: Vec<RawOption>,
}

/// Option entries arrive either as `{value, label}` pairs or bare strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawOption {
    Pair {
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        label: Option<String>,
    },
    Text(String),
}

impl RawOption {
    fn into_text(self) -> Option<String> {
        match self {
            RawOption::Pair { value, label } => value
                .filter(|v| !v.trim().is_empty())
                .or(label.filter(|l| !l.trim().is_empty())),
            RawOption::Text(text) => {
                if text.trim().is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
        }
    }
}

pub struct ExtensionFieldExtractor;

impl FieldExtractionStrategy for ExtensionFieldExtractor {
    fn extract(&self, input: ExtractionInput<'_>) -> Result<Vec<FormField>, AppError> {
        let raw_fields = input.extracted_fields.ok_or_else(|| {
            AppError::Validation(
                "extracted_fields is required for the extension strategy".to_string(),
            )
        })?;

        let mut out: Vec<FormField> = Vec::with_capacity(raw_fields.len());
        let mut seen: HashSet<String> = HashSet::new();

        for (idx, raw) in raw_fields.iter().enumerate() {
            let signature = derive_signature(raw, idx);
            // Duplicates are dropped; first occurrence wins.
            if !seen.insert(signature.clone()) {
                continue;
            }

            let raw_label = raw
                .label
                .as_deref()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or(&signature);
            let required = raw.required || raw_label.contains('*');
            let label = clean_label(raw_label);

            let input_type = if raw.is_combobox {
                InputType::Select
            } else {
                map_input_type(raw.input_type.as_deref().unwrap_or("text"))
            };

            let options: Vec<String> = raw
                .options
                .iter()
                .cloned()
                .filter_map(RawOption::into_text)
                .collect();

            out.push(FormField {
                question_signature: signature,
                label,
                input_type,
                options: if options.is_empty() { None } else { Some(options) },
                selector: raw.selector.clone().filter(|s| !s.trim().is_empty()),
                required,
            });
        }

        enrich_country_fields(&mut out);
        info!("Converted {} pre-extracted fields", out.len());
        Ok(out)
    }
}

fn derive_signature(raw: &RawExtractedField, idx: usize) -> String {
    if let Some(id) = raw.id.as_deref().filter(|v| !v.trim().is_empty()) {
        return id.to_string();
    }
    if let Some(name) = raw.name.as_deref().filter(|v| !v.trim().is_empty()) {
        return name.to_string();
    }
    // Fallback: strip locator syntax from the selector, then positional.
    if let Some(selector) = raw.selector.as_deref() {
        let stripped = selector
            .replace('#', "")
            .replace("[name=\"", "")
            .replace("\"]", "");
        if !stripped.trim().is_empty() {
            return stripped;
        }
    }
    format!("field_{idx}")
}

fn map_input_type(raw: &str) -> InputType {
    match raw.trim().to_lowercase().as_str() {
        "text" => InputType::Text,
        "textarea" => InputType::Textarea,
        "select" => InputType::Select,
        "radio" => InputType::Radio,
        "checkbox" => InputType::Checkbox,
        "date" => InputType::Date,
        "number" => InputType::Number,
        "email" => InputType::Email,
        "password" => InputType::Password,
        "file" => InputType::File,
        "tel" => InputType::Tel,
        "url" => InputType::Url,
        // Listbox-driving search boxes behave like plain text for answers.
        "search" => InputType::Text,
        _ => InputType::Text,
    }
}
