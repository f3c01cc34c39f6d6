//! Server-side HTML extraction strategy.
//!
//! Parses a serialized DOM snapshot with `scraper`, scopes traversal to a
//! form-like root, and resolves each surviving control into a canonical
//! `FormField`. ARIA combobox widgets (React-Select and similar JS
//! replacements) classify as `select` even though they are not native
//! `<select>` elements.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::info;

use crate::autofill::countries::enrich_country_fields;
use crate::autofill::extract::{clean_label, ExtractionInput, FieldExtractionStrategy};
use crate::autofill::fields::{FormField, InputType};
use crate::errors::AppError;

/// Conventional application-form roots, most specific first. Falls back to
/// the whole document when none match.
const FORM_ROOT_SELECTORS: &[&str] = &["#application_form", "#application-form", "form"];

pub struct HtmlFieldExtractor;

impl FieldExtractionStrategy for HtmlFieldExtractor {
    fn extract(&self, input: ExtractionInput<'_>) -> Result<Vec<FormField>, AppError> {
        let html = input.dom_html.ok_or_else(|| {
            AppError::Validation("dom_html is required for the html strategy".to_string())
        })?;

        let doc = Html::parse_document(html);
        let mut fields = extract_document_fields(&doc);
        enrich_country_fields(&mut fields);
        info!("Extracted {} form fields from DOM snapshot", fields.len());
        Ok(fields)
    }
}

fn extract_document_fields(doc: &Html) -> Vec<FormField> {
    let controls_sel = sel("input, textarea, select");

    let candidates: Vec<ElementRef<'_>> = match find_form_root(doc) {
        Some(root) => root.select(&controls_sel).collect(),
        None => doc.select(&controls_sel).collect(),
    };

    let mut out: Vec<FormField> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (idx, el) in candidates.iter().enumerate() {
        if !is_user_control(doc, *el) {
            continue;
        }

        let signature = derive_signature(*el, idx);
        if signature.is_empty() || !seen.insert(signature.clone()) {
            continue;
        }

        let raw_label = resolve_raw_label(doc, *el);
        let required = el.value().attr("required").is_some()
            || el.value().attr("aria-required") == Some("true")
            || raw_label.as_deref().is_some_and(|l| l.contains('*'));

        let label = raw_label
            .as_deref()
            .map(clean_label)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| signature.clone());

        let input_type = classify_input_type(*el);
        let options = resolve_options(doc, *el, input_type);

        out.push(FormField {
            question_signature: signature,
            label,
            input_type,
            options,
            selector: derive_selector(*el),
            required,
        });
    }

    out
}

fn sel(source: &str) -> Selector {
    Selector::parse(source).expect("static selector")
}

fn find_form_root(doc: &Html) -> Option<ElementRef<'_>> {
    FORM_ROOT_SELECTORS
        .iter()
        .find_map(|source| doc.select(&sel(source)).next())
}

fn element_by_id<'a>(doc: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    doc.tree
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().attr("id") == Some(id))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

/// Drops controls a user never interacts with: hidden inputs, buttons, and
/// the internal search boxes JS widgets use to drive their listboxes.
fn is_user_control(doc: &Html, el: ElementRef<'_>) -> bool {
    let element = el.value();

    if element.attr("aria-hidden") == Some("true") || element.attr("tabindex") == Some("-1") {
        return false;
    }

    if element.name() != "input" {
        return true;
    }

    let input_type = element.attr("type").unwrap_or("text").to_lowercase();
    if matches!(
        input_type.as_str(),
        "hidden" | "submit" | "button" | "reset" | "image"
    ) {
        return false;
    }

    if input_type == "search" {
        let placeholder_is_search = element
            .attr("placeholder")
            .is_some_and(|p| p.to_lowercase().contains("search"));
        let role = element.attr("role").unwrap_or("");
        let widget_internal = matches!(role, "combobox" | "searchbox")
            || references_listbox(doc, element.attr("aria-controls"));
        if placeholder_is_search && widget_internal {
            return false;
        }
    }

    true
}

fn references_listbox(doc: &Html, aria_controls: Option<&str>) -> bool {
    let Some(ids) = aria_controls else {
        return false;
    };
    ids.split_whitespace().any(|id| {
        id.to_lowercase().contains("listbox")
            || element_by_id(doc, id).is_some_and(|el| el.value().attr("role") == Some("listbox"))
    })
}

fn derive_signature(el: ElementRef<'_>, idx: usize) -> String {
    let element = el.value();
    if let Some(id) = element.attr("id").filter(|v| !v.trim().is_empty()) {
        return id.to_string();
    }
    if let Some(name) = element.attr("name").filter(|v| !v.trim().is_empty()) {
        return name.to_string();
    }
    format!("field_{idx}")
}

fn derive_selector(el: ElementRef<'_>) -> Option<String> {
    let element = el.value();
    if let Some(id) = element.attr("id").filter(|v| !v.trim().is_empty()) {
        return Some(format!("#{id}"));
    }
    element
        .attr("name")
        .filter(|v| !v.trim().is_empty())
        .map(|name| format!("[name=\"{name}\"]"))
}

fn classify_input_type(el: ElementRef<'_>) -> InputType {
    let element = el.value();

    // ARIA combobox widgets behave like selects regardless of their tag.
    if element.attr("role") == Some("combobox")
        || element.attr("aria-autocomplete") == Some("list")
    {
        return InputType::Select;
    }

    match element.name() {
        "select" => InputType::Select,
        "textarea" => InputType::Textarea,
        "input" => match element.attr("type").unwrap_or("text").to_lowercase().as_str() {
            "text" | "search" => InputType::Text,
            "email" => InputType::Email,
            "tel" => InputType::Tel,
            "url" => InputType::Url,
            "number" => InputType::Number,
            "date" => InputType::Date,
            "password" => InputType::Password,
            "file" => InputType::File,
            "checkbox" => InputType::Checkbox,
            "radio" => InputType::Radio,
            "hidden" => InputType::Hidden,
            _ => InputType::Text,
        },
        _ => InputType::Unknown,
    }
}

/// Label precedence: `<label for>` → `aria-label` → `aria-labelledby` →
/// ancestor `<label>` wrapper. Returns the raw text; cleaning happens after
/// required-detection.
fn resolve_raw_label(doc: &Html, el: ElementRef<'_>) -> Option<String> {
    let element = el.value();

    if let Some(id) = element.attr("id").filter(|v| !v.trim().is_empty()) {
        let label_sel = sel("label");
        if let Some(label_el) = doc
            .select(&label_sel)
            .find(|l| l.value().attr("for") == Some(id))
        {
            let text = element_text(label_el);
            if !text.trim().is_empty() {
                return Some(text);
            }
        }
    }

    if let Some(aria_label) = element.attr("aria-label").filter(|v| !v.trim().is_empty()) {
        return Some(aria_label.to_string());
    }

    if let Some(labelledby) = element.attr("aria-labelledby") {
        let text = labelledby
            .split_whitespace()
            .filter_map(|id| element_by_id(doc, id))
            .map(element_text)
            .collect::<Vec<_>>()
            .join(" ");
        if !text.trim().is_empty() {
            return Some(text);
        }
    }

    if let Some(wrapper) = el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "label")
    {
        let text = element_text(wrapper);
        if !text.trim().is_empty() {
            return Some(text);
        }
    }

    None
}

fn resolve_options(doc: &Html, el: ElementRef<'_>, input_type: InputType) -> Option<Vec<String>> {
    let options = match input_type {
        InputType::Select => {
            if el.value().name() == "select" {
                native_select_options(el)
            } else {
                aria_listbox_options(doc, el)
            }
        }
        InputType::Radio => radio_group_options(doc, el),
        _ => vec![],
    };

    if options.is_empty() {
        None
    } else {
        Some(options)
    }
}

fn native_select_options(el: ElementRef<'_>) -> Vec<String> {
    let option_sel = sel("option");
    el.select(&option_sel)
        .map(|opt| element_text(opt).trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

/// Best-effort option scrape for ARIA widgets: a listbox referenced via
/// `aria-controls`/`aria-owns`, or the `<id>-listbox` naming convention
/// React-Select uses for its `<id>-input` elements.
fn aria_listbox_options(doc: &Html, el: ElementRef<'_>) -> Vec<String> {
    let element = el.value();

    let mut listbox_ids: Vec<String> = Vec::new();
    for attr in ["aria-controls", "aria-owns"] {
        if let Some(ids) = element.attr(attr) {
            listbox_ids.extend(ids.split_whitespace().map(str::to_string));
        }
    }
    if let Some(id) = element.attr("id") {
        if let Some(prefix) = id.strip_suffix("-input") {
            listbox_ids.push(format!("{prefix}-listbox"));
        }
    }

    let option_sel = sel("[role=\"option\"]");
    let item_sel = sel("li");
    for id in listbox_ids {
        let Some(listbox) = element_by_id(doc, &id) else {
            continue;
        };
        let mut options: Vec<String> = listbox
            .select(&option_sel)
            .map(|opt| element_text(opt).trim().to_string())
            .filter(|text| !text.is_empty())
            .collect();
        if options.is_empty() {
            options = listbox
                .select(&item_sel)
                .map(|opt| element_text(opt).trim().to_string())
                .filter(|text| !text.is_empty())
                .collect();
        }
        if !options.is_empty() {
            return options;
        }
    }

    vec![]
}

/// Radios sharing a `name` collapse into one field; their `value`
/// attributes become the option set.
fn radio_group_options(doc: &Html, el: ElementRef<'_>) -> Vec<String> {
    let Some(name) = el.value().attr("name") else {
        return vec![];
    };
    let radio_sel = sel("input[type=\"radio\"]");
    doc.select(&radio_sel)
        .filter(|r| r.value().attr("name") == Some(name))
        .filter_map(|r| r.value().attr("value"))
        .map(str::to_string)
        .filter(|v| !v.is_empty())
        .collect()
}
