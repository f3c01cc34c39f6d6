use std::sync::Arc;

use crate::autofill::answers::AnswerModel;
use crate::autofill::extract::FieldExtractionStrategy;
use crate::autofill::store::RunStore;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum
/// extractors. The three capability traits are swapped at startup: the
/// extraction strategy via `EXTRACTION_STRATEGY`, the answer model and
/// run store by their production backends.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RunStore>,
    pub model: Arc<dyn AnswerModel>,
    pub extractor: Arc<dyn FieldExtractionStrategy>,
    pub config: Config,
}
