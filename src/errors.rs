//! Shared error taxonomy.
//!
//! Every stage returns its own `thiserror` enum; they all report an
//! [`ErrorClass`] so the caller-facing layer can pick a status without
//! matching on every variant.

use thiserror::Error;

/// Coarse classification used when turning a core error into a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing credential or model id; no backend contact was attempted.
    Configuration,
    /// Transport failure, safety block or abnormal finish from the backend.
    Backend,
    /// The model (or the request) produced text we could not interpret.
    Format,
}

/// Failures to interpret model output. Internal-facing only: these are
/// logged, never shown verbatim to end users and never fed back to the model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("expected 5 `|`-separated fields in generation directive, found {found}")]
    DirectiveArity { found: usize },
    #[error("missing <data> tag in generation reply")]
    MissingDataTag,
    #[error("invalid JSON in <data> tag: {0}")]
    InvalidPayload(String),
    #[error("non-numeric survivability value `{0}`")]
    NonNumericSurvivability(String),
    #[error("no crop blocks could be extracted from the reformatted analysis")]
    NoCropsExtracted,
}

impl FormatError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Format
    }
}
