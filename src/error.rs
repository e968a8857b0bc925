use thiserror::Error;

/// Hard failures of the extraction pipeline.
///
/// Per-field validation failures and ambiguous mappings are not errors: they
/// show up as omitted record fields and unmapped entries instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transcript could not be parsed: {0}")]
    ParseFailure(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
