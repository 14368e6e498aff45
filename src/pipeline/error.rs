use thiserror::Error;

#[derive(Debug, Error)]
#[error("Invalid input image: {0}")]
pub struct ValidationError(pub String);

#[derive(Debug, Error)]
#[error("Image analysis failed: {0}")]
pub struct AnalysisError(pub String);

#[derive(Debug, Error)]
#[error("Language model request failed: {0}")]
pub struct ModelError(pub String);

#[derive(Debug, Error)]
#[error("Artifact storage failed: {0}")]
pub struct StorageError(pub String);

/// Failures that abort a request. Model failures never show up here; the
/// critique degrades to fallback text instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Analysis(_) => "analysis",
            PipelineError::Storage(_) => "storage",
        }
    }
}
