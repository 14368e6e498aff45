pub mod annotate;
pub mod aspect;
pub mod codec;
pub mod critique;
pub mod crop;
pub mod enhance;
pub mod error;
pub mod orchestrator;
pub mod publish;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use error::PipelineError;
pub use orchestrator::{PipelineOrchestrator, PipelineSettings};
pub use publish::{discard_artifacts, publish_artifacts, PublishedArtifacts};
