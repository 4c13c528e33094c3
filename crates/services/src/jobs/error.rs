use shorts_timeline::TimelineError;
use thiserror::Error;

use super::model::JobStatus;
use crate::generation::GenerationError;
use crate::render::RenderError;
use crate::storage::StorageError;
use crate::subtitles::SubtitleError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Job not found: {0}")]
    NotFound(String),
    #[error("Job already exists: {0}")]
    Duplicate(String),
}

/// What went wrong inside a stage.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Subtitle(#[from] SubtitleError),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("generation returned no image for window at {timestamp:.2}s")]
    NoImages { timestamp: f64 },
    #[error("cancelled")]
    Cancelled,
}

/// A stage failure tagged with the stage it happened in.
#[derive(Debug, Error)]
#[error("{stage}: {source}")]
pub struct PipelineError {
    pub stage: JobStatus,
    pub source: StageFailure,
}

impl PipelineError {
    pub fn new(stage: JobStatus, source: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.source,
            StageFailure::Cancelled
                | StageFailure::Generation(GenerationError::Cancelled)
                | StageFailure::Storage(StorageError::Cancelled)
                | StageFailure::Render(RenderError::Cancelled)
        )
    }
}

/// `map_err` adapter: `.map_err(at(stage))?`.
pub(crate) fn at<E: Into<StageFailure>>(stage: JobStatus) -> impl FnOnce(E) -> PipelineError {
    move |err| PipelineError::new(stage, err)
}
