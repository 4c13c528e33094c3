pub mod generation;
pub mod jobs;
pub mod render;
pub mod storage;
pub mod subtitles;

pub use generation::{GenerationError, GenerationService, ReplicateClient};
pub use jobs::{
    Collaborators, Job, JobError, JobStatus, JobStore, JobView, Orchestrator, PipelineConfig,
    PipelineError,
};
pub use render::{CanvasConfig, FfmpegRenderer, RenderError, Renderer, TimedImage};
pub use storage::{ObjectStorage, S3Storage, StorageError, ensure_bucket};
pub use subtitles::{AssSubtitleSink, SubtitleError, SubtitleSink};
