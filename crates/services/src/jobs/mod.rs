pub mod error;
pub mod job_store;
pub mod model;
pub mod orchestrator;

pub use error::{JobError, PipelineError, StageFailure};
pub use job_store::JobStore;
pub use model::{Job, JobStatus, JobView, unescape_share_url};
pub use orchestrator::{Collaborators, Orchestrator, PipelineConfig};
