//! Remote generative models: script, voice, transcript and images.

pub mod replicate;

use async_trait::async_trait;
use shorts_timeline::Transcript;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use replicate::ReplicateClient;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Missing API key for {provider}")]
    MissingApiKey { provider: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected {what} payload: {detail}")]
    ShapeMismatch { what: &'static str, detail: String },
    #[error("Prediction {id} {status}: {reason}")]
    PredictionFailed {
        id: String,
        status: String,
        reason: String,
    },
    #[error("Prediction {id} still running after {attempts} polls")]
    PollTimeout { id: String, attempts: u32 },
    #[error("cancelled")]
    Cancelled,
}

/// Backend that turns prompts into the media a short is built from.
///
/// Every call honours `cancel` and returns [`GenerationError::Cancelled`]
/// once it fires.
#[async_trait]
pub trait GenerationService: Send + Sync + 'static {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Checks credentials without touching the network.
    fn validate(&self) -> Result<(), GenerationError>;

    async fn generate_script(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError>;

    /// Returns a URL of the synthesized narration.
    async fn synthesize_voice(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError>;

    async fn transcribe(
        &self,
        audio_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Transcript, GenerationError>;

    /// Returns up to `count` image URLs for `prompt`.
    async fn generate_images(
        &self,
        prompt: &str,
        count: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, GenerationError>;
}
