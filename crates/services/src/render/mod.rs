//! Video composition from generated stills, narration and subtitles.

pub mod ffmpeg;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shorts_config::RenderSettings;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use ffmpeg::FfmpegRenderer;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("ffmpeg exited with {status}: {stderr}")]
    Ffmpeg { status: String, stderr: String },
    #[error("no images to compose")]
    NoImages,
    #[error("cancelled")]
    Cancelled,
}

/// Output frame geometry and motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Final zoom factor reached by the end of each still.
    pub zoom: f64,
    pub fade_secs: f64,
}

impl From<&RenderSettings> for CanvasConfig {
    fn from(settings: &RenderSettings) -> Self {
        Self {
            width: settings.width,
            height: settings.height,
            fps: settings.fps,
            zoom: settings.zoom,
            fade_secs: settings.fade_secs,
        }
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            zoom: 1.5,
            fade_secs: 1.0,
        }
    }
}

/// A generated still and the narration time it illustrates.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedImage {
    pub url: String,
    pub timestamp: f64,
}

#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    /// Renders `images` in order, each shown for `per_image_secs`, into a
    /// silent video under `work_dir`.
    async fn compose_image_sequence(
        &self,
        images: &[TimedImage],
        per_image_secs: f64,
        canvas: &CanvasConfig,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, RenderError>;

    /// Adds the narration track and burns in `subtitles`. The result is no
    /// longer than the shorter of the two inputs.
    async fn mux_audio_and_subtitles(
        &self,
        video: &Path,
        audio_url: &str,
        subtitles: &Path,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, RenderError>;
}
