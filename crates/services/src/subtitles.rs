use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shorts_timeline::SubtitleCue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubtitleError {
    #[error("subtitle style template not found at {}", path.display())]
    MissingStyle { path: PathBuf },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persists subtitle cues for the renderer.
#[async_trait]
pub trait SubtitleSink: Send + Sync + 'static {
    async fn write(&self, path: &Path, cues: &[SubtitleCue]) -> Result<(), SubtitleError>;
}

/// Writes Advanced SubStation Alpha files: a style template followed by one
/// `Dialogue:` line per cue.
pub struct AssSubtitleSink {
    style_path: PathBuf,
}

impl AssSubtitleSink {
    pub const DEFAULT_STYLE: &'static str = "Default";

    pub fn new(style_path: impl Into<PathBuf>) -> Self {
        Self {
            style_path: style_path.into(),
        }
    }
}

pub fn render_ass(header: &str, cues: &[SubtitleCue], style: &str) -> String {
    let mut out = String::with_capacity(header.len() + cues.len() * 96);
    out.push_str(header);
    if !header.is_empty() && !header.ends_with('\n') {
        out.push('\n');
    }
    for cue in cues {
        out.push_str(&cue.to_dialogue(style));
        out.push('\n');
    }
    out
}

#[async_trait]
impl SubtitleSink for AssSubtitleSink {
    async fn write(&self, path: &Path, cues: &[SubtitleCue]) -> Result<(), SubtitleError> {
        let header = match tokio::fs::read_to_string(&self.style_path).await {
            Ok(header) => header,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SubtitleError::MissingStyle {
                    path: self.style_path.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, render_ass(&header, cues, Self::DEFAULT_STYLE)).await?;
        tracing::debug!(path = %path.display(), cues = cues.len(), "Subtitle file written");
        Ok(())
    }
}
