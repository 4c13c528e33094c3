use std::sync::Arc;

use shorts_config::Settings;
use shorts_services::{
    AssSubtitleSink, Collaborators, FfmpegRenderer, JobStore, Orchestrator, PipelineConfig,
    ReplicateClient, S3Storage,
};

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(settings: Settings, collaborators: Collaborators) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(JobStore::new()),
            collaborators,
            PipelineConfig::from_settings(&settings),
        ));
        Self {
            settings,
            orchestrator,
        }
    }
}

/// Production collaborators: Replicate, S3, ffmpeg and ASS files.
pub fn default_collaborators(settings: &Settings) -> Collaborators {
    Collaborators {
        generation: Arc::new(ReplicateClient::new(settings.replicate.clone())),
        storage: Arc::new(S3Storage::new(&settings.s3)),
        renderer: Arc::new(FfmpegRenderer::new(&settings.render)),
        subtitles: Arc::new(AssSubtitleSink::new(&settings.pipeline.subtitle_style_path)),
    }
}
