use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use shorts_config::{Settings, SubtitleMode};
use shorts_timeline::{CueMode, ImagePlanner, TimelineError, build_cues};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::error::{JobError, PipelineError, StageFailure, at};
use super::job_store::JobStore;
use super::model::{Job, JobStatus, JobView};
use crate::generation::GenerationService;
use crate::render::{CanvasConfig, Renderer, TimedImage};
use crate::storage::{ObjectStorage, ensure_bucket};
use crate::subtitles::SubtitleSink;

const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// External systems a job talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub generation: Arc<dyn GenerationService>,
    pub storage: Arc<dyn ObjectStorage>,
    pub renderer: Arc<dyn Renderer>,
    pub subtitles: Arc<dyn SubtitleSink>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub bucket: String,
    pub key_prefix: String,
    pub share_url_ttl: Duration,
    pub image_count: usize,
    /// `{script}` is replaced with the generated narration.
    pub image_prompt_template: String,
    pub cue_mode: CueMode,
    /// Each job gets its own subdirectory here.
    pub work_dir: PathBuf,
    pub canvas: CanvasConfig,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            bucket: settings.s3.bucket.clone(),
            key_prefix: settings.s3.key_prefix.clone(),
            share_url_ttl: Duration::from_secs(settings.s3.presign_ttl_secs),
            image_count: settings.pipeline.image_count,
            image_prompt_template: settings.pipeline.image_prompt_template.clone(),
            cue_mode: match settings.pipeline.subtitle_mode {
                SubtitleMode::Segment => CueMode::Segment,
                SubtitleMode::Word => CueMode::Word,
            },
            work_dir: PathBuf::from(&settings.render.work_dir),
            canvas: CanvasConfig::from(&settings.render),
        }
    }

    /// `{prefix}/generated_short_{id}{ext}`
    pub fn object_key(&self, job_id: &str, extension: &str) -> String {
        let prefix = self.key_prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("generated_short_{job_id}{extension}")
        } else {
            format!("{prefix}/generated_short_{job_id}{extension}")
        }
    }
}

/// Accepts prompts, runs each as an independent background job and answers
/// status queries from the shared registry.
pub struct Orchestrator {
    store: Arc<JobStore>,
    collaborators: Collaborators,
    config: Arc<PipelineConfig>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(store: Arc<JobStore>, collaborators: Collaborators, config: PipelineConfig) -> Self {
        Self {
            store,
            collaborators,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Registers a job for `prompt` and starts it in the background.
    ///
    /// Returns the job id as soon as the job is visible to [`Self::get_status`].
    pub fn submit(&self, prompt: &str) -> Result<String, JobError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(JobError::Validation("prompt must not be empty".to_string()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.store.insert(Job::new(id.clone()))?;
        tracing::info!(job_id = %id, "Job accepted");

        let run = JobRun {
            id: id.clone(),
            prompt: prompt.to_string(),
            store: Arc::clone(&self.store),
            collaborators: self.collaborators.clone(),
            config: Arc::clone(&self.config),
            cancel: self.shutdown.child_token(),
            work_dir: self.config.work_dir.join(&id),
        };
        let span = tracing::info_span!("job", job_id = %id);
        tokio::spawn(run.run().instrument(span));

        Ok(id)
    }

    pub fn get_status(&self, id: &str) -> Result<JobView, JobError> {
        self.store
            .get(id)
            .map(|job| job.view())
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Cancels every running job. Jobs stop at their next stage boundary or
    /// cancellable wait and end as failed.
    pub fn shutdown(&self) {
        tracing::info!(jobs = self.store.len(), "Cancelling running jobs");
        self.shutdown.cancel();
    }
}

struct JobRun {
    id: String,
    prompt: String,
    store: Arc<JobStore>,
    collaborators: Collaborators,
    config: Arc<PipelineConfig>,
    cancel: CancellationToken,
    work_dir: PathBuf,
}

impl JobRun {
    async fn run(self) {
        let result = self.execute().await;

        match result {
            Ok(url) => {
                self.store.update(&self.id, |job| job.complete(url));
                tracing::info!("Job completed");
            }
            Err(error) => {
                if error.is_cancelled() {
                    tracing::warn!(stage = %error.stage, "Job cancelled");
                } else {
                    tracing::error!(stage = %error.stage, %error, "Job failed");
                }
                let message = error.to_string();
                self.store.update(&self.id, |job| job.fail(message));
            }
        }

        self.cleanup().await;
    }

    /// Records `stage` on the job unless it has been cancelled.
    fn enter(&self, stage: JobStatus) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::new(stage, StageFailure::Cancelled));
        }
        let advanced = self
            .store
            .update(&self.id, |job| job.advance(stage))
            .unwrap_or(false);
        if advanced {
            tracing::info!(%stage, "Stage started");
        } else {
            tracing::debug!(%stage, "Stage update ignored");
        }
        Ok(())
    }

    async fn execute(&self) -> Result<String, PipelineError> {
        let Collaborators {
            generation,
            storage,
            renderer,
            subtitles,
        } = &self.collaborators;
        let config = &*self.config;
        let cancel = &self.cancel;

        let stage = JobStatus::ConnectingToStorage;
        self.enter(stage)?;
        ensure_bucket(storage.as_ref(), &config.bucket, cancel)
            .await
            .map_err(at(stage))?;

        let stage = JobStatus::CreatingGenerationService;
        self.enter(stage)?;
        generation.validate().map_err(at(stage))?;
        tracing::debug!(backend = generation.name(), "Generation backend ready");

        let stage = JobStatus::GeneratingScript;
        self.enter(stage)?;
        let script = generation
            .generate_script(&self.prompt, cancel)
            .await
            .map_err(at(stage))?;

        let stage = JobStatus::GeneratingVoice;
        self.enter(stage)?;
        let audio_url = generation
            .synthesize_voice(&script, cancel)
            .await
            .map_err(at(stage))?;

        let stage = JobStatus::GeneratingTranscription;
        self.enter(stage)?;
        let transcript = generation
            .transcribe(&audio_url, cancel)
            .await
            .map_err(at(stage))?;
        let total = transcript
            .duration()
            .ok_or_else(|| PipelineError::new(stage, TimelineError::EmptyTranscript))?;

        let stage = JobStatus::GeneratingImages;
        self.enter(stage)?;
        let planner = ImagePlanner::new(config.image_count).map_err(at(stage))?;
        let context = config.image_prompt_template.replace("{script}", &script);
        let windows = planner.plan(&transcript, &context).map_err(at(stage))?;
        let mut images = Vec::with_capacity(windows.len());
        for window in windows {
            let url = generation
                .generate_images(&window.prompt, 1, cancel)
                .await
                .map_err(at(stage))?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    PipelineError::new(stage, StageFailure::NoImages { timestamp: window.timestamp })
                })?;
            images.push(TimedImage {
                url,
                timestamp: window.timestamp,
            });
        }

        let stage = JobStatus::CreatingSubtitleFile;
        self.enter(stage)?;
        let cues = build_cues(&transcript, config.cue_mode).map_err(at(stage))?;
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(at(stage))?;
        let subtitle_path = self.work_dir.join("subtitles.ass");
        subtitles
            .write(&subtitle_path, &cues)
            .await
            .map_err(at(stage))?;

        let stage = JobStatus::CreatingVideoFromImages;
        self.enter(stage)?;
        let sequence = renderer
            .compose_image_sequence(
                &images,
                planner.display_duration(total),
                &config.canvas,
                &self.work_dir,
                cancel,
            )
            .await
            .map_err(at(stage))?;

        let stage = JobStatus::AddingAudioToVideo;
        self.enter(stage)?;
        let video = renderer
            .mux_audio_and_subtitles(&sequence, &audio_url, &subtitle_path, &self.work_dir, cancel)
            .await
            .map_err(at(stage))?;

        let stage = JobStatus::PreparingFileForUpload;
        self.enter(stage)?;
        let size = tokio::fs::metadata(&video).await.map_err(at(stage))?.len();
        let key = config.object_key(&self.id, &extension_of(&video));

        let stage = JobStatus::Uploading;
        self.enter(stage)?;
        storage
            .put_object(&config.bucket, &key, &video, size, VIDEO_CONTENT_TYPE, cancel)
            .await
            .map_err(at(stage))?;
        tracing::info!(%key, size, "Short uploaded");

        let stage = JobStatus::GeneratingShareUrl;
        self.enter(stage)?;
        storage
            .presigned_get(&config.bucket, &key, config.share_url_ttl, cancel)
            .await
            .map_err(at(stage))
    }

    async fn cleanup(&self) {
        match tokio::fs::remove_dir_all(&self.work_dir).await {
            Ok(()) => tracing::debug!(dir = %self.work_dir.display(), "Work dir removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(dir = %self.work_dir.display(), error = %e, "Failed to remove work dir")
            }
        }
    }
}

/// `.ext` of `path`, or `.mp4` when it has none.
fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".mp4".to_string())
}
