use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline stages in execution order, followed by the two terminal states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Initialized,
    ConnectingToStorage,
    CreatingGenerationService,
    GeneratingScript,
    GeneratingVoice,
    GeneratingTranscription,
    GeneratingImages,
    CreatingSubtitleFile,
    CreatingVideoFromImages,
    AddingAudioToVideo,
    PreparingFileForUpload,
    Uploading,
    GeneratingShareUrl,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::ConnectingToStorage => "connecting_to_storage",
            Self::CreatingGenerationService => "creating_generation_service",
            Self::GeneratingScript => "generating_script",
            Self::GeneratingVoice => "generating_voice",
            Self::GeneratingTranscription => "generating_transcription",
            Self::GeneratingImages => "generating_images",
            Self::CreatingSubtitleFile => "creating_subtitle_file",
            Self::CreatingVideoFromImages => "creating_video_from_images",
            Self::AddingAudioToVideo => "adding_audio_to_video",
            Self::PreparingFileForUpload => "preparing_file_for_upload",
            Self::Uploading => "uploading",
            Self::GeneratingShareUrl => "generating_share_url",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    /// Share URL; empty until the job completes.
    pub url: String,
    /// Failure cause; empty unless the job failed.
    pub error: String,
    /// Every status the job has entered, oldest first.
    pub history: Vec<JobStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: JobStatus::Initialized,
            url: String::new(),
            error: String::new(),
            history: vec![JobStatus::Initialized],
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the job forward to `status`.
    ///
    /// Returns `false` and leaves the job untouched when it is already terminal
    /// or when `status` is not later than the current stage.
    pub fn advance(&mut self, status: JobStatus) -> bool {
        if self.status.is_terminal() || status == JobStatus::Failed || status <= self.status {
            return false;
        }
        self.status = status;
        self.history.push(status);
        self.updated_at = Utc::now();
        true
    }

    pub fn complete(&mut self, url: String) -> bool {
        if !self.advance(JobStatus::Completed) {
            return false;
        }
        self.url = url;
        true
    }

    pub fn fail(&mut self, error: String) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.history.push(JobStatus::Failed);
        self.error = error;
        self.updated_at = Utc::now();
        true
    }

    pub fn view(&self) -> JobView {
        JobView {
            id: self.id.clone(),
            status: self.status,
            url: unescape_share_url(&self.url),
            error: (!self.error.is_empty()).then(|| self.error.clone()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Client-facing snapshot of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobView {
    pub id: String,
    pub status: JobStatus,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Undoes the ampersand escaping some serializers apply to presigned URLs.
pub fn unescape_share_url(url: &str) -> String {
    url.replace("\\u0026", "&").replace("&amp;", "&")
}
