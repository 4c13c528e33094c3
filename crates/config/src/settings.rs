use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub s3: S3Settings,
    pub replicate: ReplicateSettings,
    pub render: RenderSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    /// Object key prefix for uploaded shorts.
    pub key_prefix: String,
    pub presign_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplicateSettings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub script_model: String,
    pub voice_model: String,
    pub transcription_model: String,
    pub image_model: String,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderSettings {
    /// Root for per-job scratch directories.
    pub work_dir: String,
    pub ffmpeg_path: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub zoom: f64,
    pub fade_secs: f64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleMode {
    /// One karaoke cue per transcript segment.
    Segment,
    /// One cue per word, contiguous.
    Word,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineSettings {
    pub image_count: usize,
    /// `{script}` is replaced with the generated narration.
    pub image_prompt_template: String,
    pub subtitle_mode: SubtitleMode,
    pub subtitle_style_path: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let work_dir = std::env::temp_dir().join("shorts-maker");

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("SHORTS"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 8080)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("s3.endpoint", "http://127.0.0.1:9002")?
            .set_default("s3.access_key", "minioadmin")?
            .set_default("s3.secret_key", "minioadmin")?
            .set_default("s3.bucket", "shorts-maker")?
            .set_default("s3.region", "us-east-1")?
            .set_default("s3.key_prefix", "shorts")?
            .set_default("s3.presign_ttl_secs", 12 * 60 * 60)?
            .set_default("replicate.api_key", None::<String>)?
            .set_default("replicate.api_base", "https://api.replicate.com/v1")?
            .set_default("replicate.script_model", "meta/meta-llama-3-70b-instruct")?
            .set_default("replicate.voice_model", "lucataco/xtts-v2")?
            .set_default("replicate.transcription_model", "victor-upmeet/whisperx")?
            .set_default("replicate.image_model", "black-forest-labs/flux-schnell")?
            .set_default("replicate.poll_interval_ms", 1000)?
            .set_default("replicate.max_poll_attempts", 600)?
            .set_default("render.work_dir", work_dir.to_string_lossy().to_string())?
            .set_default("render.ffmpeg_path", "ffmpeg")?
            .set_default("render.width", 1080)?
            .set_default("render.height", 1920)?
            .set_default("render.fps", 30)?
            .set_default("render.zoom", 1.5)?
            .set_default("render.fade_secs", 1.0)?
            .set_default("pipeline.image_count", 4)?
            .set_default(
                "pipeline.image_prompt_template",
                "I have the following story: \n{script}\nGenerate an image for this specific part",
            )?
            .set_default("pipeline.subtitle_mode", "segment")?
            .set_default("pipeline.subtitle_style_path", "assets/base.ass")?
            .build()?;

        config.try_deserialize()
    }
}
