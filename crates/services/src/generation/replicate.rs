use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use shorts_config::ReplicateSettings;
use shorts_timeline::Transcript;
use tokio_util::sync::CancellationToken;

use super::{GenerationError, GenerationService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: PredictionStatus,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Value,
}

/// Replicate predictions API client.
///
/// Each call creates a prediction and polls it until it settles.
pub struct ReplicateClient {
    client: reqwest::Client,
    settings: ReplicateSettings,
}

impl ReplicateClient {
    pub fn new(settings: ReplicateSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    fn api_key(&self) -> Result<&str, GenerationError> {
        match self.settings.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(GenerationError::MissingApiKey {
                provider: self.name().to_string(),
            }),
        }
    }

    fn base(&self) -> &str {
        self.settings.api_base.trim_end_matches('/')
    }

    /// `owner/name:version` pins a version, `owner/name` runs the latest one.
    fn create_request(&self, model: &str, input: Value) -> (String, Value) {
        match model.split_once(':') {
            Some((_, version)) => (
                format!("{}/predictions", self.base()),
                json!({ "version": version, "input": input }),
            ),
            None if model.contains('/') => (
                format!("{}/models/{model}/predictions", self.base()),
                json!({ "input": input }),
            ),
            None => (
                format!("{}/predictions", self.base()),
                json!({ "version": model, "input": input }),
            ),
        }
    }

    async fn fetch(
        &self,
        request: reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Prediction, GenerationError> {
        let key = self.api_key()?;
        let send = async {
            let body = request
                .bearer_auth(key)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await?;
            Ok::<_, GenerationError>(body)
        };
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            body = send => body?,
        };
        serde_json::from_value(body).map_err(|e| GenerationError::ShapeMismatch {
            what: "prediction",
            detail: e.to_string(),
        })
    }

    /// Runs `model` to completion and returns its raw output.
    async fn run(
        &self,
        model: &str,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, GenerationError> {
        let (url, body) = self.create_request(model, input);
        let mut prediction = self.fetch(self.client.post(&url).json(&body), cancel).await?;
        tracing::debug!(model, prediction_id = %prediction.id, "Prediction created");

        let poll_url = format!("{}/predictions/{}", self.base(), prediction.id);
        let interval = Duration::from_millis(self.settings.poll_interval_ms);
        let mut attempts = 0;

        loop {
            match prediction.status {
                PredictionStatus::Succeeded => return Ok(prediction.output),
                PredictionStatus::Failed | PredictionStatus::Canceled | PredictionStatus::Unknown => {
                    return Err(GenerationError::PredictionFailed {
                        id: prediction.id,
                        status: prediction.status.as_str().to_string(),
                        reason: error_reason(&prediction.error),
                    });
                }
                PredictionStatus::Starting | PredictionStatus::Processing => {}
            }

            if attempts >= self.settings.max_poll_attempts {
                return Err(GenerationError::PollTimeout {
                    id: prediction.id,
                    attempts,
                });
            }
            attempts += 1;

            tokio::select! {
                _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }
            prediction = self.fetch(self.client.get(&poll_url), cancel).await?;
        }
    }
}

fn error_reason(error: &Value) -> String {
    match error {
        Value::Null => "no reason given".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn mismatch(what: &'static str, output: &Value) -> GenerationError {
    let mut detail = output.to_string();
    if detail.len() > 200 {
        let cut = (0..=200).rev().find(|&i| detail.is_char_boundary(i)).unwrap_or(0);
        detail.truncate(cut);
        detail.push_str("...");
    }
    GenerationError::ShapeMismatch { what, detail }
}

/// Language models stream tokens, so output is usually an array of fragments.
pub(crate) fn decode_script(output: &Value) -> Result<String, GenerationError> {
    let text = match output {
        Value::String(s) => s.clone(),
        Value::Array(parts) => {
            let mut text = String::new();
            for part in parts {
                text.push_str(part.as_str().ok_or_else(|| mismatch("script", output))?);
            }
            text
        }
        _ => return Err(mismatch("script", output)),
    };

    let text = text.trim();
    // Some prompts ask the model for `{"script": ..., "tags": ...}`.
    let script = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => match map.get("script").and_then(Value::as_str) {
            Some(script) => script.trim().to_string(),
            None => text.to_string(),
        },
        _ => text.to_string(),
    };

    if script.is_empty() {
        return Err(mismatch("script", output));
    }
    Ok(script)
}

pub(crate) fn decode_audio(output: &Value) -> Result<String, GenerationError> {
    let url = match output {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) => items.first().and_then(Value::as_str),
        Value::Object(map) => map
            .get("audio_out")
            .or_else(|| map.get("audio"))
            .and_then(Value::as_str),
        _ => None,
    };
    url.filter(|u| !u.is_empty())
        .map(str::to_string)
        .ok_or_else(|| mismatch("audio", output))
}

pub(crate) fn decode_transcript(output: &Value) -> Result<Transcript, GenerationError> {
    serde_json::from_value(output.clone()).map_err(|e| GenerationError::ShapeMismatch {
        what: "transcript",
        detail: e.to_string(),
    })
}

pub(crate) fn decode_images(output: &Value) -> Result<Vec<String>, GenerationError> {
    match output {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| mismatch("images", output))
            })
            .collect(),
        _ => Err(mismatch("images", output)),
    }
}

#[async_trait]
impl GenerationService for ReplicateClient {
    fn name(&self) -> &str {
        "replicate"
    }

    fn validate(&self) -> Result<(), GenerationError> {
        self.api_key().map(|_| ())
    }

    async fn generate_script(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        let input = json!({
            "prompt": prompt,
            "max_tokens": 512,
            "min_tokens": 50,
            "temperature": 0.9,
            "top_p": 0.9,
            "presence_penalty": 0.0,
        });
        let output = self.run(&self.settings.script_model, input, cancel).await?;
        decode_script(&output)
    }

    async fn synthesize_voice(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        let input = json!({ "text": text, "language": "en" });
        let output = self.run(&self.settings.voice_model, input, cancel).await?;
        decode_audio(&output)
    }

    async fn transcribe(
        &self,
        audio_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Transcript, GenerationError> {
        let input = json!({ "audio_file": audio_url, "align_output": true });
        let output = self
            .run(&self.settings.transcription_model, input, cancel)
            .await?;
        decode_transcript(&output)
    }

    async fn generate_images(
        &self,
        prompt: &str,
        count: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, GenerationError> {
        let input = json!({
            "prompt": prompt,
            "num_outputs": count,
            "aspect_ratio": "9:16",
            "output_format": "jpg",
        });
        let output = self.run(&self.settings.image_model, input, cancel).await?;
        decode_images(&output)
    }
}
