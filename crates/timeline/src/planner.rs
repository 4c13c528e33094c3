use serde::Serialize;

use crate::error::TimelineError;
use crate::transcript::Transcript;

/// A point in the narration that gets its own illustration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageWindow {
    pub prompt: String,
    /// Seconds from the start of the narration.
    pub timestamp: f64,
}

/// Spreads a fixed number of images evenly over the narration.
#[derive(Debug, Clone, Copy)]
pub struct ImagePlanner {
    count: usize,
}

impl ImagePlanner {
    pub fn new(count: usize) -> Result<Self, TimelineError> {
        if count == 0 {
            return Err(TimelineError::InvalidImageCount);
        }
        Ok(Self { count })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// How long each image stays on screen for a narration of `total` seconds.
    pub fn display_duration(&self, total: f64) -> f64 {
        total.max(0.0) / self.count as f64
    }

    /// `i * total / count` for each image, ascending.
    pub fn timestamps(&self, total: f64) -> Vec<f64> {
        let interval = self.display_duration(total);
        (0..self.count).map(|i| i as f64 * interval).collect()
    }

    /// Builds one window per timestamp. `context` is prepended to every prompt.
    pub fn plan(
        &self,
        transcript: &Transcript,
        context: &str,
    ) -> Result<Vec<ImageWindow>, TimelineError> {
        let total = transcript.duration().ok_or(TimelineError::EmptyTranscript)?;
        let fallback = transcript.segments[0].text.trim();

        let windows = self
            .timestamps(total)
            .into_iter()
            .map(|timestamp| {
                let text = relevant_text(transcript, timestamp);
                let text = if text.is_empty() { fallback } else { text.as_str() };
                ImageWindow {
                    prompt: join_prompt(context, text),
                    timestamp,
                }
            })
            .collect();
        Ok(windows)
    }
}

fn join_prompt(context: &str, text: &str) -> String {
    let context = context.trim_end();
    if context.is_empty() {
        text.to_string()
    } else {
        format!("{context}\n{text}")
    }
}

/// Transcript text around `timestamp`: the covering segment (or the first one
/// when the timestamp falls outside every segment) plus any following segments
/// that have already started by `timestamp`.
pub fn relevant_text(transcript: &Transcript, timestamp: f64) -> String {
    let segments = &transcript.segments;
    let first = segments
        .iter()
        .position(|s| s.start <= timestamp && timestamp < s.end)
        .unwrap_or(0);

    let mut parts = Vec::new();
    for (i, segment) in segments.iter().enumerate().skip(first) {
        let text = segment.text.trim();
        if !text.is_empty() {
            parts.push(text);
        }
        match segments.get(i + 1) {
            Some(next) if next.start > timestamp => break,
            _ => {}
        }
    }
    parts.join(" ")
}
