use serde::{Deserialize, Serialize};

/// Word-aligned transcript of the synthesized narration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    #[serde(default)]
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Word {
    /// Absent for tokens the aligner could not place, such as numerals.
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    /// Whisper-style payloads call this field `word`.
    #[serde(alias = "word")]
    pub text: String,
    #[serde(default, alias = "score")]
    pub confidence: f64,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Narration length: the end of the last segment.
    pub fn duration(&self) -> Option<f64> {
        self.segments.last().map(|s| s.end)
    }
}
