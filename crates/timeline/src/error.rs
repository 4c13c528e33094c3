use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimelineError {
    #[error("transcript has no segments")]
    EmptyTranscript,
    #[error("segment {index} has invalid bounds [{start}, {end}]")]
    InvalidSegment { index: usize, start: f64, end: f64 },
    #[error("segment {segment}: word {word} starts before the previous word")]
    WordsOutOfOrder { segment: usize, word: usize },
    #[error("cue {index} starts after it ends ({start} > {end})")]
    InvalidCueInterval { index: usize, start: f64, end: f64 },
    #[error("image count must be at least 1")]
    InvalidImageCount,
}
