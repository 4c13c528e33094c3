//! Subtitle cue construction.
//!
//! Two layouts are supported. [`CueMode::Segment`] emits one cue per transcript
//! segment carrying `\k` karaoke tags so the highlight sweeps word by word.
//! [`CueMode::Word`] emits one cue per word where each cue ends exactly when the
//! next word starts, so consecutive cues neither gap nor overlap.
//!
//! Word timings are clamped into their segment before use; transcripts from
//! the speech model are not guaranteed to respect segment bounds. Words the
//! model could not align carry no times and borrow them from their neighbours.

use serde::{Deserialize, Serialize};

use crate::error::TimelineError;
use crate::timecode::{clamp_non_negative, format_timestamp};
use crate::transcript::{Segment, Transcript, Word};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueMode {
    #[default]
    Segment,
    Word,
}

/// Karaoke highlight duration for one word.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordTiming {
    pub text: String,
    pub centiseconds: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleCue {
    pub start: f64,
    pub end: f64,
    pub text: String,
    /// Empty for word cues and for segments without word timings.
    pub karaoke: Vec<WordTiming>,
}

impl SubtitleCue {
    /// Cue payload with `{\kN}` tags when karaoke timings are present.
    pub fn display_text(&self) -> String {
        if self.karaoke.is_empty() {
            return self.text.trim().to_string();
        }
        self.karaoke
            .iter()
            .map(|w| format!("{{\\k{}}}{}", w.centiseconds, w.text.trim()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Renders an ASS `Dialogue:` event line.
    pub fn to_dialogue(&self, style: &str) -> String {
        format!(
            "Dialogue: 0,{},{},{},,0000,0000,0000,,{}",
            format_timestamp(self.start),
            format_timestamp(self.end),
            style,
            self.display_text()
        )
    }
}

/// Builds the ordered cue list for a whole transcript.
pub fn build_cues(transcript: &Transcript, mode: CueMode) -> Result<Vec<SubtitleCue>, TimelineError> {
    if transcript.is_empty() {
        return Err(TimelineError::EmptyTranscript);
    }

    let mut cues = Vec::new();
    for (index, segment) in transcript.segments.iter().enumerate() {
        let bounds = SegmentBounds::of(index, segment)?;
        match mode {
            CueMode::Segment => {
                let cue = segment_cue(index, segment, bounds)?;
                check_interval(cues.len(), &cue)?;
                cues.push(cue);
            }
            CueMode::Word => {
                for cue in word_cues(segment, bounds) {
                    check_interval(cues.len(), &cue)?;
                    cues.push(cue);
                }
            }
        }
    }
    Ok(cues)
}

#[derive(Debug, Clone, Copy)]
struct SegmentBounds {
    start: f64,
    end: f64,
}

impl SegmentBounds {
    fn of(index: usize, segment: &Segment) -> Result<Self, TimelineError> {
        let invalid = TimelineError::InvalidSegment {
            index,
            start: segment.start,
            end: segment.end,
        };
        if !segment.start.is_finite() || !segment.end.is_finite() {
            return Err(invalid);
        }
        let start = clamp_non_negative(segment.start);
        let end = clamp_non_negative(segment.end);
        if start > end {
            return Err(invalid);
        }
        Ok(Self { start, end })
    }

    fn clamp(&self, t: f64) -> f64 {
        if !t.is_finite() {
            return self.start;
        }
        t.max(self.start).min(self.end)
    }

    /// Clamped `(start, end)` per word. A missing start continues from the
    /// previous word, a missing end runs until the next word starts.
    fn spans(&self, words: &[Word]) -> Vec<(f64, f64)> {
        let mut spans = Vec::with_capacity(words.len());
        let mut previous_end = self.start;
        for (i, word) in words.iter().enumerate() {
            let start = self.clamp(word.start.unwrap_or(previous_end));
            let end = word
                .end
                .or_else(|| words.get(i + 1).and_then(|next| next.start))
                .unwrap_or(self.end);
            let end = self.clamp(end).max(start);
            spans.push((start, end));
            previous_end = end;
        }
        spans
    }
}

fn check_interval(index: usize, cue: &SubtitleCue) -> Result<(), TimelineError> {
    if cue.start > cue.end {
        return Err(TimelineError::InvalidCueInterval {
            index,
            start: cue.start,
            end: cue.end,
        });
    }
    Ok(())
}

fn to_centiseconds(seconds: f64) -> u32 {
    (seconds.max(0.0) * 100.0).round() as u32
}

/// One cue spanning the segment. The first word's highlight also covers the
/// lead-in from the segment start, middle words run until the next word begins,
/// and the last word keeps its own duration.
fn segment_cue(
    index: usize,
    segment: &Segment,
    bounds: SegmentBounds,
) -> Result<SubtitleCue, TimelineError> {
    let spans = bounds.spans(&segment.words);
    if let Some(word) = spans.windows(2).position(|p| p[1].0 < p[0].0) {
        return Err(TimelineError::WordsOutOfOrder {
            segment: index,
            word: word + 1,
        });
    }

    let last = spans.len().saturating_sub(1);
    let karaoke = segment
        .words
        .iter()
        .zip(&spans)
        .enumerate()
        .map(|(i, (word, &(start, end)))| {
            let duration = if i == 0 {
                end - bounds.start
            } else if i < last {
                spans[i + 1].0 - start
            } else {
                end - start
            };
            WordTiming {
                text: word.text.clone(),
                centiseconds: to_centiseconds(duration),
            }
        })
        .collect();

    Ok(SubtitleCue {
        start: bounds.start,
        end: bounds.end,
        text: segment.text.trim().to_string(),
        karaoke,
    })
}

/// One cue per word: cue `i` ends where word `i + 1` starts, the first cue
/// starts at the segment start and the last one ends at the segment end.
/// A segment without words becomes a single plain cue.
fn word_cues(segment: &Segment, bounds: SegmentBounds) -> Vec<SubtitleCue> {
    if segment.words.is_empty() {
        return vec![SubtitleCue {
            start: bounds.start,
            end: bounds.end,
            text: segment.text.trim().to_string(),
            karaoke: Vec::new(),
        }];
    }

    let spans = bounds.spans(&segment.words);
    segment
        .words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let start = if i == 0 { bounds.start } else { spans[i].0 };
            let end = spans.get(i + 1).map_or(bounds.end, |next| next.0);
            SubtitleCue {
                start,
                end,
                text: word.text.trim().to_string(),
                karaoke: Vec::new(),
            }
        })
        .collect()
}
