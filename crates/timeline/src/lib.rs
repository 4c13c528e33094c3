//! Timeline synthesis for generated shorts.
//!
//! Turns a word-aligned speech transcript into karaoke-timed subtitle cues and
//! into evenly spaced image windows covering the narration. Everything here is
//! pure: no I/O, no clocks, no randomness.

pub mod cues;
pub mod error;
pub mod planner;
pub mod timecode;
pub mod transcript;

pub use cues::{CueMode, SubtitleCue, WordTiming, build_cues};
pub use error::TimelineError;
pub use planner::{ImagePlanner, ImageWindow, relevant_text};
pub use timecode::format_timestamp;
pub use transcript::{Segment, Transcript, Word};
