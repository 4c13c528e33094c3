use tracing::warn;

/// Negative values within this distance of zero are float drift from upstream
/// arithmetic and are clamped quietly.
const DRIFT_TOLERANCE: f64 = 0.01;

/// Formats seconds as an ASS timecode `H:MM:SS.cc`.
///
/// Hours are unbounded. Negative and non-finite input is clamped to zero
/// (logged when it is more than float drift).
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = clamp_non_negative(seconds);
    let total_cs = (seconds * 100.0).round() as u64;

    let hours = total_cs / 360_000;
    let minutes = (total_cs / 6_000) % 60;
    let secs = (total_cs / 100) % 60;
    let centis = total_cs % 100;

    format!("{hours}:{minutes:02}:{secs:02}.{centis:02}")
}

pub(crate) fn clamp_non_negative(seconds: f64) -> f64 {
    if !seconds.is_finite() {
        warn!(value = %seconds, "Non-finite timestamp clamped to zero");
        return 0.0;
    }
    if seconds < 0.0 {
        if seconds < -DRIFT_TOLERANCE {
            warn!(value = seconds, "Negative timestamp clamped to zero");
        }
        return 0.0;
    }
    seconds
}

#[cfg(test)]
pub(crate) fn parse_timestamp(timecode: &str) -> Option<f64> {
    let mut parts = timecode.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
