use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Ticks per millisecond in the recognition source's clock (100 ns units)
pub const TICKS_PER_MS: u64 = 10_000;

/// One recognized utterance with its time interval, the atomic unit
/// fed into the aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Recognized text, possibly empty or whitespace-only
    pub text: String,
    /// Interval start in 100 ns ticks
    pub start_tick: u64,
    /// Interval end in 100 ns ticks, >= start_tick
    pub end_tick: u64,
}

/// Convert a tick count to whole milliseconds, truncating
pub fn ticks_to_ms(ticks: u64) -> u64 {
    ticks / TICKS_PER_MS
}

/// Load a materialized segment stream from a JSON array file.
///
/// Segments are taken in file order. The producer guarantees monotonic
/// non-decreasing start ticks; this loader does not re-validate ordering.
pub fn load_segments(path: &Path) -> Result<Vec<Segment>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read segment file: {}", path.display()))?;
    let segments: Vec<Segment> = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse segment file: {}", path.display()))?;
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_ticks_to_ms_truncates() {
        assert_eq!(ticks_to_ms(0), 0);
        assert_eq!(ticks_to_ms(9_999), 0);
        assert_eq!(ticks_to_ms(10_000), 1);
        assert_eq!(ticks_to_ms(30_000_000), 3_000);
    }

    #[test]
    fn test_load_segments_preserves_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"text": "Hello world", "start_tick": 0, "end_tick": 30000000}},
                {{"text": "second part", "start_tick": 30000000, "end_tick": 60000000}}
            ]"#
        )
        .unwrap();

        let segments = load_segments(file.path()).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello world");
        assert_eq!(segments[1].start_tick, 30_000_000);
    }

    #[test]
    fn test_load_segments_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(load_segments(file.path()).is_err());
    }
}
