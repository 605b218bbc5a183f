//! Subtitle entries and SRT parsing/generation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One subtitle cue. `index` is the ordering key and must be preserved
/// end-to-end through translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    pub index: u32,
    /// Opaque timing line, e.g. `00:01:02,500 --> 00:01:04,000`
    pub timeframe: String,
    pub text: String,
}

impl SubtitleEntry {
    pub fn new(index: u32, timeframe: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            index,
            timeframe: timeframe.into(),
            text: text.into(),
        }
    }

    /// Start time of the cue in milliseconds, if the timeframe is valid.
    pub fn start_ms(&self) -> Option<i64> {
        let (start, _) = split_timeframe(&self.timeframe)?;
        parse_timestamp_ms(start)
    }

    /// Return a copy shifted by `offset_ms` (clamped at zero).
    pub fn shifted(&self, offset_ms: i64) -> Option<Self> {
        let (start, end) = split_timeframe(&self.timeframe)?;
        let start = (parse_timestamp_ms(start)? + offset_ms).max(0);
        let end = (parse_timestamp_ms(end)? + offset_ms).max(0);
        Some(Self {
            index: self.index,
            timeframe: format!(
                "{} --> {}",
                format_timestamp_ms(start),
                format_timestamp_ms(end)
            ),
            text: self.text.clone(),
        })
    }
}

#[derive(Debug, Error)]
pub enum SrtError {
    #[error("no valid subtitle entries found")]
    Empty,
}

/// Parse SRT content into ordered entries. Blocks with malformed timing
/// lines are skipped, matching common player behavior.
pub fn parse_srt(content: &str) -> Result<Vec<SubtitleEntry>, SrtError> {
    let normalized = content.replace("\r\n", "\n");
    let mut entries = Vec::new();

    for block in split_blocks(&normalized) {
        let lines: Vec<&str> = block.lines().collect();
        if lines.len() < 3 {
            continue;
        }

        let index: u32 = match lines[0].trim().parse() {
            Ok(i) => i,
            Err(_) => continue,
        };
        let timeframe = lines[1].trim();
        if !is_valid_timeframe(timeframe) {
            continue;
        }

        let text = lines[2..].join("\n").trim().to_string();
        entries.push(SubtitleEntry::new(index, timeframe, text));
    }

    if entries.is_empty() {
        return Err(SrtError::Empty);
    }
    Ok(entries)
}

/// Generate SRT content from ordered entries.
pub fn generate_srt(entries: &[SubtitleEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!(
            "{}\n{}\n{}\n\n",
            entry.index, entry.timeframe, entry.text
        ));
    }
    out.trim_end().to_string()
}

/// Validate `HH:MM:SS,mmm --> HH:MM:SS,mmm`.
pub fn is_valid_timeframe(timeframe: &str) -> bool {
    match split_timeframe(timeframe) {
        Some((start, end)) => {
            parse_timestamp_ms(start).is_some() && parse_timestamp_ms(end).is_some()
        }
        None => false,
    }
}

fn split_blocks(content: &str) -> Vec<&str> {
    content
        .split("\n\n")
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .collect()
}

fn split_timeframe(timeframe: &str) -> Option<(&str, &str)> {
    let (start, end) = timeframe.split_once("-->")?;
    Some((start.trim(), end.trim()))
}

fn parse_timestamp_ms(ts: &str) -> Option<i64> {
    // HH:MM:SS,mmm
    let (hms, millis) = ts.split_once(',')?;
    let mut parts = hms.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || millis.len() != 3 {
        return None;
    }
    let millis: i64 = millis.parse().ok()?;
    if !(0..60).contains(&minutes) || !(0..60).contains(&seconds) {
        return None;
    }
    Some(((hours * 60 + minutes) * 60 + seconds) * 1000 + millis)
}

fn format_timestamp_ms(ms: i64) -> String {
    let ms = ms.max(0);
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n00:00:01,000 --> 00:00:03,000\nHello there.\n\n2\n00:00:04,000 --> 00:00:06,500\n- How are you?\n- Fine, thanks.\n";

    #[test]
    fn test_parse_srt() {
        let entries = parse_srt(SAMPLE).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].index, 1);
        assert_eq!(entries[0].text, "Hello there.");
        assert_eq!(entries[1].text, "- How are you?\n- Fine, thanks.");
    }

    #[test]
    fn test_parse_skips_malformed_blocks() {
        let content = "1\nnot a timeframe\nGarbage.\n\n2\n00:00:04,000 --> 00:00:06,500\nKept.\n";
        let entries = parse_srt(content).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "Kept.");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(parse_srt("nothing useful here").is_err());
    }

    #[test]
    fn test_generate_round_trip() {
        let entries = parse_srt(SAMPLE).unwrap();
        let regenerated = generate_srt(&entries);
        let back = parse_srt(&regenerated).unwrap();
        assert_eq!(entries, back);
    }

    #[test]
    fn test_timeframe_validation() {
        assert!(is_valid_timeframe("00:00:01,000 --> 00:00:03,000"));
        assert!(is_valid_timeframe("01:02:03,456 -->  01:02:04,000"));
        assert!(!is_valid_timeframe("00:00:01.000 --> 00:00:03.000"));
        assert!(!is_valid_timeframe("00:00:01,000"));
        assert!(!is_valid_timeframe("00:61:01,000 --> 00:00:03,000"));
    }

    #[test]
    fn test_shift() {
        let entry = SubtitleEntry::new(1, "00:00:10,000 --> 00:00:12,500", "hi");
        let shifted = entry.shifted(-1500).unwrap();
        assert_eq!(shifted.timeframe, "00:00:08,500 --> 00:00:11,000");
        assert_eq!(shifted.start_ms(), Some(8500));

        // Shifting below zero clamps
        let clamped = entry.shifted(-20_000).unwrap();
        assert_eq!(clamped.timeframe, "00:00:00,000 --> 00:00:00,000");
    }
}
