//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information parsed from FFmpeg's `-progress` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscodeProgress {
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed relative to realtime (1.5 = 1.5x)
    pub speed: f64,
    /// Whether encoding finished (`progress=end`)
    pub is_complete: bool,
}

impl TranscodeProgress {
    /// Progress percentage given the total input duration in milliseconds.
    /// Unknown durations report 0 so callers fall back to indeterminate
    /// progress rather than a bogus figure.
    pub fn percentage(&self, total_duration_ms: i64) -> u8 {
        if total_duration_ms <= 0 {
            return 0;
        }
        let pct = (self.out_time_ms as f64 / total_duration_ms as f64) * 100.0;
        pct.clamp(0.0, 100.0) as u8
    }

    /// Estimate seconds remaining from the current encoding speed.
    pub fn eta_seconds(&self, total_duration_ms: i64) -> Option<f64> {
        if self.speed <= 0.0 || self.out_time_ms <= 0 {
            return None;
        }
        let remaining_ms = total_duration_ms - self.out_time_ms;
        if remaining_ms <= 0 {
            return Some(0.0);
        }
        Some((remaining_ms as f64 / 1000.0) / self.speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        let progress = TranscodeProgress {
            out_time_ms: 5000,
            ..Default::default()
        };
        assert_eq!(progress.percentage(10000), 50);
        assert_eq!(progress.percentage(5000), 100);
        assert_eq!(progress.percentage(0), 0);

        // Never above 100 even if out_time overshoots duration
        let over = TranscodeProgress {
            out_time_ms: 12000,
            ..Default::default()
        };
        assert_eq!(over.percentage(10000), 100);
    }

    #[test]
    fn test_eta() {
        let progress = TranscodeProgress {
            out_time_ms: 5000,
            speed: 2.0,
            ..Default::default()
        };
        let eta = progress.eta_seconds(10000).unwrap();
        assert!((eta - 2.5).abs() < 0.01);

        assert!(TranscodeProgress::default().eta_seconds(10000).is_none());
    }
}
