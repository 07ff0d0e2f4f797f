use chrono::{DateTime, TimeDelta, Timelike, Utc};
use koe_config::QuotaSettings;
use koe_transcription::ProviderResult;

/// How a recognition result should be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Non-empty transcript.
    Transcribed,
    /// Vendor reported silence explicitly.
    Silence,
    /// Empty with no silence signal before the daily quota reset.
    QuotaExceeded,
    /// Empty with no silence signal at or after the reset.
    Unexplained,
}

/// Labels suspiciously empty results as quota exhaustion.
///
/// The vendor gives no reliable quota signal; an empty result before the
/// local reset hour is only a best guess.
#[derive(Debug, Clone, Copy)]
pub struct QuotaHeuristic {
    utc_offset_hours: i32,
    reset_hour: u32,
}

impl QuotaHeuristic {
    pub fn new(utc_offset_hours: i32, reset_hour: u32) -> Self {
        Self {
            utc_offset_hours: utc_offset_hours.clamp(-23, 23),
            reset_hour,
        }
    }

    pub fn from_settings(settings: &QuotaSettings) -> Self {
        Self::new(settings.utc_offset_hours, settings.reset_hour)
    }

    pub fn classify(&self, result: &ProviderResult) -> Classification {
        self.classify_at(result, Utc::now())
    }

    pub fn classify_at(&self, result: &ProviderResult, now: DateTime<Utc>) -> Classification {
        if result.no_speech_detected {
            return Classification::Silence;
        }
        if !result.transcript.is_empty() {
            return Classification::Transcribed;
        }
        if self.before_reset(now) {
            Classification::QuotaExceeded
        } else {
            Classification::Unexplained
        }
    }

    fn before_reset(&self, now: DateTime<Utc>) -> bool {
        let local = now + TimeDelta::hours(i64::from(self.utc_offset_hours));
        local.hour() < self.reset_hour
    }
}

impl Default for QuotaHeuristic {
    fn default() -> Self {
        Self::new(9, 9)
    }
}
