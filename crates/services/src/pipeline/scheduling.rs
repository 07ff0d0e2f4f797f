use std::collections::HashMap;

use koe_config::BlackoutSettings;

use super::work_item::WorkItem;

/// Inclusive hour range; `start_hour > end_hour` wraps past midnight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlackoutWindow {
    pub start_hour: u32,
    pub end_hour: u32,
    pub reason: Option<String>,
}

impl BlackoutWindow {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            (self.start_hour..=self.end_hour).contains(&hour)
        } else {
            hour >= self.start_hour || hour <= self.end_hour
        }
    }
}

/// Per-device blackout hours. Items recorded inside a window are skipped.
#[derive(Debug, Clone, Default)]
pub struct SchedulingPolicy {
    windows: HashMap<String, Vec<BlackoutWindow>>,
}

impl SchedulingPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(blackouts: &[BlackoutSettings]) -> Self {
        blackouts.iter().fold(Self::new(), |policy, b| {
            policy.with_blackout(&b.device_id, b.start_hour, b.end_hour, b.reason.clone())
        })
    }

    pub fn with_blackout(
        mut self,
        device_id: &str,
        start_hour: u32,
        end_hour: u32,
        reason: Option<String>,
    ) -> Self {
        self.windows
            .entry(device_id.to_string())
            .or_default()
            .push(BlackoutWindow {
                start_hour,
                end_hour,
                reason,
            });
        self
    }

    /// The window `item` falls in, if any.
    pub fn blackout_for(&self, item: &WorkItem) -> Option<&BlackoutWindow> {
        let hour = block_hour(&item.time_block)?;
        self.windows
            .get(&item.device_id)?
            .iter()
            .find(|w| w.contains(hour))
    }

    pub fn is_blacked_out(&self, item: &WorkItem) -> bool {
        self.blackout_for(item).is_some()
    }
}

/// Leading hour of a time block such as `"14-30"`.
pub fn block_hour(time_block: &str) -> Option<u32> {
    let digits: String = time_block
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() || digits.len() > 2 {
        return None;
    }
    digits.parse::<u32>().ok().filter(|h| *h < 24)
}
