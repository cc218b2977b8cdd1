use serde::{Deserialize, Serialize};

use crate::protocol;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub poll: PollConfig,
    pub serial: SerialConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Scheduler expiry/warning re-check interval.
    pub scheduler_interval_ms: u64,
    /// Period of the discovery pass (prune dead links, silent connect).
    pub discovery_period_ms: u64,
    /// Remaining time at which the one-shot warning cue fires.
    pub warning_threshold_ms: u64,
    /// How often the running status line is logged.
    pub status_log_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    pub usb_vendor_id: u16,
    pub baud_rate: u32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        FieldConfig {
            poll: PollConfig {
                scheduler_interval_ms: 1,
                discovery_period_ms: 200,
                warning_threshold_ms: 30_000,
                status_log_secs: 10,
            },
            serial: SerialConfig {
                usb_vendor_id: protocol::USB_VENDOR_ID,
                baud_rate: protocol::BAUD_RATE,
            },
        }
    }
}
