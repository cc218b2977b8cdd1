use serde::{Deserialize, Serialize};

/// Snapshot of the scheduler's derived display state.
///
/// This is the read surface for presentation consumers: everything a front
/// end needs to render the match (mode, title, clock digits, button labels)
/// without reaching into the scheduler itself. The running loop refreshes it
/// behind an `Arc<RwLock<...>>` and it serializes to JSON for the `status`
/// command.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FieldStatus {
    /// Effective mode currently broadcast to controllers.
    pub mode: String,

    /// Human-readable match state line.
    pub title: String,

    /// Countdown digits, zero-padded, "--" in manual mode.
    pub minutes: String,
    pub seconds: String,

    /// Selected profile name, if any.
    pub profile: Option<String>,

    pub phase_index: usize,

    /// Button captions; "---" when no profile is selected.
    pub primary_label: String,
    pub secondary_label: String,

    /// Whether the Start/Stop controls apply (valid profile selected).
    pub controls_visible: bool,

    /// Number of connected controllers.
    pub controllers: usize,

    /// Unix timestamp of last refresh.
    pub updated_ts: u64,
}

impl Default for FieldStatus {
    fn default() -> Self {
        FieldStatus {
            mode: "disabled".to_string(),
            title: String::new(),
            minutes: "--".to_string(),
            seconds: "--".to_string(),
            profile: None,
            phase_index: 0,
            primary_label: "---".to_string(),
            secondary_label: "---".to_string(),
            controls_visible: false,
            controllers: 0,
            updated_ts: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_status_default() {
        let status = FieldStatus::default();
        assert_eq!(status.mode, "disabled");
        assert_eq!(status.minutes, "--");
        assert_eq!(status.controllers, 0);
        assert!(!status.controls_visible);
    }

    #[test]
    fn test_field_status_serde_roundtrip() {
        let mut status = FieldStatus::default();
        status.mode = "driver".to_string();
        status.title = "Running on driver mode".to_string();
        status.minutes = "01".to_string();
        status.seconds = "45".to_string();
        status.controllers = 2;

        let json = serde_json::to_string(&status).expect("serialize failed");
        let restored: FieldStatus = serde_json::from_str(&json).expect("deserialize failed");

        assert_eq!(restored.mode, "driver");
        assert_eq!(restored.minutes, "01");
        assert_eq!(restored.controllers, 2);
    }
}
