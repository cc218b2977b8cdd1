//! Match profiles: named, ordered sequences of timed phases.
//!
//! The five canonical profiles are built once at startup and live for the
//! process lifetime. Only the Custom profile's two non-disabled durations are
//! ever mutated at runtime.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

/// Operating mode of a connected controller.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    Disabled,
    Autonomous,
    Driver,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchMode::Disabled => "disabled",
            MatchMode::Autonomous => "autonomous",
            MatchMode::Driver => "driver",
        };
        f.write_str(name)
    }
}

impl FromStr for MatchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" => Ok(MatchMode::Disabled),
            "autonomous" | "auton" | "auto" => Ok(MatchMode::Autonomous),
            "driver" => Ok(MatchMode::Driver),
            other => Err(anyhow!("unknown match mode: {}", other)),
        }
    }
}

/// One segment of a match: a mode held for a duration.
///
/// Duration 0 means "indefinite" for a disabled phase at the profile edges,
/// and "skip marker" for a non-disabled phase (the scheduler jumps over it
/// without ever broadcasting its mode).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MatchPhase {
    pub mode: MatchMode,
    pub duration_secs: u32,
}

impl MatchPhase {
    pub fn new(mode: MatchMode, duration_secs: u32) -> Self {
        MatchPhase {
            mode,
            duration_secs,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        u64::from(self.duration_secs) * 1000
    }
}

#[derive(Clone, Debug)]
pub struct MatchProfile {
    pub name: String,
    pub phases: Vec<MatchPhase>,
}

impl MatchProfile {
    pub fn new(name: &str, phases: Vec<MatchPhase>) -> Self {
        MatchProfile {
            name: name.to_string(),
            phases,
        }
    }

    /// A profile is eligible for the automatic Start/Stop controls when its
    /// phases strictly alternate disabled/non-disabled, it starts and ends
    /// disabled, and at least one non-disabled phase has duration >= 1.
    pub fn is_valid(&self) -> bool {
        let mut expect_disabled = true;
        let mut has_active = false;
        for phase in &self.phases {
            if phase.mode == MatchMode::Disabled {
                if !expect_disabled {
                    return false;
                }
                expect_disabled = false;
            } else {
                if expect_disabled {
                    return false;
                }
                if phase.duration_secs >= 1 {
                    has_active = true;
                }
                expect_disabled = true;
            }
        }
        // The sequence must end on a disabled phase.
        if expect_disabled {
            return false;
        }
        has_active
    }

    /// True when no phase after `index` would run a countdown, i.e. expiry at
    /// `index` is the end of the match.
    pub fn is_last_active_phase(&self, index: usize) -> bool {
        self.phases
            .get(index + 1..)
            .unwrap_or_default()
            .iter()
            .all(|p| p.mode == MatchMode::Disabled || p.duration_secs < 1)
    }
}

/// The two runtime-editable phases of the Custom profile.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CustomSlot {
    Auto,
    Driver,
}

impl CustomSlot {
    pub fn phase_index(self) -> usize {
        match self {
            CustomSlot::Auto => 1,
            CustomSlot::Driver => 3,
        }
    }
}

pub const CUSTOM_PROFILE_NAME: &str = "Custom";

/// The canonical profile set, in selection order.
pub fn default_profiles() -> Vec<MatchProfile> {
    use MatchMode::*;
    vec![
        MatchProfile::new(
            "Regular",
            vec![
                MatchPhase::new(Disabled, 0),
                MatchPhase::new(Autonomous, 15),
                MatchPhase::new(Disabled, 0),
                MatchPhase::new(Driver, 60 + 45),
                MatchPhase::new(Disabled, 0),
            ],
        ),
        MatchProfile::new(
            "VexU",
            vec![
                MatchPhase::new(Disabled, 0),
                MatchPhase::new(Autonomous, 45),
                MatchPhase::new(Disabled, 0),
                MatchPhase::new(Driver, 60 + 15),
                MatchPhase::new(Disabled, 0),
            ],
        ),
        MatchProfile::new(
            "Driver",
            vec![
                MatchPhase::new(Disabled, 0),
                MatchPhase::new(Driver, 60),
                MatchPhase::new(Disabled, 0),
            ],
        ),
        MatchProfile::new(
            "Auton",
            vec![
                MatchPhase::new(Disabled, 0),
                MatchPhase::new(Autonomous, 60),
                MatchPhase::new(Disabled, 0),
            ],
        ),
        MatchProfile::new(
            CUSTOM_PROFILE_NAME,
            vec![
                MatchPhase::new(Disabled, 0),
                MatchPhase::new(Autonomous, 15),
                MatchPhase::new(Disabled, 0),
                MatchPhase::new(Driver, 60 + 45),
                MatchPhase::new(Disabled, 0),
            ],
        ),
    ]
}

/// Coerce a raw duration edit into a stored value.
///
/// Empty or non-numeric input becomes 0; more than three digits or anything
/// above 999 clamps to 999.
pub fn sanitize_duration_input(raw: &str) -> u32 {
    let raw = raw.trim();
    let Ok(value) = raw.parse::<u32>() else {
        return 0;
    };
    if raw.len() > 3 || value > 999 {
        return 999;
    }
    value
}
