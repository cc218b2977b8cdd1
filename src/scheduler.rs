//! Phase scheduler - the match state machine.
//!
//! Owns the active profile, the current phase index and exactly one countdown
//! timer, replaced wholesale whenever a new phase begins. Phases are indexed
//! one ahead of the timer that counts down to their start: during a disabled
//! lead-in window the timer is already armed for the upcoming phase while the
//! effective mode (what devices are told) stays disabled.
//!
//! Effective-mode changes are latched in a pending slot; the owning loop
//! drains it with [`MatchScheduler::take_pending_mode`] and hands the mode to
//! the broadcaster. Collapsing several changes within one poll into the last
//! one is intentional - the last write wins on the wire anyway.

use log::{info, warn};

use crate::config::FieldConfig;
use crate::profile::{
    default_profiles, sanitize_duration_input, CustomSlot, MatchMode, MatchProfile,
    CUSTOM_PROFILE_NAME,
};
use crate::timer::{CountdownTimer, MatchTimer, TimerStatus};
use crate::traits::{AudioCue, Clock};

pub struct MatchScheduler<C: Clock, A: AudioCue> {
    clock: C,
    cues: A,
    config: FieldConfig,
    profiles: Vec<MatchProfile>,
    /// None is the manual-mode sentinel: no profile, no phase logic.
    selected: Option<usize>,
    phase_index: usize,
    timer: CountdownTimer,
    effective_mode: MatchMode,
    /// One-shot flag for the 30-second warning, reset per countdown.
    warning_fired: bool,
    pending_mode: Option<MatchMode>,
}

impl<C: Clock, A: AudioCue> MatchScheduler<C, A> {
    pub fn new(clock: C, cues: A, config: FieldConfig) -> Self {
        MatchScheduler {
            clock,
            cues,
            config,
            profiles: default_profiles(),
            selected: None,
            phase_index: 0,
            timer: CountdownTimer::new(),
            effective_mode: MatchMode::Disabled,
            warning_fired: false,
            pending_mode: None,
        }
    }

    // ========================================================================
    // PROFILE / MODE SELECTION
    // ========================================================================

    pub fn profiles(&self) -> &[MatchProfile] {
        &self.profiles
    }

    pub fn profile_index(&self, name: &str) -> Option<usize> {
        self.profiles
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn select_profile(&mut self, index: usize) {
        if index >= self.profiles.len() {
            warn!("No such profile index: {}", index);
            return;
        }
        info!("Profile selected: {}", self.profiles[index].name);
        self.selected = Some(index);
        self.phase_index = 0;
        self.warning_fired = false;
        self.advance_phase(0);
    }

    /// Drop the active profile and drive the mode directly.
    pub fn select_manual_mode(&mut self, mode: MatchMode) {
        self.selected = None;
        self.set_effective_mode(mode);
    }

    // ========================================================================
    // PHASE ADVANCE
    // ========================================================================

    fn advance_phase(&mut self, new_index: usize) {
        self.phase_index = new_index;
        let Some(sel) = self.selected else {
            return;
        };

        let Some(phase) = self.profiles[sel].phases.get(new_index).copied() else {
            // Defensive recovery, not fatal: a profile exhausted past its last
            // phase falls back to manual disabled mode.
            warn!(
                "Invalid phase {} in profile {}; switching to manual disabled mode",
                new_index, self.profiles[sel].name
            );
            self.selected = None;
            self.phase_index = 0;
            self.set_effective_mode(MatchMode::Disabled);
            return;
        };

        let now = self.clock.now_ms();

        if phase.mode != MatchMode::Disabled {
            let mut timer = CountdownTimer::new();
            timer.set(now, phase.duration_ms());
            timer.start(now);
            self.timer = timer;
            self.warning_fired = false;
            self.cues.play_start();
            self.set_effective_mode(phase.mode);
            return;
        }

        match self.profiles[sel].phases.get(new_index + 1).copied() {
            None => {
                // Match end. No further timer; disabled is already in effect.
                self.set_effective_mode(MatchMode::Disabled);
            }
            Some(next) if next.duration_secs == 0 => {
                // Zero-length marker: jump past it without ever broadcasting
                // the skipped phase's mode.
                self.advance_phase(new_index + 2);
            }
            Some(next) => {
                // Lead-in window: arm the countdown for the upcoming phase but
                // keep the devices disabled until it is started.
                let mut timer = CountdownTimer::new();
                timer.set(now, next.duration_ms());
                self.timer = timer;
                self.warning_fired = false;
                self.set_effective_mode(MatchMode::Disabled);
            }
        }
    }

    // ========================================================================
    // SCHEDULING POLL
    // ========================================================================

    /// Expiry and warning check, invoked on every scheduling poll. Only active
    /// phases are processed; during lead-in and end windows the timer is not
    /// running and nothing can expire.
    pub fn poll(&mut self) {
        let Some(sel) = self.selected else {
            return;
        };
        let Some(phase) = self.profiles[sel].phases.get(self.phase_index).copied() else {
            return;
        };
        if phase.mode == MatchMode::Disabled {
            return;
        }

        let now = self.clock.now_ms();
        match self.timer.status(now) {
            TimerStatus::TimesUp => {
                let last = self.profiles[sel].is_last_active_phase(self.phase_index);
                self.advance_phase(self.phase_index + 1);
                if last {
                    self.cues.play_stop();
                } else {
                    self.cues.play_pause();
                }
            }
            TimerStatus::Running => {
                // Edge-triggered warning: fires once when remaining first
                // drops to the threshold, re-arms if it rises back above.
                if self.timer.display_ticks(now) > self.config.poll.warning_threshold_ms {
                    self.warning_fired = false;
                } else if !self.warning_fired {
                    self.warning_fired = true;
                    self.cues.play_warning();
                }
            }
            _ => {}
        }
    }

    // ========================================================================
    // MANUAL CONTROLS
    // ========================================================================

    pub fn press_primary(&mut self) {
        let Some(sel) = self.selected else {
            return;
        };
        if !self.profiles[sel].is_valid() {
            return;
        }
        let now = self.clock.now_ms();
        match self.timer.status(now) {
            TimerStatus::Init => {
                self.advance_phase(self.phase_index + 1);
            }
            TimerStatus::Running => {
                self.timer.stop(now);
                self.set_effective_mode(MatchMode::Disabled);
            }
            TimerStatus::Paused => {
                self.timer.start(now);
                let phase_mode = self.profiles[sel]
                    .phases
                    .get(self.phase_index)
                    .map(|p| p.mode);
                if let Some(mode) = phase_mode {
                    self.set_effective_mode(mode);
                }
            }
            TimerStatus::TimesUp => {
                if self.phase_index + 1 >= self.profiles[sel].phases.len() {
                    self.advance_phase(0); // start over
                } else {
                    self.advance_phase(self.phase_index + 1);
                }
            }
        }
    }

    pub fn press_secondary(&mut self) {
        let Some(sel) = self.selected else {
            return;
        };
        if !self.profiles[sel].is_valid() {
            return;
        }
        let now = self.clock.now_ms();
        match self.timer.status(now) {
            TimerStatus::Init | TimerStatus::TimesUp => {
                // Abandon the profile, hand the robots to the drivers.
                self.selected = None;
                self.set_effective_mode(MatchMode::Driver);
            }
            TimerStatus::Running => {
                self.timer.set(now, 0);
                self.cues.play_abort();
            }
            TimerStatus::Paused => {
                self.timer.set(now, 0);
                self.timer.start(now);
                self.cues.play_abort();
            }
        }
    }

    // ========================================================================
    // DURATION EDIT (Custom profile only)
    // ========================================================================

    pub fn set_custom_duration(&mut self, slot: CustomSlot, raw: &str) {
        let value = sanitize_duration_input(raw);
        let Some(custom) = self.profile_index(CUSTOM_PROFILE_NAME) else {
            return;
        };
        self.profiles[custom].phases[slot.phase_index()].duration_secs = value;
        info!("Custom {:?} duration set to {}s", slot, value);

        // Re-evaluate from phase 0 so the edit takes effect immediately.
        if self.selected == Some(custom) {
            self.phase_index = 0;
            self.advance_phase(0);
        }
    }

    // ========================================================================
    // DERIVED STATE (read surface for the presentation consumer)
    // ========================================================================

    pub fn effective_mode(&self) -> MatchMode {
        self.effective_mode
    }

    pub fn phase_index(&self) -> usize {
        self.phase_index
    }

    pub fn selected_profile(&self) -> Option<&MatchProfile> {
        self.selected.map(|i| &self.profiles[i])
    }

    pub fn timer_status(&self) -> TimerStatus {
        self.timer.status(self.clock.now_ms())
    }

    pub fn take_pending_mode(&mut self) -> Option<MatchMode> {
        self.pending_mode.take()
    }

    pub fn controls_visible(&self) -> bool {
        self.selected.is_some_and(|i| self.profiles[i].is_valid())
    }

    pub fn status_title(&self) -> String {
        let Some(sel) = self.selected else {
            return format!("Switched to mode: {}", self.effective_mode);
        };
        let profile = &self.profiles[sel];
        let Some(phase) = profile.phases.get(self.phase_index) else {
            return "Invalid Match".to_string();
        };
        if phase.mode != MatchMode::Disabled {
            if self.effective_mode == MatchMode::Disabled {
                "PAUSED".to_string()
            } else {
                format!("Running on {} mode", self.effective_mode)
            }
        } else {
            match profile.phases.get(self.phase_index + 1) {
                Some(next) => format!("PAUSED - Waiting to start {}", next.mode),
                None => "Match ended".to_string(),
            }
        }
    }

    /// Countdown minutes, zero-padded. The +999 bias keeps the last
    /// sub-second of real time displaying as 01 rather than rolling to 00
    /// early (the VEX field display convention).
    pub fn minutes_display(&self) -> String {
        let Some(ticks) = self.display_ticks() else {
            return "--".to_string();
        };
        format!("{:02}", (ticks + 999) % 3_600_000 / 60_000)
    }

    pub fn seconds_display(&self) -> String {
        let Some(ticks) = self.display_ticks() else {
            return "--".to_string();
        };
        format!("{:02}", (ticks + 999) % 60_000 / 1000)
    }

    fn display_ticks(&self) -> Option<u64> {
        self.selected?;
        Some(self.timer.display_ticks(self.clock.now_ms()))
    }

    pub fn primary_label(&self) -> &'static str {
        let Some(sel) = self.selected else {
            return "---";
        };
        match self.timer.status(self.clock.now_ms()) {
            TimerStatus::Init => "Start",
            TimerStatus::Running => "Pause",
            TimerStatus::Paused => "Resume",
            TimerStatus::TimesUp => {
                if self.phase_index + 1 >= self.profiles[sel].phases.len() {
                    "Start Over"
                } else {
                    "Start"
                }
            }
        }
    }

    pub fn secondary_label(&self) -> &'static str {
        if self.selected.is_none() {
            return "---";
        }
        match self.timer.status(self.clock.now_ms()) {
            TimerStatus::Init | TimerStatus::TimesUp => "Exit",
            _ => "Stop",
        }
    }

    fn set_effective_mode(&mut self, mode: MatchMode) {
        if self.effective_mode != mode {
            self.effective_mode = mode;
            self.pending_mode = Some(mode);
        }
    }
}
