//! Wall-clock match timers.
//!
//! Both timer kinds take the current monotonic time as an explicit `now_ms`
//! argument instead of reading a clock themselves. Remaining/elapsed ticks are
//! always a difference of two monotonic timestamps, so there is no periodic
//! accumulation and no drift from polling frequency. The caller (the phase
//! scheduler) owns exactly one timer at a time and replaces it wholesale when
//! a new phase begins.

/// Timer state as observed at a given instant.
///
/// `TimesUp` is never stored; it is detected on read when a started countdown
/// has no remaining ticks, and it is terminal until the next `set()`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TimerStatus {
    Init,
    Running,
    Paused,
    TimesUp,
}

/// Contract shared by the countdown and stopwatch variants.
pub trait MatchTimer {
    fn start(&mut self, now_ms: u64);
    fn stop(&mut self, now_ms: u64);
    fn set(&mut self, now_ms: u64, ticks_ms: u64);
    fn reset(&mut self, now_ms: u64);
    /// Remaining ticks (countdown) or elapsed ticks (stopwatch), clamped >= 0.
    fn display_ticks(&self, now_ms: u64) -> u64;
    fn status(&self, now_ms: u64) -> TimerStatus;
}

/// Counts down from a configured total. This is the variant the scheduler uses.
#[derive(Debug)]
pub struct CountdownTimer {
    total_ms: u64,
    accumulated_ms: u64,
    run_started_ms: Option<u64>,
    // Explicit pause tag. Paused and Init both have no active run reference,
    // so without this tag the two are indistinguishable after set().
    paused: bool,
}

impl CountdownTimer {
    pub fn new() -> Self {
        CountdownTimer {
            total_ms: 0,
            accumulated_ms: 0,
            run_started_ms: None,
            paused: false,
        }
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        let run = self
            .run_started_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0);
        self.total_ms.saturating_sub(self.accumulated_ms + run)
    }
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchTimer for CountdownTimer {
    fn start(&mut self, now_ms: u64) {
        match self.status(now_ms) {
            // Terminal until set(); restarting an expired countdown is a no-op.
            TimerStatus::Running | TimerStatus::TimesUp => {}
            _ => {
                self.run_started_ms = Some(now_ms);
                self.paused = false;
            }
        }
    }

    fn stop(&mut self, now_ms: u64) {
        if self.status(now_ms) != TimerStatus::Running {
            return;
        }
        if let Some(start) = self.run_started_ms.take() {
            self.accumulated_ms += now_ms.saturating_sub(start);
            self.paused = true;
        }
    }

    fn set(&mut self, now_ms: u64, ticks_ms: u64) {
        match self.status(now_ms) {
            TimerStatus::Paused => {
                // Reconfiguring a paused timer keeps it paused, with the full
                // new total remaining.
                self.total_ms = ticks_ms;
                self.accumulated_ms = 0;
                self.run_started_ms = None;
                self.paused = true;
            }
            TimerStatus::Running => {
                // Only reached by the abort path, which zeroes a live run. The
                // run reference is kept so the zeroed timer reads as TimesUp
                // rather than Init.
                self.total_ms = ticks_ms;
            }
            TimerStatus::Init | TimerStatus::TimesUp => {
                self.total_ms = ticks_ms;
                self.accumulated_ms = 0;
                self.run_started_ms = None;
                self.paused = false;
            }
        }
    }

    fn reset(&mut self, _now_ms: u64) {
        self.accumulated_ms = 0;
        self.run_started_ms = None;
        self.paused = false;
    }

    fn display_ticks(&self, now_ms: u64) -> u64 {
        self.remaining_ms(now_ms)
    }

    fn status(&self, now_ms: u64) -> TimerStatus {
        if self.run_started_ms.is_some() {
            if self.remaining_ms(now_ms) == 0 {
                TimerStatus::TimesUp
            } else {
                TimerStatus::Running
            }
        } else if self.paused {
            TimerStatus::Paused
        } else {
            TimerStatus::Init
        }
    }
}

/// Counts up from zero (or a configured base). Never reports TimesUp.
#[derive(Debug)]
pub struct StopwatchTimer {
    base_ms: u64,
    accumulated_ms: u64,
    run_started_ms: Option<u64>,
    paused: bool,
}

impl StopwatchTimer {
    pub fn new() -> Self {
        StopwatchTimer {
            base_ms: 0,
            accumulated_ms: 0,
            run_started_ms: None,
            paused: false,
        }
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        let run = self
            .run_started_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0);
        self.base_ms + self.accumulated_ms + run
    }
}

impl Default for StopwatchTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchTimer for StopwatchTimer {
    fn start(&mut self, now_ms: u64) {
        if self.status(now_ms) != TimerStatus::Running {
            self.run_started_ms = Some(now_ms);
            self.paused = false;
        }
    }

    fn stop(&mut self, now_ms: u64) {
        if self.status(now_ms) != TimerStatus::Running {
            return;
        }
        if let Some(start) = self.run_started_ms.take() {
            self.accumulated_ms += now_ms.saturating_sub(start);
            self.paused = true;
        }
    }

    fn set(&mut self, now_ms: u64, ticks_ms: u64) {
        let was_paused = self.status(now_ms) == TimerStatus::Paused;
        self.base_ms = ticks_ms;
        self.accumulated_ms = 0;
        self.run_started_ms = None;
        self.paused = was_paused;
    }

    fn reset(&mut self, _now_ms: u64) {
        self.base_ms = 0;
        self.accumulated_ms = 0;
        self.run_started_ms = None;
        self.paused = false;
    }

    fn display_ticks(&self, now_ms: u64) -> u64 {
        self.elapsed_ms(now_ms)
    }

    fn status(&self, now_ms: u64) -> TimerStatus {
        let _ = now_ms;
        if self.run_started_ms.is_some() {
            TimerStatus::Running
        } else if self.paused {
            TimerStatus::Paused
        } else {
            TimerStatus::Init
        }
    }
}
