//! Seams to hardware and collaborators, mockable in tests.

use anyhow::Result;

/// One open serial connection to a controller.
#[cfg_attr(test, mockall::automock)]
pub trait SerialTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Best-effort release of the underlying handle.
    fn close(&mut self) -> Result<()>;

    /// Port name, for log lines.
    fn name(&self) -> String;
}

/// Discovers and opens controller ports.
///
/// `interactive` distinguishes an explicit user-driven connect (failures are
/// surfaced, candidates worth reporting) from the silent discovery poll
/// (failure just means "try again next cycle").
#[cfg_attr(test, mockall::automock)]
pub trait PortScanner {
    /// Claim the next unclaimed matching device, or `Ok(None)` if there is
    /// none right now.
    fn claim_next(&mut self, interactive: bool) -> Result<Option<Box<dyn SerialTransport>>>;

    /// Return a previously claimed port name to the unclaimed pool.
    fn release(&mut self, name: &str);
}

/// Audio cue sink. The player is an external collaborator: it drops a new cue
/// request while one is playing, so callers fire cues unconditionally.
#[cfg_attr(test, mockall::automock)]
pub trait AudioCue {
    fn play_start(&mut self);
    fn play_pause(&mut self);
    fn play_stop(&mut self);
    fn play_warning(&mut self);
    fn play_abort(&mut self);
}

/// Monotonic time source feeding the timers.
#[cfg_attr(test, mockall::automock)]
pub trait Clock {
    fn now_ms(&self) -> u64;
}
