use anyhow::{bail, Result};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use vexfield::config::FieldConfig;
use vexfield::link::LinkSet;
use vexfield::profile::MatchMode;
use vexfield::protocol::{mode_frame, FRAME_LEN};
use vexfield::scheduler::MatchScheduler;
use vexfield::traits::{AudioCue, Clock, PortScanner, SerialTransport};

// --- Simulation doubles ---

#[derive(Clone, Default)]
struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

/// Every frame written to any simulated port, in wire order.
#[derive(Clone, Default)]
struct WireLog(Rc<RefCell<Vec<(String, [u8; FRAME_LEN])>>>);

impl WireLog {
    fn frames_for(&self, port: &str) -> Vec<[u8; FRAME_LEN]> {
        self.0
            .borrow()
            .iter()
            .filter(|(name, _)| name == port)
            .map(|(_, frame)| *frame)
            .collect()
    }
}

struct SimTransport {
    name: String,
    log: WireLog,
    broken: Rc<Cell<bool>>,
}

impl SerialTransport for SimTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if self.broken.get() {
            bail!("device unplugged");
        }
        let mut frame = [0u8; FRAME_LEN];
        frame.copy_from_slice(data);
        self.log.0.borrow_mut().push((self.name.clone(), frame));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Hands out pre-staged transports one per discovery pass, like ports being
/// plugged in over time.
#[derive(Default)]
struct SimScanner {
    pending: Vec<Box<dyn SerialTransport>>,
}

impl PortScanner for SimScanner {
    fn claim_next(&mut self, _interactive: bool) -> Result<Option<Box<dyn SerialTransport>>> {
        Ok(self.pending.pop())
    }

    fn release(&mut self, _name: &str) {}
}

#[derive(Clone, Default)]
struct CueLog(Rc<RefCell<Vec<&'static str>>>);

impl AudioCue for CueLog {
    fn play_start(&mut self) {
        self.0.borrow_mut().push("start");
    }
    fn play_pause(&mut self) {
        self.0.borrow_mut().push("pause");
    }
    fn play_stop(&mut self) {
        self.0.borrow_mut().push("stop");
    }
    fn play_warning(&mut self) {
        self.0.borrow_mut().push("warning");
    }
    fn play_abort(&mut self) {
        self.0.borrow_mut().push("abort");
    }
}

fn sim_transport(name: &str, log: &WireLog) -> (Box<dyn SerialTransport>, Rc<Cell<bool>>) {
    let broken = Rc::new(Cell::new(false));
    let transport = SimTransport {
        name: name.to_string(),
        log: log.clone(),
        broken: broken.clone(),
    };
    (Box::new(transport), broken)
}

/// Drain the scheduler's latched mode change into the broadcaster, the way
/// the main loop does on every pass.
fn pump<C: Clock, A: AudioCue>(scheduler: &mut MatchScheduler<C, A>, links: &mut LinkSet) {
    scheduler.poll();
    if let Some(mode) = scheduler.take_pending_mode() {
        links.broadcast(mode);
    }
}

// --- Scenarios ---

#[test]
fn full_regular_match_over_the_wire() {
    let _ = env_logger::builder().is_test(true).try_init();

    let clock = SimClock::default();
    let cues = CueLog::default();
    let log = WireLog::default();

    let mut scheduler =
        MatchScheduler::new(clock.clone(), cues.clone(), FieldConfig::default());
    let mut links = LinkSet::new();

    let (port_a, _) = sim_transport("sim-a", &log);
    let (port_b, _) = sim_transport("sim-b", &log);
    let mut scanner = SimScanner {
        pending: vec![port_b, port_a],
    };

    // Two controllers plug in before the match; each one is told the current
    // (disabled) mode as it joins.
    links.discover(&mut scanner, scheduler.effective_mode());
    links.discover(&mut scanner, scheduler.effective_mode());
    assert_eq!(links.len(), 2);

    scheduler.select_profile(0); // Regular: auto 15s, driver 105s
    pump(&mut scheduler, &mut links);

    // Start the match: autonomous goes out to everyone.
    scheduler.press_primary();
    pump(&mut scheduler, &mut links);

    // Autonomous expires.
    clock.advance(15_000);
    pump(&mut scheduler, &mut links);

    // Referee starts the driver period.
    scheduler.press_primary();
    pump(&mut scheduler, &mut links);

    // Driver period expires: match over.
    clock.advance(105_000);
    pump(&mut scheduler, &mut links);

    // The 15s autonomous period is already inside the warning window, so the
    // warning cue fires on the first poll after start.
    assert_eq!(
        cues.0.borrow().as_slice(),
        ["start", "warning", "pause", "start", "stop"]
    );
    assert_eq!(scheduler.status_title(), "Match ended");

    let expected = vec![
        mode_frame(MatchMode::Disabled), // join
        mode_frame(MatchMode::Autonomous),
        mode_frame(MatchMode::Disabled), // between periods
        mode_frame(MatchMode::Driver),
        mode_frame(MatchMode::Disabled), // match end
    ];
    assert_eq!(log.frames_for("sim-a"), expected);
    assert_eq!(log.frames_for("sim-b"), expected);
}

#[test]
fn late_joiner_receives_mode_in_progress() {
    let _ = env_logger::builder().is_test(true).try_init();

    let clock = SimClock::default();
    let log = WireLog::default();

    let mut scheduler =
        MatchScheduler::new(clock.clone(), CueLog::default(), FieldConfig::default());
    let mut links = LinkSet::new();

    scheduler.select_profile(2); // Driver: 60s
    scheduler.press_primary();
    pump(&mut scheduler, &mut links); // nobody connected yet

    // A controller is plugged in mid-period: it must come up in driver mode,
    // not disabled.
    let (port, _) = sim_transport("sim-late", &log);
    let mut scanner = SimScanner {
        pending: vec![port],
    };
    clock.advance(20_000);
    links.discover(&mut scanner, scheduler.effective_mode());

    assert_eq!(
        log.frames_for("sim-late"),
        vec![mode_frame(MatchMode::Driver)]
    );
}

#[test]
fn unplugged_device_is_pruned_and_others_keep_receiving() {
    let _ = env_logger::builder().is_test(true).try_init();

    let clock = SimClock::default();
    let log = WireLog::default();

    let mut scheduler =
        MatchScheduler::new(clock.clone(), CueLog::default(), FieldConfig::default());
    let mut links = LinkSet::new();

    let (port_a, _) = sim_transport("sim-a", &log);
    let (port_b, broken_b) = sim_transport("sim-b", &log);
    let (port_c, _) = sim_transport("sim-c", &log);
    let mut scanner = SimScanner {
        pending: vec![port_c, port_b, port_a],
    };
    for _ in 0..3 {
        links.discover(&mut scanner, scheduler.effective_mode());
    }
    assert_eq!(links.len(), 3);

    // The middle device dies; the broadcast still reaches the other two.
    broken_b.set(true);
    scheduler.select_manual_mode(MatchMode::Driver);
    pump(&mut scheduler, &mut links);

    assert_eq!(log.frames_for("sim-a").last(), Some(&mode_frame(MatchMode::Driver)));
    assert_eq!(log.frames_for("sim-c").last(), Some(&mode_frame(MatchMode::Driver)));
    assert_eq!(log.frames_for("sim-b").len(), 1); // only the join frame

    let released = links.prune_disconnected();
    assert_eq!(released, vec!["sim-b".to_string()]);
    assert_eq!(links.len(), 2);
}
