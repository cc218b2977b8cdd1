use anyhow::Result;
use clap::Parser;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serialport::SerialPortType;

use vexfield::config::FieldConfig;
use vexfield::link::LinkSet;
use vexfield::profile::{CustomSlot, MatchMode};
use vexfield::scheduler::MatchScheduler;
use vexfield::status::FieldStatus;
use vexfield::traits::{AudioCue, Clock, PortScanner, SerialTransport};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Profile to select at startup (Regular, VexU, Driver, Auton, Custom)
    #[arg(short, long, default_value = "Regular")]
    profile: String,

    /// Custom profile autonomous duration in seconds
    #[arg(long)]
    custom_auto: Option<String>,

    /// Custom profile driver duration in seconds
    #[arg(long)]
    custom_driver: Option<String>,

    /// List serial ports and exit
    #[arg(long, default_value_t = false)]
    list: bool,
}

// Concrete Implementations for Traits

struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Cue sink standing in for the audio collaborator: cue points are logged so
/// an external player (or a referee watching the console) can follow along.
struct ConsoleCues;

impl AudioCue for ConsoleCues {
    fn play_start(&mut self) {
        info!("[Cue] start");
    }
    fn play_pause(&mut self) {
        info!("[Cue] pause");
    }
    fn play_stop(&mut self) {
        info!("[Cue] stop");
    }
    fn play_warning(&mut self) {
        info!("[Cue] 30 second warning");
    }
    fn play_abort(&mut self) {
        info!("[Cue] abort");
    }
}

struct SerialPortTransport {
    name: String,
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport for SerialPortTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // The OS handle is released when the port is dropped.
        self.port.flush()?;
        Ok(())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Enumerates USB serial ports, filters on the VEX vendor id and opens the
/// first unclaimed match with exclusive access at the fixed baud rate.
struct UsbPortScanner {
    vendor_id: u16,
    baud: u32,
    claimed: HashSet<String>,
}

impl UsbPortScanner {
    fn new(config: &FieldConfig) -> Self {
        UsbPortScanner {
            vendor_id: config.serial.usb_vendor_id,
            baud: config.serial.baud_rate,
            claimed: HashSet::new(),
        }
    }
}

impl PortScanner for UsbPortScanner {
    fn claim_next(&mut self, interactive: bool) -> Result<Option<Box<dyn SerialTransport>>> {
        let ports = serialport::available_ports()?;
        let mut saw_candidate = false;

        for info in &ports {
            let SerialPortType::UsbPort(usb) = &info.port_type else {
                continue;
            };
            if usb.vid != self.vendor_id || self.claimed.contains(&info.port_name) {
                continue;
            }
            saw_candidate = true;

            match serialport::new(info.port_name.as_str(), self.baud)
                .timeout(Duration::from_millis(100))
                .open()
            {
                Ok(port) => {
                    self.claimed.insert(info.port_name.clone());
                    return Ok(Some(Box::new(SerialPortTransport {
                        name: info.port_name.clone(),
                        port,
                    })));
                }
                Err(e) => {
                    if interactive {
                        warn!("Could not open {}: {}", info.port_name, e);
                    } else {
                        debug!("Could not open {}: {}", info.port_name, e);
                    }
                }
            }
        }

        if interactive && !saw_candidate {
            // Help the user pick the right cable: show what is actually there.
            if ports.is_empty() {
                info!("No serial ports present.");
            }
            for info in &ports {
                if let SerialPortType::UsbPort(usb) = &info.port_type {
                    info!(
                        "  {} (vid {:#06x}, pid {:#06x})",
                        info.port_name, usb.vid, usb.pid
                    );
                }
            }
        }

        Ok(None)
    }

    fn release(&mut self, name: &str) {
        self.claimed.remove(name);
    }
}

fn list_ports(config: &FieldConfig) -> Result<()> {
    let ports = serialport::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }
    for info in ports {
        match info.port_type {
            SerialPortType::UsbPort(usb) => {
                let marker = if usb.vid == config.serial.usb_vendor_id {
                    " <- controller"
                } else {
                    ""
                };
                println!(
                    "{} usb vid={:#06x} pid={:#06x} {}{}",
                    info.port_name,
                    usb.vid,
                    usb.pid,
                    usb.product.unwrap_or_default(),
                    marker
                );
            }
            other => println!("{} {:?}", info.port_name, other),
        }
    }
    Ok(())
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}

fn refresh_status<C: Clock, A: AudioCue>(
    scheduler: &MatchScheduler<C, A>,
    controllers: usize,
    shared: &Arc<RwLock<FieldStatus>>,
) {
    if let Ok(mut status) = shared.write() {
        status.mode = scheduler.effective_mode().to_string();
        status.title = scheduler.status_title();
        status.minutes = scheduler.minutes_display();
        status.seconds = scheduler.seconds_display();
        status.profile = scheduler.selected_profile().map(|p| p.name.clone());
        status.phase_index = scheduler.phase_index();
        status.primary_label = scheduler.primary_label().to_string();
        status.secondary_label = scheduler.secondary_label().to_string();
        status.controls_visible = scheduler.controls_visible();
        status.controllers = controllers;
        status.updated_ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
    }
}

fn handle_command<C: Clock, A: AudioCue>(
    line: &str,
    scheduler: &mut MatchScheduler<C, A>,
    links: &mut LinkSet,
    scanner: &mut dyn PortScanner,
    status_shared: &Arc<RwLock<FieldStatus>>,
    running: &AtomicBool,
) {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return;
    };
    let argument = words.next();

    match (command, argument) {
        ("1", _) | ("start", _) => scheduler.press_primary(),
        ("2", _) | ("stop", _) => scheduler.press_secondary(),
        ("mode", Some(raw)) => match raw.parse::<MatchMode>() {
            Ok(mode) => {
                info!("Switching to mode: {}", mode);
                scheduler.select_manual_mode(mode);
            }
            Err(e) => warn!("{}", e),
        },
        ("profile", Some(name)) => match scheduler.profile_index(name) {
            Some(index) => scheduler.select_profile(index),
            None => {
                let names: Vec<&str> = scheduler.profiles().iter().map(|p| p.name.as_str()).collect();
                warn!("Unknown profile {}; available: {}", name, names.join(", "));
            }
        },
        ("auto", Some(raw)) => scheduler.set_custom_duration(CustomSlot::Auto, raw),
        ("driver", Some(raw)) => scheduler.set_custom_duration(CustomSlot::Driver, raw),
        ("connect", _) => {
            if let Err(e) = links.connect_interactive(scanner, scheduler.effective_mode()) {
                warn!("Failed to connect controller: {}", e);
            }
        }
        ("status", _) => {
            refresh_status(scheduler, links.len(), status_shared);
            if let Ok(status) = status_shared.read() {
                match serde_json::to_string_pretty(&*status) {
                    Ok(json) => println!("{}", json),
                    Err(e) => warn!("Status serialization failed: {}", e),
                }
            }
        }
        ("quit", _) | ("exit", _) => running.store(false, Ordering::SeqCst),
        ("help", _) => {
            println!("commands:");
            println!("  1 | start          primary button (start/pause/resume)");
            println!("  2 | stop           secondary button (exit/abort)");
            println!("  profile <name>     select a match profile");
            println!("  mode <m>           manual disabled/driver/autonomous");
            println!("  auto <secs>        Custom profile autonomous duration");
            println!("  driver <secs>      Custom profile driver duration");
            println!("  connect            connect a controller now");
            println!("  status             print status as JSON");
            println!("  quit               exit");
        }
        _ => warn!("Unknown command: {} (try 'help')", line),
    }
}

fn main() -> Result<()> {
    env_logger::builder()
        .format_timestamp(None)
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    let config = FieldConfig::default();

    if args.list {
        return list_ports(&config);
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down...");
        r.store(false, Ordering::SeqCst);
    })?;

    let mut scheduler = MatchScheduler::new(MonotonicClock::new(), ConsoleCues, config.clone());
    let mut links = LinkSet::new();
    let mut scanner = UsbPortScanner::new(&config);
    let status_shared = Arc::new(RwLock::new(FieldStatus::default()));

    if let Some(raw) = &args.custom_auto {
        scheduler.set_custom_duration(CustomSlot::Auto, raw);
    }
    if let Some(raw) = &args.custom_driver {
        scheduler.set_custom_duration(CustomSlot::Driver, raw);
    }

    match scheduler.profile_index(&args.profile) {
        Some(index) => scheduler.select_profile(index),
        None => {
            let names: Vec<&str> = scheduler.profiles().iter().map(|p| p.name.as_str()).collect();
            error!("Unknown profile {}; available: {}", args.profile, names.join(", "));
            std::process::exit(2);
        }
    }

    let commands = spawn_stdin_reader();
    info!("Field control ready. Type 'help' for commands.");

    let mut last_discovery = Instant::now();
    let mut last_refresh = Instant::now();
    let mut last_log = Instant::now();

    while running.load(Ordering::SeqCst) {
        // Commands arrive over a channel so all state stays on this thread.
        while let Ok(line) = commands.try_recv() {
            handle_command(
                &line,
                &mut scheduler,
                &mut links,
                &mut scanner,
                &status_shared,
                &running,
            );
        }

        scheduler.poll();

        if let Some(mode) = scheduler.take_pending_mode() {
            info!("Sending match mode: {}", mode);
            links.broadcast(mode);
        }

        if last_discovery.elapsed() >= Duration::from_millis(config.poll.discovery_period_ms) {
            last_discovery = Instant::now();
            for name in links.prune_disconnected() {
                scanner.release(&name);
            }
            links.discover(&mut scanner, scheduler.effective_mode());
        }

        if last_refresh.elapsed() >= Duration::from_secs(1) {
            last_refresh = Instant::now();
            refresh_status(&scheduler, links.len(), &status_shared);
        }

        if last_log.elapsed() >= Duration::from_secs(config.poll.status_log_secs) {
            last_log = Instant::now();
            info!(
                "{} [{}:{}] {} controller(s)",
                scheduler.status_title(),
                scheduler.minutes_display(),
                scheduler.seconds_display(),
                links.len()
            );
        }

        thread::sleep(Duration::from_millis(config.poll.scheduler_interval_ms));
    }

    // Leave the robots disabled on the way out.
    links.broadcast(MatchMode::Disabled);

    info!("Exiting.");
    Ok(())
}
