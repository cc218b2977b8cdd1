//! Device links and the mode broadcaster.
//!
//! One `DeviceLink` per physically connected controller. The `LinkSet` owns
//! every live link and is only ever touched from the scheduling thread, so
//! adds, removes and broadcasts need no locking; writes to a single device
//! stay ordered because each link has exactly one owner.

use anyhow::{anyhow, Result};
use log::{debug, info, warn};

use crate::profile::MatchMode;
use crate::protocol::mode_frame;
use crate::traits::{PortScanner, SerialTransport};

pub struct DeviceLink {
    name: String,
    transport: Option<Box<dyn SerialTransport>>,
    last_mode: Option<MatchMode>,
}

impl DeviceLink {
    pub fn new(transport: Box<dyn SerialTransport>) -> Self {
        DeviceLink {
            name: transport.name(),
            transport: Some(transport),
            last_mode: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn last_mode(&self) -> Option<MatchMode> {
        self.last_mode
    }

    /// Write the 14-byte command frame for `mode`.
    ///
    /// Fire-and-forget: the device advertises a reply but it is never read or
    /// validated here. The physical controller depends on that.
    pub fn set_match_mode(&mut self, mode: MatchMode) -> Result<()> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| anyhow!("link {} is closed", self.name))?;
        transport.write_all(&mode_frame(mode))?;
        self.last_mode = Some(mode);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Best-effort release: a close failure is logged, the handle is cleared
    /// regardless.
    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close() {
                warn!("Closing {} failed: {}", self.name, e);
            }
        }
        self.last_mode = None;
    }
}

/// All currently connected controllers, plus the broadcast and discovery
/// bookkeeping over them.
#[derive(Default)]
pub struct LinkSet {
    links: Vec<DeviceLink>,
}

impl LinkSet {
    pub fn new() -> Self {
        LinkSet { links: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Fan `mode` out to every connected link, sequentially. A failed write is
    /// logged and tears down that link only; delivery to the remaining links
    /// continues.
    pub fn broadcast(&mut self, mode: MatchMode) {
        for link in &mut self.links {
            if !link.is_connected() {
                continue;
            }
            if let Err(e) = link.set_match_mode(mode) {
                warn!("Write to {} failed: {}", link.name(), e);
                link.disconnect();
            }
        }
    }

    /// Drop links whose transport is gone. Returns the released port names so
    /// the scanner can reclaim them later.
    pub fn prune_disconnected(&mut self) -> Vec<String> {
        let mut released = Vec::new();
        self.links.retain(|link| {
            if link.is_connected() {
                true
            } else {
                info!("Controller disconnected: {}", link.name());
                released.push(link.name().to_string());
                false
            }
        });
        released
    }

    /// Silent connect attempt for a newly plugged controller. All errors are
    /// swallowed; a device that joins immediately receives `current_mode`.
    pub fn discover(&mut self, scanner: &mut dyn PortScanner, current_mode: MatchMode) {
        match scanner.claim_next(false) {
            Ok(Some(transport)) => {
                let name = self.attach(transport, current_mode);
                info!("Controller connected automatically: {}", name);
            }
            Ok(None) => {}
            Err(e) => debug!("Discovery pass found nothing usable: {}", e),
        }
    }

    /// Explicit connect. Failures are surfaced to the caller, never fatal to
    /// the process.
    pub fn connect_interactive(
        &mut self,
        scanner: &mut dyn PortScanner,
        current_mode: MatchMode,
    ) -> Result<()> {
        let transport = scanner
            .claim_next(true)?
            .ok_or_else(|| anyhow!("no controller found"))?;
        let name = self.attach(transport, current_mode);
        info!("Controller connected: {}", name);
        Ok(())
    }

    fn attach(&mut self, transport: Box<dyn SerialTransport>, current_mode: MatchMode) -> String {
        let mut link = DeviceLink::new(transport);
        let name = link.name().to_string();
        if let Err(e) = link.set_match_mode(current_mode) {
            warn!("Initial mode write to {} failed: {}", name, e);
        }
        self.links.push(link);
        name
    }
}
