// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17
//
// ─────────────────────────────────────────────────────────────
// osboot · Flashing command surface
//
// The operations a flashing transport drives: write a stitched
// image into an OSIP slot, list the table, stop or skip the
// countdown. Any command cancels autoboot; once the host talks to
// us the device stays in flashing mode.
//
// Commands are assumed to arrive one at a time. Two concurrent
// `flash` calls against the same device are unsupported.
// ─────────────────────────────────────────────────────────────

use std::sync::Arc;

use log::info;

use crate::autoboot::AutobootState;
use crate::bootloader::{launch_or_die, DefaultBoot};
use crate::error::{BootError, BootResult};
use crate::osip::{ImageTableStore, TableRead, OSII_TOTAL};

pub mod console;

/// Size of the download buffer reserved at start-up.
pub const SCRATCH_SIZE: usize = 256 * 1024 * 1024;

/// OSIP slot of the main OS.
pub const ANDROID_OS: usize = 0;
/// OSIP slot of the provisioning OS.
pub const POS: usize = 1;
/// OSIP slot of the charging OS.
pub const COS: usize = 3;

/// Map a flash target name or slot number to an OSIP slot.
pub fn resolve_target(target: &str) -> BootResult<usize> {
    let slot = match target {
        "boot" | "android" => ANDROID_OS,
        "recovery" | "pos" => POS,
        "charging" | "cos" => COS,
        other => other
            .parse::<usize>()
            .map_err(|_| BootError::Format(format!("unknown flash target {other:?}")))?,
    };
    if slot >= OSII_TOTAL {
        return Err(BootError::InvalidSlot(slot));
    }
    Ok(slot)
}

/// Reserve the download buffer. There is no degraded mode without it.
pub fn alloc_scratch(size: usize) -> BootResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size).map_err(|e| {
        BootError::InitFatal(format!("scratch malloc of {size} failed: {e}"))
    })?;
    Ok(buf)
}

pub struct FlashService {
    store: ImageTableStore,
    state: Arc<AutobootState>,
    boot: Arc<dyn DefaultBoot>,
}

impl FlashService {
    pub fn new(
        store: ImageTableStore,
        state: Arc<AutobootState>,
        boot: Arc<dyn DefaultBoot>,
    ) -> Self {
        Self { store, state, boot }
    }

    pub fn state(&self) -> &AutobootState {
        &self.state
    }

    /// Write a stitched image to `target`. Returns the slot written.
    pub fn flash(&self, target: &str, data: &[u8]) -> BootResult<usize> {
        self.state.cancel();
        let slot = resolve_target(target)?;
        info!("flash {target} -> OSIP slot {slot}");
        self.store.write_stitched(slot, data)?;
        Ok(slot)
    }

    /// Current primary table.
    pub fn list(&self) -> BootResult<TableRead> {
        self.state.cancel();
        self.store.read_primary()
    }

    /// Backup table at 0xE0.
    pub fn backup(&self) -> BootResult<TableRead> {
        self.state.cancel();
        self.store.read_backup()
    }

    pub fn stop_autoboot(&self) -> bool {
        self.state.cancel()
    }

    /// Stop the countdown and boot the default image now.
    pub fn continue_boot(&self) -> BootResult<()> {
        self.state.cancel();
        launch_or_die(self.boot.as_ref())
    }
}
