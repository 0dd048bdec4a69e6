// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17
//
// ─────────────────────────────────────────────────────────────
// osboot · Autoboot countdown
//
// On power-up the loader counts down once per tick and boots the
// default image unless something cancels it first. Cancellation
// comes from the input watcher or from any flashing command and
// is a one-way transition: Armed → Cancelled, never back.
//
// The countdown thread reads the flag without locking. A cancel
// that lands on the same tick as the final check may lose that
// race, so precision is one tick.
// ─────────────────────────────────────────────────────────────

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info};

use crate::bootloader::{launch_or_die, DefaultBoot};
use crate::error::{BootError, BootResult};

/// Default countdown in seconds.
pub const AUTOBOOT_DELAY_SECS: u32 = 8;

const ARMED: u8 = 0;
const CANCELLED: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutobootPhase {
    Armed,
    Cancelled,
}

/// Process-wide autoboot flag plus the countdown's remaining seconds.
#[derive(Debug)]
pub struct AutobootState {
    phase: AtomicU8,
    remaining: AtomicU32,
}

impl AutobootState {
    /// Armed state counting down from `delay_secs`.
    pub fn armed(delay_secs: u32) -> Self {
        Self {
            phase: AtomicU8::new(ARMED),
            remaining: AtomicU32::new(delay_secs),
        }
    }

    /// State that starts out cancelled, for `--no-autoboot`.
    pub fn disarmed() -> Self {
        Self {
            phase: AtomicU8::new(CANCELLED),
            remaining: AtomicU32::new(0),
        }
    }

    pub fn phase(&self) -> AutobootPhase {
        match self.phase.load(Ordering::Acquire) {
            ARMED => AutobootPhase::Armed,
            _ => AutobootPhase::Cancelled,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.phase() == AutobootPhase::Armed
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Relaxed)
    }

    /// Disable autoboot. Returns `true` only for the call that made the
    /// transition; later calls are no-ops.
    pub fn cancel(&self) -> bool {
        let changed = self
            .phase
            .compare_exchange(ARMED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if changed {
            info!("Autoboot disabled.");
        }
        changed
    }
}

/// How a countdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Cancelled with this many seconds left.
    Cancelled { remaining: u32 },
    /// The default boot was attempted and returned without error.
    Fired,
    /// The default boot could not start; flashing mode stays available.
    BootFailed,
}

/// Countdown that launches the default image unless cancelled.
pub struct AutobootController {
    state: Arc<AutobootState>,
    launcher: Arc<dyn DefaultBoot>,
    tick: Duration,
}

impl AutobootController {
    pub fn new(state: Arc<AutobootState>, launcher: Arc<dyn DefaultBoot>) -> Self {
        Self {
            state,
            launcher,
            tick: Duration::from_secs(1),
        }
    }

    /// Override the one-second tick.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Run the countdown on the calling thread.
    pub fn run(&self) -> Outcome {
        let mut remaining = self.state.remaining();
        loop {
            if !self.state.is_armed() {
                debug!("autoboot countdown stopped at {remaining}");
                return Outcome::Cancelled { remaining };
            }
            if remaining == 0 {
                break;
            }
            info!("Automatic boot in {remaining} seconds.");
            thread::sleep(self.tick);
            remaining -= 1;
            self.state.remaining.store(remaining, Ordering::Relaxed);
        }

        match launch_or_die(self.launcher.as_ref()) {
            Ok(()) => Outcome::Fired,
            Err(e) => {
                error!("autoboot failed: {e}");
                Outcome::BootFailed
            }
        }
    }

    /// Run the countdown on its own thread.
    pub fn spawn(self) -> BootResult<JoinHandle<Outcome>> {
        thread::Builder::new()
            .name("autoboot".into())
            .spawn(move || self.run())
            .map_err(|e| BootError::InitFatal(format!("autoboot thread: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingBoot {
        calls: AtomicUsize,
        fail: bool,
    }

    impl DefaultBoot for CountingBoot {
        fn launch_default(&self) -> BootResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(BootError::Mount("boot".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn cancel_transitions_once() {
        let state = AutobootState::armed(3);
        assert!(state.is_armed());
        assert!(state.cancel());
        assert!(!state.cancel());
        assert_eq!(state.phase(), AutobootPhase::Cancelled);
    }

    #[test]
    fn uncancelled_countdown_fires() {
        let state = Arc::new(AutobootState::armed(3));
        let boot = Arc::new(CountingBoot::default());
        let ctl = AutobootController::new(state.clone(), boot.clone())
            .with_tick(Duration::from_millis(1));
        assert_eq!(ctl.run(), Outcome::Fired);
        assert_eq!(boot.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.remaining(), 0);
    }

    #[test]
    fn zero_delay_fires_immediately() {
        let boot = Arc::new(CountingBoot::default());
        let ctl = AutobootController::new(Arc::new(AutobootState::armed(0)), boot.clone());
        assert_eq!(ctl.run(), Outcome::Fired);
        assert_eq!(boot.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disarmed_state_never_boots() {
        let boot = Arc::new(CountingBoot::default());
        let ctl = AutobootController::new(Arc::new(AutobootState::disarmed()), boot.clone());
        assert_eq!(ctl.run(), Outcome::Cancelled { remaining: 0 });
        assert_eq!(boot.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn mount_failure_fails_open() {
        let boot = Arc::new(CountingBoot {
            fail: true,
            ..Default::default()
        });
        let ctl = AutobootController::new(Arc::new(AutobootState::armed(1)), boot)
            .with_tick(Duration::from_millis(1));
        assert_eq!(ctl.run(), Outcome::BootFailed);
    }
}
