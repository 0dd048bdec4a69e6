// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17
//
// ─────────────────────────────────────────────────────────────
// osboot · Input cancellation watcher
//
// Opens every character device under /dev/input and waits on all
// of them at once. The first key press or pointer movement
// cancels autoboot and ends the watcher. KEY_DOT is ignored: some
// boards without a keypad report spurious dots from the MRST
// keypad controller.
//
// A socket pair rides along in the poll set so the watcher can be
// stopped without killing the process.
// ─────────────────────────────────────────────────────────────

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, trace, warn};

use crate::autoboot::AutobootState;
use crate::error::{BootError, BootResult};

pub const INPUT_DIR: &str = "/dev/input";

pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_REL: u16 = 0x02;
pub const EV_ABS: u16 = 0x03;
pub const KEY_DOT: u16 = 52;

/// One `struct input_event`, without its timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

impl InputEvent {
    /// Size of the kernel record, timestamp included.
    pub const SIZE: usize = std::mem::size_of::<libc::input_event>();
    const TIME: usize = std::mem::size_of::<libc::timeval>();

    pub fn new(kind: u16, code: u16, value: i32) -> Self {
        Self { kind, code, value }
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        let b = buf.get(Self::TIME..Self::SIZE)?;
        Some(Self {
            kind: u16::from_ne_bytes([b[0], b[1]]),
            code: u16::from_ne_bytes([b[2], b[3]]),
            value: i32::from_ne_bytes([b[4], b[5], b[6], b[7]]),
        })
    }

    /// Kernel record with a zero timestamp.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        let t = Self::TIME;
        out[t..t + 2].copy_from_slice(&self.kind.to_ne_bytes());
        out[t + 2..t + 4].copy_from_slice(&self.code.to_ne_bytes());
        out[t + 4..t + 8].copy_from_slice(&self.value.to_ne_bytes());
        out
    }

    /// Whether this event should stop the autoboot countdown.
    pub fn cancels_autoboot(&self) -> bool {
        match self.kind {
            EV_KEY => self.code != KEY_DOT,
            EV_REL | EV_ABS => true,
            _ => false,
        }
    }
}

/// An opened input device node.
#[derive(Debug)]
pub struct InputSource {
    pub name: String,
    file: File,
}

impl InputSource {
    pub fn new(name: impl Into<String>, file: File) -> Self {
        Self {
            name: name.into(),
            file,
        }
    }
}

/// Open every readable character device directly under `dir`.
///
/// Nodes that fail to open are logged and skipped.
pub fn open_input_devices(dir: &Path) -> BootResult<Vec<InputSource>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| BootError::io(format!("opendir {}", dir.display()), e))?;
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();

    let mut sources = Vec::new();
    for path in paths {
        let meta = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                warn!("stat {}: {e}", path.display());
                continue;
            }
        };
        if !meta.file_type().is_char_device() {
            continue;
        }
        match OpenOptions::new().read(true).open(&path) {
            Ok(file) => {
                info!("Opened {}. fd={}", path.display(), file.as_raw_fd());
                sources.push(InputSource::new(path.display().to_string(), file));
            }
            Err(e) => info!("Unable to open {}: {e}", path.display()),
        }
    }
    Ok(sources)
}

/// How the watcher stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// A qualifying event cancelled autoboot.
    Cancelled,
    /// No input device could be opened.
    Idle,
    /// Stopped through its [`ShutdownHandle`].
    Shutdown,
    /// Every source hung up or polling failed.
    Exhausted,
}

/// Stops a running watcher. Dropping the handle stops it as well.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: UnixStream,
}

impl ShutdownHandle {
    pub fn shutdown(&self) -> BootResult<()> {
        (&self.tx)
            .write_all(&[1])
            .map_err(|e| BootError::io("signal input watcher shutdown", e))
    }
}

pub struct CancellationWatcher {
    sources: Vec<InputSource>,
    state: Arc<AutobootState>,
    shutdown: UnixStream,
}

impl CancellationWatcher {
    pub fn new(
        sources: Vec<InputSource>,
        state: Arc<AutobootState>,
    ) -> BootResult<(Self, ShutdownHandle)> {
        let (tx, rx) =
            UnixStream::pair().map_err(|e| BootError::io("create shutdown channel", e))?;
        Ok((
            Self {
                sources,
                state,
                shutdown: rx,
            },
            ShutdownHandle { tx },
        ))
    }

    /// Watch every input device under `dir`.
    ///
    /// An unreadable directory yields a watcher with no sources.
    pub fn from_dir(dir: &Path, state: Arc<AutobootState>) -> BootResult<(Self, ShutdownHandle)> {
        let sources = open_input_devices(dir).unwrap_or_else(|e| {
            error!("{e}");
            Vec::new()
        });
        Self::new(sources, state)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Block until a qualifying event, shutdown, or loss of all sources.
    pub fn run(mut self) -> WatchOutcome {
        debug!("begin input listener");
        let outcome = self.watch();
        debug!("exit input listener: {outcome:?}");
        outcome
    }

    fn watch(&mut self) -> WatchOutcome {
        if self.sources.is_empty() {
            error!("Unable to open any input device.");
            return WatchOutcome::Idle;
        }

        loop {
            let mut fds: Vec<libc::pollfd> = self
                .sources
                .iter()
                .map(|s| s.file.as_raw_fd())
                .chain(std::iter::once(self.shutdown.as_raw_fd()))
                .map(|fd| libc::pollfd {
                    fd,
                    events: libc::POLLIN,
                    revents: 0,
                })
                .collect();
            // SAFETY: `fds` is a live, correctly sized pollfd array.
            let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if ret < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!("poll on input devices failed: {err}");
                return WatchOutcome::Exhausted;
            }
            trace!("poll returns {ret}");

            let (ready, shutdown) = fds.split_at(self.sources.len());
            if shutdown[0].revents != 0 {
                return WatchOutcome::Shutdown;
            }

            let mut dead = Vec::new();
            for (i, pfd) in ready.iter().enumerate() {
                if pfd.revents == 0 {
                    continue;
                }
                if pfd.revents & libc::POLLIN == 0 {
                    dead.push(i);
                    continue;
                }
                let src = &mut self.sources[i];
                let mut buf = [0u8; InputEvent::SIZE];
                match src.file.read(&mut buf) {
                    Ok(0) => dead.push(i),
                    Ok(n) if n != InputEvent::SIZE => {
                        info!("Unable to read event from {}: short read of {n}", src.name);
                    }
                    Ok(_) => {
                        let Some(ev) = InputEvent::decode(&buf) else {
                            continue;
                        };
                        debug!(
                            "read from {}. Event type: {:x}, code: {:x}, value: {:x}",
                            src.name, ev.kind, ev.code, ev.value
                        );
                        if ev.cancels_autoboot() {
                            self.state.cancel();
                            return WatchOutcome::Cancelled;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => {
                        info!("Unable to read event from {}: {e}", src.name);
                        dead.push(i);
                    }
                }
            }

            for i in dead.into_iter().rev() {
                let src = self.sources.remove(i);
                warn!("input device {} went away", src.name);
            }
            if self.sources.is_empty() {
                return WatchOutcome::Exhausted;
            }
        }
    }

    pub fn spawn(self) -> BootResult<JoinHandle<WatchOutcome>> {
        thread::Builder::new()
            .name("input-listener".into())
            .spawn(move || self.run())
            .map_err(|e| BootError::InitFatal(format!("input listener thread: {e}")))
    }
}
