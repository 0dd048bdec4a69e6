// CLASSIFICATION: COMMUNITY
// Filename: error.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Error taxonomy shared by every boot-time component.

use std::io;

use log::error;
use thiserror::Error;

/// Errors raised by the image table, autoboot and boot-path code.
#[derive(Debug, Error)]
pub enum BootError {
    /// Device open/read/write/flush failure.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    /// Malformed stitched image or image table.
    #[error("format error: {0}")]
    Format(String),
    /// Device page/block size could not be determined.
    #[error("geometry error: {0}")]
    Geometry(String),
    /// Image table slot outside the fixed capacity.
    #[error("image slot {0} out of range")]
    InvalidSlot(usize),
    #[error("mount failed: {0}")]
    Mount(String),
    #[error("kernel handoff failed: {0}")]
    Handoff(String),
    #[error("config error: {0}")]
    Config(String),
    /// Start-up resource failure with no degraded mode.
    #[error("fatal init failure: {0}")]
    InitFatal(String),
}

pub type BootResult<T> = Result<T, BootError>;

impl BootError {
    /// Wrap an I/O error with the operation that produced it.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        BootError::Io {
            context: context.into(),
            source,
        }
    }

    /// True when control cannot safely continue past this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BootError::Handoff(_) | BootError::InitFatal(_))
    }

    /// Process exit status for errors that reach the entry point.
    pub fn exit_code(&self) -> i32 {
        match self {
            BootError::Config(_) => 2,
            _ => 1,
        }
    }
}

/// Log `err` and abort the process.
pub fn die(err: &BootError) -> ! {
    error!("unrecoverable: {err}");
    log::logger().flush();
    std::process::abort()
}
