// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v0.1
// Date Modified: 2026-10-17
// Author: Lukas Bower

//! Boot arbitration and OSIP image table core of the osboot loader.
//!
//! At power-up the loader races an autoboot countdown against human
//! input and flashing commands. The countdown boots the default image;
//! any input event or command keeps the device in flashing mode, where
//! stitched images are written into the OSIP table on the raw device.

/// Error taxonomy and the process-abort primitive.
pub mod error;

/// YAML configuration and disk layout.
pub mod config;

/// OSIP table codec, stitched image parser and device store.
pub mod osip;

/// Autoboot countdown and its shared cancellation state.
pub mod autoboot;

/// Input device watcher that cancels autoboot.
pub mod input;

/// Default boot path: mount and kernel handoff.
pub mod bootloader;

/// Flashing command surface.
pub mod flash;

pub use error::{BootError, BootResult};
