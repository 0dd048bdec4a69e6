// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.3
// Date Modified: 2026-10-17
// Author: Lukas Bower
//
// ─────────────────────────────────────────────────────────────
// osboot · Boot path (root module)
//
// Everything needed to get from "countdown expired" to a running
// kernel.
//
// Current sub-modules
// -------------------
// * `launch` – boot partition lookup + handoff sequencing
// * `mount`  – mount(2) wrapper for partitions
// * `kexec`  – kernel handoff through the kexec tool
// ─────────────────────────────────────────────────────────────

/// Default boot sequencing and collaborator traits.
pub mod launch;

pub mod mount;

/// kexec-based [`launch::KernelHandoff`].
pub mod kexec;

pub use kexec::KexecHandoff;
pub use launch::{
    launch_or_die, BootLauncher, BootPaths, DefaultBoot, KernelHandoff, MountPartition,
    PartitionInfo, PartitionTable, BOOT_PARTITION,
};
pub use mount::SysMount;
