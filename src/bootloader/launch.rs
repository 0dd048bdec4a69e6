// CLASSIFICATION: COMMUNITY
// Filename: launch.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17
//
// ─────────────────────────────────────────────────────────────
// osboot · Default boot path
//
//  1. Look up the `boot` partition in the disk layout.
//  2. Mount it.
//  3. Hand `kernel`, `ramdisk.img` and `cmdline` from the mount
//     point to the kernel handoff.
//
// A mount failure only aborts this attempt. A failed handoff is
// fatal: there is no safe state to return to.
// ─────────────────────────────────────────────────────────────

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info};
use serde::Deserialize;

use crate::error::{die, BootError, BootResult};

/// Partition that holds the default kernel.
pub const BOOT_PARTITION: &str = "boot";

/// A named byte range on a backing device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PartitionInfo {
    pub name: String,
    pub device: PathBuf,
    #[serde(default)]
    pub start: u64,
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub fstype: Option<String>,
}

/// Read-only view of the disk layout.
pub trait PartitionTable: Send + Sync {
    fn find(&self, name: &str) -> Option<&PartitionInfo>;
}

/// Mounts a partition and returns its mount point.
pub trait MountPartition: Send + Sync {
    fn mount(&self, ptn: &PartitionInfo) -> BootResult<PathBuf>;
}

/// Transfers control to a loaded kernel. Does not return on success.
pub trait KernelHandoff: Send + Sync {
    fn handoff(&self, paths: &BootPaths) -> BootResult<()>;
}

/// Anything that can boot the default image.
pub trait DefaultBoot: Send + Sync {
    fn launch_default(&self) -> BootResult<()>;
}

/// Kernel, ramdisk and command-line files of one boot partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootPaths {
    pub kernel: PathBuf,
    pub ramdisk: PathBuf,
    pub cmdline: PathBuf,
}

impl BootPaths {
    pub fn under(mountpoint: &Path) -> Self {
        Self {
            kernel: mountpoint.join("kernel"),
            ramdisk: mountpoint.join("ramdisk.img"),
            cmdline: mountpoint.join("cmdline"),
        }
    }
}

pub struct BootLauncher {
    partitions: Arc<dyn PartitionTable>,
    mounter: Box<dyn MountPartition>,
    handoff: Box<dyn KernelHandoff>,
}

impl BootLauncher {
    pub fn new(
        partitions: Arc<dyn PartitionTable>,
        mounter: impl MountPartition + 'static,
        handoff: impl KernelHandoff + 'static,
    ) -> Self {
        Self {
            partitions,
            mounter: Box::new(mounter),
            handoff: Box::new(handoff),
        }
    }
}

impl DefaultBoot for BootLauncher {
    fn launch_default(&self) -> BootResult<()> {
        let ptn = self.partitions.find(BOOT_PARTITION).ok_or_else(|| {
            error!("Can't mount boot partition: not in disk layout");
            BootError::Mount(format!("no {BOOT_PARTITION} partition"))
        })?;
        let mountpoint = self.mounter.mount(ptn).map_err(|e| {
            error!("Can't mount boot partition! ({e})");
            e
        })?;
        let paths = BootPaths::under(&mountpoint);
        info!("booting {}", paths.kernel.display());
        self.handoff.handoff(&paths)
    }
}

/// Launch the default image, aborting the process if the handoff fails.
pub fn launch_or_die(boot: &dyn DefaultBoot) -> BootResult<()> {
    match boot.launch_default() {
        Err(e) if e.is_fatal() => die(&e),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Layout(Vec<PartitionInfo>);

    impl PartitionTable for Layout {
        fn find(&self, name: &str) -> Option<&PartitionInfo> {
            self.0.iter().find(|p| p.name == name)
        }
    }

    struct FixedMount(Option<PathBuf>);

    impl MountPartition for FixedMount {
        fn mount(&self, ptn: &PartitionInfo) -> BootResult<PathBuf> {
            self.0
                .clone()
                .ok_or_else(|| BootError::Mount(ptn.name.clone()))
        }
    }

    #[derive(Default)]
    struct RecordingHandoff(Arc<Mutex<Vec<BootPaths>>>);

    impl KernelHandoff for RecordingHandoff {
        fn handoff(&self, paths: &BootPaths) -> BootResult<()> {
            self.0.lock().unwrap().push(paths.clone());
            Ok(())
        }
    }

    fn boot_layout() -> Arc<dyn PartitionTable> {
        Arc::new(Layout(vec![PartitionInfo {
            name: "boot".into(),
            device: "/dev/mmcblk0p1".into(),
            start: 0,
            length: 0x100_0000,
            fstype: None,
        }]))
    }

    #[test]
    fn hands_off_paths_under_mountpoint() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let launcher = BootLauncher::new(
            boot_layout(),
            FixedMount(Some("/mnt/boot".into())),
            RecordingHandoff(seen.clone()),
        );
        launcher.launch_default().unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kernel, Path::new("/mnt/boot/kernel"));
        assert_eq!(seen[0].ramdisk, Path::new("/mnt/boot/ramdisk.img"));
        assert_eq!(seen[0].cmdline, Path::new("/mnt/boot/cmdline"));
    }

    #[test]
    fn mount_failure_skips_handoff() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let launcher =
            BootLauncher::new(boot_layout(), FixedMount(None), RecordingHandoff(seen.clone()));
        let err = launcher.launch_default().unwrap_err();
        assert!(matches!(err, BootError::Mount(_)));
        assert!(!err.is_fatal());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_boot_partition_is_mount_error() {
        let launcher = BootLauncher::new(
            Arc::new(Layout(Vec::new())),
            FixedMount(Some("/mnt/boot".into())),
            RecordingHandoff::default(),
        );
        assert!(matches!(launcher.launch_default(), Err(BootError::Mount(_))));
    }
}
