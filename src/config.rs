// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Loader configuration and disk layout.
//!
//! The file is YAML. Every key is optional:
//!
//! ```yaml
//! device: /dev/mmcblk0
//! autoboot:
//!   delay_secs: 5
//! partitions:
//!   - name: boot
//!     device: /dev/mmcblk0p1
//!     fstype: ext4
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::autoboot::AUTOBOOT_DELAY_SECS;
use crate::bootloader::{PartitionInfo, PartitionTable};
use crate::error::{BootError, BootResult};
use crate::input::INPUT_DIR;

pub const DISK_CONFIG_LOCATION: &str = "/etc/disk_layout.conf";
pub const MMC_DEV_POS: &str = "/dev/mmcblk0";
pub const MMC_ERASE_SIZE: &str =
    "/sys/devices/pci0000:00/0000:00:01.0/mmc_host/mmc0/mmc0:0001/erase_size";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AutobootConfig {
    pub enabled: bool,
    pub delay_secs: u32,
}

impl Default for AutobootConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_secs: AUTOBOOT_DELAY_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// Raw device holding the OSIP and OS images.
    pub device: PathBuf,
    /// sysfs attribute exposing the device erase size in bytes.
    pub erase_size_attr: PathBuf,
    pub input_dir: PathBuf,
    pub autoboot: AutobootConfig,
    pub mount_root: PathBuf,
    pub kexec_bin: PathBuf,
    pub partitions: Vec<PartitionInfo>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            device: MMC_DEV_POS.into(),
            erase_size_attr: MMC_ERASE_SIZE.into(),
            input_dir: INPUT_DIR.into(),
            autoboot: AutobootConfig::default(),
            mount_root: "/mnt".into(),
            kexec_bin: crate::bootloader::kexec::DEFAULT_KEXEC_BIN.into(),
            partitions: Vec::new(),
        }
    }
}

impl BootConfig {
    pub fn parse(text: &str) -> BootResult<Self> {
        serde_yaml::from_str(text).map_err(|e| BootError::Config(e.to_string()))
    }

    /// Load `path` and apply environment overrides.
    pub fn load(path: &Path) -> BootResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| BootError::Config(format!("{}: {e}", path.display())))?;
        let mut cfg = Self::parse(&text)?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> BootResult<()> {
        if let Ok(delay) = std::env::var("OSBOOT_AUTOBOOT_DELAY") {
            self.autoboot.delay_secs = delay
                .trim()
                .parse()
                .map_err(|_| BootError::Config(format!("OSBOOT_AUTOBOOT_DELAY={delay:?}")))?;
        }
        if let Ok(dir) = std::env::var("OSBOOT_INPUT_DIR") {
            self.input_dir = dir.into();
        }
        Ok(())
    }

    pub fn layout(&self) -> DiskLayout {
        DiskLayout {
            partitions: self.partitions.clone(),
        }
    }
}

/// Named partitions from the config file.
#[derive(Debug, Clone, Default)]
pub struct DiskLayout {
    partitions: Vec<PartitionInfo>,
}

impl DiskLayout {
    pub fn new(partitions: Vec<PartitionInfo>) -> Self {
        Self { partitions }
    }

    pub fn dump(&self) {
        for p in &self.partitions {
            debug!(
                "partition {:<10} dev={} start=0x{:x} len=0x{:x} fs={}",
                p.name,
                p.device.display(),
                p.start,
                p.length,
                p.fstype.as_deref().unwrap_or("-")
            );
        }
    }
}

impl PartitionTable for DiskLayout {
    fn find(&self, name: &str) -> Option<&PartitionInfo> {
        self.partitions.iter().find(|p| p.name == name)
    }
}
