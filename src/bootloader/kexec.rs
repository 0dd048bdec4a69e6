// CLASSIFICATION: COMMUNITY
// Filename: kexec.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Kernel handoff through the `kexec` userspace tool.
//!
//! The image is staged with `kexec -l` and entered with `kexec -e`. When
//! the second step succeeds the process never sees it return.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use log::info;

use super::launch::{BootPaths, KernelHandoff};
use crate::error::{BootError, BootResult};

pub const DEFAULT_KEXEC_BIN: &str = "/sbin/kexec";

#[derive(Debug, Clone)]
pub struct KexecHandoff {
    bin: PathBuf,
}

impl KexecHandoff {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    /// Arguments for the staging step.
    pub fn load_args(paths: &BootPaths, cmdline: &str) -> Vec<String> {
        vec![
            "-l".into(),
            paths.kernel.display().to_string(),
            format!("--ramdisk={}", paths.ramdisk.display()),
            format!("--command-line={cmdline}"),
        ]
    }

    fn run(&self, args: &[String]) -> BootResult<()> {
        let status = Command::new(&self.bin)
            .args(args)
            .status()
            .map_err(|e| BootError::Handoff(format!("spawn {}: {e}", self.bin.display())))?;
        if !status.success() {
            return Err(BootError::Handoff(format!(
                "{} {} exited with {status}",
                self.bin.display(),
                args.first().map(String::as_str).unwrap_or("")
            )));
        }
        Ok(())
    }
}

impl Default for KexecHandoff {
    fn default() -> Self {
        Self::new(DEFAULT_KEXEC_BIN)
    }
}

impl KernelHandoff for KexecHandoff {
    fn handoff(&self, paths: &BootPaths) -> BootResult<()> {
        let cmdline = fs::read_to_string(&paths.cmdline)
            .map_err(|e| BootError::Handoff(format!("read {}: {e}", paths.cmdline.display())))?;
        let cmdline = cmdline.trim();
        info!("kexec {} cmdline={cmdline:?}", paths.kernel.display());
        self.run(&Self::load_args(paths, cmdline))?;
        self.run(&["-e".to_string()])
    }
}
