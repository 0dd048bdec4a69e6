// CLASSIFICATION: COMMUNITY
// Filename: mount.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Mounting partitions under a fixed root with `mount(2)`.

use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::launch::{MountPartition, PartitionInfo};
use crate::error::{BootError, BootResult};

pub const DEFAULT_FSTYPE: &str = "ext4";

/// Mounts each partition at `<root>/<name>`.
#[derive(Debug, Clone)]
pub struct SysMount {
    root: PathBuf,
}

impl SysMount {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Mount point used for `ptn`.
    pub fn target(&self, ptn: &PartitionInfo) -> PathBuf {
        self.root.join(&ptn.name)
    }
}

impl MountPartition for SysMount {
    fn mount(&self, ptn: &PartitionInfo) -> BootResult<PathBuf> {
        let target = self.target(ptn);
        if is_mount_point(&target)? {
            debug!("{} already mounted", target.display());
            return Ok(target);
        }
        fs::create_dir_all(&target)
            .map_err(|e| BootError::Mount(format!("mkdir {}: {e}", target.display())))?;
        let fstype = ptn.fstype.as_deref().unwrap_or(DEFAULT_FSTYPE);
        mount_fs(&ptn.device, &target, fstype).map_err(|e| {
            BootError::Mount(format!(
                "{} on {}: {e}",
                ptn.device.display(),
                target.display()
            ))
        })?;
        info!("mounted {} ({fstype}) on {}", ptn.device.display(), target.display());
        Ok(target)
    }
}

fn is_mount_point(path: &Path) -> BootResult<bool> {
    let data = match fs::read_to_string("/proc/self/mountinfo") {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(BootError::io("read /proc/self/mountinfo", e)),
    };
    Ok(mountinfo_has(&data, path))
}

fn mountinfo_has(data: &str, path: &Path) -> bool {
    data.lines()
        .filter_map(|line| line.split_whitespace().nth(4))
        .any(|mp| Path::new(mp) == path)
}

fn cstring(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

fn mount_fs(source: &Path, target: &Path, fstype: &str) -> io::Result<()> {
    let source = cstring(source)?;
    let target = cstring(target)?;
    let fstype =
        CString::new(fstype).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: all pointers come from live CStrings; data is null.
    let res = unsafe {
        libc::mount(
            source.as_ptr(),
            target.as_ptr(),
            fstype.as_ptr(),
            0,
            std::ptr::null(),
        )
    };
    if res != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
