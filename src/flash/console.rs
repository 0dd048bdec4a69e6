// CLASSIFICATION: COMMUNITY
// Filename: console.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Line-oriented driver for [`FlashService`].
//!
//! Replies follow fastboot conventions: `OKAY ...` or `FAIL ...`.
//!
//! ```text
//! flash boot /tmp/boot.stitched
//! list
//! backup
//! stop
//! continue
//! ```

use std::fs::File;
use std::io::{self, BufRead, Read, Write};

use log::warn;

use super::FlashService;
use crate::error::{BootError, BootResult};
use crate::osip::TableRead;

/// Serve commands from `input` until it is exhausted.
///
/// Images are loaded into `scratch`, which is never grown past its
/// reserved capacity. Only a failure of the streams themselves ends the
/// loop; a malformed line gets a `FAIL` reply.
pub fn serve<R: BufRead, W: Write>(
    svc: &FlashService,
    mut input: R,
    out: &mut W,
    scratch: &mut Vec<u8>,
) -> io::Result<()> {
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match input.read_until(b'\n', &mut raw) {
            Ok(0) => return Ok(()),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
        let Ok(line) = std::str::from_utf8(&raw) else {
            warn!("dropping command line that is not UTF-8");
            writeln!(out, "FAIL command is not valid UTF-8")?;
            out.flush()?;
            continue;
        };
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();
        match dispatch(svc, cmd, &args, scratch) {
            Ok(reply) => writeln!(out, "OKAY {reply}")?,
            Err(e) => {
                warn!("command {cmd:?} failed: {e}");
                writeln!(out, "FAIL {e}")?;
            }
        }
        out.flush()?;
    }
}

fn dispatch(
    svc: &FlashService,
    cmd: &str,
    args: &[&str],
    scratch: &mut Vec<u8>,
) -> BootResult<String> {
    match (cmd, args) {
        ("flash", [target, path]) => {
            load_image(path, scratch)?;
            let slot = svc.flash(target, scratch)?;
            Ok(format!("slot {slot}"))
        }
        ("list", []) => describe(svc.list()?),
        ("backup", []) => describe(svc.backup()?),
        ("stop", []) => {
            svc.stop_autoboot();
            Ok("autoboot disabled".into())
        }
        ("continue", []) => {
            svc.continue_boot()?;
            Ok("booting".into())
        }
        _ => Err(BootError::Format(format!(
            "unknown command {:?}",
            std::iter::once(cmd).chain(args.iter().copied()).collect::<Vec<_>>().join(" ")
        ))),
    }
}

fn load_image(path: &str, scratch: &mut Vec<u8>) -> BootResult<()> {
    let mut f = File::open(path).map_err(|e| BootError::io(format!("open {path}"), e))?;
    let len = f
        .metadata()
        .map_err(|e| BootError::io(format!("stat {path}"), e))?
        .len();
    if len > scratch.capacity() as u64 {
        return Err(BootError::Format(format!(
            "{path} is {len} bytes, download buffer holds {}",
            scratch.capacity()
        )));
    }
    scratch.clear();
    f.read_to_end(scratch)
        .map_err(|e| BootError::io(format!("read {path}"), e))?;
    Ok(())
}

fn describe(read: TableRead) -> BootResult<String> {
    let table = match read {
        TableRead::Valid(t) => t,
        TableRead::Unverified(t) => {
            return Err(BootError::Format(format!(
                "invalid OSIP header (sig=0x{:08x})",
                t.signature
            )))
        }
    };
    let slots: Vec<String> = table
        .populated()
        .map(|(i, d)| {
            format!(
                "{i}:lba=0x{:x},size=0x{:x}",
                d.logical_start_block, d.size_of_os_image
            )
        })
        .collect();
    Ok(format!("images={} {}", table.num_images, slots.join(" ")))
}
