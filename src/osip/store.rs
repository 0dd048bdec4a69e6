// CLASSIFICATION: COMMUNITY
// Filename: store.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Read-modify-write of the OSIP table on the raw boot device.
//!
//! Every access opens the device, performs one read or write and closes
//! it again; no handle is cached. Writers are not serialised here: the
//! command transport must never run two `write_image` calls at once.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::stitched::{StitchedImage, STITCHED_PAGE_SIZE};
use super::{ImageTable, TableRead, BACKUP_LOC, OSIP_SIZE, PRIMARY_LOC};
use crate::error::{BootError, BootResult};

/// eMMC pages per erase block.
pub const MMC_PAGES_PER_BLOCK: u64 = 1;
const KBYTES: u64 = 1024;

/// Page and block size of the boot device, in the units the OSIP
/// descriptors use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub page_size: u64,
    pub block_size: u64,
}

impl Geometry {
    /// Derive geometry from an erase size in bytes.
    pub fn from_erase_size(erase_size: u64) -> BootResult<Self> {
        let page_size = erase_size / KBYTES;
        if page_size == 0 {
            return Err(BootError::Geometry(format!(
                "erase size {erase_size} is below one page"
            )));
        }
        Ok(Self {
            page_size,
            block_size: page_size * MMC_PAGES_PER_BLOCK,
        })
    }

    /// Device pages needed for `pages` stitched pages.
    ///
    /// Truncating division plus one: exact multiples still get one
    /// extra page.
    pub fn device_pages(&self, pages: u32) -> BootResult<u32> {
        let units = u64::from(pages) * STITCHED_PAGE_SIZE / self.page_size + 1;
        u32::try_from(units)
            .map_err(|_| BootError::Format(format!("{pages} pages overflow the size field")))
    }
}

/// Source of boot device geometry.
pub trait DeviceGeometry: Send + Sync {
    fn geometry(&self) -> BootResult<Geometry>;
}

impl DeviceGeometry for Geometry {
    fn geometry(&self) -> BootResult<Geometry> {
        Ok(*self)
    }
}

/// Geometry read from the sysfs `erase_size` attribute of the MMC card.
#[derive(Debug, Clone)]
pub struct SysfsEraseSize {
    path: PathBuf,
}

impl SysfsEraseSize {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DeviceGeometry for SysfsEraseSize {
    fn geometry(&self) -> BootResult<Geometry> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            BootError::Geometry(format!("read {}: {e}", self.path.display()))
        })?;
        info!("page size {}", raw.trim());
        let erase: u64 = raw.trim().parse().map_err(|_| {
            BootError::Geometry(format!(
                "{} holds {:?}, not a byte count",
                self.path.display(),
                raw.trim()
            ))
        })?;
        Geometry::from_erase_size(erase)
    }
}

/// OSIP table and payload access on one raw device.
pub struct ImageTableStore {
    device: PathBuf,
    geometry: Box<dyn DeviceGeometry>,
}

impl ImageTableStore {
    pub fn new(device: impl Into<PathBuf>, geometry: impl DeviceGeometry + 'static) -> Self {
        Self {
            device: device.into(),
            geometry: Box::new(geometry),
        }
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    /// Read the table at device offset 0.
    pub fn read_primary(&self) -> BootResult<TableRead> {
        debug!("reading OSIP from {}", self.device.display());
        self.read_at(PRIMARY_LOC)
    }

    /// Read the backup table. There is no matching write path.
    pub fn read_backup(&self) -> BootResult<TableRead> {
        debug!("reading OSIP from backup location 0x{BACKUP_LOC:x}");
        self.read_at(BACKUP_LOC)
    }

    fn read_at(&self, offset: u64) -> BootResult<TableRead> {
        let mut f = File::open(&self.device)
            .map_err(|e| BootError::io(format!("open {}", self.device.display()), e))?;
        f.seek(SeekFrom::Start(offset))
            .map_err(|e| BootError::io("seek to OSIP", e))?;
        // A short device leaves the tail zeroed.
        let mut buf = [0u8; OSIP_SIZE];
        let mut filled = 0;
        while filled < OSIP_SIZE {
            match f.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(BootError::io("read of osip failed", e)),
            }
        }
        let read = TableRead::classify(ImageTable::decode(&buf)?);
        if let TableRead::Valid(table) = &read {
            table.dump();
        }
        Ok(read)
    }

    /// Parse a stitched blob and write it into `slot`.
    pub fn write_stitched(&self, slot: usize, data: &[u8]) -> BootResult<()> {
        info!("writing stitched image ({} bytes) to slot {slot}", data.len());
        let image = StitchedImage::parse(data)?;
        self.write_image(slot, &image)
    }

    /// Persist `image` into `slot` and write its payload.
    ///
    /// The table is re-read first. `num_images` is reset to one, the
    /// start block is taken from the slot's existing entry and the size is
    /// recomputed in device pages. The table is written before the payload,
    /// so a failure between the two leaves the slot pointing at stale data.
    pub fn write_image(&self, slot: usize, image: &StitchedImage<'_>) -> BootResult<()> {
        let geometry = self.geometry.geometry()?;
        let declared = u64::from(image.descriptor.size_of_os_image) * STITCHED_PAGE_SIZE;
        if declared != image.payload_len() {
            return Err(BootError::Format(format!(
                "data format is not correct: {declared} declared, {} supplied",
                image.payload_len()
            )));
        }

        let mut table = match self.read_primary()? {
            TableRead::Valid(t) => t,
            TableRead::Unverified(t) => {
                warn!("slot {slot} is being written over an unverified OSIP");
                t
            }
        };
        let mut desc = image.descriptor;
        desc.logical_start_block = table.descriptor(slot)?.logical_start_block;
        desc.size_of_os_image = geometry.device_pages(image.descriptor.size_of_os_image)?;
        table.num_images = 1;
        table.set_descriptor(slot, desc)?;

        debug!(
            "os_rev_major=0x{:x},os_rev_minor=0x{:x},ddr_load_address=0x{:x}",
            desc.os_rev_major, desc.os_rev_minor, desc.ddr_load_address
        );
        debug!(
            "entry_point=0x{:x},sizeof_osimage=0x{:x},attribute=0x{:x}",
            desc.entry_point, desc.size_of_os_image, desc.attribute
        );

        let offset = u64::from(desc.logical_start_block)
            .checked_mul(geometry.block_size)
            .ok_or_else(|| {
                BootError::Geometry(format!(
                    "block 0x{:x} of {} bytes is beyond the device",
                    desc.logical_start_block, geometry.block_size
                ))
            })?;
        self.write_at(PRIMARY_LOC, &table.encode(), "OSIP")?;
        self.write_at(offset, image.payload, "image payload")?;
        info!(
            "slot {slot}: {} bytes at block 0x{:x}",
            image.payload.len(),
            desc.logical_start_block
        );
        Ok(())
    }

    fn write_at(&self, offset: u64, data: &[u8], what: &str) -> BootResult<()> {
        let mut f = OpenOptions::new()
            .write(true)
            .open(&self.device)
            .map_err(|e| BootError::io(format!("open {}", self.device.display()), e))?;
        f.seek(SeekFrom::Start(offset))
            .map_err(|e| BootError::io(format!("seek for {what}"), e))?;
        f.write_all(data)
            .map_err(|e| BootError::io(format!("write of {what}"), e))?;
        f.sync_all()
            .map_err(|e| BootError::io(format!("flush of {what}"), e))
    }
}
