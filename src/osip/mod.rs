// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17
//
// ─────────────────────────────────────────────────────────────
// osboot · OS Image Pointer (OSIP) table
//
// The OSIP header is the only persistent record of where each
// bootable image lives on the raw boot device. It is a fixed
// 200-byte structure: a 32-byte preamble followed by seven
// 24-byte image descriptors (OSII), all little-endian.
//
//   0x00  sig            u32   "$OS$"
//   0x04  intel_reserved u8
//   0x05  header_rev_min u8
//   0x06  header_rev_maj u8
//   0x07  header_checksum u8
//   0x08  num_pointers   u8
//   0x09  num_images     u8
//   0x0a  header_size    u16
//   0x0c  reserved       u32 × 5
//   0x20  desc[7]        OSII × 7
//
// Sub-modules
// -----------
// * `stitched` – parser for combined descriptor+payload update blobs
// * `store`    – read-modify-write of the table on the raw device
// ─────────────────────────────────────────────────────────────

use log::{info, warn};

use crate::error::{BootError, BootResult};

pub mod stitched;
pub mod store;

pub use stitched::StitchedImage;
pub use store::{DeviceGeometry, Geometry, ImageTableStore, SysfsEraseSize};

/// "$OS$" read as a little-endian `u32`.
pub const OSIP_SIG: u32 = 0x2453_4f24;
/// Number of descriptor slots in the table.
pub const OSII_TOTAL: usize = 7;
/// Encoded size of one descriptor.
pub const OSII_SIZE: usize = 24;
/// Encoded size of the header fields preceding the descriptors.
pub const OSIP_PREAMBLE: usize = 0x20;
/// Encoded size of the full table.
pub const OSIP_SIZE: usize = OSIP_PREAMBLE + OSII_TOTAL * OSII_SIZE;
/// Device offset of the primary table.
pub const PRIMARY_LOC: u64 = 0;
/// Device offset of the backup table. Read-only.
pub const BACKUP_LOC: u64 = 0xE0;

/// One bootable image entry (OSII).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageDescriptor {
    pub os_rev_minor: u16,
    pub os_rev_major: u16,
    /// Block offset of the payload on the boot device.
    pub logical_start_block: u32,
    pub ddr_load_address: u32,
    pub entry_point: u32,
    /// Image size in device page units.
    pub size_of_os_image: u32,
    pub attribute: u8,
    pub reserved: [u8; 3],
}

impl ImageDescriptor {
    /// A slot holds an image once it has a start block or a size.
    pub fn is_occupied(&self) -> bool {
        self.logical_start_block != 0 || self.size_of_os_image != 0
    }

    fn decode(b: &[u8]) -> Self {
        Self {
            os_rev_minor: le_u16(b, 0),
            os_rev_major: le_u16(b, 2),
            logical_start_block: le_u32(b, 4),
            ddr_load_address: le_u32(b, 8),
            entry_point: le_u32(b, 12),
            size_of_os_image: le_u32(b, 16),
            attribute: b[20],
            reserved: [b[21], b[22], b[23]],
        }
    }

    fn encode_into(&self, out: &mut [u8]) {
        out[0..2].copy_from_slice(&self.os_rev_minor.to_le_bytes());
        out[2..4].copy_from_slice(&self.os_rev_major.to_le_bytes());
        out[4..8].copy_from_slice(&self.logical_start_block.to_le_bytes());
        out[8..12].copy_from_slice(&self.ddr_load_address.to_le_bytes());
        out[12..16].copy_from_slice(&self.entry_point.to_le_bytes());
        out[16..20].copy_from_slice(&self.size_of_os_image.to_le_bytes());
        out[20] = self.attribute;
        out[21..24].copy_from_slice(&self.reserved);
    }
}

/// The on-disk OSIP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageTable {
    pub signature: u32,
    pub intel_reserved: u8,
    pub header_rev_minor: u8,
    pub header_rev_major: u8,
    pub header_checksum: u8,
    pub num_pointers: u8,
    /// Populated slot count. Not validated against capacity on decode.
    pub num_images: u8,
    pub header_size: u16,
    pub reserved: [u32; 5],
    pub descriptors: [ImageDescriptor; OSII_TOTAL],
}

impl ImageTable {
    /// Decode a table from the first [`OSIP_SIZE`] bytes of `bytes`.
    ///
    /// A signature mismatch does not fail the decode; use
    /// [`ImageTable::is_valid`] or [`TableRead`] before trusting slot data.
    /// Only input shorter than the fixed layout is rejected.
    pub fn decode(bytes: &[u8]) -> BootResult<Self> {
        if bytes.len() < OSIP_SIZE {
            return Err(BootError::Format(format!(
                "image table needs {OSIP_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut reserved = [0u32; 5];
        for (i, r) in reserved.iter_mut().enumerate() {
            *r = le_u32(bytes, 0x0c + i * 4);
        }
        let mut descriptors = [ImageDescriptor::default(); OSII_TOTAL];
        for (i, d) in descriptors.iter_mut().enumerate() {
            let off = OSIP_PREAMBLE + i * OSII_SIZE;
            *d = ImageDescriptor::decode(&bytes[off..off + OSII_SIZE]);
        }
        Ok(Self {
            signature: le_u32(bytes, 0),
            intel_reserved: bytes[4],
            header_rev_minor: bytes[5],
            header_rev_major: bytes[6],
            header_checksum: bytes[7],
            num_pointers: bytes[8],
            num_images: bytes[9],
            header_size: le_u16(bytes, 0x0a),
            reserved,
            descriptors,
        })
    }

    /// Encode to the exact on-disk byte sequence.
    pub fn encode(&self) -> [u8; OSIP_SIZE] {
        let mut out = [0u8; OSIP_SIZE];
        out[0..4].copy_from_slice(&self.signature.to_le_bytes());
        out[4] = self.intel_reserved;
        out[5] = self.header_rev_minor;
        out[6] = self.header_rev_major;
        out[7] = self.header_checksum;
        out[8] = self.num_pointers;
        out[9] = self.num_images;
        out[0x0a..0x0c].copy_from_slice(&self.header_size.to_le_bytes());
        for (i, r) in self.reserved.iter().enumerate() {
            let off = 0x0c + i * 4;
            out[off..off + 4].copy_from_slice(&r.to_le_bytes());
        }
        for (i, d) in self.descriptors.iter().enumerate() {
            let off = OSIP_PREAMBLE + i * OSII_SIZE;
            d.encode_into(&mut out[off..off + OSII_SIZE]);
        }
        out
    }

    pub fn is_valid(&self) -> bool {
        self.signature == OSIP_SIG
    }

    /// Descriptor recorded for `slot`.
    pub fn descriptor(&self, slot: usize) -> BootResult<&ImageDescriptor> {
        self.descriptors.get(slot).ok_or(BootError::InvalidSlot(slot))
    }

    /// Replace the descriptor in `slot`, leaving every other slot untouched.
    pub fn set_descriptor(&mut self, slot: usize, desc: ImageDescriptor) -> BootResult<()> {
        let entry = self
            .descriptors
            .get_mut(slot)
            .ok_or(BootError::InvalidSlot(slot))?;
        *entry = desc;
        Ok(())
    }

    /// Occupied slots with their index.
    ///
    /// `num_images` is not consulted: every write resets it to one, so
    /// it says nothing about which slots hold an image.
    pub fn populated(&self) -> impl Iterator<Item = (usize, &ImageDescriptor)> + '_ {
        self.descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_occupied())
    }

    /// Log the header and every populated descriptor.
    pub fn dump(&self) {
        info!(
            "OSIP sig=0x{:08x} rev={}.{} checksum=0x{:02x} pointers={} images={} size={}",
            self.signature,
            self.header_rev_major,
            self.header_rev_minor,
            self.header_checksum,
            self.num_pointers,
            self.num_images,
            self.header_size
        );
        for (i, d) in self.populated() {
            info!(
                "  OSII[{i}] rev={}.{} lba=0x{:x} load=0x{:x} entry=0x{:x} size=0x{:x} attr=0x{:x}",
                d.os_rev_major,
                d.os_rev_minor,
                d.logical_start_block,
                d.ddr_load_address,
                d.entry_point,
                d.size_of_os_image,
                d.attribute
            );
        }
    }
}

/// Result of reading a table from the device.
///
/// Callers must match on the variant; an `Unverified` table decoded
/// structurally but carried the wrong signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRead {
    Valid(ImageTable),
    Unverified(ImageTable),
}

impl TableRead {
    /// Classify a decoded table by its signature, warning on mismatch.
    pub fn classify(table: ImageTable) -> Self {
        if table.is_valid() {
            TableRead::Valid(table)
        } else {
            warn!(
                "Invalid OSIP header detected (sig=0x{:08x})",
                table.signature
            );
            TableRead::Unverified(table)
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, TableRead::Valid(_))
    }
}

fn le_u16(b: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([b[off], b[off + 1]])
}

fn le_u32(b: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
}
