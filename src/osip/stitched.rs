// CLASSIFICATION: COMMUNITY
// Filename: stitched.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-17

//! Stitched update blobs.
//!
//! A stitched image is what the flashing host sends for an OS slot: one
//! 512-byte preamble block carrying an OSIP header whose first descriptor
//! describes the image, followed by the raw payload. The descriptor's
//! `size_of_os_image` is the payload length in 512-byte pages.

use log::debug;

use super::{ImageDescriptor, ImageTable};
use crate::error::{BootError, BootResult};

/// Page unit used by `size_of_os_image` inside a stitched blob.
pub const STITCHED_PAGE_SIZE: u64 = 512;
/// Length of the preamble block preceding the payload.
pub const STITCHED_BLOCK_SIZE: usize = 512;

/// Descriptor and payload borrowed from a stitched blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StitchedImage<'a> {
    pub descriptor: ImageDescriptor,
    pub payload: &'a [u8],
}

impl<'a> StitchedImage<'a> {
    /// Split `data` into its descriptor and payload.
    ///
    /// The total length must equal `pages * 512 + 512`.
    pub fn parse(data: &'a [u8]) -> BootResult<Self> {
        if data.len() < STITCHED_BLOCK_SIZE {
            return Err(BootError::Format(format!(
                "stitched image of {} bytes is shorter than its {STITCHED_BLOCK_SIZE}-byte preamble",
                data.len()
            )));
        }
        let (preamble, payload) = data.split_at(STITCHED_BLOCK_SIZE);
        let header = ImageTable::decode(preamble)?;
        if !header.is_valid() {
            return Err(BootError::Format(format!(
                "stitched preamble has bad signature 0x{:08x}",
                header.signature
            )));
        }
        let descriptor = header.descriptors[0];
        let declared = u64::from(descriptor.size_of_os_image) * STITCHED_PAGE_SIZE;
        if declared != payload.len() as u64 {
            return Err(BootError::Format(format!(
                "declared {} pages ({declared} bytes) but payload is {} bytes",
                descriptor.size_of_os_image,
                payload.len()
            )));
        }
        debug!(
            "stitched image: {} pages, load=0x{:x}",
            descriptor.size_of_os_image, descriptor.ddr_load_address
        );
        Ok(Self { descriptor, payload })
    }

    /// Declared payload length in bytes.
    pub fn payload_len(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// Build a stitched blob around `payload`. Used by tests and host tooling.
pub fn stitch(descriptor: ImageDescriptor, payload: &[u8]) -> Vec<u8> {
    let header = ImageTable {
        signature: super::OSIP_SIG,
        num_pointers: 1,
        num_images: 1,
        descriptors: {
            let mut d = [ImageDescriptor::default(); super::OSII_TOTAL];
            d[0] = descriptor;
            d
        },
        ..Default::default()
    };
    let mut blob = vec![0u8; STITCHED_BLOCK_SIZE];
    blob[..super::OSIP_SIZE].copy_from_slice(&header.encode());
    blob.extend_from_slice(payload);
    blob
}
