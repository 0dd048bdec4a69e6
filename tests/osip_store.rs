// CLASSIFICATION: COMMUNITY
// Filename: osip_store.rs v0.1
// Date Modified: 2026-10-17
// Author: Lukas Bower

use std::fs;
use std::io::Write;

use osboot::osip::stitched::stitch;
use osboot::osip::{
    Geometry, ImageDescriptor, ImageTable, ImageTableStore, SysfsEraseSize, TableRead,
    BACKUP_LOC, OSIP_SIG, OSIP_SIZE,
};
use osboot::BootError;
use tempfile::NamedTempFile;

const START_BLOCKS: [u32; 7] = [0x1000, 0x3000, 0x5000, 0x7000, 0x9000, 0xb000, 0xd000];

fn seeded_table() -> ImageTable {
    let mut t = ImageTable {
        signature: OSIP_SIG,
        header_rev_major: 1,
        num_pointers: 1,
        num_images: 4,
        header_size: OSIP_SIZE as u16,
        ..Default::default()
    };
    for (i, d) in t.descriptors.iter_mut().enumerate() {
        *d = ImageDescriptor {
            os_rev_major: 1,
            os_rev_minor: i as u16,
            logical_start_block: START_BLOCKS[i],
            ddr_load_address: 0x0110_0000,
            entry_point: 0x0110_1000,
            size_of_os_image: 0x100 + i as u32,
            attribute: i as u8,
            reserved: [0; 3],
        };
    }
    t
}

fn device_with(table: &ImageTable) -> NamedTempFile {
    let mut dev = NamedTempFile::new().unwrap();
    dev.write_all(&table.encode()).unwrap();
    dev.write_all(&vec![0u8; 4096]).unwrap();
    dev.flush().unwrap();
    dev
}

fn erase_size(text: &str) -> NamedTempFile {
    let mut attr = NamedTempFile::new().unwrap();
    attr.write_all(text.as_bytes()).unwrap();
    attr
}

fn incoming(pages: u32) -> ImageDescriptor {
    ImageDescriptor {
        os_rev_major: 9,
        os_rev_minor: 9,
        logical_start_block: 0x42,
        ddr_load_address: 0x0200_0000,
        entry_point: 0x0200_1000,
        size_of_os_image: pages,
        attribute: 0x0f,
        reserved: [0; 3],
    }
}

fn primary(store: &ImageTableStore) -> ImageTable {
    match store.read_primary().unwrap() {
        TableRead::Valid(t) => t,
        TableRead::Unverified(_) => panic!("primary table lost its signature"),
    }
}

#[test]
fn erase_size_2048_scenario() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dev = device_with(&seeded_table());
    let attr = erase_size("2048\n");
    let store = ImageTableStore::new(dev.path(), SysfsEraseSize::new(attr.path()));

    let payload: Vec<u8> = (0..100 * 512).map(|i| (i % 251) as u8).collect();
    let blob = stitch(incoming(100), &payload);
    assert_eq!(blob.len(), 100 * 512 + 512);
    store.write_stitched(0, &blob).unwrap();

    let t = primary(&store);
    let d = t.descriptors[0];
    assert_eq!(d.size_of_os_image, 100 * 512 / 2 + 1);
    assert_eq!(d.logical_start_block, START_BLOCKS[0]);
    assert_eq!(d.ddr_load_address, 0x0200_0000);
    assert_eq!(t.num_images, 1);

    // block size 2 → payload at lba * 2
    let raw = fs::read(dev.path()).unwrap();
    let off = START_BLOCKS[0] as usize * 2;
    assert_eq!(&raw[off..off + payload.len()], &payload[..]);
}

#[test]
fn write_preserves_other_slots() {
    let seeded = seeded_table();
    let dev = device_with(&seeded);
    let store = ImageTableStore::new(dev.path(), Geometry::from_erase_size(4096).unwrap());

    store
        .write_stitched(3, &stitch(incoming(2), &[0xee; 1024]))
        .unwrap();

    let t = primary(&store);
    for slot in (0..7).filter(|&s| s != 3) {
        assert_eq!(t.descriptors[slot], seeded.descriptors[slot], "slot {slot}");
    }
    assert_eq!(t.descriptors[3].logical_start_block, START_BLOCKS[3]);
    assert_ne!(t.descriptors[3].logical_start_block, incoming(2).logical_start_block);
    assert_eq!(t.descriptors[3].os_rev_major, 9);
}

#[test]
fn size_mismatch_leaves_device_untouched() {
    let dev = device_with(&seeded_table());
    let store = ImageTableStore::new(dev.path(), Geometry::from_erase_size(2048).unwrap());
    let before = fs::read(dev.path()).unwrap();

    let blob = stitch(incoming(3), &[0x11; 2 * 512]);
    let err = store.write_stitched(0, &blob).unwrap_err();
    assert!(matches!(err, BootError::Format(_)));
    assert_eq!(fs::read(dev.path()).unwrap(), before);
}

#[test]
fn geometry_failure_precedes_any_write() {
    let dev = device_with(&seeded_table());
    let attr = erase_size("not-a-number\n");
    let store = ImageTableStore::new(dev.path(), SysfsEraseSize::new(attr.path()));
    let before = fs::read(dev.path()).unwrap();

    let err = store
        .write_stitched(0, &stitch(incoming(1), &[0u8; 512]))
        .unwrap_err();
    assert!(matches!(err, BootError::Geometry(_)));
    assert_eq!(fs::read(dev.path()).unwrap(), before);
}

#[test]
fn out_of_range_slot_is_rejected_without_writing() {
    let dev = device_with(&seeded_table());
    let store = ImageTableStore::new(dev.path(), Geometry::from_erase_size(2048).unwrap());
    let before = fs::read(dev.path()).unwrap();
    let err = store
        .write_stitched(7, &stitch(incoming(1), &[0u8; 512]))
        .unwrap_err();
    assert!(matches!(err, BootError::InvalidSlot(7)));
    assert_eq!(fs::read(dev.path()).unwrap(), before);
}

#[test]
fn blank_device_reads_as_unverified() {
    let mut dev = NamedTempFile::new().unwrap();
    dev.write_all(&[0u8; 1024]).unwrap();
    let store = ImageTableStore::new(dev.path(), Geometry::from_erase_size(2048).unwrap());
    match store.read_primary().unwrap() {
        TableRead::Unverified(t) => {
            assert_eq!(t.signature, 0);
            assert_eq!(t.num_images, 0);
        }
        TableRead::Valid(_) => panic!("blank device must not verify"),
    }
}

#[test]
fn corrupt_signature_still_returns_slots() {
    let mut table = seeded_table();
    table.signature = 0x2453_4f25;
    let dev = device_with(&table);
    let store = ImageTableStore::new(dev.path(), Geometry::from_erase_size(2048).unwrap());
    let read = store.read_primary().unwrap();
    assert!(!read.is_valid());
    let TableRead::Unverified(t) = read else {
        unreachable!()
    };
    assert_eq!(t.descriptors[5].logical_start_block, START_BLOCKS[5]);
}

#[test]
fn writing_over_unverified_table_keeps_its_geometry() {
    let mut table = seeded_table();
    table.signature = 0;
    let dev = device_with(&table);
    let store = ImageTableStore::new(dev.path(), Geometry::from_erase_size(2048).unwrap());
    store
        .write_stitched(1, &stitch(incoming(1), &[0x77; 512]))
        .unwrap();
    let TableRead::Unverified(t) = store.read_primary().unwrap() else {
        panic!("signature is not invented on write");
    };
    assert_eq!(t.descriptors[1].logical_start_block, START_BLOCKS[1]);
    assert_eq!(t.num_images, 1);
}

#[test]
fn backup_table_is_read_from_0xe0() {
    let mut dev = NamedTempFile::new().unwrap();
    let mut image = vec![0u8; BACKUP_LOC as usize];
    image.extend_from_slice(&seeded_table().encode());
    dev.write_all(&image).unwrap();
    let store = ImageTableStore::new(dev.path(), Geometry::from_erase_size(2048).unwrap());

    assert!(!store.read_primary().unwrap().is_valid());
    match store.read_backup().unwrap() {
        TableRead::Valid(t) => assert_eq!(t, seeded_table()),
        TableRead::Unverified(_) => panic!("backup copy should verify"),
    }
}

#[test]
fn missing_device_is_io_error() {
    let store = ImageTableStore::new(
        "/nonexistent/mmcblk0",
        Geometry::from_erase_size(2048).unwrap(),
    );
    assert!(matches!(store.read_primary(), Err(BootError::Io { .. })));
    let err = store
        .write_stitched(0, &stitch(incoming(1), &[0u8; 512]))
        .unwrap_err();
    assert!(matches!(err, BootError::Io { .. }));
}
