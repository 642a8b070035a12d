//! End-to-end scenarios against a fresh image, exercising `Volume` the way
//! the adapter would (spec §8.4), without going through an actual FUSE mount.

use imgfs_core::layout::{BLOCK_SIZE, MODE_DIR_BIT};
use imgfs_core::{Error, Volume};
use tempfile::NamedTempFile;

fn fresh_volume() -> Volume {
    let tmp = NamedTempFile::new().unwrap();
    Volume::open(tmp.path()).unwrap()
}

#[test]
fn mkdir_and_readdir() {
    let mut vol = fresh_volume();
    vol.mkdir("/a", 0o755).unwrap();

    let names: Vec<&str> = vol.readdir("/").unwrap().iter().collect();
    assert!(names.contains(&"a"));
    assert!(names.contains(&"."));

    let attr = vol.getattr("/a").unwrap();
    assert_eq!(attr.mode, 0o755 | MODE_DIR_BIT);
    assert_eq!(attr.size, 0);
}

#[test]
fn small_write_round_trips() {
    let mut vol = fresh_volume();
    vol.mknod("/note.txt", 0o100644).unwrap();
    let written = vol.write("/note.txt", b"hello, world", 0).unwrap();
    assert_eq!(written, 12);
    assert_eq!(vol.read("/note.txt", 12, 0).unwrap(), b"hello, world");
    assert_eq!(vol.getattr("/note.txt").unwrap().size, 12);
}

#[test]
fn grow_across_direct_to_indirect_transition() {
    let mut vol = fresh_volume();
    vol.mknod("/big", 0o100644).unwrap();
    vol.truncate("/big", BLOCK_SIZE as u64).unwrap();
    vol.write("/big", b"tail", BLOCK_SIZE as u64 - 4).unwrap();

    vol.truncate("/big", BLOCK_SIZE as u64 + 100).unwrap();
    assert_eq!(vol.getattr("/big").unwrap().size, BLOCK_SIZE as u32 + 100);
    // The bytes written before the transition are preserved in the migrated block.
    assert_eq!(vol.read("/big", 4, BLOCK_SIZE as u64 - 4).unwrap(), b"tail");
}

#[test]
fn truncate_down_across_transition_preserves_prefix() {
    let mut vol = fresh_volume();
    vol.mknod("/big", 0o100644).unwrap();
    vol.truncate("/big", BLOCK_SIZE as u64 + 4096).unwrap();
    vol.write("/big", b"head", 0).unwrap();

    vol.truncate("/big", BLOCK_SIZE as u64).unwrap();
    assert_eq!(vol.getattr("/big").unwrap().size, BLOCK_SIZE as u32);
    assert_eq!(vol.read("/big", 4, 0).unwrap(), b"head");

    vol.truncate("/big", 4).unwrap();
    assert_eq!(vol.getattr("/big").unwrap().size, 4);
    assert_eq!(vol.read("/big", 4, 0).unwrap(), b"head");
}

#[test]
fn rename_within_root() {
    let mut vol = fresh_volume();
    vol.mknod("/a", 0o100644).unwrap();
    vol.write("/a", b"payload", 0).unwrap();

    vol.rename("/a", "/b").unwrap();

    assert!(matches!(vol.access("/a"), Err(Error::NoSuchEntry)));
    assert_eq!(vol.read("/b", 7, 0).unwrap(), b"payload");
}

#[test]
fn rename_overwriting_existing_destination() {
    let mut vol = fresh_volume();
    vol.mknod("/a", 0o100644).unwrap();
    vol.write("/a", b"new", 0).unwrap();
    vol.mknod("/b", 0o100644).unwrap();
    vol.write("/b", b"old-content", 0).unwrap();

    vol.rename("/a", "/b").unwrap();

    assert!(matches!(vol.access("/a"), Err(Error::NoSuchEntry)));
    assert_eq!(vol.read("/b", 3, 0).unwrap(), b"new");
}

#[test]
fn delete_and_reuse_reclaims_inode_and_block() {
    let mut vol = fresh_volume();
    vol.mknod("/a", 0o100644).unwrap();
    vol.unlink("/a").unwrap();
    assert!(matches!(vol.access("/a"), Err(Error::NoSuchEntry)));

    // A fresh create after delete should succeed, proving the inode and
    // block bitmaps were correctly cleared rather than leaking.
    vol.mknod("/b", 0o100644).unwrap();
    vol.write("/b", b"ok", 0).unwrap();
    assert_eq!(vol.read("/b", 2, 0).unwrap(), b"ok");
}

#[test]
fn nested_directories_resolve_and_rmdir_targets_the_right_parent() {
    let mut vol = fresh_volume();
    vol.mkdir("/outer", 0o755).unwrap();
    vol.mkdir("/outer/inner", 0o755).unwrap();
    vol.mknod("/outer/inner/leaf.txt", 0o100644).unwrap();
    vol.write("/outer/inner/leaf.txt", b"deep", 0).unwrap();

    assert_eq!(vol.read("/outer/inner/leaf.txt", 4, 0).unwrap(), b"deep");

    vol.unlink("/outer/inner/leaf.txt").unwrap();
    vol.rmdir("/outer/inner").unwrap();
    assert!(matches!(vol.access("/outer/inner"), Err(Error::NoSuchEntry)));

    let outer_listing: Vec<&str> = vol.readdir("/outer").unwrap().iter().collect();
    assert_eq!(outer_listing, vec!["."]);

    let root_listing: Vec<&str> = vol.readdir("/").unwrap().iter().collect();
    assert!(root_listing.contains(&"outer"));
}

#[test]
fn directory_capacity_is_enforced() {
    let mut vol = fresh_volume();
    vol.mkdir("/d", 0o755).unwrap();
    let capacity = BLOCK_SIZE / (48 + 4);
    for i in 0..capacity {
        vol.mknod(&format!("/d/f{i}"), 0o100644).unwrap();
    }
    assert!(matches!(vol.mknod("/d/overflow", 0o100644), Err(Error::NoSpace)));
}

#[test]
fn name_too_long_is_rejected() {
    let mut vol = fresh_volume();
    let long_name = format!("/{}", "x".repeat(48));
    assert!(matches!(vol.mknod(&long_name, 0o100644), Err(Error::NameTooLong)));
}
