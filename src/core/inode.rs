//! Inode table and inode allocator; the direct/indirect extent map (spec §4.4).

use crate::alloc::{alloc_block, free_block};
use crate::bitmap;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::layout::{self, BLOCK_SIZE, INODE_COUNT, INODE_RECORD_SIZE};

/// One on-disk inode record: refs, mode, size, block, each a 32-bit integer
/// (spec §3.3, §6.1). Kept as a plain value type; callers read it out of the
/// mapping, mutate the copy, and write it back through [`set_inode`] (or the
/// individual field setters below), rather than holding a long-lived
/// reference into the mapping across further allocator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeRecord {
    /// 0 if the slot is free, 1 if in use (no hard links in this filesystem).
    pub refs: u32,
    /// POSIX mode bits; high bits encode file type (see [`layout::MODE_DIR_BIT`]).
    pub mode: u32,
    /// Bytes of valid data (or, for directories, the packed entry array length).
    pub size: u32,
    /// Direct data block if `size <= BLOCK_SIZE`, else an indirect block index.
    pub block: u32,
}

impl InodeRecord {
    const EMPTY: InodeRecord = InodeRecord {
        refs: 0,
        mode: 0,
        size: 0,
        block: 0,
    };

    fn read(bytes: &[u8]) -> Self {
        InodeRecord {
            refs: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            mode: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            size: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            block: u32::from_le_bytes(bytes[12..16].try_into().unwrap()),
        }
    }

    fn write(&self, bytes: &mut [u8]) {
        bytes[0..4].copy_from_slice(&self.refs.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.mode.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.size.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.block.to_le_bytes());
    }

    /// Whether this inode's mode has the directory bit set.
    pub fn is_dir(&self) -> bool {
        self.mode & layout::MODE_DIR_BIT != 0
    }
}

/// Reads inode `inum`'s record.
pub fn get_inode(image: &Image, inum: u32) -> InodeRecord {
    let off = layout::inode_offset(inum) - layout::INODE_REGION_BLOCK * BLOCK_SIZE;
    InodeRecord::read(&image.inode_region()[off..off + INODE_RECORD_SIZE])
}

fn set_inode(image: &mut Image, inum: u32, record: &InodeRecord) {
    let off = layout::inode_offset(inum) - layout::INODE_REGION_BLOCK * BLOCK_SIZE;
    let region = image.inode_region_mut();
    record.write(&mut region[off..off + INODE_RECORD_SIZE]);
}

fn inode_bitmap_mut(image: &mut Image) -> &mut [u8] {
    let region = image.inode_region_mut();
    &mut region[..layout::INODE_BITMAP_SIZE]
}

/// First-free scan of the inode bitmap. Does **not** initialize the record;
/// the caller must publish refs/mode/size/block before the inode is visible
/// through any directory.
pub fn alloc_inode(image: &mut Image) -> Result<u32> {
    let bm = inode_bitmap_mut(image);
    for i in 0..INODE_COUNT {
        if !bitmap::get(bm, i) {
            bitmap::put(bm, i, true);
            return Ok(i as u32);
        }
    }
    Err(Error::NoSpace)
}

/// Clears inode `inum`'s bit. Does not free its data blocks.
pub fn free_inode(image: &mut Image, inum: u32) {
    let bm = inode_bitmap_mut(image);
    bitmap::put(bm, inum as usize, false);
}

/// Formats inode 0 as the root directory on a freshly created image.
pub fn format_root(image: &mut Image) -> Result<()> {
    let root = get_inode(image, layout::ROOT_INODE);
    if root.refs != 0 {
        return Ok(());
    }
    let block = alloc_block(image)?;
    let bm = inode_bitmap_mut(image);
    bitmap::put(bm, layout::ROOT_INODE as usize, true);
    set_inode(
        image,
        layout::ROOT_INODE,
        &InodeRecord {
            refs: 1,
            mode: layout::ROOT_DIR_MODE,
            size: 0,
            block,
        },
    );
    Ok(())
}

/// Maps a logical block index within an inode's data to a physical block
/// index, or `None` if `logical` is out of range for `node`'s current extent.
pub fn inode_get_bnum(image: &Image, node: &InodeRecord, logical: u32) -> Option<u32> {
    if node.size as u64 <= BLOCK_SIZE as u64 {
        return (logical == 0).then_some(node.block);
    }
    let valid = layout::blocks_for_size(node.size as u64) as u32;
    if logical >= valid {
        return None;
    }
    let indirect = image.block(node.block as usize);
    let off = logical as usize * 4;
    Some(u32::from_le_bytes(indirect[off..off + 4].try_into().unwrap()))
}

fn indirect_slot(image: &Image, indirect_block: u32, slot: u32) -> u32 {
    let blk = image.block(indirect_block as usize);
    let off = slot as usize * 4;
    u32::from_le_bytes(blk[off..off + 4].try_into().unwrap())
}

fn set_indirect_slot(image: &mut Image, indirect_block: u32, slot: u32, value: u32) {
    let blk = image.block_mut(indirect_block as usize);
    let off = slot as usize * 4;
    blk[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

/// Grows `node`'s extent to cover `blocks_for_size(new_size)` blocks,
/// performing the direct→indirect transition if needed. Does not touch
/// `node.size`; the caller updates it only after this returns `Ok`, and
/// leaves any blocks allocated before a `NoSpace` failure in place (spec §7
/// Partial-failure semantics — this rewrite preserves that, it does not
/// roll back).
pub fn grow_inode(image: &mut Image, inum: u32, new_size: u64) -> Result<()> {
    let mut node = get_inode(image, inum);
    let current_blocks = layout::blocks_for_size(node.size as u64);
    let target_blocks = layout::blocks_for_size(new_size);
    if target_blocks <= current_blocks {
        return Ok(());
    }

    let mut current_blocks = current_blocks;
    let was_direct = node.size as u64 <= BLOCK_SIZE as u64;
    if was_direct && target_blocks > 1 {
        let indirect_block = alloc_block(image)?;
        set_indirect_slot(image, indirect_block, 0, node.block);
        node.block = indirect_block;
        set_inode(image, inum, &node);
        current_blocks = 1;
    }

    // A direct file growing within its one existing block (was_direct &&
    // target_blocks == 1) has nothing left to allocate: node.block already
    // names its only data block, and it holds file data, not an indirect
    // pointer array. Looping here would overwrite that data and leak the
    // block alloc_block hands back (original inode.c guards this the same way).
    if !was_direct || target_blocks > 1 {
        while current_blocks < target_blocks {
            let block = alloc_block(image)?;
            set_indirect_slot(image, node.block, current_blocks as u32, block);
            current_blocks += 1;
        }
    }
    Ok(())
}

/// Frees blocks no longer covered by `new_size`, performing the
/// indirect→direct transition only when exactly one block survives. Does not
/// touch `node.size`. Shrinking all the way to zero blocks frees every data
/// block but leaves `node.block` pointing at the now-empty indirect block
/// rather than freeing it too — callers that are discarding the inode
/// entirely (unlink, rmdir) free that last block themselves.
pub fn shrink_inode(image: &mut Image, inum: u32, new_size: u64) {
    let mut node = get_inode(image, inum);
    if node.size as u64 <= BLOCK_SIZE as u64 {
        return;
    }
    let old_blocks = layout::blocks_for_size(node.size as u64);
    let required_blocks = layout::blocks_for_size(new_size);

    for slot in required_blocks..old_blocks {
        let blk = indirect_slot(image, node.block, slot as u32);
        free_block(image, blk);
    }

    if required_blocks == 1 {
        let preserved = indirect_slot(image, node.block, 0);
        free_block(image, node.block);
        node.block = preserved;
        set_inode(image, inum, &node);
    }
}

/// Updates `size` on an inode already grown/shrunk to the matching extent.
pub fn set_size(image: &mut Image, inum: u32, size: u32) {
    let mut node = get_inode(image, inum);
    node.size = size;
    set_inode(image, inum, &node);
}

/// Publishes a brand-new inode record (used by `mknod`/`mkdir`).
pub fn init_inode(image: &mut Image, inum: u32, mode: u32, block: u32) {
    set_inode(
        image,
        inum,
        &InodeRecord {
            refs: 1,
            mode,
            size: 0,
            block,
        },
    );
}

/// Clears an inode's record back to all-zero (cosmetic; the bitmap bit is
/// what actually governs reuse, via [`free_inode`]).
pub fn clear_inode(image: &mut Image, inum: u32) {
    set_inode(image, inum, &InodeRecord::EMPTY);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn fresh_image() -> Image {
        let tmp = NamedTempFile::new().unwrap();
        let mut image = Image::open(tmp.path()).unwrap();
        format_root(&mut image).unwrap();
        image
    }

    #[test]
    fn root_is_formatted() {
        let image = fresh_image();
        let root = get_inode(&image, layout::ROOT_INODE);
        assert_eq!(root.refs, 1);
        assert!(root.is_dir());
        assert_eq!(root.size, 0);
    }

    #[test]
    fn alloc_free_reuse() {
        let mut image = fresh_image();
        let a = alloc_inode(&mut image).unwrap();
        free_inode(&mut image, a);
        let b = alloc_inode(&mut image).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn grow_within_one_block_is_a_no_op() {
        let mut image = fresh_image();
        let inum = alloc_inode(&mut image).unwrap();
        let block = alloc_block(&mut image).unwrap();
        init_inode(&mut image, inum, 0o100644, block);
        let next_free_before = alloc_block(&mut image).unwrap();
        free_block(&mut image, next_free_before);

        grow_inode(&mut image, inum, BLOCK_SIZE as u64).unwrap();

        let node = get_inode(&image, inum);
        assert_eq!(node.block, block, "still direct, same block");
        assert_eq!(
            inode_get_bnum(&image, &node, 0),
            Some(block),
            "growing within one block must not touch the direct pointer"
        );
        let next_free_after = alloc_block(&mut image).unwrap();
        assert_eq!(next_free_after, next_free_before, "no block was leaked by the no-op grow");
    }

    #[test]
    fn direct_bnum_only_logical_zero() {
        let mut image = fresh_image();
        let inum = alloc_inode(&mut image).unwrap();
        let block = alloc_block(&mut image).unwrap();
        init_inode(&mut image, inum, 0o100644, block);
        set_size(&mut image, inum, 10);
        let node = get_inode(&image, inum);
        assert_eq!(inode_get_bnum(&image, &node, 0), Some(block));
        assert_eq!(inode_get_bnum(&image, &node, 1), None);
    }

    #[test]
    fn grow_across_direct_to_indirect_transition() {
        let mut image = fresh_image();
        let inum = alloc_inode(&mut image).unwrap();
        let direct_block = alloc_block(&mut image).unwrap();
        init_inode(&mut image, inum, 0o100644, direct_block);
        set_size(&mut image, inum, BLOCK_SIZE as u32);

        grow_inode(&mut image, inum, BLOCK_SIZE as u64 + 1).unwrap();
        set_size(&mut image, inum, BLOCK_SIZE as u32 + 1);

        let node = get_inode(&image, inum);
        assert_ne!(node.block, direct_block, "block field now names the indirect block");
        assert_eq!(inode_get_bnum(&image, &node, 0), Some(direct_block));
        assert!(inode_get_bnum(&image, &node, 1).is_some());
    }

    #[test]
    fn shrink_across_indirect_to_direct_transition() {
        let mut image = fresh_image();
        let inum = alloc_inode(&mut image).unwrap();
        let direct_block = alloc_block(&mut image).unwrap();
        init_inode(&mut image, inum, 0o100644, direct_block);
        set_size(&mut image, inum, BLOCK_SIZE as u32);
        grow_inode(&mut image, inum, BLOCK_SIZE as u64 + 1).unwrap();
        set_size(&mut image, inum, BLOCK_SIZE as u32 + 1);
        let node = get_inode(&image, inum);
        let indirect_block = node.block;

        shrink_inode(&mut image, inum, BLOCK_SIZE as u64);
        set_size(&mut image, inum, BLOCK_SIZE as u32);

        let node = get_inode(&image, inum);
        assert_eq!(node.block, direct_block);
        assert!(!crate::alloc::is_allocated(&image, indirect_block));
    }

    #[test]
    fn grow_no_space_leaves_partial_extent_and_size_untouched() {
        let mut image = fresh_image();
        let inum = alloc_inode(&mut image).unwrap();
        let direct_block = alloc_block(&mut image).unwrap();
        init_inode(&mut image, inum, 0o100644, direct_block);
        set_size(&mut image, inum, BLOCK_SIZE as u32);

        // Exhaust every remaining block so growth fails partway through.
        let mut leaked = vec![];
        loop {
            match alloc_block(&mut image) {
                Ok(b) => leaked.push(b),
                Err(Error::NoSpace) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        for b in leaked {
            free_block(&mut image, b);
        }
        // Re-exhaust leaving exactly one free block so the direct->indirect
        // transition succeeds but the first data block allocation fails.
        let mut again = vec![];
        loop {
            match alloc_block(&mut image) {
                Ok(b) => again.push(b),
                Err(Error::NoSpace) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        let reserved = again.pop().unwrap();
        free_block(&mut image, reserved);

        let before = get_inode(&image, inum);
        let result = grow_inode(&mut image, inum, BLOCK_SIZE as u64 * 3);
        assert!(matches!(result, Err(Error::NoSpace)));
        let after = get_inode(&image, inum);
        assert_eq!(before.size, after.size, "grow never touches size");
        assert_ne!(after.block, direct_block, "the indirect block was allocated before failing");
    }
}
