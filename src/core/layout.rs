//! On-disk layout constants and the byte-offset arithmetic that ties them together.
//!
//! Everything here is compile-time: the image format is fixed at build time, not
//! negotiated at runtime (see the Configuration surface note in DESIGN.md).

/// Size of one block, in bytes.
pub const BLOCK_SIZE: usize = 4096;
/// Total number of blocks in the image.
pub const N_BLOCKS: usize = 256;
/// Number of blocks reserved for the inode bitmap and inode table.
pub const NUM_INODE_TABLE_BLOCKS: usize = 2;
/// Maximum length of a directory entry name, including the terminating NUL.
pub const DIR_NAME_LENGTH: usize = 48;

/// Size in bytes of one on-disk inode record (refs, mode, size, block; 32 bits each).
pub const INODE_RECORD_SIZE: usize = 16;
/// Size in bytes of one on-disk directory entry (name + inode index).
pub const DIRENT_SIZE: usize = DIR_NAME_LENGTH + 4;

/// Size of the block bitmap, in bytes (one bit per block).
pub const BLOCK_BITMAP_SIZE: usize = N_BLOCKS / 8;

/// Number of inodes the table holds.
///
/// Chosen so the inode bitmap prefix and the inode table together fill exactly
/// `NUM_INODE_TABLE_BLOCKS` blocks, with no spillover into the data region. See
/// DESIGN.md for why this isn't the naive `NUM_INODE_TABLE_BLOCKS * BLOCK_SIZE /
/// INODE_RECORD_SIZE`.
pub const INODE_COUNT: usize = 508;
/// Size of the inode bitmap, in bytes (one bit per inode).
pub const INODE_BITMAP_SIZE: usize = INODE_COUNT.div_ceil(8);

/// Block index of the block bitmap.
pub const BLOCK_BITMAP_BLOCK: usize = 0;
/// Block index where the inode bitmap and inode table begin.
pub const INODE_REGION_BLOCK: usize = 1;
/// Index of the first data block.
pub const DATA_REGION_START: usize = INODE_REGION_BLOCK + NUM_INODE_TABLE_BLOCKS;

/// The inode number of the root directory.
pub const ROOT_INODE: u32 = 0;
/// Default mode for the root directory: directory bit plus `0755`.
pub const ROOT_DIR_MODE: u32 = 0o040755;
/// Mode bit marking an inode as a directory.
pub const MODE_DIR_BIT: u32 = 0o040000;

const _: () = assert!(INODE_BITMAP_SIZE + INODE_COUNT * INODE_RECORD_SIZE
    == NUM_INODE_TABLE_BLOCKS * BLOCK_SIZE);

/// Byte offset, from the start of the image, of the inode bitmap.
pub fn inode_bitmap_offset() -> usize {
    INODE_REGION_BLOCK * BLOCK_SIZE
}

/// Byte offset, from the start of the image, of the first inode record.
pub fn inode_table_offset() -> usize {
    inode_bitmap_offset() + INODE_BITMAP_SIZE
}

/// Byte offset, from the start of the image, of inode `inum`'s record.
pub fn inode_offset(inum: u32) -> usize {
    inode_table_offset() + inum as usize * INODE_RECORD_SIZE
}

/// Number of blocks needed to hold `size` bytes.
pub fn blocks_for_size(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE as u64)
}
