//! Memory-maps a fixed-size image file and hands out blocks by index.

use crate::error::Result;
use crate::layout::{BLOCK_BITMAP_BLOCK, BLOCK_SIZE, DATA_REGION_START, INODE_REGION_BLOCK, N_BLOCKS};
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::path::Path;

/// The backing store: one memory-mapped file of `N_BLOCKS * BLOCK_SIZE` bytes.
pub struct Image {
    mmap: MmapMut,
}

impl Image {
    /// Opens `path`, creating it and zero-filling it to the image size if it
    /// doesn't exist yet, and memory-maps it. A freshly created image has its
    /// bitmaps and root inode formatted in place (§4.1).
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let metadata = file.metadata()?;
        let image_len = (N_BLOCKS * BLOCK_SIZE) as u64;
        let is_fresh = metadata.len() == 0;
        if metadata.len() != image_len {
            file.set_len(image_len)?;
        }
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let mut image = Self { mmap };
        if is_fresh {
            image.format();
        }
        Ok(image)
    }

    /// Marks the reserved blocks allocated. The block and inode bitmaps are
    /// already zero-filled by `set_len`; the root inode is formatted by the
    /// caller (`Volume::open`), which needs the allocator and inode layers.
    fn format(&mut self) {
        let bitmap = self.block_mut(BLOCK_BITMAP_BLOCK);
        for i in 0..DATA_REGION_START {
            crate::bitmap::put(bitmap, i, true);
        }
    }

    /// Returns the block at index `i` as an immutable byte slice.
    pub fn block(&self, i: usize) -> &[u8] {
        debug_assert!(i < N_BLOCKS, "block index {i} out of range");
        &self.mmap[i * BLOCK_SIZE..(i + 1) * BLOCK_SIZE]
    }

    /// Returns the block at index `i` as a mutable byte slice.
    pub fn block_mut(&mut self, i: usize) -> &mut [u8] {
        debug_assert!(i < N_BLOCKS, "block index {i} out of range");
        &mut self.mmap[i * BLOCK_SIZE..(i + 1) * BLOCK_SIZE]
    }

    /// Returns the whole inode-region span (inode bitmap + table), spanning
    /// `INODE_REGION_BLOCK` and the block(s) after it, as one contiguous slice.
    pub fn inode_region_mut(&mut self) -> &mut [u8] {
        let start = INODE_REGION_BLOCK * BLOCK_SIZE;
        let end = start + crate::layout::NUM_INODE_TABLE_BLOCKS * BLOCK_SIZE;
        &mut self.mmap[start..end]
    }

    /// Immutable counterpart of [`Image::inode_region_mut`].
    pub fn inode_region(&self) -> &[u8] {
        let start = INODE_REGION_BLOCK * BLOCK_SIZE;
        let end = start + crate::layout::NUM_INODE_TABLE_BLOCKS * BLOCK_SIZE;
        &self.mmap[start..end]
    }

    /// Flushes pending writes to the backing file. Called on clean teardown;
    /// not required per-operation (§5 Persistence).
    pub fn teardown(&mut self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}
