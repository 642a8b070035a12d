//! First-free block allocator, scanning the block bitmap in block 0 (spec §4.3).

use crate::bitmap;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::layout::{BLOCK_BITMAP_BLOCK, N_BLOCKS};

/// Scans the block bitmap for the first unset bit, sets it, and returns its
/// index. The scan starts at block 0, not after the reserved region, so the
/// reserved blocks being pre-marked used is the only special-casing needed.
pub fn alloc_block(image: &mut Image) -> Result<u32> {
    let bm = image.block_mut(BLOCK_BITMAP_BLOCK);
    for i in 0..N_BLOCKS {
        if !bitmap::get(bm, i) {
            bitmap::put(bm, i, true);
            return Ok(i as u32);
        }
    }
    Err(Error::NoSpace)
}

/// Clears bit `i` in the block bitmap. Callers must not double-free.
pub fn free_block(image: &mut Image, i: u32) {
    let bm = image.block_mut(BLOCK_BITMAP_BLOCK);
    bitmap::put(bm, i as usize, false);
}

/// Returns whether block `i` is currently marked allocated.
pub fn is_allocated(image: &Image, i: u32) -> bool {
    bitmap::get(image.block(BLOCK_BITMAP_BLOCK), i as usize)
}
