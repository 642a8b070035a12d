//! Path resolution: walks slash-separated segments through directory lookups
//! starting at the root inode (spec §4.6).

use crate::directory::directory_lookup;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::inode::get_inode;
use crate::layout::ROOT_INODE;

/// Resolves an absolute path to an inode number, failing on the first
/// missing segment. Does not check that intermediate segments are
/// directories — that is the calling operation's responsibility (spec §4.6).
pub fn find_path(image: &Image, path: &str) -> Result<u32> {
    if path == "/" {
        return Ok(ROOT_INODE);
    }
    let mut current = ROOT_INODE;
    for segment in path.trim_start_matches('/').split('/') {
        if segment.is_empty() {
            continue;
        }
        let node = get_inode(image, current);
        current = directory_lookup(image, &node, segment)?;
    }
    Ok(current)
}

/// Splits `path` into its parent directory's path and its final segment.
/// `/a/b/c` becomes `("/a/b", "c")`; a bare top-level name like `/a` becomes
/// `("/", "a")`. Used by operations that must resolve the containing
/// directory before acting on the entry itself (mknod, mkdir, unlink, rmdir,
/// rename) — the original C resolved these inline and, for `rmdir`/`unlink`,
/// mixed up the root inode with the actual parent; this split makes the
/// parent explicit everywhere it's needed (SPEC_FULL.md §9, corrected bug).
pub fn split_parent(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => ("/", trimmed),
    }
}
