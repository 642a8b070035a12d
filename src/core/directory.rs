//! Packed, fixed-width directory entries living in a directory inode's single
//! direct block (spec §4.5). Directories never grow into the indirect extent;
//! a full block is a hard capacity limit, reported as `NoSpace` rather than
//! overrunning into the next block (see SPEC_FULL.md §9, corrected bug).

use crate::error::{Error, Result};
use crate::image::Image;
use crate::inode::InodeRecord;
use crate::layout::{BLOCK_SIZE, DIRENT_SIZE, DIR_NAME_LENGTH};

/// One packed directory entry: a fixed-width name field plus an inode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; DIR_NAME_LENGTH],
    pub inum: u32,
}

impl DirEntry {
    fn read(bytes: &[u8]) -> Self {
        let mut name = [0u8; DIR_NAME_LENGTH];
        name.copy_from_slice(&bytes[..DIR_NAME_LENGTH]);
        let inum = u32::from_le_bytes(bytes[DIR_NAME_LENGTH..DIRENT_SIZE].try_into().unwrap());
        DirEntry { name, inum }
    }

    fn write(&self, bytes: &mut [u8]) {
        bytes[..DIR_NAME_LENGTH].copy_from_slice(&self.name);
        bytes[DIR_NAME_LENGTH..DIRENT_SIZE].copy_from_slice(&self.inum.to_le_bytes());
    }

    /// Name as a `&str`, trimmed at the first NUL. Entries are always written
    /// through [`encode_name`], so embedded NULs never appear in practice.
    pub fn name_str(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }
}

/// Encodes `name` into a fixed-width, NUL-terminated field, or `None` if it
/// (including the terminator) doesn't fit in `DIR_NAME_LENGTH` bytes.
fn encode_name(name: &str) -> Option<[u8; DIR_NAME_LENGTH]> {
    let bytes = name.as_bytes();
    if bytes.len() >= DIR_NAME_LENGTH {
        return None;
    }
    let mut buf = [0u8; DIR_NAME_LENGTH];
    buf[..bytes.len()].copy_from_slice(bytes);
    Some(buf)
}

fn entry_count(dir: &InodeRecord) -> usize {
    dir.size as usize / DIRENT_SIZE
}

fn entries(image: &Image, dir: &InodeRecord) -> Vec<DirEntry> {
    let block = image.block(dir.block as usize);
    (0..entry_count(dir))
        .map(|i| DirEntry::read(&block[i * DIRENT_SIZE..(i + 1) * DIRENT_SIZE]))
        .collect()
}

/// Looks up `name` in directory `dir`, returning its inode number.
pub fn directory_lookup(image: &Image, dir: &InodeRecord, name: &str) -> Result<u32> {
    entries(image, dir)
        .iter()
        .find(|e| e.name_str() == name)
        .map(|e| e.inum)
        .ok_or(Error::NoSuchEntry)
}

/// Appends a `(name, inum)` entry to directory `dir`, failing if `name` is
/// already present, too long to encode, or the directory's single block has
/// no room for another entry. Returns the directory's new `size`; the caller
/// is responsible for publishing it via [`crate::inode::set_size`].
pub fn directory_put(image: &mut Image, dir: &InodeRecord, name: &str, inum: u32) -> Result<u32> {
    if directory_lookup(image, dir, name).is_ok() {
        return Err(Error::AlreadyExists);
    }
    let encoded = encode_name(name).ok_or(Error::NameTooLong)?;
    let count = entry_count(dir);
    if (count + 1) * DIRENT_SIZE > BLOCK_SIZE {
        return Err(Error::NoSpace);
    }
    let block = image.block_mut(dir.block as usize);
    let entry = DirEntry { name: encoded, inum };
    entry.write(&mut block[count * DIRENT_SIZE..(count + 1) * DIRENT_SIZE]);
    Ok((count as u32 + 1) * DIRENT_SIZE as u32)
}

/// Removes the entry named `name` from directory `dir` by swapping in the
/// last entry over it (order is not preserved). Returns the directory's new
/// `size`; the caller publishes it via [`crate::inode::set_size`].
pub fn directory_delete(image: &mut Image, dir: &InodeRecord, name: &str) -> Result<u32> {
    let all = entries(image, dir);
    let idx = all
        .iter()
        .position(|e| e.name_str() == name)
        .ok_or(Error::NoSuchEntry)?;
    let last = all.len() - 1;
    let block = image.block_mut(dir.block as usize);
    if idx != last {
        let moved = all[last];
        moved.write(&mut block[idx * DIRENT_SIZE..(idx + 1) * DIRENT_SIZE]);
    }
    Ok((last as u32) * DIRENT_SIZE as u32)
}

/// Returns every entry's name and inode number, in on-disk order.
pub fn directory_list(image: &Image, dir: &InodeRecord) -> Vec<(String, u32)> {
    entries(image, dir)
        .iter()
        .map(|e| (e.name_str().to_string(), e.inum))
        .collect()
}
