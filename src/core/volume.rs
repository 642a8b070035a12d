//! Ties the block, inode, directory, and path layers together into the
//! adapter surface described in spec §6.2. `Volume` owns the image; every
//! method here is a plain function of its arguments and the mapped bytes —
//! no logging, no FUSE types, no process state (spec §6.2b: the core does
//! not log).

use crate::alloc::{alloc_block, free_block};
use crate::directory::{directory_delete, directory_list, directory_put};
use crate::error::{Error, Result};
use crate::image::Image;
use crate::inode::{
    alloc_inode, clear_inode, format_root, free_inode, get_inode, grow_inode, init_inode,
    inode_get_bnum, shrink_inode, InodeRecord,
};
use crate::layout::{BLOCK_SIZE, MODE_DIR_BIT};
use crate::path::{find_path, split_parent};
use crate::slist::StringList;
use std::path::Path;

/// File attributes returned by `getattr`, per spec §6.2.
#[derive(Debug, Clone, Copy)]
pub struct Attr {
    pub mode: u32,
    pub size: u32,
    pub nlink: u32,
}

impl From<InodeRecord> for Attr {
    fn from(node: InodeRecord) -> Self {
        Attr {
            mode: node.mode,
            size: node.size,
            nlink: node.refs,
        }
    }
}

/// The whole storage engine: a memory-mapped image plus the operations that
/// read and mutate it.
pub struct Volume {
    image: Image,
}

impl Volume {
    /// Opens (or creates and formats) the image at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let mut image = Image::open(path)?;
        format_root(&mut image)?;
        Ok(Volume { image })
    }

    /// Flushes the mapping to the backing file. Called on clean unmount.
    pub fn teardown(&mut self) -> Result<()> {
        self.image.teardown()
    }

    fn resolve(&self, path: &str) -> Result<(u32, InodeRecord)> {
        let inum = find_path(&self.image, path)?;
        Ok((inum, get_inode(&self.image, inum)))
    }

    fn resolve_dir(&self, path: &str) -> Result<(u32, InodeRecord)> {
        let (inum, node) = self.resolve(path)?;
        if !node.is_dir() {
            return Err(Error::NotADirectory);
        }
        Ok((inum, node))
    }

    /// `access(path)`: succeeds iff `path` resolves.
    pub fn access(&self, path: &str) -> Result<()> {
        find_path(&self.image, path)?;
        Ok(())
    }

    /// `getattr(path)`.
    pub fn getattr(&self, path: &str) -> Result<Attr> {
        let (_, node) = self.resolve(path)?;
        Ok(node.into())
    }

    fn create(&mut self, path: &str, mode: u32) -> Result<Attr> {
        let (parent_path, name) = split_parent(path);
        let (parent_inum, parent) = self.resolve_dir(parent_path)?;

        let inum = alloc_inode(&mut self.image)?;
        let block = match alloc_block(&mut self.image) {
            Ok(b) => b,
            Err(e) => {
                free_inode(&mut self.image, inum);
                return Err(e);
            }
        };
        init_inode(&mut self.image, inum, mode, block);
        if let Err(e) = directory_put(&mut self.image, &parent, name, inum)
            .map(|new_size| crate::inode::set_size(&mut self.image, parent_inum, new_size))
        {
            free_block(&mut self.image, block);
            free_inode(&mut self.image, inum);
            clear_inode(&mut self.image, inum);
            return Err(e);
        }
        Ok(get_inode(&self.image, inum).into())
    }

    /// `mknod(path, mode)`.
    pub fn mknod(&mut self, path: &str, mode: u32) -> Result<Attr> {
        self.create(path, mode)
    }

    /// `mkdir(path, mode)`: mknod with the directory bit set.
    pub fn mkdir(&mut self, path: &str, mode: u32) -> Result<Attr> {
        self.create(path, mode | MODE_DIR_BIT)
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        if path == "/" {
            return Err(Error::NotSupported);
        }
        let (parent_path, name) = split_parent(path);
        let (parent_inum, parent) = self.resolve_dir(parent_path)?;
        let (inum, node) = self.resolve(path)?;

        let final_block = if node.size as u64 > BLOCK_SIZE as u64 {
            shrink_inode(&mut self.image, inum, 0);
            get_inode(&self.image, inum).block
        } else {
            node.block
        };
        free_block(&mut self.image, final_block);
        free_inode(&mut self.image, inum);
        clear_inode(&mut self.image, inum);

        let new_size = directory_delete(&mut self.image, &parent, name)?;
        crate::inode::set_size(&mut self.image, parent_inum, new_size);
        Ok(())
    }

    /// `unlink(path)`.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let (_, node) = self.resolve(path)?;
        if node.is_dir() {
            return Err(Error::NotADirectory);
        }
        self.remove(path)
    }

    /// `rmdir(path)`: no emptiness check (spec §9). Removes the entry from
    /// the directory's actual parent, resolved via `split_parent`.
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        let (_, node) = self.resolve(path)?;
        if !node.is_dir() {
            return Err(Error::NotADirectory);
        }
        self.remove(path)
    }

    /// `rename(src, dst)`: if `dst` exists, it is removed first.
    pub fn rename(&mut self, src: &str, dst: &str) -> Result<()> {
        let (src_inum, _) = self.resolve(src)?;
        let (src_parent_path, src_name) = split_parent(src);
        let (dst_parent_path, dst_name) = split_parent(dst);

        if self.resolve(dst).is_ok() {
            self.remove(dst)?;
        }

        let (dst_parent_inum, dst_parent) = self.resolve_dir(dst_parent_path)?;
        let new_size = directory_put(&mut self.image, &dst_parent, dst_name, src_inum)?;
        crate::inode::set_size(&mut self.image, dst_parent_inum, new_size);

        let (src_parent_inum, src_parent) = self.resolve_dir(src_parent_path)?;
        let new_size = directory_delete(&mut self.image, &src_parent, src_name)?;
        crate::inode::set_size(&mut self.image, src_parent_inum, new_size);
        Ok(())
    }

    /// `truncate(path, n)`: grows or shrinks the inode to exactly `n` bytes.
    pub fn truncate(&mut self, path: &str, n: u64) -> Result<()> {
        let (inum, node) = self.resolve(path)?;
        if n as u64 > node.size as u64 {
            grow_inode(&mut self.image, inum, n)?;
        } else {
            shrink_inode(&mut self.image, inum, n);
        }
        crate::inode::set_size(&mut self.image, inum, n as u32);
        Ok(())
    }

    /// `read(path, n, off)`: clamps to EOF; never fails on an out-of-range
    /// offset, it simply returns fewer (possibly zero) bytes.
    pub fn read(&self, path: &str, n: u64, off: u64) -> Result<Vec<u8>> {
        let (_, node) = self.resolve(path)?;
        if off >= node.size as u64 {
            return Ok(Vec::new());
        }
        let end = (off + n).min(node.size as u64);
        let mut out = Vec::with_capacity((end - off) as usize);
        let mut pos = off;
        while pos < end {
            let logical = (pos / BLOCK_SIZE as u64) as u32;
            let in_block = (pos % BLOCK_SIZE as u64) as usize;
            let take = ((end - pos) as usize).min(BLOCK_SIZE - in_block);
            let Some(bnum) = inode_get_bnum(&self.image, &node, logical) else {
                break;
            };
            let block = self.image.block(bnum as usize);
            out.extend_from_slice(&block[in_block..in_block + take]);
            pos += take as u64;
        }
        Ok(out)
    }

    /// `write(path, n, off)`: grows the file first if the write extends past
    /// the current size, then copies `data` in block by block.
    pub fn write(&mut self, path: &str, data: &[u8], off: u64) -> Result<u32> {
        let (inum, node) = self.resolve(path)?;
        let end = off + data.len() as u64;
        if end > node.size as u64 {
            grow_inode(&mut self.image, inum, end)?;
            crate::inode::set_size(&mut self.image, inum, end as u32);
        }
        let node = get_inode(&self.image, inum);

        let mut pos = off;
        let mut written = 0usize;
        while written < data.len() {
            let logical = (pos / BLOCK_SIZE as u64) as u32;
            let in_block = (pos % BLOCK_SIZE as u64) as usize;
            let take = (data.len() - written).min(BLOCK_SIZE - in_block);
            let bnum = inode_get_bnum(&self.image, &node, logical)
                .expect("block freshly grown to cover this offset");
            let block = self.image.block_mut(bnum as usize);
            block[in_block..in_block + take].copy_from_slice(&data[written..written + take]);
            pos += take as u64;
            written += take;
        }
        Ok(written as u32)
    }

    /// `readdir(path)`: entries of the directory plus a synthesized `.`.
    pub fn readdir(&self, path: &str) -> Result<StringList> {
        let (_, node) = self.resolve_dir(path)?;
        let mut names: Vec<String> = directory_list(&self.image, &node)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        names.push(".".to_string());
        Ok(StringList::from_names(names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn fresh_volume() -> Volume {
        let tmp = NamedTempFile::new().unwrap();
        Volume::open(tmp.path()).unwrap()
    }

    #[test]
    fn mkdir_then_readdir() {
        let mut vol = fresh_volume();
        let attr = vol.mkdir("/a", 0o755).unwrap();
        assert_eq!(attr.mode, 0o755 | MODE_DIR_BIT);
        assert_eq!(attr.size, 0);

        let listing: Vec<&str> = vol.readdir("/").unwrap().iter().collect();
        assert!(listing.contains(&"a"));
        assert!(listing.contains(&"."));
        assert_eq!(vol.getattr("/a").unwrap().mode, 0o755 | MODE_DIR_BIT);
    }

    #[test]
    fn small_write_then_read_round_trips() {
        let mut vol = fresh_volume();
        vol.mknod("/f", 0o100644).unwrap();
        let n = vol.write("/f", b"hello", 0).unwrap();
        assert_eq!(n, 5);
        assert_eq!(vol.read("/f", 5, 0).unwrap(), b"hello");
        assert_eq!(vol.getattr("/f").unwrap().size, 5);
    }

    #[test]
    fn write_past_eof_grows_across_indirect_transition() {
        let mut vol = fresh_volume();
        vol.mknod("/big", 0o100644).unwrap();
        let at = BLOCK_SIZE as u64 - 1;
        let data = b"XY";
        vol.write("/big", data, at).unwrap();
        assert_eq!(vol.getattr("/big").unwrap().size, BLOCK_SIZE as u32 + 1);
        assert_eq!(vol.read("/big", 2, at).unwrap(), data);
    }

    #[test]
    fn truncate_down_across_indirect_transition_preserves_prefix() {
        let mut vol = fresh_volume();
        vol.mknod("/f", 0o100644).unwrap();
        vol.truncate("/f", BLOCK_SIZE as u64 + 10).unwrap();
        vol.write("/f", b"head", 0).unwrap();
        vol.truncate("/f", BLOCK_SIZE as u64).unwrap();
        assert_eq!(vol.getattr("/f").unwrap().size, BLOCK_SIZE as u32);
        assert_eq!(vol.read("/f", 4, 0).unwrap(), b"head");
    }

    #[test]
    fn read_past_eof_returns_empty() {
        let mut vol = fresh_volume();
        vol.mknod("/f", 0o100644).unwrap();
        vol.write("/f", b"hi", 0).unwrap();
        assert_eq!(vol.read("/f", 10, 100).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn rename_within_root() {
        let mut vol = fresh_volume();
        vol.mknod("/a", 0o100644).unwrap();
        vol.write("/a", b"data", 0).unwrap();
        vol.rename("/a", "/b").unwrap();
        assert!(matches!(vol.access("/a"), Err(Error::NoSuchEntry)));
        assert_eq!(vol.read("/b", 4, 0).unwrap(), b"data");
    }

    #[test]
    fn delete_then_reuse_inode_and_block() {
        let mut vol = fresh_volume();
        vol.mknod("/a", 0o100644).unwrap();
        let attr = vol.getattr("/a").unwrap();
        vol.unlink("/a").unwrap();
        assert!(matches!(vol.access("/a"), Err(Error::NoSuchEntry)));
        let attr2 = vol.mknod("/b", 0o100644).unwrap();
        assert_eq!(attr.size, attr2.size);
    }

    #[test]
    fn unlink_on_directory_is_rejected() {
        let mut vol = fresh_volume();
        vol.mkdir("/d", 0o755).unwrap();
        assert!(matches!(vol.unlink("/d"), Err(Error::NotADirectory)));
    }

    #[test]
    fn rmdir_removes_from_actual_parent_not_root() {
        let mut vol = fresh_volume();
        vol.mkdir("/outer", 0o755).unwrap();
        vol.mkdir("/outer/inner", 0o755).unwrap();
        vol.rmdir("/outer/inner").unwrap();
        assert!(matches!(vol.access("/outer/inner"), Err(Error::NoSuchEntry)));
        // Root's own listing is untouched by removing a nested directory.
        let root_listing: Vec<&str> = vol.readdir("/").unwrap().iter().collect();
        assert!(root_listing.contains(&"outer"));
    }
}
