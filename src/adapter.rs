//! Translates FUSE's callback table onto `imgfs_core::Volume` (spec §6.2a).
//!
//! The core is path-keyed; FUSE is inode-number-keyed. This adapter's only
//! state beyond the volume itself is a small inode-number ⇄ path table,
//! populated by `lookup`/`mkdir`/`mknod`/`create` and consulted (never
//! trusted blindly — every call still re-resolves through the core) by the
//! operations the kernel addresses by inode number.

use imgfs_core::{Attr, Error, Volume};
use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyWrite, Request,
};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const TTL: Duration = Duration::from_secs(1);
const ROOT_FUSE_INO: u64 = 1;

fn errno(e: &Error) -> i32 {
    e.to_errno()
}

/// Joins a directory path and a child name the way every FUSE parent-keyed
/// callback needs to (lookup, mknod, mkdir, unlink, rmdir, rename, create).
fn join(parent: &str, name: &OsStr) -> String {
    let name = name.to_string_lossy();
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

pub struct Adapter {
    volume: Volume,
    ino_to_path: HashMap<u64, PathBuf>,
    path_to_ino: HashMap<PathBuf, u64>,
    next_ino: u64,
}

impl Adapter {
    pub fn new(volume: Volume) -> Self {
        let mut ino_to_path = HashMap::new();
        let mut path_to_ino = HashMap::new();
        ino_to_path.insert(ROOT_FUSE_INO, PathBuf::from("/"));
        path_to_ino.insert(PathBuf::from("/"), ROOT_FUSE_INO);
        Adapter {
            volume,
            ino_to_path,
            path_to_ino,
            next_ino: ROOT_FUSE_INO + 1,
        }
    }

    fn path_for(&self, ino: u64) -> Option<&Path> {
        self.ino_to_path.get(&ino).map(PathBuf::as_path)
    }

    /// Returns the FUSE inode number for `path`, allocating a fresh one if
    /// this is the first time the adapter has seen it.
    fn ino_for(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.path_to_ino.get(Path::new(path)) {
            return ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.ino_to_path.insert(ino, PathBuf::from(path));
        self.path_to_ino.insert(PathBuf::from(path), ino);
        ino
    }

    /// Drops any cached mapping for `path` (unlink, rmdir, the overwritten
    /// side of a rename).
    fn forget_path(&mut self, path: &str) {
        if let Some(ino) = self.path_to_ino.remove(Path::new(path)) {
            self.ino_to_path.remove(&ino);
        }
    }

    /// Rebases a cached path (and everything nested under it) after a
    /// successful rename, so later by-inode calls still resolve correctly.
    fn rebase_path(&mut self, old_path: &str, new_path: &str) {
        if let Some(ino) = self.path_to_ino.remove(Path::new(old_path)) {
            self.ino_to_path.insert(ino, PathBuf::from(new_path));
            self.path_to_ino.insert(PathBuf::from(new_path), ino);
        }
        let prefix = format!("{old_path}/");
        let stale: Vec<PathBuf> = self
            .path_to_ino
            .keys()
            .filter(|p| p.to_string_lossy().starts_with(&prefix))
            .cloned()
            .collect();
        for old in stale {
            if let Some(ino) = self.path_to_ino.remove(&old) {
                let rest = old.to_string_lossy()[old_path.len()..].to_string();
                let rebased = PathBuf::from(format!("{new_path}{rest}"));
                self.ino_to_path.insert(ino, rebased.clone());
                self.path_to_ino.insert(rebased, ino);
            }
        }
    }

    fn attr(&self, ino: u64, attr: Attr) -> FileAttr {
        let kind = if attr.mode & imgfs_core::layout::MODE_DIR_BIT != 0 {
            FileType::Directory
        } else {
            FileType::RegularFile
        };
        let now = SystemTime::now();
        FileAttr {
            ino,
            size: attr.size as u64,
            blocks: (attr.size as u64).div_ceil(512),
            atime: now,
            mtime: now,
            ctime: now,
            crtime: now,
            kind,
            perm: (attr.mode & 0o7777) as u16,
            nlink: attr.nlink.max(1),
            uid: 0,
            gid: 0,
            rdev: 0,
            blksize: imgfs_core::layout::BLOCK_SIZE as u32,
            flags: 0,
        }
    }
}

impl Filesystem for Adapter {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(parent_path) = self.path_for(parent).map(|p| p.to_string_lossy().into_owned())
        else {
            reply.error(libc::ENOENT);
            return;
        };
        let child_path = join(&parent_path, name);
        log::debug!("lookup({child_path})");
        match self.volume.getattr(&child_path) {
            Ok(attr) => {
                let ino = self.ino_for(&child_path);
                reply.entry(&TTL, &self.attr(ino, attr), 0);
            }
            Err(e) => {
                log::trace!("lookup({child_path}) -> {e}");
                reply.error(errno(&e));
            }
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let Some(path) = self.path_for(ino).map(|p| p.to_string_lossy().into_owned()) else {
            reply.error(libc::ENOENT);
            return;
        };
        log::debug!("getattr({path})");
        match self.volume.getattr(&path) {
            Ok(attr) => reply.attr(&TTL, &self.attr(ino, attr)),
            Err(e) => {
                log::warn!("getattr({path}) -> {e}");
                reply.error(errno(&e));
            }
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<fuser::TimeOrNow>,
        _mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(path) = self.path_for(ino).map(|p| p.to_string_lossy().into_owned()) else {
            reply.error(libc::ENOENT);
            return;
        };
        log::debug!("setattr({path}, size={size:?})");
        // chmod/utimens have no core counterpart (spec §6.2a): any mode,
        // ownership, or time change in this call is accepted but ignored.
        if let Some(n) = size {
            if let Err(e) = self.volume.truncate(&path, n) {
                log::warn!("setattr({path}) truncate -> {e}");
                reply.error(errno(&e));
                return;
            }
        }
        match self.volume.getattr(&path) {
            Ok(attr) => reply.attr(&TTL, &self.attr(ino, attr)),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, _mask: i32, reply: ReplyEmpty) {
        let Some(path) = self.path_for(ino).map(|p| p.to_string_lossy().into_owned()) else {
            reply.error(libc::ENOENT);
            return;
        };
        log::trace!("access({path})");
        match self.volume.access(&path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        let Some(parent_path) = self.path_for(parent).map(|p| p.to_string_lossy().into_owned())
        else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = join(&parent_path, name);
        log::debug!("mknod({path}, mode={mode:#o})");
        match self.volume.mknod(&path, mode) {
            Ok(attr) => {
                let ino = self.ino_for(&path);
                reply.entry(&TTL, &self.attr(ino, attr), 0);
            }
            Err(e) => {
                log::warn!("mknod({path}) -> {e}");
                reply.error(errno(&e));
            }
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(parent_path) = self.path_for(parent).map(|p| p.to_string_lossy().into_owned())
        else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = join(&parent_path, name);
        log::debug!("create({path}, mode={mode:#o})");
        match self.volume.mknod(&path, mode & !umask & 0o7777) {
            Ok(attr) => {
                let ino = self.ino_for(&path);
                reply.created(&TTL, &self.attr(ino, attr), 0, 0, 0);
            }
            Err(e) => {
                log::warn!("create({path}) -> {e}");
                reply.error(errno(&e));
            }
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(parent_path) = self.path_for(parent).map(|p| p.to_string_lossy().into_owned())
        else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = join(&parent_path, name);
        log::debug!("mkdir({path}, mode={mode:#o})");
        match self.volume.mkdir(&path, mode) {
            Ok(attr) => {
                let ino = self.ino_for(&path);
                reply.entry(&TTL, &self.attr(ino, attr), 0);
            }
            Err(e) => {
                log::warn!("mkdir({path}) -> {e}");
                reply.error(errno(&e));
            }
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(parent_path) = self.path_for(parent).map(|p| p.to_string_lossy().into_owned())
        else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = join(&parent_path, name);
        log::debug!("unlink({path})");
        match self.volume.unlink(&path) {
            Ok(()) => {
                self.forget_path(&path);
                reply.ok();
            }
            Err(e) => {
                log::warn!("unlink({path}) -> {e}");
                reply.error(errno(&e));
            }
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(parent_path) = self.path_for(parent).map(|p| p.to_string_lossy().into_owned())
        else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = join(&parent_path, name);
        log::debug!("rmdir({path})");
        match self.volume.rmdir(&path) {
            Ok(()) => {
                self.forget_path(&path);
                reply.ok();
            }
            Err(e) => {
                log::warn!("rmdir({path}) -> {e}");
                reply.error(errno(&e));
            }
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let (Some(src_parent), Some(dst_parent)) = (
            self.path_for(parent).map(|p| p.to_string_lossy().into_owned()),
            self.path_for(newparent).map(|p| p.to_string_lossy().into_owned()),
        ) else {
            reply.error(libc::ENOENT);
            return;
        };
        let src = join(&src_parent, name);
        let dst = join(&dst_parent, newname);
        log::debug!("rename({src} -> {dst})");
        match self.volume.rename(&src, &dst) {
            Ok(()) => {
                self.forget_path(&dst);
                self.rebase_path(&src, &dst);
                reply.ok();
            }
            Err(e) => {
                log::warn!("rename({src} -> {dst}) -> {e}");
                reply.error(errno(&e));
            }
        }
    }

    fn open(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn opendir(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(path) = self.path_for(ino).map(|p| p.to_string_lossy().into_owned()) else {
            reply.error(libc::ENOENT);
            return;
        };
        log::trace!("read({path}, off={offset}, size={size})");
        match self.volume.read(&path, size as u64, offset.max(0) as u64) {
            Ok(data) => reply.data(&data),
            Err(e) => {
                log::warn!("read({path}) -> {e}");
                reply.error(errno(&e));
            }
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.path_for(ino).map(|p| p.to_string_lossy().into_owned()) else {
            reply.error(libc::ENOENT);
            return;
        };
        log::trace!("write({path}, off={offset}, len={})", data.len());
        match self.volume.write(&path, data, offset.max(0) as u64) {
            Ok(written) => reply.written(written),
            Err(e) => {
                log::warn!("write({path}) -> {e}");
                reply.error(errno(&e));
            }
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path_for(ino).map(|p| p.to_string_lossy().into_owned()) else {
            reply.error(libc::ENOENT);
            return;
        };
        log::debug!("readdir({path})");
        let listing = match self.volume.readdir(&path) {
            Ok(l) => l,
            Err(e) => {
                log::warn!("readdir({path}) -> {e}");
                reply.error(errno(&e));
                return;
            }
        };
        let names: Vec<String> = listing.iter().map(str::to_owned).collect();
        for (i, name) in names.into_iter().enumerate().skip(offset as usize) {
            let entry_path = if name == "." {
                path.clone()
            } else {
                join(&path, OsStr::new(&name))
            };
            let kind = match self.volume.getattr(&entry_path) {
                Ok(attr) if attr.mode & imgfs_core::layout::MODE_DIR_BIT != 0 => FileType::Directory,
                _ => FileType::RegularFile,
            };
            let child_ino = if name == "." { ino } else { self.ino_for(&entry_path) };
            if reply.add(child_ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _newparent: u64,
        _newname: &OsStr,
        reply: ReplyEntry,
    ) {
        // No core counterpart: hard links across names are not supported.
        reply.error(libc::ENOSYS);
    }

    fn ioctl(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: u32,
        _cmd: u32,
        _in_data: &[u8],
        _out_size: u32,
        reply: fuser::ReplyIoctl,
    ) {
        reply.error(libc::ENOSYS);
    }
}
