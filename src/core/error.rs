//! The core's error taxonomy (see spec §7) and its mapping onto host errno values.

use std::io;

/// Everything a core operation can fail with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A path component, or a directory entry being deleted, does not exist.
    #[error("no such entry")]
    NoSuchEntry,
    /// `directory_put` found a name already present in the directory.
    #[error("already exists")]
    AlreadyExists,
    /// A path segment or entry name is at least `DIR_NAME_LENGTH` bytes long.
    #[error("name too long")]
    NameTooLong,
    /// The block bitmap, the inode bitmap, or a directory's single block is full.
    #[error("no space left on device")]
    NoSpace,
    /// An operation expected a directory-type inode and found something else.
    #[error("not a directory")]
    NotADirectory,
    /// `link`, `chmod`, `utimens`, `ioctl`: no core counterpart.
    #[error("operation not supported")]
    NotSupported,
    /// Failure opening, extending, or mapping the backing image file.
    #[error("image I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Maps this error onto the `errno` value the FUSE adapter should reply with.
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            Error::NoSuchEntry => libc::ENOENT,
            Error::AlreadyExists => libc::EEXIST,
            Error::NameTooLong => libc::ENAMETOOLONG,
            Error::NoSpace => libc::ENOSPC,
            Error::NotADirectory => libc::ENOTDIR,
            Error::NotSupported => libc::ENOSYS,
            Error::Io(_) => libc::EIO,
        }
    }
}
