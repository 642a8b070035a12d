//! Core storage engine for a single-image, user-space mounted filesystem:
//! block and inode bitmaps, the direct/indirect extent map, packed directory
//! entries, whole-path resolution, and the `Volume` facade that ties them
//! together. Pure functions of the mapped image and their arguments — no
//! FUSE types, no logging, no process state (see `volume` module docs).

pub mod alloc;
pub mod bitmap;
pub mod directory;
pub mod error;
pub mod image;
pub mod inode;
pub mod layout;
pub mod path;
pub mod slist;
pub mod volume;

pub use error::{Error, Result};
pub use volume::{Attr, Volume};
