//! Path resolution inside ustar archives.
//!
//! An archive is read once into an [`index::Index`] that maps every normalized path to the file,
//! directory or symlink stored there.  Request paths are then resolved against the index,
//! following symlinks and `.`/`..` components, to the regular file they refer to, and the
//! content of that file can be copied out of the archive.
//!
//! ```no_run
//! use tarwalk::Archive;
//!
//! let mut archive = Archive::open("rootfs.tar")?;
//! let length = archive.length("bin/sh")?;
//! let content = archive.read("etc/hostname")?;
//! # Ok::<(), tarwalk::Error>(())
//! ```

pub mod archive;
pub mod error;
pub mod extract;
pub mod header;
pub mod index;
pub mod limits;
pub mod resolve;


pub use archive::Archive;
pub use error::{Error, Result};
pub use limits::Limits;
