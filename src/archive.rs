//! An opened archive: the reader, its index, and the limits used to resolve paths in it.

use std::{
    fs::File,
    io::{BufReader, Read, Seek, Write},
    path::Path,
};

use crate::{
    extract,
    index::{Entry, Index, RegularFile},
    resolve::Resolver,
    Limits, Result,
};

/// An archive with its index.
///
/// ```no_run
/// use tarwalk::Archive;
///
/// let mut archive = Archive::open("layer.tar").unwrap();
/// let file = archive.find("usr/bin/sh").unwrap();
/// println!("{} ({} bytes)", file.path, file.size);
///
/// archive.extract("etc/os-release", &mut std::io::stdout()).unwrap();
/// ```
#[derive(Debug)]
pub struct Archive<R> {
    reader: R,
    index: Index,
    limits: Limits,
}

impl Archive<BufReader<File>> {
    /// Opens and indexes the archive at `path`, with limits taken from the environment.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_limits(path, Limits::from_env()?)
    }

    /// Opens and indexes the archive at `path`, with the given limits.
    pub fn open_with_limits(path: impl AsRef<Path>, limits: Limits) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Self::with_limits(reader, limits)
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Indexes the archive read from `reader`, with default limits.
    pub fn new(reader: R) -> Result<Self> {
        Self::with_limits(reader, Limits::default())
    }

    pub fn with_limits(mut reader: R, limits: Limits) -> Result<Self> {
        let index = Index::build(&mut reader)?;
        Ok(Self {
            reader,
            index,
            limits,
        })
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Iterates over the indexed entries in archive order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.index.entries()
    }

    /// Resolves `path` to a regular file.  See [`Resolver::resolve()`].
    pub fn find(&self, path: &str) -> Result<&RegularFile> {
        Resolver::new(&self.index, &self.limits).resolve(path)
    }

    /// Returns the size of the file that `path` resolves to.
    pub fn length(&self, path: &str) -> Result<u64> {
        self.find(path).map(extract::length)
    }

    /// Writes the content of the file that `path` resolves to, returning its size.
    pub fn extract<W: Write + ?Sized>(&mut self, path: &str, out: &mut W) -> Result<u64> {
        let file = Resolver::new(&self.index, &self.limits).resolve(path)?;
        extract::copy_file(&mut self.reader, file, out)
    }

    /// Reads the content of the file that `path` resolves to.
    pub fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        let file = Resolver::new(&self.index, &self.limits).resolve(path)?;
        extract::read_file(&mut self.reader, file)
    }
}
