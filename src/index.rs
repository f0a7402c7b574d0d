//! The namespace of an archive, rebuilt from its flat list of headers.
//!
//! A ustar archive stores no directory tree, only a sequence of entries, and directory entries
//! are optional.  The [`Index`] maps each normalized path to the [`Entry`] stored at it and
//! synthesizes the ancestors of every directory that the archive does declare.  The parents of
//! files and symlinks are *not* synthesized: a file whose directory was never declared can only
//! be reached if it lives at the archive root.

use std::{
    borrow::Cow,
    collections::{hash_map, HashMap},
    io::{Read, Seek},
};

use log::{debug, trace};

use crate::{
    header::{read_header, EntryType},
    Error, Result,
};

/// A regular file stored in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularFile {
    /// The normalized path of the file.
    pub path: String,
    /// Byte position of the file content in the archive.
    pub offset: u64,
    /// Length of the file content in bytes.
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File(RegularFile),
    /// An explicit or synthesized directory.
    Directory {
        path: String,
    },
    /// A symbolic link; the target is stored as found in the archive, minus any trailing `/`.
    Symlink {
        path: String,
        target: String,
    },
}

impl Entry {
    /// The normalized path this entry is stored under.
    pub fn path(&self) -> &str {
        match self {
            Entry::File(file) => &file.path,
            Entry::Directory { path } | Entry::Symlink { path, .. } => path,
        }
    }
}

/// Normalizes a stored archive name into an index key.
///
/// Trailing `/` are removed, then a single leading `/`, then a leading `./`.  Runs of `/` inside
/// the name collapse to one, so no key contains an empty component.
///
/// ```
/// use tarwalk::index::normalize_path;
///
/// assert_eq!(normalize_path("./usr/bin/"), "usr/bin");
/// assert_eq!(normalize_path("/etc/passwd"), "etc/passwd");
/// assert_eq!(normalize_path("usr//lib"), "usr/lib");
/// ```
pub fn normalize_path(name: &str) -> Cow<'_, str> {
    let name = name.trim_end_matches('/');
    let name = name.strip_prefix('/').unwrap_or(name);
    let name = name.strip_prefix("./").unwrap_or(name);

    if name.contains("//") {
        let components: Vec<&str> = name.split('/').filter(|c| !c.is_empty()).collect();
        Cow::Owned(components.join("/"))
    } else {
        Cow::Borrowed(name)
    }
}

/// Mapping from normalized path to [`Entry`], in archive order.
///
/// The index is built once and is immutable afterwards.
#[derive(Debug, Default)]
pub struct Index {
    entries: Vec<Entry>,
    positions: HashMap<String, usize>,
}

impl Index {
    /// Reads every header of the archive, starting at offset 0, and indexes the entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotCompatible`] if the archive doesn't start with a ustar header,
    /// [`Error::UnsupportedEntryType`] for entries other than files, directories and symlinks,
    /// and any error from [`read_header`].
    pub fn build<R: Read + Seek>(archive: &mut R) -> Result<Self> {
        let mut index = Index::default();
        let mut offset = 0;
        let mut headers = 0usize;

        while let Some(header) = read_header(archive, offset)? {
            headers += 1;
            offset = header.next_offset;

            let normalized = normalize_path(&header.name);
            let path: &str = &normalized;
            let is_root = path.is_empty() || path == ".";

            match header.entry_type {
                typeflag @ EntryType::Other(_) => {
                    return Err(Error::UnsupportedEntryType {
                        path: path.to_owned(),
                        typeflag,
                    })
                }
                _ if is_root => trace!("skipping archive root entry {:?}", header.name),
                EntryType::Regular => index.insert(Entry::File(RegularFile {
                    path: path.to_owned(),
                    offset: header.content_offset(),
                    size: header.size,
                })),
                EntryType::Directory => index.insert_directory(path),
                EntryType::Symlink => {
                    let target = match header.link_name.trim_end_matches('/') {
                        "" if !header.link_name.is_empty() => "/",
                        trimmed => trimmed,
                    };
                    index.insert(Entry::Symlink {
                        path: path.to_owned(),
                        target: target.to_owned(),
                    });
                }
            }
        }

        if headers == 0 {
            return Err(Error::NotCompatible);
        }

        debug!(
            "indexed {} entries from {headers} headers",
            index.entries.len()
        );
        Ok(index)
    }

    /// Inserts an entry, replacing any previous entry at the same path.  A replaced entry keeps
    /// its original position in the archive order.
    fn insert(&mut self, entry: Entry) {
        match self.positions.entry(entry.path().to_owned()) {
            hash_map::Entry::Occupied(slot) => {
                trace!("{:?} replaces an earlier entry", entry.path());
                self.entries[*slot.get()] = entry;
            }
            hash_map::Entry::Vacant(slot) => {
                slot.insert(self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Inserts a directory along with any of its ancestors that aren't indexed yet.
    ///
    /// Ancestors never replace an existing entry.  The directory itself replaces a previous
    /// file or symlink at its path, but an existing directory is left in place.
    fn insert_directory(&mut self, path: &str) {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        for end in 1..components.len() {
            let ancestor = components[..end].join("/");
            if !self.positions.contains_key(&ancestor) {
                trace!("synthesizing directory {ancestor:?}");
                self.insert(Entry::Directory { path: ancestor });
            }
        }

        if !matches!(self.get(path), Some(Entry::Directory { .. })) {
            self.insert(Entry::Directory {
                path: path.to_owned(),
            });
        }
    }

    /// Looks up the entry stored at exactly the given normalized path.
    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.positions.get(path).map(|&pos| &self.entries[pos])
    }

    /// Iterates over all entries, in the order their paths first appeared in the archive.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
