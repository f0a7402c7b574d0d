//! Resolution of request paths against an [`Index`].
//!
//! Paths are walked one component at a time from the archive root.  `.` and empty components
//! (from repeated or leading `/`) are ignored, `..` moves to the parent directory and is an error
//! at the root, and symlinks are expanded as they are met: relative targets start at the
//! directory containing the link, absolute targets at the archive root.
//!
//! Expansion is physical.  When a link points at a directory, the remaining components of the
//! path are walked from the directory the link resolved to, so `link/..` is the parent of the
//! link's target and not the directory containing the link.
//!
//! Each call to [`Resolver::resolve()`] counts the symlinks it expands and fails once the count
//! reaches [`Limits::max_indirections`].  A link that is met a second time within the same call
//! is reported as a loop straight away, even if its first expansion has already finished.

use std::collections::HashSet;

use log::trace;

use crate::{
    index::{Entry, Index, RegularFile},
    Error, Limits, Result,
};

/// Where a walk ended up.
#[derive(Debug)]
enum Location<'a> {
    /// A directory, given by its components from the archive root.
    Directory(Vec<&'a str>),
    File(&'a RegularFile),
}

/// State for one top-level resolution.
#[derive(Debug, Default)]
struct Walk<'a> {
    /// Symlinks expanded so far.
    visited: HashSet<&'a str>,
    /// Number of symlinks expanded so far.
    depth: usize,
}

/// Resolves request paths against an index.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    index: &'a Index,
    limits: &'a Limits,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a Index, limits: &'a Limits) -> Self {
        Self { index, limits }
    }

    /// Resolves `path` to the regular file it ultimately refers to.
    ///
    /// # Return value
    ///
    /// On success, returns the file entry; its `path` is the canonical path of the file.
    ///
    /// On failure, returns one of [`Error::NotFound`], [`Error::NotADirectory`],
    /// [`Error::IsADirectory`] (the path names a directory), [`Error::SymlinkLoop`],
    /// [`Error::TooManyLinks`] or [`Error::EscapesRoot`].
    pub fn resolve(&self, path: &str) -> Result<&'a RegularFile> {
        let request = path.trim_end_matches('/');
        let request = request.strip_prefix("./").unwrap_or(request);

        match self.walk(request, Vec::new(), &mut Walk::default())? {
            Location::File(file) => Ok(file),
            Location::Directory(components) => Err(Error::IsADirectory(join(&components))),
        }
    }

    /// Walks `path` starting in the directory `dir`.
    fn walk(&self, path: &str, mut dir: Vec<&'a str>, state: &mut Walk<'a>) -> Result<Location<'a>> {
        let tokens: Vec<&str> = path.split('/').collect();

        for (i, token) in tokens.iter().enumerate() {
            let last = i + 1 == tokens.len();

            match *token {
                "" | "." => {}
                ".." => {
                    if dir.pop().is_none() {
                        return Err(Error::EscapesRoot(path.to_owned()));
                    }
                }
                name => {
                    let candidate = if dir.is_empty() {
                        name.to_owned()
                    } else {
                        format!("{}/{name}", join(&dir))
                    };

                    match self.index.get(&candidate) {
                        None => return Err(Error::NotFound(candidate)),
                        Some(Entry::Directory { path }) => {
                            dir = path.split('/').collect();
                        }
                        Some(Entry::File(file)) if last => return Ok(Location::File(file)),
                        Some(Entry::File(file)) => {
                            return Err(Error::NotADirectory(file.path.clone()))
                        }
                        Some(Entry::Symlink { path, target }) => {
                            match self.follow(path, target, dir, state)? {
                                Location::Directory(target_dir) => dir = target_dir,
                                Location::File(file) if last => return Ok(Location::File(file)),
                                Location::File(file) => {
                                    return Err(Error::NotADirectory(file.path.clone()))
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(Location::Directory(dir))
    }

    /// Expands the symlink at `path`, which lives in the directory `dir`.
    fn follow(
        &self,
        path: &'a str,
        target: &'a str,
        dir: Vec<&'a str>,
        state: &mut Walk<'a>,
    ) -> Result<Location<'a>> {
        if !state.visited.insert(path) {
            return Err(Error::SymlinkLoop(path.to_owned()));
        }
        if state.depth >= self.limits.max_indirections {
            return Err(Error::TooManyLinks {
                path: path.to_owned(),
                limit: self.limits.max_indirections,
            });
        }
        if target.is_empty() {
            return Err(Error::NotFound(path.to_owned()));
        }

        state.depth += 1;
        trace!("following {path:?} -> {target:?} (depth {})", state.depth);

        let start = if target.starts_with('/') { Vec::new() } else { dir };

        self.walk(target, start, state)
    }
}

fn join(components: &[&str]) -> String {
    components.join("/")
}
