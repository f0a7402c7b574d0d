use std::{
    fs::File,
    io::{stdout, BufReader, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tarwalk::{index::Entry, Archive, Limits};

/// tarwalk
#[derive(Debug, Parser)]
#[clap(name = "tarwalk", version)]
pub struct App {
    /// Maximum number of symlinks to follow while resolving a path (overrides
    /// $TARWALK_MAX_INDIRECTIONS)
    #[clap(long)]
    max_indirections: Option<usize>,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Prints the canonical path of the file that a path resolves to
    Find {
        /// the archive to read
        archive: PathBuf,
        /// the path inside of the archive
        path: String,
    },
    /// Writes the content of the file that a path resolves to to stdout
    Extract {
        /// the archive to read
        archive: PathBuf,
        /// the path inside of the archive
        path: String,
    },
    /// Prints the size in bytes of the file that a path resolves to
    Length {
        /// the archive to read
        archive: PathBuf,
        /// the path inside of the archive
        path: String,
    },
    /// Lists the entries of the archive, in archive order
    List {
        /// the archive to read
        archive: PathBuf,
    },
}

fn open(archive: &Path, max_indirections: Option<usize>) -> Result<Archive<BufReader<File>>> {
    let mut limits = Limits::from_env()?;
    if let Some(max) = max_indirections {
        limits.max_indirections = max;
    }

    Archive::open_with_limits(archive, limits)
        .with_context(|| format!("Opening archive {}", archive.display()))
}

fn main() -> Result<()> {
    env_logger::init();

    // usage errors exit with 1 like every other failure, not clap's 2
    let args = App::try_parse().unwrap_or_else(|err| {
        let _ = err.print();
        std::process::exit(if err.use_stderr() { 1 } else { 0 })
    });

    match args.cmd {
        Command::Find { archive, path } => {
            let archive = open(&archive, args.max_indirections)?;
            let file = archive.find(&path)?;
            println!("{}", file.path);
        }
        Command::Extract { archive, path } => {
            let mut archive = open(&archive, args.max_indirections)?;
            let mut out = stdout().lock();
            archive.extract(&path, &mut out)?;
            out.flush()?;
        }
        Command::Length { archive, path } => {
            let archive = open(&archive, args.max_indirections)?;
            println!("{}", archive.length(&path)?);
        }
        Command::List { archive } => {
            let archive = open(&archive, args.max_indirections)?;
            let mut out = stdout().lock();
            for entry in archive.entries() {
                match entry {
                    Entry::File(file) => writeln!(out, "file {} {}", file.path, file.size)?,
                    Entry::Directory { path } => writeln!(out, "dir {path}")?,
                    Entry::Symlink { path, target } => {
                        writeln!(out, "symlink {path} -> {target}")?
                    }
                }
            }
            out.flush()?;
        }
    }

    Ok(())
}
