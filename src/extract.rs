//! Copying file content out of the archive.

use std::io::{self, Read, Seek, SeekFrom, Write};

use log::debug;

use crate::{index::RegularFile, Error, Result};

/// Returns the size of the file content in bytes.
#[must_use]
pub fn length(file: &RegularFile) -> u64 {
    file.size
}

/// Writes the content of `file` to `out`.
///
/// The archive is checked for the full content range before anything is written, so a truncated
/// archive produces no output at all.
///
/// # Return value
///
/// On success, the number of bytes written, which is always `file.size`.
///
/// On failure, [`Error::Truncated`] if the archive ends before the content does, or an
/// [`Error::Io`].
pub fn copy_file<R, W>(archive: &mut R, file: &RegularFile, out: &mut W) -> Result<u64>
where
    R: Read + Seek,
    W: Write + ?Sized,
{
    let archive_len = archive.seek(SeekFrom::End(0))?;
    let available = archive_len.saturating_sub(file.offset);
    if available < file.size {
        return Err(truncated(file, available));
    }

    debug!(
        "copying {} bytes of {:?} from offset {}",
        file.size, file.path, file.offset
    );
    archive.seek(SeekFrom::Start(file.offset))?;
    let copied = io::copy(&mut archive.take(file.size), out)?;
    if copied < file.size {
        // the archive shrank underneath us
        return Err(truncated(file, copied));
    }

    Ok(copied)
}

/// Reads the content of `file` into memory.
///
/// See [`copy_file()`].
pub fn read_file<R: Read + Seek>(archive: &mut R, file: &RegularFile) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    copy_file(archive, file, &mut content)?;
    Ok(content)
}

fn truncated(file: &RegularFile, available: u64) -> Error {
    Error::Truncated {
        path: file.path.clone(),
        offset: file.offset,
        size: file.size,
        available,
    }
}
