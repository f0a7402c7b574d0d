//! Decoding of individual ustar header blocks.
//!
//! Only the fields needed to rebuild the archive namespace are decoded.  The layout of a header
//! block (all offsets relative to the start of the block) is:
//!
//! | Offset | Size | Field     | Description                              |
//! |--------|------|-----------|------------------------------------------|
//! | 0      | 100  | name      | File path (NUL-terminated if < 100)      |
//! | 124    | 12   | size      | File size in octal ASCII                 |
//! | 156    | 1    | typeflag  | Entry type (see [`EntryType`])           |
//! | 157    | 100  | linkname  | Link target for symbolic links           |
//! | 257    | 7    | magic     | `"ustar  "` (GNU magic and version)      |
//!
//! Content follows the header directly and is padded to the next [`BLOCK_SIZE`] boundary.

use std::{
    fmt,
    io::{ErrorKind, Read, Seek, SeekFrom},
    str::Utf8Error,
};

use log::trace;
use thiserror::Error;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

/// Size of a header block, and the alignment of entry content.
pub const BLOCK_SIZE: u64 = 512;

/// The seven bytes at offset 257 that mark a block as a ustar header.
pub const USTAR_MAGIC: &[u8; 7] = b"ustar  ";

/// Errors raised while decoding the fields of a header block.
#[derive(Debug, Error)]
pub enum HeaderError {
    /// A numeric field contains something other than octal digits.
    #[error("invalid octal field: {0:?}")]
    InvalidOctal(Vec<u8>),

    /// A string field is not valid UTF-8.
    #[error("invalid UTF-8 in {field} field: {source}")]
    InvalidUtf8 {
        field: &'static str,
        #[source]
        source: Utf8Error,
    },

    /// The declared size cannot be laid out in a 64-bit archive.
    #[error("invalid entry size {size} at offset {offset}")]
    InvalidSize { offset: u64, size: u64 },
}

/// The raw 512-byte header block, with the fields laid out as GNU tar writes them.
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
#[allow(dead_code)] // mode, ownership and timestamps are never consulted
struct HeaderBlock {
    name: [u8; 100],
    mode: [u8; 8],
    uid: [u8; 8],
    gid: [u8; 8],
    size: [u8; 12],
    mtime: [u8; 12],
    checksum: [u8; 8],
    typeflag: u8,
    linkname: [u8; 100],
    magic: [u8; 6],
    version: [u8; 2],
    pad: [u8; 247],
}

impl HeaderBlock {
    fn has_magic(&self) -> bool {
        self.magic[..] == USTAR_MAGIC[..6] && self.version[0] == USTAR_MAGIC[6]
    }
}

/// The kind of object described by a header, taken from its typeflag byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Regular file (`'0'`, or NUL for old archives).
    Regular,
    /// Symbolic link (`'2'`).
    Symlink,
    /// Directory (`'5'`).
    Directory,
    /// Anything else; not supported by the indexer.
    Other(u8),
}

impl EntryType {
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'0' | b'\0' => EntryType::Regular,
            b'2' => EntryType::Symlink,
            b'5' => EntryType::Directory,
            other => EntryType::Other(other),
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Regular => write!(f, "regular file"),
            EntryType::Symlink => write!(f, "symbolic link"),
            EntryType::Directory => write!(f, "directory"),
            EntryType::Other(byte) => write!(f, "typeflag {:?}", char::from(*byte)),
        }
    }
}

/// A decoded header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Byte position of the header block in the archive.
    pub offset: u64,
    /// The stored name, not yet normalized.
    pub name: String,
    pub entry_type: EntryType,
    /// The stored link target; only meaningful for symlinks.
    pub link_name: String,
    /// Length of the entry content in bytes.
    pub size: u64,
    /// Byte position of the header following this entry.
    pub next_offset: u64,
}

impl Header {
    /// Byte position of the entry content, directly after the header block.
    #[must_use]
    pub fn content_offset(&self) -> u64 {
        self.offset + BLOCK_SIZE
    }
}

/// Reads and decodes the header block at `offset`.
///
/// # Return value
///
///  - `Ok(Some(header))` if a ustar header was found
///  - `Ok(None)` if the archive is finished: the block at `offset` doesn't carry the ustar magic
///    (this includes the zero blocks that terminate an archive) or it couldn't be read in full
///  - `Err(..)` for I/O errors and for headers with malformed fields
pub fn read_header<R: Read + Seek>(archive: &mut R, offset: u64) -> crate::Result<Option<Header>> {
    archive.seek(SeekFrom::Start(offset))?;

    let mut block = HeaderBlock::new_zeroed();
    let filled = read_block(archive, block.as_mut_bytes())?;
    if filled < block.as_bytes().len() {
        trace!("short header block at {offset} ({filled} bytes), archive finished");
        return Ok(None);
    }

    if !block.has_magic() {
        trace!("no ustar magic at {offset}, archive finished");
        return Ok(None);
    }

    let size = parse_octal(&block.size)?;
    let next_offset = size
        .checked_next_multiple_of(BLOCK_SIZE)
        .and_then(|padded| padded.checked_add(BLOCK_SIZE))
        .and_then(|span| span.checked_add(offset))
        .ok_or(HeaderError::InvalidSize { offset, size })?;

    let name = decode_str("name", &block.name)?.trim_end_matches(' ');
    let link_name = decode_str("linkname", &block.linkname)?;

    Ok(Some(Header {
        offset,
        name: name.to_owned(),
        entry_type: EntryType::from_byte(block.typeflag),
        link_name: link_name.to_owned(),
        size,
        next_offset,
    }))
}

/// Fills as much of `buf` as the reader allows, returning the number of bytes read.  Only a
/// return value equal to `buf.len()` means the block is complete.
fn read_block(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn decode_str<'a>(field: &'static str, bytes: &'a [u8]) -> Result<&'a str, HeaderError> {
    std::str::from_utf8(truncate_null(bytes))
        .map_err(|source| HeaderError::InvalidUtf8 { field, source })
}

/// Parses an octal ASCII field.
///
/// Leading spaces are skipped and the digits end at the first space or NUL, so both
/// `"00000000005\0"` and `"     5 "` decode to 5.  An empty field is zero.
pub fn parse_octal(bytes: &[u8]) -> Result<u64, HeaderError> {
    let start = bytes.iter().position(|&b| b != b' ').unwrap_or(bytes.len());
    let end = bytes[start..]
        .iter()
        .position(|&b| b == b' ' || b == b'\0')
        .map_or(bytes.len(), |i| start + i);

    let mut value: u64 = 0;
    for &byte in &bytes[start..end] {
        if !(b'0'..=b'7').contains(&byte) {
            return Err(HeaderError::InvalidOctal(bytes.to_vec()));
        }
        value = value
            .checked_mul(8)
            .and_then(|v| v.checked_add(u64::from(byte - b'0')))
            .ok_or_else(|| HeaderError::InvalidOctal(bytes.to_vec()))?;
    }

    Ok(value)
}

/// Truncates a fixed-size field at its first NUL byte.
#[must_use]
pub fn truncate_null(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(pos) => &bytes[..pos],
        None => bytes,
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, Read, Seek, SeekFrom};

    use similar_asserts::assert_eq;

    use super::*;
    use crate::{test::TestArchive, Error};

    #[test]
    fn test_block_layout() {
        assert_eq!(std::mem::size_of::<HeaderBlock>(), BLOCK_SIZE as usize);
        assert_eq!(std::mem::offset_of!(HeaderBlock, size), 124);
        assert_eq!(std::mem::offset_of!(HeaderBlock, typeflag), 156);
        assert_eq!(std::mem::offset_of!(HeaderBlock, linkname), 157);
        assert_eq!(std::mem::offset_of!(HeaderBlock, magic), 257);
    }

    #[test]
    fn test_parse_octal() {
        assert_eq!(parse_octal(b"00000000005\0").unwrap(), 5);
        assert_eq!(parse_octal(b"     123 ").unwrap(), 0o123);
        assert_eq!(parse_octal(b"0000644\0").unwrap(), 0o644);
        assert_eq!(parse_octal(b"\0\0\0\0").unwrap(), 0);
        assert_eq!(parse_octal(b"").unwrap(), 0);
        assert!(matches!(
            parse_octal(b"00000000008\0"),
            Err(HeaderError::InvalidOctal(_))
        ));
        assert!(matches!(
            parse_octal(b"12x4"),
            Err(HeaderError::InvalidOctal(_))
        ));
        // 23 octal digits overflow a u64
        assert!(matches!(
            parse_octal(b"77777777777777777777777"),
            Err(HeaderError::InvalidOctal(_))
        ));
    }

    #[test]
    fn test_truncate_null() {
        assert_eq!(truncate_null(b"hello\0world"), b"hello");
        assert_eq!(truncate_null(b"no null here"), b"no null here");
        assert_eq!(truncate_null(b"\0empty"), b"");
    }

    #[test]
    fn test_read_file_header() {
        let data = TestArchive::new().file("dir/hello.txt", b"hello").finish();
        let header = read_header(&mut Cursor::new(&data), 0).unwrap().unwrap();

        assert_eq!(header.offset, 0);
        assert_eq!(header.name, "dir/hello.txt");
        assert_eq!(header.entry_type, EntryType::Regular);
        assert_eq!(header.size, 5);
        assert_eq!(header.content_offset(), 512);
        assert_eq!(header.next_offset, 1024);
    }

    #[test]
    fn test_next_offset_rounding() {
        let data = TestArchive::new()
            .file("empty", b"")
            .file("block", &[b'x'; 512])
            .file("spill", &[b'y'; 513])
            .file("last", b"z")
            .finish();
        let mut cursor = Cursor::new(&data);

        let empty = read_header(&mut cursor, 0).unwrap().unwrap();
        assert_eq!(empty.next_offset, 512);
        let block = read_header(&mut cursor, empty.next_offset).unwrap().unwrap();
        assert_eq!(block.next_offset, 512 + 1024);
        let spill = read_header(&mut cursor, block.next_offset).unwrap().unwrap();
        assert_eq!(spill.next_offset, 1536 + 512 + 1024);
        let last = read_header(&mut cursor, spill.next_offset).unwrap().unwrap();
        assert_eq!(last.name, "last");
    }

    #[test]
    fn test_read_symlink_header() {
        let data = TestArchive::new().symlink("a/link", "../b/target").finish();
        let header = read_header(&mut Cursor::new(&data), 0).unwrap().unwrap();

        assert_eq!(header.entry_type, EntryType::Symlink);
        assert_eq!(header.link_name, "../b/target");
        assert_eq!(header.size, 0);
        assert_eq!(header.next_offset, 512);
    }

    #[test]
    fn test_entry_types() {
        assert_eq!(EntryType::from_byte(b'0'), EntryType::Regular);
        assert_eq!(EntryType::from_byte(b'\0'), EntryType::Regular);
        assert_eq!(EntryType::from_byte(b'2'), EntryType::Symlink);
        assert_eq!(EntryType::from_byte(b'5'), EntryType::Directory);
        assert_eq!(EntryType::from_byte(b'1'), EntryType::Other(b'1'));
        assert_eq!(EntryType::Other(b'L').to_string(), "typeflag 'L'");
    }

    #[test]
    fn test_finished_conditions() {
        let data = TestArchive::new().file("f", b"data").finish();

        // the two zero blocks at the end
        assert!(read_header(&mut Cursor::new(&data), 1024).unwrap().is_none());
        // past the end
        assert!(read_header(&mut Cursor::new(&data), 1 << 20)
            .unwrap()
            .is_none());
        // a block that is cut short
        assert!(read_header(&mut Cursor::new(&data[..300]), 0)
            .unwrap()
            .is_none());
        // POSIX magic is not accepted
        let mut posix = data.clone();
        posix[257..265].copy_from_slice(b"ustar\x0000");
        assert!(read_header(&mut Cursor::new(&posix), 0).unwrap().is_none());
    }

    #[test]
    fn test_trailing_spaces_in_name() {
        let data = TestArchive::new().raw(b"padded  ", b'0', "", b"").finish();
        let header = read_header(&mut Cursor::new(&data), 0).unwrap().unwrap();
        assert_eq!(header.name, "padded");
    }

    #[test]
    fn test_malformed_size() {
        let mut data = TestArchive::new().file("f", b"data").finish();
        data[124..136].copy_from_slice(b"0000000009x\0");

        match read_header(&mut Cursor::new(&data), 0) {
            Err(Error::Header(HeaderError::InvalidOctal(field))) => {
                assert_eq!(field, b"0000000009x\0".to_vec())
            }
            res => panic!("Expected InvalidOctal, got {res:?}"),
        }
    }

    #[test]
    fn test_invalid_utf8_name() {
        let data = TestArchive::new().raw(b"bad\xff", b'0', "", b"").finish();

        match read_header(&mut Cursor::new(&data), 0) {
            Err(Error::Header(HeaderError::InvalidUtf8 { field, .. })) => {
                assert_eq!(field, "name")
            }
            res => panic!("Expected InvalidUtf8, got {res:?}"),
        }
    }

    /// Presents `data` as if it were stored at position `base` of a much larger file.
    struct Shifted {
        data: Cursor<Vec<u8>>,
        base: u64,
    }

    impl Read for Shifted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.data.read(buf)
        }
    }

    impl Seek for Shifted {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            match pos {
                SeekFrom::Start(n) if n >= self.base => {
                    self.data.set_position(n - self.base);
                    Ok(n)
                }
                _ => Err(io::ErrorKind::Unsupported.into()),
            }
        }
    }

    #[test]
    fn test_next_offset_overflow() {
        let offset = u64::MAX - 511;
        let mut archive = Shifted {
            data: Cursor::new(TestArchive::new().file("f", b"data").finish()),
            base: offset,
        };

        match read_header(&mut archive, offset) {
            Err(Error::Header(HeaderError::InvalidSize { offset: at, size })) => {
                assert_eq!(at, offset);
                assert_eq!(size, 4);
            }
            res => panic!("Expected InvalidSize, got {res:?}"),
        }
    }
}
