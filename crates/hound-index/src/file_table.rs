use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use hound_core::{Error, Result};

/// A monotonically assigned id local to one index generation (§3). Never
/// reused across generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u32);

/// One file's metadata as recorded in a committed generation (§3).
/// `line_offsets` is not part of the on-disk table; it is computed lazily
/// from raw content and cached per reader (§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: FileId,
    pub path: String,
    pub size: u64,
    pub mtime: u64,
}

/// One `files.idx` entry (§4.1, extended per §10.7): where the path lives
/// in `files`, and where the packed content lives in `content`.
#[derive(Debug, Clone, Copy)]
pub struct FileIndexEntry {
    pub files_offset: u64,
    pub content_offset: u64,
    pub content_len: u64,
    pub mtime: u64,
}

pub const FILE_INDEX_ENTRY_LEN: usize = 32;

impl FileIndexEntry {
    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.files_offset)?;
        w.write_u64::<LittleEndian>(self.content_offset)?;
        w.write_u64::<LittleEndian>(self.content_len)?;
        w.write_u64::<LittleEndian>(self.mtime)?;
        Ok(())
    }

    pub fn read<R: Read>(mut r: R) -> io::Result<FileIndexEntry> {
        Ok(FileIndexEntry {
            files_offset: r.read_u64::<LittleEndian>()?,
            content_offset: r.read_u64::<LittleEndian>()?,
            content_len: r.read_u64::<LittleEndian>()?,
            mtime: r.read_u64::<LittleEndian>()?,
        })
    }
}

/// Writes one `files` table entry: a u32 length prefix, the UTF-8 path
/// bytes, then zero padding to the next 8-byte boundary (§4.1). Returns the
/// entry's starting offset.
pub fn write_path_entry<W: Write>(mut w: W, base_offset: u64, path: &str) -> io::Result<u64> {
    let bytes = path.as_bytes();
    w.write_u32::<LittleEndian>(bytes.len() as u32)?;
    w.write_all(bytes)?;
    let written = 4 + bytes.len();
    let padded = (written + 7) & !7;
    let pad = padded - written;
    if pad > 0 {
        w.write_all(&[0u8; 8][..pad])?;
    }
    let _ = base_offset;
    Ok(padded as u64)
}

/// Reads one path entry at `offset` within `files`.
pub fn read_path_entry(files: &[u8], offset: u64) -> Result<String> {
    let offset = offset as usize;
    if offset + 4 > files.len() {
        return Err(Error::CorruptIndex("files table: truncated length prefix".into()));
    }
    let len = u32::from_le_bytes(files[offset..offset + 4].try_into().unwrap()) as usize;
    let start = offset + 4;
    let end = start
        .checked_add(len)
        .ok_or_else(|| Error::CorruptIndex("files table: length overflow".into()))?;
    if end > files.len() {
        return Err(Error::CorruptIndex("files table: path out of bounds".into()));
    }
    String::from_utf8(files[start..end].to_vec())
        .map_err(|_| Error::CorruptIndex("files table: non-UTF-8 path".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_entry_round_trips_and_pads_to_eight() {
        let mut buf = Vec::new();
        let written = write_path_entry(&mut buf, 0, "src/lib.rs").unwrap();
        assert_eq!(written % 8, 0);
        assert_eq!(buf.len(), written as usize);
        let path = read_path_entry(&buf, 0).unwrap();
        assert_eq!(path, "src/lib.rs");
    }

    #[test]
    fn index_entry_round_trips() {
        let entry = FileIndexEntry {
            files_offset: 16,
            content_offset: 4096,
            content_len: 128,
            mtime: 1_700_000_000,
        };
        let mut buf = Vec::new();
        entry.write(&mut buf).unwrap();
        assert_eq!(buf.len(), FILE_INDEX_ENTRY_LEN);
        let parsed = FileIndexEntry::read(&buf[..]).unwrap();
        assert_eq!(parsed.files_offset, 16);
        assert_eq!(parsed.content_len, 128);
    }
}
