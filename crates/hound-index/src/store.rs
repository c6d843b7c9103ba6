use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;

use hound_core::{Error, Result};

use crate::file_table::{FileId, FileIndexEntry, FileRecord, FILE_INDEX_ENTRY_LEN};
use crate::file_table as ft;
use crate::manifest::Manifest;
use crate::trigram::Trigram;
use crate::varint::DeltaDecoder;

const TRIGRAM_ENTRY_LEN: usize = 12;

/// The query-side view of one committed index generation (§4.1). `open`
/// validates the on-disk layout up front so every later lookup can assume
/// well-formed data; any violation is reported as `CorruptIndex` rather
/// than panicking, since a corrupt generation must trigger a Searcher
/// rebuild, not a crash.
pub struct IndexReader {
    dir: PathBuf,
    manifest: Manifest,
    files: Vec<FileRecord>,
    trigrams_mmap: Mmap,
    postings_mmap: Mmap,
    content_mmap: Mmap,
    content_offsets: Vec<usize>,
    line_offsets: Mutex<HashMap<u32, std::sync::Arc<Vec<u32>>>>,
}

/// A view into one trigram's posting list. Iteration decodes varints
/// lazily; the list is never fully materialized unless the caller collects
/// it.
pub struct PostingList<'a> {
    bytes: &'a [u8],
}

impl<'a> PostingList<'a> {
    pub fn iter(&self) -> DeltaDecoder<'a> {
        DeltaDecoder::new(self.bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl IndexReader {
    pub fn open(dir: impl AsRef<Path>) -> Result<IndexReader> {
        let dir = dir.as_ref().to_path_buf();

        let manifest_bytes = std::fs::read(dir.join("manifest")).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::CorruptIndex("generation has no manifest (incomplete build)".into())
            } else {
                Error::Io(e)
            }
        })?;
        let manifest = Manifest::read(&manifest_bytes[..])?;

        let files_idx_bytes = std::fs::read(dir.join("files.idx"))?;
        if files_idx_bytes.len() != manifest.file_count as usize * FILE_INDEX_ENTRY_LEN {
            return Err(Error::CorruptIndex("files.idx size mismatch with manifest".into()));
        }
        let files_blob = std::fs::read(dir.join("files"))?;

        let mut files = Vec::with_capacity(manifest.file_count as usize);
        let mut content_offsets = Vec::with_capacity(manifest.file_count as usize);
        for i in 0..manifest.file_count as usize {
            let start = i * FILE_INDEX_ENTRY_LEN;
            let entry = FileIndexEntry::read(&files_idx_bytes[start..start + FILE_INDEX_ENTRY_LEN])
                .map_err(|_| Error::CorruptIndex("malformed files.idx entry".into()))?;
            let path = ft::read_path_entry(&files_blob, entry.files_offset)?;
            files.push(FileRecord {
                id: FileId(i as u32),
                path,
                size: entry.content_len,
                mtime: entry.mtime,
            });
            content_offsets.push(entry.content_offset as usize);
        }

        let trigrams_mmap = open_mmap(&dir.join("trigrams.idx"))?;
        if trigrams_mmap.len() != manifest.trigram_count as usize * TRIGRAM_ENTRY_LEN {
            return Err(Error::CorruptIndex("trigrams.idx size mismatch with manifest".into()));
        }
        validate_sorted_trigrams(&trigrams_mmap)?;

        let postings_mmap = open_mmap(&dir.join("postings"))?;
        let content_mmap = open_mmap(&dir.join("content"))?;

        validate_offsets_in_bounds(&trigrams_mmap, postings_mmap.len())?;
        validate_content_offsets(&files_idx_bytes, manifest.file_count, content_mmap.len())?;

        Ok(IndexReader {
            dir,
            manifest,
            files,
            trigrams_mmap,
            postings_mmap,
            content_mmap,
            content_offsets,
            line_offsets: Mutex::new(HashMap::new()),
        })
    }

    pub fn generation(&self) -> u32 {
        self.manifest.generation
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    /// Binary search over `trigrams.idx` for the given trigram (§4.1).
    pub fn lookup(&self, trigram: Trigram) -> PostingList<'_> {
        let needle = trigram.0 & Trigram::MASK;
        let count = self.manifest.trigram_count as usize;
        let mut lo = 0usize;
        let mut hi = count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry_trigram = entry_trigram_at(&self.trigrams_mmap, mid);
            if entry_trigram < needle {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo < count && entry_trigram_at(&self.trigrams_mmap, lo) == needle {
            let (offset, len) = entry_posting_span(&self.trigrams_mmap, lo);
            PostingList {
                bytes: &self.postings_mmap[offset..offset + len],
            }
        } else {
            PostingList { bytes: &[] }
        }
    }

    pub fn read_file(&self, file_id: FileId) -> Result<&[u8]> {
        let record = self
            .files
            .get(file_id.0 as usize)
            .ok_or(Error::UnknownFileId(file_id.0))?;
        let start = self.content_offset(file_id.0)?;
        let end = start + record.size as usize;
        self.content_mmap
            .get(start..end)
            .ok_or_else(|| Error::CorruptIndex("content offset out of bounds".into()))
    }

    fn content_offset(&self, file_id: u32) -> Result<usize> {
        self.content_offsets
            .get(file_id as usize)
            .copied()
            .ok_or(Error::UnknownFileId(file_id))
    }

    /// Byte offsets of line starts within `read_file(file_id)`, computed
    /// on first use and cached for the lifetime of this reader (§4.5).
    pub fn line_offsets(&self, file_id: FileId) -> Result<std::sync::Arc<Vec<u32>>> {
        if let Some(cached) = self.line_offsets.lock().unwrap().get(&file_id.0) {
            return Ok(cached.clone());
        }
        let bytes = self.read_file(file_id)?;
        let mut offsets = vec![0u32];
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'\n' && i + 1 < bytes.len() {
                offsets.push((i + 1) as u32);
            }
        }
        let offsets = std::sync::Arc::new(offsets);
        self.line_offsets
            .lock()
            .unwrap()
            .insert(file_id.0, offsets.clone());
        Ok(offsets)
    }
}

fn open_mmap(path: &Path) -> Result<Mmap> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::CorruptIndex(format!("missing {}", path.display()))
        } else {
            Error::Io(e)
        }
    })?;
    // Safety: the generation directory is immutable once its manifest is
    // written (§3); nothing else in this process mutates these files.
    unsafe { Mmap::map(&file) }.map_err(Error::Io)
}

fn entry_trigram_at(mmap: &[u8], index: usize) -> u32 {
    let start = index * TRIGRAM_ENTRY_LEN;
    LittleEndian::read_u32(&mmap[start..start + 4])
}

fn entry_posting_span(mmap: &[u8], index: usize) -> (usize, usize) {
    let start = index * TRIGRAM_ENTRY_LEN;
    let offset = LittleEndian::read_u32(&mmap[start + 4..start + 8]) as usize;
    let len = LittleEndian::read_u32(&mmap[start + 8..start + 12]) as usize;
    (offset, len)
}

fn validate_sorted_trigrams(mmap: &[u8]) -> Result<()> {
    let count = mmap.len() / TRIGRAM_ENTRY_LEN;
    let mut prev: Option<u32> = None;
    for i in 0..count {
        let t = entry_trigram_at(mmap, i);
        if let Some(p) = prev {
            if t <= p {
                return Err(Error::CorruptIndex("trigrams.idx is not strictly ascending".into()));
            }
        }
        prev = Some(t);
    }
    Ok(())
}

fn validate_offsets_in_bounds(trigrams_mmap: &[u8], postings_len: usize) -> Result<()> {
    let count = trigrams_mmap.len() / TRIGRAM_ENTRY_LEN;
    for i in 0..count {
        let (offset, len) = entry_posting_span(trigrams_mmap, i);
        if offset.checked_add(len).map(|end| end > postings_len).unwrap_or(true) {
            return Err(Error::CorruptIndex("posting list out of bounds".into()));
        }
    }
    Ok(())
}

fn validate_content_offsets(files_idx_bytes: &[u8], file_count: u32, content_len: usize) -> Result<()> {
    for i in 0..file_count as usize {
        let start = i * FILE_INDEX_ENTRY_LEN;
        let entry = FileIndexEntry::read(&files_idx_bytes[start..start + FILE_INDEX_ENTRY_LEN])
            .map_err(|_| Error::CorruptIndex("malformed files.idx entry".into()))?;
        let end = entry
            .content_offset
            .checked_add(entry.content_len)
            .ok_or_else(|| Error::CorruptIndex("content span overflow".into()))?;
        if end as usize > content_len {
            return Err(Error::CorruptIndex("content offset out of bounds".into()));
        }
    }
    Ok(())
}
