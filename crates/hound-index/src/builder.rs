use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use hound_core::{Error, Result};

use crate::file_table::{self, FileId, FileIndexEntry, FILE_INDEX_ENTRY_LEN};
use crate::manifest::{Manifest, VERSION};
use crate::trigram::{self, Trigram};
use crate::varint;

/// Write-side of one index generation (§4.2). `begin` opens a staging
/// directory; `add_file` streams in accepted files; `finish` commits by
/// writing every table and, last, the `manifest` that marks the generation
/// as complete.
pub struct IndexBuilder {
    staging_dir: PathBuf,
    generation: u32,
    max_file_bytes: u64,

    files_writer: BufWriter<File>,
    content_writer: BufWriter<File>,
    files_offset: u64,
    content_offset: u64,

    index_entries: Vec<FileIndexEntry>,
    paths: Vec<String>,
    postings: BTreeMap<u32, Vec<u32>>,
    next_id: u32,
}

impl IndexBuilder {
    pub fn begin(staging_dir: impl AsRef<Path>, generation: u32, max_file_bytes: u64) -> Result<IndexBuilder> {
        let staging_dir = staging_dir.as_ref().to_path_buf();
        fs::create_dir_all(&staging_dir)?;

        let files_writer = BufWriter::new(File::create(staging_dir.join("files"))?);
        let content_writer = BufWriter::new(File::create(staging_dir.join("content"))?);

        Ok(IndexBuilder {
            staging_dir,
            generation,
            max_file_bytes,
            files_writer,
            content_writer,
            files_offset: 0,
            content_offset: 0,
            index_entries: Vec::new(),
            paths: Vec::new(),
            postings: BTreeMap::new(),
            next_id: 0,
        })
    }

    /// Accepts one file into the generation being built. Acceptance
    /// filtering (size limits, binary detection, glob excludes) is the
    /// Indexer's job (§4.2); this is a last-line-of-defense size ceiling
    /// only, since a builder could in principle be driven directly.
    pub fn add_file(&mut self, path: &str, bytes: &[u8], mtime: u64) -> Result<FileId> {
        if bytes.len() as u64 > self.max_file_bytes {
            return Err(Error::Other(format!(
                "{path}: {} bytes exceeds max-file-bytes",
                bytes.len()
            )));
        }

        let id = FileId(self.next_id);
        self.next_id += 1;

        let path_len = file_table::write_path_entry(&mut self.files_writer, self.files_offset, path)?;
        let content_offset = self.content_offset;
        self.content_writer.write_all(bytes)?;
        self.content_offset += bytes.len() as u64;

        self.index_entries.push(FileIndexEntry {
            files_offset: self.files_offset,
            content_offset,
            content_len: bytes.len() as u64,
            mtime,
        });
        self.paths.push(path.to_string());
        self.files_offset += path_len;

        for trigram in trigram::extract(bytes) {
            let postings = self.postings.entry(trigram.0).or_default();
            // Files are ingested in ascending FileId order, so each
            // trigram's posting list is built already sorted.
            postings.push(id.0);
        }

        Ok(id)
    }

    pub fn file_count(&self) -> u32 {
        self.next_id
    }

    /// Deletes the staging directory without committing. Used on
    /// cancellation (§5): a reindex cancellation must leave no partial
    /// generation behind.
    pub fn abort(self) -> Result<()> {
        drop(self.files_writer);
        drop(self.content_writer);
        fs::remove_dir_all(&self.staging_dir)?;
        Ok(())
    }

    /// Commits the generation: flushes `files`/`content`, writes
    /// `files.idx` and `trigrams.idx`/`postings`, then `manifest` last as
    /// the atomicity marker (§4.2).
    pub fn finish(mut self) -> Result<PathBuf> {
        self.files_writer.flush()?;
        self.content_writer.flush()?;

        let mut files_idx = BufWriter::new(File::create(self.staging_dir.join("files.idx"))?);
        for entry in &self.index_entries {
            entry.write(&mut files_idx)?;
        }
        files_idx.flush()?;

        let mut trigrams_idx = BufWriter::new(File::create(self.staging_dir.join("trigrams.idx"))?);
        let mut postings_file = BufWriter::new(File::create(self.staging_dir.join("postings"))?);

        let mut posting_offset: u32 = 0;
        let trigram_count = self.postings.len() as u32;
        for (&trigram, ids) in &self.postings {
            let encoded = varint::encode_deltas(ids);
            postings_file.write_all(&encoded)?;

            use byteorder::{LittleEndian, WriteBytesExt};
            trigrams_idx.write_u32::<LittleEndian>(trigram & Trigram::MASK)?;
            trigrams_idx.write_u32::<LittleEndian>(posting_offset)?;
            trigrams_idx.write_u32::<LittleEndian>(encoded.len() as u32)?;

            posting_offset += encoded.len() as u32;
        }
        trigrams_idx.flush()?;
        postings_file.flush()?;

        let manifest = Manifest {
            version: VERSION,
            generation: self.generation,
            file_count: self.next_id,
            trigram_count,
            created_at: now_epoch_seconds(),
        };
        let mut manifest_file = File::create(self.staging_dir.join("manifest"))?;
        manifest.write(&mut manifest_file)?;
        manifest_file.flush()?;
        manifest_file.sync_all()?;

        let _ = FILE_INDEX_ENTRY_LEN;
        Ok(self.staging_dir)
    }
}

fn now_epoch_seconds() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::IndexReader;

    #[test]
    fn builds_and_commits_a_readable_generation() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("idx-rev1-1");
        let mut builder = IndexBuilder::begin(&staging, 1, 5 * 1024 * 1024).unwrap();
        builder.add_file("a.txt", b"hello world", 1_700_000_000).unwrap();
        builder.add_file("b.txt", b"goodbye", 1_700_000_000).unwrap();
        let committed = builder.finish().unwrap();

        let reader = IndexReader::open(&committed).unwrap();
        assert_eq!(reader.files().len(), 2);
    }

    #[test]
    fn rejects_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("idx-rev1-1");
        let mut builder = IndexBuilder::begin(&staging, 1, 4).unwrap();
        assert!(builder.add_file("big.txt", b"too big for the limit", 0).is_err());
    }

    #[test]
    fn abort_removes_staging_directory() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("idx-rev1-1");
        let mut builder = IndexBuilder::begin(&staging, 1, 1024).unwrap();
        builder.add_file("a.txt", b"hi", 0).unwrap();
        builder.abort().unwrap();
        assert!(!staging.exists());
    }

    #[test]
    fn determinism_same_corpus_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let staging_a = dir.path().join("idx-rev1-1");
        let mut a = IndexBuilder::begin(&staging_a, 1, 1024).unwrap();
        a.add_file("a.txt", b"hello world", 0).unwrap();
        a.add_file("b.txt", b"goodbye", 0).unwrap();
        a.finish().unwrap();

        let staging_b = dir.path().join("idx-rev1-2");
        let mut b = IndexBuilder::begin(&staging_b, 1, 1024).unwrap();
        b.add_file("a.txt", b"hello world", 0).unwrap();
        b.add_file("b.txt", b"goodbye", 0).unwrap();
        b.finish().unwrap();

        let trigrams_a = fs::read(staging_a.join("trigrams.idx")).unwrap();
        let trigrams_b = fs::read(staging_b.join("trigrams.idx")).unwrap();
        assert_eq!(trigrams_a, trigrams_b);

        let postings_a = fs::read(staging_a.join("postings")).unwrap();
        let postings_b = fs::read(staging_b.join("postings")).unwrap();
        assert_eq!(postings_a, postings_b);
    }
}
