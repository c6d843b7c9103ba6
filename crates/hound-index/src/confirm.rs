//! Confirms trigram candidates by rescanning file bytes with the full
//! regex and assembling line-annotated match records (§4.5).

use hound_core::Result;

use crate::file_table::FileId;
use crate::store::IndexReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub line_number: u32,
    pub byte_start: u32,
    pub byte_end: u32,
    pub line_text: String,
    pub before: Vec<String>,
    pub after: Vec<String>,
}

/// Runs `regex` over one candidate file's bytes and returns every match,
/// each annotated with its 1-based line number and surrounding context.
/// Stops early once `max_matches_per_file` matches have been found (§4.5
/// bounding); `None` means unbounded.
pub fn confirm_file(
    reader: &IndexReader,
    file_id: FileId,
    regex: &regex::bytes::Regex,
    context_lines: u32,
    max_matches_per_file: Option<usize>,
) -> Result<Vec<Match>> {
    let bytes = reader.read_file(file_id)?;
    let offsets = reader.line_offsets(file_id)?;

    let mut matches = Vec::new();
    for m in regex.find_iter(bytes) {
        let line_index = line_index_for_offset(&offsets, m.start());
        let line_number = (line_index + 1) as u32;

        let line_text = line_text(bytes, &offsets, line_index);
        let before = context_before(bytes, &offsets, line_index, context_lines);
        let after = context_after(bytes, &offsets, line_index, context_lines);

        matches.push(Match {
            line_number,
            byte_start: m.start() as u32,
            byte_end: m.end() as u32,
            line_text,
            before,
            after,
        });

        if let Some(limit) = max_matches_per_file {
            if matches.len() >= limit {
                break;
            }
        }
    }
    Ok(matches)
}

/// Binary search for the line containing byte offset `pos`: the count of
/// line-start offsets `<= pos`, minus one (§4.5: computed on demand,
/// cached per reader via `IndexReader::line_offsets`).
fn line_index_for_offset(offsets: &[u32], pos: usize) -> usize {
    let pos = pos as u32;
    offsets.partition_point(|&o| o <= pos).saturating_sub(1)
}

fn line_span(offsets: &[u32], bytes: &[u8], index: usize) -> (usize, usize) {
    let start = offsets.get(index).copied().unwrap_or(0) as usize;
    let end = offsets
        .get(index + 1)
        .map(|&o| o as usize)
        .unwrap_or(bytes.len());
    let end = bytes[start..end]
        .iter()
        .position(|&b| b == b'\n')
        .map(|p| start + p)
        .unwrap_or(end);
    (start, end)
}

fn line_text(bytes: &[u8], offsets: &[u32], index: usize) -> String {
    let (start, end) = line_span(offsets, bytes, index);
    String::from_utf8_lossy(&bytes[start..end]).into_owned()
}

fn context_before(bytes: &[u8], offsets: &[u32], index: usize, n: u32) -> Vec<String> {
    let start = index.saturating_sub(n as usize);
    (start..index).map(|i| line_text(bytes, offsets, i)).collect()
}

fn context_after(bytes: &[u8], offsets: &[u32], index: usize, n: u32) -> Vec<String> {
    let last = offsets.len().saturating_sub(1);
    let end = (index + n as usize).min(last);
    ((index + 1)..=end).map(|i| line_text(bytes, offsets, i)).collect()
}
