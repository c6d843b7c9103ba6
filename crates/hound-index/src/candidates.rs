//! Evaluates a [`TrigramQuery`] against one `IndexReader`'s posting lists,
//! producing the candidate FileId set a query must then confirm (§4.5).

use crate::query_lower::TrigramQuery;
use crate::store::IndexReader;

/// The result of evaluating a trigram expression. `All` means the
/// expression carried no usable constraint and every file in the
/// generation is a candidate — this is the common case for short or
/// unindexable patterns (§4.5, §8 "short literal widens").
#[derive(Debug, Clone)]
pub enum CandidateSet {
    All,
    Some(Vec<u32>),
}

pub fn evaluate(query: &TrigramQuery, reader: &IndexReader) -> CandidateSet {
    match query {
        TrigramQuery::All => CandidateSet::All,
        TrigramQuery::Trigram(t) => CandidateSet::Some(reader.lookup(*t).iter().collect()),
        TrigramQuery::And(terms) => {
            let mut acc: Option<Vec<u32>> = None;
            for term in terms {
                match evaluate(term, reader) {
                    CandidateSet::All => {}
                    CandidateSet::Some(ids) => {
                        acc = Some(match acc {
                            None => ids,
                            Some(prev) => intersect(&prev, &ids),
                        });
                    }
                }
            }
            acc.map(CandidateSet::Some).unwrap_or(CandidateSet::All)
        }
        TrigramQuery::Or(terms) => {
            let mut acc: Vec<u32> = Vec::new();
            for term in terms {
                match evaluate(term, reader) {
                    CandidateSet::All => return CandidateSet::All,
                    CandidateSet::Some(ids) => acc = union(&acc, &ids),
                }
            }
            CandidateSet::Some(acc)
        }
    }
}

/// Two-pointer merge over sorted, deduplicated FileId lists (the
/// classic codesearch AND), grounded in the same posting-list merge
/// technique used to intersect two trigrams' postings.
fn intersect(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn union(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}
