//! Lowers a regular expression into a boolean expression over required
//! trigrams (§4.5, §9). The result is always a sound superset filter: any
//! file actually matched by the regex is guaranteed to satisfy the lowered
//! expression, even if the lowering gives up and widens to `All`.

use regex_syntax::hir::{Class, Hir, HirKind, Literal};
use regex_syntax::Parser;

use hound_core::{Error, Result};

use crate::trigram::{self, Trigram};

const CLASS_WIDEN_THRESHOLD: usize = 4;
const CASE_VARIANT_CAP: usize = 128;

/// A boolean expression over trigram membership, evaluated against a
/// single `IndexReader`'s posting lists (§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrigramQuery {
    /// No constraint; every file is a candidate.
    All,
    /// No file can satisfy this (only produced internally; treated the
    /// same as `All` at evaluation time so we never produce false
    /// negatives from an over-eager `None`).
    Trigram(Trigram),
    And(Vec<TrigramQuery>),
    Or(Vec<TrigramQuery>),
}

/// Parses `pattern` and lowers it to a [`TrigramQuery`]. A pattern that
/// fails to parse is a caller error (`QueryInvalid`); a pattern that
/// parses but can't be usefully lowered degrades to `All` rather than
/// failing (§9: "a failing lowering must widen to TRUE").
pub fn lower(pattern: &str, ignore_case: bool) -> Result<TrigramQuery> {
    let hir = Parser::new()
        .parse(pattern)
        .map_err(|e| Error::QueryInvalid(format!("{pattern}: {e}")))?;
    let mut lowerer = Lowerer {
        ignore_case,
        terms: Vec::new(),
        pending: None,
    };
    lowerer.walk(&hir);
    lowerer.flush();
    Ok(and_all(lowerer.terms))
}

/// Accumulates a boolean conjunction as it walks a concatenation,
/// maintaining a running "string set" of concrete byte sequences that
/// could still grow by concatenation with what follows (the classic
/// codesearch technique). Anything that can't be folded into the string
/// set flushes it to trigram requirements and starts fresh.
struct Lowerer {
    ignore_case: bool,
    terms: Vec<TrigramQuery>,
    pending: Option<Vec<Vec<u8>>>,
}

impl Lowerer {
    fn walk(&mut self, hir: &Hir) {
        match hir.kind() {
            HirKind::Empty | HirKind::Look(_) => {
                // Zero-width; doesn't affect which bytes follow.
            }
            HirKind::Literal(Literal(bytes)) => {
                self.extend_pending(&[bytes.to_vec()]);
            }
            HirKind::Class(class) => match class_members(class) {
                Some(members) if !members.is_empty() => {
                    let variants: Vec<Vec<u8>> = members.iter().map(|&b| vec![b]).collect();
                    self.extend_pending(&variants);
                }
                _ => {
                    self.flush();
                }
            },
            HirKind::Repetition(rep) => {
                // A repeated subexpression's exact membership is not
                // tracked; treat it as a boundary (§9 widening guidance).
                self.flush();
                if rep.min >= 1 {
                    // At least one copy is guaranteed; its own literal
                    // content (if simple) still constrains candidates.
                    self.walk(&rep.sub);
                    self.flush();
                }
            }
            HirKind::Capture(cap) => self.walk(&cap.sub),
            HirKind::Concat(items) => {
                for item in items {
                    self.walk(item);
                }
            }
            HirKind::Alternation(branches) => {
                self.flush();
                let mut sub_terms = Vec::with_capacity(branches.len());
                for branch in branches {
                    let mut sub = Lowerer {
                        ignore_case: self.ignore_case,
                        terms: Vec::new(),
                        pending: None,
                    };
                    sub.walk(branch);
                    sub.flush();
                    sub_terms.push(and_all(sub.terms));
                }
                self.terms.push(or_all(sub_terms));
            }
        }
    }

    fn extend_pending(&mut self, variants: &[Vec<u8>]) {
        let next = match self.pending.take() {
            None => variants.to_vec(),
            Some(current) => {
                let product_len = current.len() * variants.len();
                if product_len > CASE_VARIANT_CAP {
                    self.flush_strings(current);
                    variants.to_vec()
                } else {
                    let mut product = Vec::with_capacity(product_len);
                    for prefix in &current {
                        for suffix in variants {
                            let mut s = prefix.clone();
                            s.extend_from_slice(suffix);
                            product.push(s);
                        }
                    }
                    product
                }
            }
        };
        if next.len() > CASE_VARIANT_CAP {
            // Too many live variants to keep extending; lock in what we
            // have so far as a requirement and start over empty.
            self.flush_strings(next);
        } else {
            self.pending = Some(next);
        }
    }

    fn flush(&mut self) {
        if let Some(strings) = self.pending.take() {
            self.flush_strings(strings);
        }
    }

    fn flush_strings(&mut self, strings: Vec<Vec<u8>>) {
        let mut or_terms = Vec::new();
        for s in strings {
            let expanded = if self.ignore_case {
                case_variants(&s)
            } else {
                Some(vec![s])
            };
            let Some(expanded) = expanded else { continue };
            for variant in expanded {
                if let Some(term) = literal_term(&variant) {
                    or_terms.push(term);
                }
            }
        }
        if !or_terms.is_empty() {
            self.terms.push(or_all(or_terms));
        }
    }
}

fn literal_term(bytes: &[u8]) -> Option<TrigramQuery> {
    let trigrams = trigram::of_literal(bytes);
    if trigrams.is_empty() {
        // Shorter than 3 bytes: no constraint contributed (§4.5).
        return None;
    }
    Some(and_all(
        trigrams.into_iter().map(TrigramQuery::Trigram).collect(),
    ))
}

/// Expands each alphabetic byte of `s` to its case variants, capped to
/// avoid combinatorial explosion (§4.5). Returns `None` if the cap would
/// be exceeded, meaning the caller should widen instead of constraining.
fn case_variants(s: &[u8]) -> Option<Vec<Vec<u8>>> {
    let mut variants = vec![Vec::new()];
    for &b in s {
        let alts: Vec<u8> = if b.is_ascii_alphabetic() {
            vec![b.to_ascii_lowercase(), b.to_ascii_uppercase()]
        } else {
            vec![b]
        };
        if variants.len() * alts.len() > CASE_VARIANT_CAP {
            return None;
        }
        let mut next = Vec::with_capacity(variants.len() * alts.len());
        for v in &variants {
            for &a in &alts {
                let mut nv = v.clone();
                nv.push(a);
                next.push(nv);
            }
        }
        variants = next;
    }
    Some(variants)
}

fn class_members(class: &Class) -> Option<Vec<u8>> {
    match class {
        Class::Bytes(bytes) => {
            let mut members = Vec::new();
            for range in bytes.ranges() {
                for b in range.start()..=range.end() {
                    members.push(b);
                    if members.len() > CLASS_WIDEN_THRESHOLD {
                        return None;
                    }
                }
            }
            Some(members)
        }
        Class::Unicode(unicode) => {
            let mut members = Vec::new();
            for range in unicode.ranges() {
                if !range.start().is_ascii() || !range.end().is_ascii() {
                    return None;
                }
                let span = range.end() as u32 - range.start() as u32 + 1;
                if span as usize > CLASS_WIDEN_THRESHOLD {
                    return None;
                }
                for c in (range.start() as u32)..=(range.end() as u32) {
                    members.push(c as u8);
                }
                if members.len() > CLASS_WIDEN_THRESHOLD {
                    return None;
                }
            }
            Some(members)
        }
    }
}

fn and_all(mut terms: Vec<TrigramQuery>) -> TrigramQuery {
    terms.retain(|t| *t != TrigramQuery::All);
    match terms.len() {
        0 => TrigramQuery::All,
        1 => terms.pop().unwrap(),
        _ => TrigramQuery::And(terms),
    }
}

fn or_all(terms: Vec<TrigramQuery>) -> TrigramQuery {
    if terms.iter().any(|t| *t == TrigramQuery::All) {
        return TrigramQuery::All;
    }
    match terms.len() {
        0 => TrigramQuery::All,
        1 => terms.into_iter().next().unwrap(),
        _ => TrigramQuery::Or(terms),
    }
}
