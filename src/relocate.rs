//! Byte-level symbol relocation
//!
//! Rewrites an archive so that every entry path, and every literal occurrence
//! of a pattern inside compiled or binary entry bytes, is renamed. Text
//! entries keep their content here; the resource text pass rewrites them once
//! with the full relocation map. Patterns are expressed in dotted form; the
//! slash form is derived alongside so that archive paths (slash-delimited)
//! and code references (dot-delimited) stay in sync.
//!
//! Replacement is a single left-to-right pass: at each position the pairs are
//! tried in order, the first match wins, and replacement output is never
//! rescanned. Prefix relocations, where the replacement contains the pattern
//! (`group` -> `forge.group`), depend on this.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tar::{Archive, Builder, EntryType};

use crate::archive::ArchiveError;
use crate::resource::is_binary_bytes;

/// Errors for relocation runs
#[derive(Debug, thiserror::Error)]
pub enum RelocateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
}

/// One rename pair, in dotted and slash form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pattern: String,
    relocated: String,
    path_pattern: String,
    path_relocated: String,
}

impl Relocation {
    /// Create a relocation from dotted patterns; the slash forms are derived
    pub fn new(pattern: &str, relocated: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            relocated: relocated.to_string(),
            path_pattern: pattern.replace('.', "/"),
            path_relocated: relocated.replace('.', "/"),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn relocated(&self) -> &str {
        &self.relocated
    }
}

/// Apply `pairs` to `haystack` in one left-to-right pass
///
/// At each position the pairs are tried in order and the first matching
/// pattern is replaced; scanning resumes after the replacement, so output is
/// never rescanned. Empty patterns never match.
pub fn replace_once(haystack: &[u8], pairs: &[(&[u8], &[u8])]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;

    'scan: while i < haystack.len() {
        for (from, to) in pairs {
            if !from.is_empty() && haystack[i..].starts_with(from) {
                out.extend_from_slice(to);
                i += from.len();
                continue 'scan;
            }
        }
        out.push(haystack[i]);
        i += 1;
    }

    out
}

/// `replace_once` over string pairs
pub fn replace_once_str(line: &str, pairs: &[(String, String)]) -> String {
    let byte_pairs: Vec<(&[u8], &[u8])> = pairs
        .iter()
        .map(|(from, to)| (from.as_bytes(), to.as_bytes()))
        .collect();
    String::from_utf8_lossy(&replace_once(line.as_bytes(), &byte_pairs)).into_owned()
}

/// Rewrite `input` into `output` with every relocation applied
///
/// Entry paths get the slash forms; compiled and binary entry bytes get both
/// forms of every pair. Text entry bytes pass through untouched: the prefix
/// pairs contain their own pattern, so a later text pass over content this
/// pass already rewrote would match inside the replacement. Deterministic,
/// total over the archive, and entries it does not touch keep their original
/// order.
pub fn run(input: &Path, output: &Path, relocations: &[Relocation]) -> Result<(), RelocateError> {
    let path_pairs: Vec<(&[u8], &[u8])> = relocations
        .iter()
        .map(|r| (r.path_pattern.as_bytes(), r.path_relocated.as_bytes()))
        .collect();

    let mut content_pairs: Vec<(&[u8], &[u8])> = Vec::new();
    for r in relocations {
        content_pairs.push((r.pattern.as_bytes(), r.relocated.as_bytes()));
        if r.path_pattern != r.pattern {
            content_pairs.push((r.path_pattern.as_bytes(), r.path_relocated.as_bytes()));
        }
    }

    let mut archive = Archive::new(File::open(input)?);
    let mut builder = Builder::new(File::create(output)?);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let rel = entry.path()?.to_path_buf();
        let old_path = rel
            .to_str()
            .ok_or_else(|| ArchiveError::NonUtf8Path(rel.clone()))?;
        let new_path =
            String::from_utf8_lossy(&replace_once(old_path.as_bytes(), &path_pairs)).into_owned();

        let mut header = entry.header().clone();
        if header.entry_type() == EntryType::Directory {
            builder.append_data(&mut header, &new_path, io::empty())?;
        } else {
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            if old_path.ends_with(".class") || is_binary_bytes(&contents) {
                let rewritten = replace_once(&contents, &content_pairs);
                header.set_size(rewritten.len() as u64);
                builder.append_data(&mut header, &new_path, rewritten.as_slice())?;
            } else {
                builder.append_data(&mut header, &new_path, contents.as_slice())?;
            }
        }
    }

    builder.finish()?;
    Ok(())
}
