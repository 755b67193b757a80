//! Post-merge duplicate symbol collapse
//!
//! After the merged archive is packed, caller-declared shared symbols exist
//! once per platform under their platform-qualified names. The resolver
//! drains a worklist of qualified-to-canonical pairs against one owned
//! working archive: each iteration relocates exactly one pair over the whole
//! archive, atomically replaces it, stages the canonical copy on disk, and
//! purges archive-local copies other pending entries would recreate. At most
//! one mutation of the working archive is ever in flight.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::archive::{self, ArchiveError};
use crate::relocate::{self, RelocateError, Relocation};

/// Errors for duplicate collapse
#[derive(Debug, thiserror::Error)]
pub enum DuplicateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("relocation error: {0}")]
    Relocate(#[from] RelocateError),
}

/// One pending collapse: a platform-qualified symbol and its canonical name,
/// both in dotted form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkEntry {
    pub qualified: String,
    pub canonical: String,
}

impl WorkEntry {
    /// Slash form of the canonical name, for archive path matching
    pub fn canonical_path(&self) -> String {
        self.canonical.replace('.', "/")
    }

    /// Slash form of the qualified name
    pub fn qualified_path(&self) -> String {
        self.qualified.replace('.', "/")
    }
}

/// Pending collapses, drained one entry at a time
///
/// Every qualified key maps to the same canonical value across the platforms
/// that contain it, and a canonical value is never itself a key.
#[derive(Debug, Default)]
pub struct DuplicateWorklist {
    entries: VecDeque<WorkEntry>,
}

impl DuplicateWorklist {
    /// Build the worklist from the declared duplicates and the participating
    /// platform tags, in caller order then platform order
    pub fn build(duplicates: &[String], tags: &[&str]) -> Self {
        let mut entries = VecDeque::new();
        for duplicate in duplicates {
            for tag in tags {
                entries.push_back(WorkEntry {
                    qualified: format!("{}.{}", tag, duplicate),
                    canonical: duplicate.clone(),
                });
            }
        }
        Self { entries }
    }

    /// Union text-replacement map for the final pass over the merged tree:
    /// slash pairs first, then dotted pairs
    pub fn text_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.entries.len() * 2);
        for entry in &self.entries {
            pairs.push((entry.qualified_path(), entry.canonical_path()));
        }
        for entry in &self.entries {
            pairs.push((entry.qualified.clone(), entry.canonical.clone()));
        }
        pairs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn pop(&mut self) -> Option<WorkEntry> {
        self.entries.pop_front()
    }

    fn pending_for_canonical(&self, canonical: &str) -> bool {
        self.entries.iter().any(|e| e.canonical == canonical)
    }
}

/// Collapses duplicates against one owned merged archive
pub struct DuplicateResolver {
    merged: PathBuf,
    working: PathBuf,
    staging: PathBuf,
}

impl DuplicateResolver {
    /// `merged` is the packed archive to mutate; `working` is the scoped
    /// temporary for each relocation; `staging` accumulates the single
    /// retained on-disk copy of every collapsed symbol
    pub fn new(merged: &Path, working: PathBuf, staging: PathBuf) -> Self {
        Self {
            merged: merged.to_path_buf(),
            working,
            staging,
        }
    }

    /// Drain the worklist
    ///
    /// A prefix that matches nothing during extraction only means the
    /// platform never defined that symbol; every other failure aborts the
    /// merge with the archive left in its pre-iteration state.
    pub fn run(&self, mut worklist: DuplicateWorklist) -> Result<(), DuplicateError> {
        while let Some(entry) = worklist.pop() {
            let canonical_prefix = format!("{}/", entry.canonical_path());

            // A canonical copy may already exist (from an earlier iteration
            // or the sources themselves); keep it staged before relocating.
            self.extract_tolerant(&canonical_prefix)?;

            if self.working.exists() {
                fs::remove_file(&self.working)?;
            }
            relocate::run(
                &self.merged,
                &self.working,
                &[Relocation::new(&entry.qualified, &entry.canonical)],
            )?;
            fs::rename(&self.working, &self.merged)?;

            // Stage whatever the relocation just canonicalized.
            self.extract_tolerant(&canonical_prefix)?;

            // Later entries for the same canonical name would merge into the
            // archive copy unpredictably; only the staged copy survives.
            if worklist.pending_for_canonical(&entry.canonical) {
                match archive::remove_prefix(&self.merged, &canonical_prefix) {
                    Ok(()) | Err(ArchiveError::PrefixNotFound { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }

    fn extract_tolerant(&self, prefix: &str) -> Result<(), DuplicateError> {
        match archive::extract_prefix(&self.merged, prefix, &self.staging) {
            Ok(()) | Err(ArchiveError::PrefixNotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
