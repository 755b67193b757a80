//! Per-platform relocation planning
//!
//! Before any byte-level rewriting happens, each participating platform gets
//! an initial relocation map moving the shared namespace root under the
//! platform's own prefix. Injected interop namespaces found in the artifact's
//! entry listing move with the platform too, so they cannot collide across
//! platforms either.

use std::path::Path;

use crate::archive::{self, ArchiveError};
use crate::relocate::{replace_once_str, Relocation};

/// Top-level entry prefix marking injected cross-platform interop code
pub const INJECT_MARKER: &str = "architectury_inject";

/// Errors for relocation planning
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("cannot list source archive: {0}")]
    Archive(#[from] ArchiveError),
}

/// Ordered set of literal (from, to) replacement pairs
///
/// Pairs apply in insertion order via a single left-to-right pass per line
/// (see `relocate::replace_once`): at each position the first matching pair
/// wins and replacement output is never rescanned. Pairs whose keys are
/// prefixes of each other are therefore order-sensitive by design.
#[derive(Debug, Clone, Default)]
pub struct RelocationMap {
    pairs: Vec<(String, String)>,
}

impl RelocationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair; an existing key keeps its position but takes the new
    /// replacement
    pub fn push(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let from = from.into();
        let to = to.into();
        if let Some(existing) = self.pairs.iter_mut().find(|(f, _)| *f == from) {
            existing.1 = to;
        } else {
            self.pairs.push((from, to));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, from: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(f, _)| f == from)
            .map(|(_, t)| t.as_str())
    }

    /// Apply every pair to one line of text, single pass, insertion order
    pub fn apply_line(&self, line: &str) -> String {
        replace_once_str(line, &self.pairs)
    }

    /// The map as byte-level relocations for the archive rewriter
    pub fn to_relocations(&self) -> Vec<Relocation> {
        self.pairs
            .iter()
            .map(|(from, to)| Relocation::new(from, to))
            .collect()
    }
}

/// Build the initial relocation map for one platform's source archive
///
/// Always emits `group -> tag.group`, then the caller's extra pairs, then the
/// injected-namespace pair when the entry listing contains a top-level entry
/// starting with the injection marker. A source archive that cannot be listed
/// fails the whole plan.
pub fn initial_map(
    group: &str,
    tag: &str,
    extra_relocations: &[(String, String)],
    source: &Path,
) -> Result<RelocationMap, PlanError> {
    let mut map = RelocationMap::new();
    map.push(group, format!("{}.{}", tag, group));

    for (from, to) in extra_relocations {
        map.push(from.clone(), to.clone());
    }

    let mut injected = None;
    for entry in archive::list_entries(source)? {
        let top = if entry.is_dir {
            entry.path.clone()
        } else {
            first_segment(&entry.path)
        };
        if top.starts_with(INJECT_MARKER) {
            injected = Some(top);
        }
    }

    if let Some(name) = injected {
        let relocated = format!("{}.{}", tag, name);
        map.push(name, relocated);
    }

    Ok(map)
}

/// First path segment of a slash-delimited entry name, empty if there is none
fn first_segment(path: &str) -> String {
    match path.find('/') {
        Some(end) => path[..end].to_string(),
        None => String::new(),
    }
}
