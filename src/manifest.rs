//! Archive manifest attributes and cross-platform merging
//!
//! The primary metadata file is a flat `Key: Value` attribute list at
//! `META-INF/MANIFEST.MF`. Merging is last-writer-wins in the fixed platform
//! order; the merged archive gets exactly one manifest, written fresh.

use std::fs;
use std::io;
use std::path::Path;

/// Entry path of the primary metadata file inside an artifact
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Attribute listing the cross-cutting config references
pub const MIXIN_CONFIGS_ATTR: &str = "MixinConfigs";

/// Provenance attribute recording the merging tool's version
pub const VERSION_ATTR: &str = "Platfuse-Version";

/// Errors for manifest handling
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed manifest line {line}: {text}")]
    Malformed { line: usize, text: String },
}

/// Ordered key/value attribute set
///
/// Setting an existing key keeps its position and replaces the value; new
/// keys append. Rendering writes one `Key: Value` line per attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestAttributes {
    entries: Vec<(String, String)>,
}

impl ManifestAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let mut attributes = Self::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line.split_once(':').ok_or_else(|| ManifestError::Malformed {
                line: index + 1,
                text: line.to_string(),
            })?;
            attributes.set(key.trim(), value.trim());
        }
        Ok(attributes)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn write_file(&self, path: &Path) -> Result<(), ManifestError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.render())?;
        Ok(())
    }
}

/// Merge attribute sets in platform order, then fix up the cross-cutting
/// config attribute, then stamp provenance
///
/// The merged `MixinConfigs` names, when inherited from the sources, are
/// re-prefixed by a substring heuristic: names containing `neoforge` or `neo`
/// go to the neoforge namespace, everything else to forge. This can
/// misclassify a third platform's reference whose name happens to contain the
/// marker; the ambiguity is inherent to the attribute and left as-is.
///
/// `mixin_lists` holds each platform's discovered mixin names in merge order;
/// the first non-empty list fills the attribute only when it is still unset.
pub fn merge_manifests(
    sets: Vec<ManifestAttributes>,
    mixin_lists: &[Vec<String>],
    version: &str,
) -> ManifestAttributes {
    let mut merged = ManifestAttributes::new();
    for set in sets {
        for (key, value) in set.iter() {
            merged.set(key.clone(), value.clone());
        }
    }

    if let Some(value) = merged.get(MIXIN_CONFIGS_ATTR).map(ToString::to_string) {
        let reprefixed: Vec<String> = value
            .split(',')
            .map(|name| {
                if name.contains("neoforge") || name.contains("neo") {
                    format!("neoforge-{}", name)
                } else {
                    format!("forge-{}", name)
                }
            })
            .collect();
        merged.set(MIXIN_CONFIGS_ATTR, reprefixed.join(","));
    }

    for list in mixin_lists {
        if !list.is_empty() && merged.get(MIXIN_CONFIGS_ATTR).is_none() {
            merged.set(MIXIN_CONFIGS_ATTR, list.join(","));
        }
    }

    merged.set(VERSION_ATTR, version);
    merged
}
