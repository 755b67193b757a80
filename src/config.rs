//! Merge configuration
//!
//! A merge is described by a TOML file naming the group, the output file, the
//! per-platform input archives with their optional extra relocations and
//! declared mixin configs, and the duplicate symbols to collapse.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::merge::MergeRequest;
use crate::platform::PlatformArtifact;

/// Errors loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// One fixed platform's section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformEntry {
    /// Input archive path; relative paths resolve against the process cwd
    pub source: Option<PathBuf>,

    /// Extra literal relocations, applied after the automatic group prefix
    #[serde(default)]
    pub relocations: BTreeMap<String, String>,

    /// Declared cross-cutting config names
    #[serde(default)]
    pub mixins: Vec<String>,
}

/// A caller-defined platform beyond the four fixed ones
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomEntry {
    pub name: String,
    pub source: PathBuf,

    #[serde(default)]
    pub relocations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformsSection {
    #[serde(default)]
    pub forge: PlatformEntry,

    #[serde(default)]
    pub neoforge: PlatformEntry,

    #[serde(default)]
    pub fabric: PlatformEntry,

    #[serde(default)]
    pub quilt: PlatformEntry,
}

/// The full merge configuration as loaded from disk
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Shared namespace root of the artifacts being merged
    pub group: String,

    /// File name of the merged archive
    pub output: String,

    /// Scratch root; defaults to `.platfuse` next to the config's cwd
    pub scratch_dir: Option<PathBuf>,

    #[serde(default)]
    pub remove_duplicates: Vec<String>,

    #[serde(default)]
    pub reuse_existing: bool,

    #[serde(default)]
    pub platforms: PlatformsSection,

    #[serde(default)]
    pub custom: Vec<CustomEntry>,
}

impl MergeConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(toml::from_str(&fs::read_to_string(path)?)?)
    }

    /// Turn the configuration into a runnable request
    ///
    /// `scratch_override` takes precedence over the configured scratch root.
    pub fn into_request(self, scratch_override: Option<PathBuf>) -> MergeRequest {
        let scratch_dir = scratch_override
            .or(self.scratch_dir)
            .unwrap_or_else(|| PathBuf::from(".platfuse"));

        let fixed = [
            ("forge", self.platforms.forge),
            ("neoforge", self.platforms.neoforge),
            ("fabric", self.platforms.fabric),
            ("quilt", self.platforms.quilt),
        ];
        let mut platforms = Vec::with_capacity(4 + self.custom.len());
        for (tag, entry) in fixed {
            let artifact = match tag {
                "forge" => PlatformArtifact::forge(entry.source),
                "neoforge" => PlatformArtifact::neoforge(entry.source),
                "fabric" => PlatformArtifact::fabric(entry.source),
                _ => PlatformArtifact::quilt(entry.source),
            };
            platforms.push(
                artifact
                    .with_relocations(pairs(entry.relocations))
                    .with_mixin_refs(entry.mixins),
            );
        }
        for custom in self.custom {
            platforms.push(
                PlatformArtifact::custom(&custom.name, custom.source)
                    .with_relocations(pairs(custom.relocations)),
            );
        }

        MergeRequest {
            platforms,
            group: self.group,
            scratch_dir,
            output_name: self.output,
            remove_duplicates: self.remove_duplicates,
            reuse_existing: self.reuse_existing,
        }
    }
}

fn pairs(map: BTreeMap<String, String>) -> Vec<(String, String)> {
    map.into_iter().collect()
}
