//! Platform descriptors and the fixed merge order
//!
//! Four fixed platforms plus arbitrarily many caller-defined custom ones.
//! The merge order is forge, neoforge, fabric, quilt, then customs in caller
//! order; metadata precedence and file-collision outcomes follow that order.

use std::path::PathBuf;

/// One platform's contribution to a merge
#[derive(Debug, Clone)]
pub struct PlatformArtifact {
    /// Short identifier used as the namespace prefix
    pub tag: String,

    /// Input archive; `None` means this platform was not declared at all
    pub source: Option<PathBuf>,

    /// Literal text pairs applied on top of the automatic prefix relocation
    pub extra_relocations: Vec<(String, String)>,

    /// Caller-declared cross-cutting config names for this platform
    pub mixin_refs: Vec<String>,

    /// Discovered mixin configs join the platform's mixin list
    pub collects_mixins: bool,

    /// Companion mapping files are renamed in the mixin bucket instead of
    /// their own pass
    pub folds_refmaps: bool,

    /// Access-declaration files are renamed for this platform
    pub renames_wideners: bool,
}

impl PlatformArtifact {
    fn fixed(tag: &str, source: Option<PathBuf>, collects_mixins: bool) -> Self {
        Self {
            tag: tag.to_string(),
            source,
            extra_relocations: Vec::new(),
            mixin_refs: Vec::new(),
            collects_mixins,
            folds_refmaps: !collects_mixins,
            renames_wideners: !collects_mixins,
        }
    }

    pub fn forge(source: Option<PathBuf>) -> Self {
        Self::fixed("forge", source, true)
    }

    pub fn neoforge(source: Option<PathBuf>) -> Self {
        Self::fixed("neoforge", source, true)
    }

    pub fn fabric(source: Option<PathBuf>) -> Self {
        Self::fixed("fabric", source, false)
    }

    pub fn quilt(source: Option<PathBuf>) -> Self {
        Self::fixed("quilt", source, false)
    }

    /// A caller-defined platform; behaves like the loader-style platforms for
    /// resource renaming
    pub fn custom(name: &str, source: PathBuf) -> Self {
        Self::fixed(name, Some(source), false)
    }

    pub fn with_relocations(mut self, relocations: Vec<(String, String)>) -> Self {
        self.extra_relocations = relocations;
        self
    }

    pub fn with_mixin_refs(mut self, mixin_refs: Vec<String>) -> Self {
        self.mixin_refs = mixin_refs;
        self
    }

    /// Declared means a source path was supplied, whether or not it exists
    pub fn declared(&self) -> bool {
        self.source.is_some()
    }

    /// Participating means the declared source actually exists on disk
    pub fn participates(&self) -> bool {
        self.source.as_deref().is_some_and(|p| p.exists())
    }
}
