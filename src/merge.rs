//! Merge orchestration
//!
//! Owns the scratch-directory lifecycle and sequences the phases: plan,
//! byte-level relocation, unpack, resource renaming, manifest merging,
//! accumulation, pack, duplicate collapse, repack, cleanup. A single merge
//! request runs start to finish on one thread; a second concurrent request
//! must use a distinct scratch root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::archive::{self, ArchiveError};
use crate::diag::DiagnosticSink;
use crate::duplicate::{DuplicateError, DuplicateResolver, DuplicateWorklist};
use crate::manifest::{self, ManifestError};
use crate::plan::{self, PlanError, RelocationMap};
use crate::platform::PlatformArtifact;
use crate::relocate::RelocateError;
use crate::resource;

/// Errors that abort a merge
///
/// Any error return means no usable output; callers should wipe the scratch
/// root before retrying.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("no artifacts were supplied")]
    NoArtifacts,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("relocation error: {0}")]
    Relocate(#[from] RelocateError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("duplicate collapse error: {0}")]
    Duplicate(#[from] DuplicateError),
}

/// Everything one merge run needs
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Fixed platforms first (forge, neoforge, fabric, quilt), then customs
    /// in caller order; this order fixes metadata precedence
    pub platforms: Vec<PlatformArtifact>,

    /// Shared namespace root every platform relocates under its own prefix
    pub group: String,

    /// Scratch root; exclusively owned by this request while it runs
    pub scratch_dir: PathBuf,

    /// File name of the merged output, created under the scratch root
    pub output_name: String,

    /// Symbols to collapse to a single copy after merging
    pub remove_duplicates: Vec<String>,

    /// Return an existing output unchanged instead of redoing any work
    pub reuse_existing: bool,
}

/// Runs one merge request
pub struct Merger<'a> {
    request: MergeRequest,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> Merger<'a> {
    pub fn new(request: MergeRequest, sink: &'a dyn DiagnosticSink) -> Self {
        Self { request, sink }
    }

    /// Run the merge and return the path of the merged archive
    pub fn merge(self) -> Result<PathBuf, MergeError> {
        let request = &self.request;
        let scratch = &request.scratch_dir;
        let output = scratch.join(&request.output_name);

        if output.exists() {
            if request.reuse_existing {
                self.sink.info("reusing existing merged archive");
                return Ok(output);
            }
            fs::remove_file(&output)?;
        }

        if request.platforms.iter().all(|p| !p.declared()) {
            return Err(MergeError::NoArtifacts);
        }

        fs::create_dir_all(scratch)?;

        for platform in &request.platforms {
            if platform.declared() && !platform.participates() {
                self.sink.warn(&format!(
                    "{} artifact does not exist; skipping that platform",
                    platform.tag
                ));
            }
        }

        let participating: Vec<&PlatformArtifact> = request
            .platforms
            .iter()
            .filter(|p| p.participates())
            .collect();

        self.sink.info(&format!(
            "merging {} platform(s) [{}] under group {} into {}",
            participating.len(),
            participating
                .iter()
                .map(|p| p.tag.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            request.group,
            request.output_name
        ));

        // Phase 1: plan and relocate each artifact at the byte level.
        let mut relocated = Vec::with_capacity(participating.len());
        let mut maps: Vec<RelocationMap> = Vec::with_capacity(participating.len());
        for platform in &participating {
            let source = platform.source.as_deref().expect("participant has a source");
            let map = plan::initial_map(
                &request.group,
                &platform.tag,
                &platform.extra_relocations,
                source,
            )?;
            self.sink.debug(&format!(
                "{}: {} relocation pair(s) planned",
                platform.tag,
                map.len()
            ));

            let dest = scratch.join(format!("{}-relocated.tar", platform.tag));
            if dest.exists() {
                fs::remove_file(&dest)?;
            }
            crate::relocate::run(source, &dest, &map.to_relocations())?;
            relocated.push(dest);
            maps.push(map);
        }

        // Phase 2: unpack into per-platform scratch trees, wiping leftovers
        // from any earlier failed run.
        let mut trees = Vec::with_capacity(participating.len());
        for (platform, archive_path) in participating.iter().zip(&relocated) {
            let tree = scratch.join(format!("{}-temps", platform.tag));
            wipe_dir(&tree)?;
            archive::unpack(archive_path, &tree)?;
            trees.push(tree);
        }

        // Phase 3: rename loose resources and rewrite text, platform by
        // platform; each pass returns the extended relocation map.
        let mut mixin_lists = Vec::with_capacity(participating.len());
        for ((platform, tree), map) in participating.iter().zip(&trees).zip(maps.iter_mut()) {
            let outcome =
                resource::rename_resources(tree, platform, &request.group, std::mem::take(map))?;
            *map = outcome.map;
            if !outcome.mixins.is_empty() {
                self.sink
                    .debug(&format!("{}: mixins {}", platform.tag, outcome.mixins.join(",")));
            }
            mixin_lists.push(outcome.mixins);
        }

        // Phase 4: merge manifests with last-writer-wins precedence, then
        // drop the per-platform manifests so only the merged one survives.
        let mut sets = Vec::with_capacity(trees.len());
        for tree in &trees {
            sets.push(manifest::ManifestAttributes::from_file(
                &tree.join(manifest::MANIFEST_PATH),
            )?);
        }
        let merged_manifest =
            manifest::merge_manifests(sets, &mixin_lists, env!("CARGO_PKG_VERSION"));
        for tree in &trees {
            fs::remove_file(tree.join(manifest::MANIFEST_PATH))?;
        }

        // Phase 5: accumulate the scratch trees, later platforms overwriting
        // colliding files, and write the merged manifest fresh.
        let merged_tree = scratch.join("merged-temps");
        wipe_dir(&merged_tree)?;
        for tree in &trees {
            archive::copy_tree(tree, &merged_tree)?;
        }
        merged_manifest.write_file(&merged_tree.join(manifest::MANIFEST_PATH))?;

        // Phase 6: pack the merged tree.
        archive::pack(&merged_tree, &output)?;

        // Phase 7: collapse declared duplicates against the packed archive,
        // then restore the retained copies and run the final text pass.
        let staging = scratch.join("duplicate-temps");
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        if !request.remove_duplicates.is_empty() {
            let tags: Vec<&str> = participating.iter().map(|p| p.tag.as_str()).collect();
            let worklist = DuplicateWorklist::build(&request.remove_duplicates, &tags);
            let text_pairs = worklist.text_pairs();
            self.sink
                .debug(&format!("collapsing {} duplicate entr(ies)", worklist.len()));

            let working = scratch.join(format!("{}.duplicate.remover", request.output_name));
            DuplicateResolver::new(&output, working, staging.clone()).run(worklist)?;

            wipe_dir(&merged_tree)?;
            archive::unpack(&output, &merged_tree)?;
            if staging.exists() {
                archive::copy_tree(&staging, &merged_tree)?;
            }

            let mut text_map = RelocationMap::new();
            for (from, to) in text_pairs {
                text_map.push(from, to);
            }
            resource::rewrite_text_files(&merged_tree, &text_map)?;

            fs::remove_file(&output)?;
            archive::pack(&merged_tree, &output)?;
        }

        set_broad_permissions(&output);
        self.sink
            .info(&format!("merged archive sha256: {}", file_sha256(&output)?));

        // Cleanup: every temporary and every original source artifact goes;
        // only the merged output remains.
        fs::remove_dir_all(&merged_tree)?;
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        for tree in &trees {
            fs::remove_dir_all(tree)?;
        }
        for archive_path in &relocated {
            fs::remove_file(archive_path)?;
        }
        for platform in &participating {
            if let Some(source) = platform.source.as_deref() {
                fs::remove_file(source)?;
            }
        }

        Ok(output)
    }
}

fn wipe_dir(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}

/// Make the output readable/writable/executable for everyone; failure to do
/// so never fails the merge
fn set_broad_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o777));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

fn file_sha256(path: &Path) -> io::Result<String> {
    let contents = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&contents);
    Ok(hex::encode(hasher.finalize()))
}
