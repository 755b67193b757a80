//! Loose-resource discovery, renaming, and text rewriting
//!
//! After a platform's relocated archive is unpacked, its scratch tree still
//! contains loose files whose names would collide across platforms: nested
//! archives, service registrations, mixin configs, refmaps, and access
//! wideners. Each gets a platform-prefixed name, every rename is recorded in
//! the platform's relocation map, and the full map is then applied to every
//! text file in the tree so old names never survive in textual references.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::plan::RelocationMap;
use crate::platform::PlatformArtifact;

/// Metadata directory holding the manifest, services, and nested archives
pub const META_DIR: &str = "META-INF";

/// Subdirectories that may hold nested archives
const NESTED_ARCHIVE_DIRS: [&str; 2] = ["jars", "jarjar"];

/// Extensions treated as nested archives under the metadata directory
const NESTED_ARCHIVE_EXTS: [&str; 2] = ["jar", "tar"];

/// Path fragments excluded from mixin/refmap detection
const DATA_TREES: [&str; 3] = ["/data/", "/assets/", "/config/"];

/// First-line keyword identifying an access-declaration file
const WIDENER_KEYWORD: &str = "accessWidener";

/// Extension identifying an access-declaration file
const WIDENER_EXT: &str = "accesswidener";

/// Result of renaming one platform's resources
#[derive(Debug)]
pub struct RenameOutcome {
    /// The platform's relocation map extended with every rename plus the
    /// dotted and slash group pairs
    pub map: RelocationMap,

    /// Caller-declared mixin refs (platform-prefixed) plus discovered ones,
    /// in discovery order; only populated for mixin-collecting platforms
    pub mixins: Vec<String>,
}

/// A byte slice is binary if any of its first 4096 bytes is a zero byte
pub fn is_binary_bytes(bytes: &[u8]) -> bool {
    bytes.iter().take(4096).any(|b| *b == 0)
}

/// A file is binary if any of its first 4096 bytes is a zero byte
pub fn is_binary(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; 4096];
    let mut read = 0;
    while read < buf.len() {
        let n = file.read(&mut buf[read..])?;
        if n == 0 {
            break;
        }
        read += n;
    }
    Ok(is_binary_bytes(&buf[..read]))
}

/// Every non-compiled text file in the tree, recursively
///
/// Compiled-code files are excluded by extension regardless of content.
pub fn list_text_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "class") {
            continue;
        }
        if !is_binary(path)? {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// Apply the map to every text file, line by line, writing the result back
///
/// Each line gets one left-to-right substitution pass over the map in
/// insertion order; a pair's output is never rescanned by later pairs.
pub fn rewrite_text_files(dir: &Path, map: &RelocationMap) -> io::Result<()> {
    if map.is_empty() {
        return Ok(());
    }
    for file in list_text_files(dir)? {
        let contents = fs::read(&file)?;
        let text = String::from_utf8_lossy(&contents);
        let mut rewritten = String::with_capacity(text.len());
        for line in text.lines() {
            rewritten.push_str(&map.apply_line(line));
            rewritten.push('\n');
        }
        fs::write(&file, rewritten)?;
    }
    Ok(())
}

/// Nested archives under the metadata directory's archive subdirectories
fn nested_archives(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for sub in NESTED_ARCHIVE_DIRS {
        let location = dir.join(META_DIR).join(sub);
        if !location.is_dir() {
            continue;
        }
        let mut children: Vec<_> = fs::read_dir(&location)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|e| e.path())
            .collect();
        children.sort();
        for child in children {
            if child
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| NESTED_ARCHIVE_EXTS.contains(&e))
            {
                archives.push(child);
            }
        }
    }
    Ok(archives)
}

/// Service registrations whose base name contains the shared namespace root
fn service_files(dir: &Path, group: &str) -> io::Result<Vec<PathBuf>> {
    let location = dir.join(META_DIR).join("services");
    if !location.is_dir() {
        return Ok(Vec::new());
    }
    let mut children: Vec<_> = fs::read_dir(&location)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    children.sort();
    Ok(children
        .into_iter()
        .filter(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.contains(group))
        })
        .collect())
}

/// Whether the path sits inside a data/assets/config tree, relative to the
/// scratch root
fn in_data_tree(root: &Path, path: &Path) -> bool {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel = format!("/{}", rel.display());
    DATA_TREES.iter().any(|t| rel.contains(t))
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "json")
}

/// Mixin config descriptors: JSON files outside data trees containing a
/// `"package"` key; with `include_refmaps`, companion mapping files join the
/// same bucket
fn mixin_configs(dir: &Path, include_refmaps: bool) -> io::Result<Vec<PathBuf>> {
    let mut configs = Vec::new();
    for file in list_text_files(dir)? {
        if in_data_tree(dir, &file) || !is_json(&file) {
            continue;
        }
        let text = fs::read_to_string(&file)?;
        if include_refmaps && (text.contains("\"mappings\":") || text.contains("\"data\":")) {
            configs.push(file);
            continue;
        }
        if text.contains("\"package\":") {
            configs.push(file);
        }
    }
    Ok(configs)
}

/// Companion mapping files (refmaps), detected on their own
fn refmaps(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut maps = Vec::new();
    for file in list_text_files(dir)? {
        if in_data_tree(dir, &file) || !is_json(&file) {
            continue;
        }
        let text = fs::read_to_string(&file)?;
        if text.contains("\"mappings\":") || text.contains("\"data\":") {
            maps.push(file);
        }
    }
    Ok(maps)
}

/// Access-declaration files, by extension or first-line keyword
fn access_wideners(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut wideners = Vec::new();
    for file in list_text_files(dir)? {
        if file.extension().is_some_and(|e| e == WIDENER_EXT) {
            wideners.push(file);
            continue;
        }
        let text = fs::read_to_string(&file)?;
        if text.lines().next().is_some_and(|l| l.starts_with(WIDENER_KEYWORD)) {
            wideners.push(file);
        }
    }
    Ok(wideners)
}

/// Rename `file` within its directory, recording the pair in the map
fn rename_into(map: &mut RelocationMap, file: &Path, new_name: String) -> io::Result<String> {
    let old_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::other(format!("unusable file name: {}", file.display())))?
        .to_string();
    let renamed = file.with_file_name(&new_name);
    fs::rename(file, &renamed)?;
    map.push(old_name, new_name.clone());
    Ok(new_name)
}

/// Rename one platform's loose resources and rewrite its text files
///
/// Takes the platform's relocation map as built so far and returns the
/// extended map plus the platform's mixin list; nothing on the artifact is
/// mutated.
pub fn rename_resources(
    tree: &Path,
    artifact: &PlatformArtifact,
    group: &str,
    map: RelocationMap,
) -> io::Result<RenameOutcome> {
    let mut map = map;
    let tag = artifact.tag.as_str();

    let mut mixins: Vec<String> = if artifact.collects_mixins {
        artifact
            .mixin_refs
            .iter()
            .map(|m| format!("{}-{}", tag, m))
            .collect()
    } else {
        Vec::new()
    };

    for file in nested_archives(tree)? {
        let name = file_name(&file)?;
        rename_into(&mut map, &file, format!("{}-{}", tag, name))?;
    }

    for file in service_files(tree, group)? {
        let name = file_name(&file)?;
        rename_into(&mut map, &file, format!("{}.{}", tag, name))?;
    }

    for file in mixin_configs(tree, artifact.folds_refmaps)? {
        let name = file_name(&file)?;
        let renamed = rename_into(&mut map, &file, format!("{}-{}", tag, name))?;
        if artifact.collects_mixins {
            mixins.push(renamed);
        }
    }

    if artifact.collects_mixins {
        for file in refmaps(tree)? {
            let name = file_name(&file)?;
            rename_into(&mut map, &file, format!("{}-{}", tag, name))?;
        }
    }

    if artifact.renames_wideners {
        for file in access_wideners(tree)? {
            let name = file_name(&file)?;
            rename_into(&mut map, &file, format!("{}-{}", tag, name))?;
        }
    }

    // Plain-text references to the shared namespace are rewritten even in
    // files the byte-level relocator never saw.
    map.push(group, format!("{}.{}", tag, group));
    map.push(
        group.replace('.', "/"),
        format!("{}/{}", tag, group.replace('.', "/")),
    );

    rewrite_text_files(tree, &map)?;

    Ok(RenameOutcome { map, mixins })
}

fn file_name(path: &Path) -> io::Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(ToString::to_string)
        .ok_or_else(|| io::Error::other(format!("unusable file name: {}", path.display())))
}
