//! Archive pack/unpack and partial-entry operations
//!
//! Artifacts are plain tar archives of files. This module owns the container
//! format: exploding an archive into a directory tree, reassembling a tree
//! into an archive, listing entries, and extracting or removing just the
//! entries under a path prefix. Entry paths and content bytes are preserved
//! exactly; packing writes entries in sorted path order with normalized
//! metadata so the same tree always produces the same bytes.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tar::{Archive, Builder, EntryType, Header};
use walkdir::WalkDir;

/// Errors for archive operations
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("no entries match prefix: {prefix}")]
    PrefixNotFound { prefix: String },

    #[error("entry path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    #[error("entry path escapes the extraction root: {0}")]
    UnsafeEntryPath(PathBuf),
}

/// One entry name from an archive listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    /// Slash-delimited entry path, directories without a trailing slash
    pub path: String,
    pub is_dir: bool,
}

/// Join an entry path under `dest`, rejecting absolute paths and parent
/// components so a crafted archive cannot write outside the extraction root
fn checked_join(dest: &Path, rel: &Path) -> Result<PathBuf, ArchiveError> {
    use std::path::Component;
    for component in rel.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(ArchiveError::UnsafeEntryPath(rel.to_path_buf())),
        }
    }
    Ok(dest.join(rel))
}

fn entry_path_string(path: &Path) -> Result<String, ArchiveError> {
    path.to_str()
        .map(|s| s.trim_end_matches('/').to_string())
        .ok_or_else(|| ArchiveError::NonUtf8Path(path.to_path_buf()))
}

/// List every entry in the archive without extracting anything
pub fn list_entries(archive: &Path) -> Result<Vec<ListedEntry>, ArchiveError> {
    let mut archive = Archive::new(File::open(archive)?);
    let mut entries = Vec::new();

    for entry in archive.entries()? {
        let entry = entry?;
        let path = entry_path_string(&entry.path()?)?;
        if path.is_empty() {
            continue;
        }
        entries.push(ListedEntry {
            path,
            is_dir: entry.header().entry_type() == EntryType::Directory,
        });
    }

    Ok(entries)
}

/// Explode an archive into a directory tree, preserving entry paths and bytes
pub fn unpack(archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let mut archive = Archive::new(File::open(archive)?);
    fs::create_dir_all(dest)?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let rel = entry.path()?.to_path_buf();
        let out = checked_join(dest, &rel)?;

        if entry.header().entry_type() == EntryType::Directory {
            fs::create_dir_all(&out)?;
        } else {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            fs::write(&out, contents)?;
        }
    }

    Ok(())
}

/// Reassemble a directory tree into an archive
pub fn pack(tree: &Path, archive: &Path) -> Result<(), ArchiveError> {
    // Sorted so repacking the same tree is deterministic
    let mut entries: BTreeMap<PathBuf, bool> = BTreeMap::new();
    for entry in WalkDir::new(tree).follow_links(false) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(tree)
            .expect("walked path outside its root")
            .to_path_buf();
        if rel.as_os_str().is_empty() {
            continue;
        }
        entries.insert(rel, entry.file_type().is_dir());
    }

    let mut builder = Builder::new(File::create(archive)?);

    for (rel, is_dir) in &entries {
        let full = tree.join(rel);
        let mut header = Header::new_gnu();
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);

        if *is_dir {
            header.set_size(0);
            header.set_mode(0o755);
            header.set_entry_type(EntryType::Directory);
            let name = format!("{}/", rel.display());
            builder.append_data(&mut header, name, io::empty())?;
        } else {
            let contents = fs::read(&full)?;
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, rel, contents.as_slice())?;
        }
    }

    builder.finish()?;
    Ok(())
}

/// Extract just the entries under `prefix` into `dest`, preserving their full
/// entry paths
///
/// A prefix matching nothing is reported as `PrefixNotFound`; callers that
/// treat a missing prefix as benign match on that variant.
pub fn extract_prefix(archive: &Path, prefix: &str, dest: &Path) -> Result<(), ArchiveError> {
    let mut archive = Archive::new(File::open(archive)?);
    let mut matched = 0usize;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let rel = entry.path()?.to_path_buf();
        let path = rel
            .to_str()
            .ok_or_else(|| ArchiveError::NonUtf8Path(rel.clone()))?;
        if !path.starts_with(prefix) {
            continue;
        }
        matched += 1;

        let out = checked_join(dest, &rel)?;
        if entry.header().entry_type() == EntryType::Directory {
            fs::create_dir_all(&out)?;
        } else {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            fs::write(&out, contents)?;
        }
    }

    if matched == 0 {
        return Err(ArchiveError::PrefixNotFound {
            prefix: prefix.to_string(),
        });
    }
    Ok(())
}

/// Rewrite the archive without the entries under `prefix`, leaving every
/// other entry untouched and in its original order
pub fn remove_prefix(archive: &Path, prefix: &str) -> Result<(), ArchiveError> {
    let rewrite = archive.with_extension("rewrite");
    let mut matched = 0usize;

    {
        let mut input = Archive::new(File::open(archive)?);
        let mut builder = Builder::new(File::create(&rewrite)?);

        for entry in input.entries()? {
            let mut entry = entry?;
            let rel = entry.path()?.to_path_buf();
            let path = rel
                .to_str()
                .ok_or_else(|| ArchiveError::NonUtf8Path(rel.clone()))?
                .to_string();
            if path.starts_with(prefix) {
                matched += 1;
                continue;
            }

            let mut header = entry.header().clone();
            if header.entry_type() == EntryType::Directory {
                builder.append_data(&mut header, &rel, io::empty())?;
            } else {
                let mut contents = Vec::new();
                entry.read_to_end(&mut contents)?;
                builder.append_data(&mut header, &rel, contents.as_slice())?;
            }
        }

        builder.finish()?;
    }

    if matched == 0 {
        fs::remove_file(&rewrite)?;
        return Err(ArchiveError::PrefixNotFound {
            prefix: prefix.to_string(),
        });
    }

    fs::rename(&rewrite, archive)?;
    Ok(())
}

/// Copy the contents of `src` into `dest`, overwriting colliding files
pub fn copy_tree(src: &Path, dest: &Path) -> Result<(), ArchiveError> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walked path outside its root");
        if rel.as_os_str().is_empty() {
            continue;
        }
        let out = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &out)?;
        }
    }
    Ok(())
}
