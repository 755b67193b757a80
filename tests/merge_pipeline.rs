//! End-to-end merge pipeline tests
//!
//! Each test builds small platform artifacts on disk, runs a full merge, and
//! inspects the merged archive.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use platfuse::archive;
use platfuse::manifest::ManifestAttributes;
use platfuse::{MergeRequest, Merger, PlatformArtifact, RecordingSink};

const BASE_MANIFEST: &str = "Manifest-Version: 1.0\n";

/// Pack a platform artifact from (path, contents) pairs; a manifest is
/// always included unless the caller supplies one
fn build_artifact(scratch: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let tree = scratch.join(format!("{}-src", name));
    for (path, contents) in files {
        let full = tree.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, contents).unwrap();
    }
    let manifest = tree.join("META-INF/MANIFEST.MF");
    if !manifest.exists() {
        fs::create_dir_all(manifest.parent().unwrap()).unwrap();
        fs::write(&manifest, BASE_MANIFEST).unwrap();
    }
    let archive_path = scratch.join(format!("{}.tar", name));
    archive::pack(&tree, &archive_path).unwrap();
    fs::remove_dir_all(&tree).unwrap();
    archive_path
}

fn request(scratch: &Path, platforms: Vec<PlatformArtifact>) -> MergeRequest {
    MergeRequest {
        platforms,
        group: "com.example.mymod".to_string(),
        scratch_dir: scratch.join("work"),
        output_name: "mymod-merged.tar".to_string(),
        remove_duplicates: Vec::new(),
        reuse_existing: false,
    }
}

fn entry_paths(archive_path: &Path) -> Vec<String> {
    archive::list_entries(archive_path)
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect()
}

fn merged_manifest(scratch: &Path, output: &Path) -> ManifestAttributes {
    let tree = scratch.join("inspect");
    archive::unpack(output, &tree).unwrap();
    let manifest = ManifestAttributes::from_file(&tree.join("META-INF/MANIFEST.MF")).unwrap();
    fs::remove_dir_all(&tree).unwrap();
    manifest
}

#[test]
fn test_platform_namespaces_never_collide() {
    let scratch = TempDir::new().unwrap();
    let forge = build_artifact(
        scratch.path(),
        "forge",
        &[("com/example/mymod/Mod.txt", "forge body")],
    );
    let fabric = build_artifact(
        scratch.path(),
        "fabric",
        &[("com/example/mymod/Mod.txt", "fabric body")],
    );

    let sink = RecordingSink::new();
    let request = request(
        scratch.path(),
        vec![
            PlatformArtifact::forge(Some(forge)),
            PlatformArtifact::fabric(Some(fabric)),
        ],
    );
    let output = Merger::new(request, &sink).merge().unwrap();

    let paths = entry_paths(&output);
    assert!(paths.contains(&"forge/com/example/mymod/Mod.txt".to_string()));
    assert!(paths.contains(&"fabric/com/example/mymod/Mod.txt".to_string()));
    assert!(!paths.contains(&"com/example/mymod/Mod.txt".to_string()));
}

#[test]
fn test_merge_consumes_sources_and_scratch() {
    let scratch = TempDir::new().unwrap();
    let forge = build_artifact(scratch.path(), "forge", &[("a.txt", "x")]);

    let sink = RecordingSink::new();
    let request = request(scratch.path(), vec![PlatformArtifact::forge(Some(forge.clone()))]);
    let work = request.scratch_dir.clone();
    let output = Merger::new(request, &sink).merge().unwrap();

    assert!(output.exists());
    assert!(!forge.exists());
    assert!(!work.join("forge-temps").exists());
    assert!(!work.join("merged-temps").exists());
    assert!(!work.join("forge-relocated.tar").exists());
}

#[test]
fn test_missing_declared_platform_warns_and_continues() {
    let scratch = TempDir::new().unwrap();
    let fabric = build_artifact(scratch.path(), "fabric", &[("a.txt", "x")]);

    let sink = RecordingSink::new();
    let request = request(
        scratch.path(),
        vec![
            PlatformArtifact::forge(Some(scratch.path().join("never-built.tar"))),
            PlatformArtifact::fabric(Some(fabric)),
        ],
    );
    let output = Merger::new(request, &sink).merge().unwrap();

    assert!(output.exists());
    let warnings = sink.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("forge"));
}

#[test]
fn test_metadata_precedence_follows_platform_order() {
    let scratch = TempDir::new().unwrap();
    let forge = build_artifact(
        scratch.path(),
        "forge",
        &[(
            "META-INF/MANIFEST.MF",
            "Manifest-Version: 1.0\nImplementation-Title: forge-title\nForge-Only: yes\n",
        )],
    );
    let fabric = build_artifact(
        scratch.path(),
        "fabric",
        &[(
            "META-INF/MANIFEST.MF",
            "Manifest-Version: 1.0\nImplementation-Title: fabric-title\n",
        )],
    );

    let sink = RecordingSink::new();
    let request = request(
        scratch.path(),
        vec![
            PlatformArtifact::forge(Some(forge)),
            PlatformArtifact::fabric(Some(fabric)),
        ],
    );
    let output = Merger::new(request, &sink).merge().unwrap();

    let manifest = merged_manifest(scratch.path(), &output);
    assert_eq!(manifest.get("Implementation-Title"), Some("fabric-title"));
    assert_eq!(manifest.get("Forge-Only"), Some("yes"));
    assert_eq!(
        manifest.get("Platfuse-Version"),
        Some(env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn test_discovered_mixins_fill_manifest_attribute() {
    let scratch = TempDir::new().unwrap();
    let forge = build_artifact(
        scratch.path(),
        "forge",
        &[("mymod.mixins.json", "{\"package\": \"com.example.mymod.mixin\"}")],
    );

    let sink = RecordingSink::new();
    let request = request(scratch.path(), vec![PlatformArtifact::forge(Some(forge))]);
    let output = Merger::new(request, &sink).merge().unwrap();

    let manifest = merged_manifest(scratch.path(), &output);
    assert_eq!(
        manifest.get("MixinConfigs"),
        Some("forge-mymod.mixins.json")
    );

    // The renamed config is present and the mod descriptor would see it
    let paths = entry_paths(&output);
    assert!(paths.contains(&"forge-mymod.mixins.json".to_string()));
    assert!(!paths.contains(&"mymod.mixins.json".to_string()));
}

#[test]
fn test_text_references_follow_every_rename() {
    let scratch = TempDir::new().unwrap();
    let fabric = build_artifact(
        scratch.path(),
        "fabric",
        &[
            ("mymod.mixins.json", "{\"package\": \"com.example.mymod.mixin\"}"),
            (
                "fabric.mod.json",
                "{\"entrypoints\": [\"com.example.mymod.Init\"], \"mixins\": [\"mymod.mixins.json\"]}",
            ),
        ],
    );

    let sink = RecordingSink::new();
    let request = request(scratch.path(), vec![PlatformArtifact::fabric(Some(fabric))]);
    let output = Merger::new(request, &sink).merge().unwrap();

    let tree = scratch.path().join("inspect");
    archive::unpack(&output, &tree).unwrap();
    let descriptor = fs::read_to_string(tree.join("fabric.mod.json")).unwrap();
    assert_eq!(
        descriptor,
        "{\"entrypoints\": [\"fabric.com.example.mymod.Init\"], \"mixins\": [\"fabric-mymod.mixins.json\"]}\n"
    );
}

#[test]
fn test_group_references_prefixed_exactly_once() {
    let scratch = TempDir::new().unwrap();
    let fabric = build_artifact(
        scratch.path(),
        "fabric",
        &[(
            "fabric.mod.json",
            "{\"entrypoints\": [\"com.example.mymod.Init\"]}",
        )],
    );

    let sink = RecordingSink::new();
    let request = request(scratch.path(), vec![PlatformArtifact::fabric(Some(fabric))]);
    let output = Merger::new(request, &sink).merge().unwrap();

    let tree = scratch.path().join("inspect");
    archive::unpack(&output, &tree).unwrap();
    let descriptor = fs::read_to_string(tree.join("fabric.mod.json")).unwrap();
    // The byte relocation and the text pass must not stack prefixes
    assert_eq!(
        descriptor,
        "{\"entrypoints\": [\"fabric.com.example.mymod.Init\"]}\n"
    );
    assert!(!descriptor.contains("fabric.fabric."));
}

#[test]
fn test_duplicates_collapse_to_single_copy() {
    let scratch = TempDir::new().unwrap();
    let forge = build_artifact(
        scratch.path(),
        "forge",
        &[
            ("com/example/mymod/shared/Util.txt", "shared util"),
            ("com/example/mymod/ForgeMod.txt", "forge only"),
        ],
    );
    let fabric = build_artifact(
        scratch.path(),
        "fabric",
        &[
            ("com/example/mymod/shared/Util.txt", "shared util"),
            ("com/example/mymod/FabricMod.txt", "fabric only"),
        ],
    );

    let sink = RecordingSink::new();
    let mut request = request(
        scratch.path(),
        vec![
            PlatformArtifact::forge(Some(forge)),
            PlatformArtifact::fabric(Some(fabric)),
        ],
    );
    request.remove_duplicates = vec!["com.example.mymod.shared".to_string()];
    let output = Merger::new(request, &sink).merge().unwrap();

    let paths = entry_paths(&output);
    assert!(paths.contains(&"com/example/mymod/shared/Util.txt".to_string()));
    assert!(!paths
        .iter()
        .any(|p| p.starts_with("forge/com/example/mymod/shared")));
    assert!(!paths
        .iter()
        .any(|p| p.starts_with("fabric/com/example/mymod/shared")));

    // Platform-local code keeps its qualified namespace
    assert!(paths.contains(&"forge/com/example/mymod/ForgeMod.txt".to_string()));
    assert!(paths.contains(&"fabric/com/example/mymod/FabricMod.txt".to_string()));
}

#[test]
fn test_collapsed_names_rewritten_in_text() {
    let scratch = TempDir::new().unwrap();
    let forge = build_artifact(
        scratch.path(),
        "forge",
        &[
            ("com/example/mymod/shared/Util.txt", "shared util"),
            ("notes.txt", "uses com.example.mymod.shared.Util"),
        ],
    );

    let sink = RecordingSink::new();
    let mut request = request(scratch.path(), vec![PlatformArtifact::forge(Some(forge))]);
    request.remove_duplicates = vec!["com.example.mymod.shared".to_string()];
    let output = Merger::new(request, &sink).merge().unwrap();

    let tree = scratch.path().join("inspect");
    archive::unpack(&output, &tree).unwrap();
    let notes = fs::read_to_string(tree.join("notes.txt")).unwrap();
    // The per-platform text pass qualified the reference; the collapse pass
    // must bring it back to exactly the canonical name
    assert_eq!(notes, "uses com.example.mymod.shared.Util\n");
}

#[test]
fn test_existing_output_reused_without_work() {
    let scratch = TempDir::new().unwrap();
    let forge = build_artifact(scratch.path(), "forge", &[("a.txt", "x")]);

    let work = scratch.path().join("work");
    fs::create_dir_all(&work).unwrap();
    fs::write(work.join("mymod-merged.tar"), "pre-existing bytes").unwrap();

    let sink = RecordingSink::new();
    let mut request = request(scratch.path(), vec![PlatformArtifact::forge(Some(forge.clone()))]);
    request.reuse_existing = true;
    let output = Merger::new(request, &sink).merge().unwrap();

    // Nothing was rebuilt: the placeholder bytes and the source survive
    assert_eq!(fs::read_to_string(&output).unwrap(), "pre-existing bytes");
    assert!(forge.exists());
    assert!(!work.join("forge-temps").exists());
}

#[test]
fn test_custom_platform_joins_the_merge() {
    let scratch = TempDir::new().unwrap();
    let fabric = build_artifact(
        scratch.path(),
        "fabric",
        &[("com/example/mymod/Mod.txt", "fabric body")],
    );
    let sponge = build_artifact(
        scratch.path(),
        "sponge",
        &[("com/example/mymod/Mod.txt", "sponge body")],
    );

    let sink = RecordingSink::new();
    let request = request(
        scratch.path(),
        vec![
            PlatformArtifact::fabric(Some(fabric)),
            PlatformArtifact::custom("sponge", sponge),
        ],
    );
    let output = Merger::new(request, &sink).merge().unwrap();

    let paths = entry_paths(&output);
    assert!(paths.contains(&"fabric/com/example/mymod/Mod.txt".to_string()));
    assert!(paths.contains(&"sponge/com/example/mymod/Mod.txt".to_string()));
}
