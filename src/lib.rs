//! Platfuse - Multi-platform artifact merger
//!
//! This crate merges several platform-specific build artifacts of one project
//! (forge, neoforge, fabric, quilt, plus caller-defined platforms) into a
//! single archive whose namespaces never collide, by relocating each
//! platform's code under a platform-qualified prefix, renaming loose
//! resources, merging manifests, and optionally collapsing declared shared
//! symbols back to a single copy.

pub mod archive;
pub mod config;
pub mod diag;
pub mod duplicate;
pub mod manifest;
pub mod merge;
pub mod plan;
pub mod platform;
pub mod relocate;
pub mod resource;

pub use config::{ConfigError, MergeConfig};
pub use diag::{ConsoleSink, DiagnosticSink, RecordingSink};
pub use merge::{MergeError, MergeRequest, Merger};
pub use platform::PlatformArtifact;
