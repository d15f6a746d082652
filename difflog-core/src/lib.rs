//! difflog core - Public API diffing for Python codebases.
//!
//! This crate extracts a normalized model of a Python package's public API
//! from source, without importing or executing it, and computes a precise,
//! deterministic diff between two such models.
//!
//! # Features
//!
//! - **Non-executing extraction**: tree-sitter parse of every module
//! - **Parallel parsing**: files of a tree are parsed concurrently using Rayon
//! - **Classified changes**: added, removed, signature, annotation, base class,
//!   kind, decorator and value changes, with parameter-level detail
//! - **Revision checkout**: git revisions are materialized as temporary worktrees
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use difflog_core::{compare, ExtractOptions, GitWorktreeResolver, Revision};
//!
//! let resolver = GitWorktreeResolver::new(Path::new("."));
//! let diff = compare(
//!     &resolver,
//!     &Revision::Git("v1.0.0".to_string()),
//!     &Revision::WorkingTree,
//!     &ExtractOptions::default(),
//! )?;
//! for change in &diff.changes {
//!     println!("{}", change.describe());
//! }
//! # Ok::<(), difflog_core::Error>(())
//! ```

pub mod differ;
pub mod error;
pub mod extractor;
pub mod model;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod types;

use tracing::debug;

pub use differ::{diff, diff_models, ApiDiff, ChangeKind, ChangeRecord, DiffSummary, SubChange};
pub use error::{Error, Result};
pub use extractor::{extract, extract_source, extract_with, ExtractOptions};
pub use model::{ApiModel, ParamKind, Parameter, Signature, Symbol, SymbolKind};
pub use resolver::{
    default_base_revision, git_file_content, DirectoryResolver, GitWorktreeResolver, Revision,
    RevisionResolver, SourceTree,
};
pub use scanner::ScanOptions;

/// Compare the public API of two revisions.
///
/// Both revisions are materialized before anything is parsed, so an unknown
/// revision is reported before any extraction error. The two trees are then
/// extracted in parallel; an extraction error names the revision it came from.
pub fn compare<R>(resolver: &R, from: &Revision, to: &Revision, options: &ExtractOptions) -> Result<ApiDiff>
where
    R: RevisionResolver + ?Sized,
{
    let before_tree = resolver.materialize(from)?;
    let after_tree = resolver.materialize(to)?;
    debug!(from = %from, to = %to, "comparing revisions");

    let (before, after) = rayon::join(
        || extract_with(before_tree.root(), options),
        || extract_with(after_tree.root(), options),
    );
    let before = before.map_err(|e| e.at_revision(&from.label()))?;
    let after = after.map_err(|e| e.at_revision(&to.label()))?;

    Ok(diff_models(&before, &after))
}

/// Compare two versions of a single Python file.
///
/// Symbols are named relative to the file, e.g. `Widget.resize`.
pub fn compare_sources(old_source: &str, old_path: &str, new_source: &str, new_path: &str) -> Result<ApiDiff> {
    let (before, after) = rayon::join(
        || extract_source(old_source, old_path),
        || extract_source(new_source, new_path),
    );
    Ok(diff_models(&before?, &after?))
}

/// Get the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
