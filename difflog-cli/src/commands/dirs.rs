//! Dirs command - compare two source trees on disk

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use difflog_core::{compare, DirectoryResolver, ExtractOptions, Revision};

use super::diff::{emit, DiffReport};
use crate::output::OutputConfig;

pub fn run(
    old_dir: &Path,
    new_dir: &Path,
    fail_on_breaking: bool,
    options: &ExtractOptions,
    config: &OutputConfig,
) -> anyhow::Result<ExitCode> {
    // Paths are taken as given: absolute ones replace the base on join.
    let resolver = DirectoryResolver::new(".");
    let from = Revision::Git(old_dir.display().to_string());
    let to = Revision::Git(new_dir.display().to_string());

    let diff = compare(&resolver, &from, &to, options).with_context(|| {
        format!(
            "failed to compare {} with {}",
            old_dir.display(),
            new_dir.display()
        )
    })?;

    let report = DiffReport::new(from.label(), to.label(), diff);
    Ok(emit(&report, config, fail_on_breaking))
}
