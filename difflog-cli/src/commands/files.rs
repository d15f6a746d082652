//! Files command - compare two versions of a single Python file
//!
//! Each side is read from disk, or from a git revision when `--from-rev` /
//! `--to-rev` is given, so `difflog files m.py m.py --from-rev v1` compares
//! one file across history.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use difflog_core::{compare_sources, git_file_content, Revision};

use super::diff::{emit, DiffReport};
use crate::output::OutputConfig;

/// Where one side of the comparison comes from.
struct Side<'a> {
    path: &'a Path,
    revision: Revision,
}

impl Side<'_> {
    fn label(&self) -> String {
        match self.revision {
            Revision::WorkingTree => self.path.display().to_string(),
            Revision::Git(ref rev) => format!("{}:{}", rev, self.path.display()),
        }
    }

    fn read(&self, repo: &Path) -> anyhow::Result<String> {
        match self.revision {
            Revision::WorkingTree => std::fs::read_to_string(self.path)
                .with_context(|| format!("failed to read {}", self.path.display())),
            Revision::Git(_) => {
                let path = self.path.to_string_lossy();
                git_file_content(repo, &self.revision, &path)
                    .with_context(|| format!("failed to read {}", self.label()))
            }
        }
    }
}

pub fn run(
    old_file: &Path,
    new_file: &Path,
    repo: &Path,
    from_rev: Option<&str>,
    to_rev: Option<&str>,
    fail_on_breaking: bool,
    config: &OutputConfig,
) -> anyhow::Result<ExitCode> {
    let old = Side {
        path: old_file,
        revision: from_rev.map(Revision::parse).unwrap_or(Revision::WorkingTree),
    };
    let new = Side {
        path: new_file,
        revision: to_rev.map(Revision::parse).unwrap_or(Revision::WorkingTree),
    };

    let old_source = old.read(repo)?;
    let new_source = new.read(repo)?;

    let diff = compare_sources(
        &old_source,
        &old_file.to_string_lossy(),
        &new_source,
        &new_file.to_string_lossy(),
    )
    .with_context(|| format!("failed to compare {} with {}", old.label(), new.label()))?;

    let report = DiffReport::new(old.label(), new.label(), diff);
    Ok(emit(&report, config, fail_on_breaking))
}
