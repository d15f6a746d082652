//! Diff command - public API diff between two git revisions
//!
//! Both revisions are checked out into temporary worktrees, extracted, and
//! compared. The report is shared by the `dirs` and `files` commands.

use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use colored::Colorize;
use difflog_core::{
    compare, default_base_revision, ApiDiff, ChangeKind, ChangeRecord, ExtractOptions,
    GitWorktreeResolver, Revision,
};
use serde::Serialize;
use tracing::debug;

use crate::output::{self, markdown, OutputConfig, Outputter};

/// Exit code for a successful run that found breaking changes under
/// `--fail-on-breaking`.
pub const BREAKING_EXIT_CODE: u8 = 2;

/// Diff result with the labels of the two compared sides.
#[derive(Debug, Serialize)]
pub struct DiffReport {
    pub from: String,
    pub to: String,
    #[serde(flatten)]
    pub diff: ApiDiff,
}

impl DiffReport {
    pub fn new(from: impl Into<String>, to: impl Into<String>, diff: ApiDiff) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            diff,
        }
    }

    /// Records grouped by change kind, in report order, skipping empty groups.
    fn sections(&self) -> Vec<(ChangeKind, Vec<&ChangeRecord>)> {
        ChangeKind::ALL
            .iter()
            .map(|kind| (*kind, self.diff.by_kind(*kind).collect::<Vec<_>>()))
            .filter(|(_, records)| !records.is_empty())
            .collect()
    }
}

/// The part of a record description after the qualified name.
fn detail(record: &ChangeRecord) -> String {
    let described = record.describe();
    match described.split_once(": ") {
        Some((_, rest)) => rest.to_string(),
        None => described,
    }
}

impl Outputter for DiffReport {
    fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{} {} -> {}\n",
            "API DIFF:".cyan().bold(),
            self.from.yellow(),
            self.to.green()
        ));

        if !self.diff.has_changes() {
            output.push_str(&format!("{}\n", "No public API changes.".dimmed()));
            return output;
        }
        output.push_str(&format!("{}\n", self.diff.summary.text()));

        for (kind, records) in self.sections() {
            output.push('\n');
            let title = format!("{} ({}):", kind.title(), records.len());
            let title = match kind {
                ChangeKind::Added => title.green().bold(),
                ChangeKind::Removed => title.red().bold(),
                _ => title.yellow().bold(),
            };
            output.push_str(&format!("{}\n", title));

            for record in records {
                let name = match kind {
                    ChangeKind::Added => record.qualified_name.green(),
                    ChangeKind::Removed => record.qualified_name.red(),
                    _ => record.qualified_name.yellow(),
                };
                let marker = if record.is_breaking() {
                    "⚠"
                } else {
                    match kind {
                        ChangeKind::Added => "+",
                        ChangeKind::Removed => "-",
                        _ => "~",
                    }
                };
                output.push_str(&format!("  {} {}: {}\n", marker, name, detail(record)));
            }
        }

        output
    }

    fn to_markdown(&self) -> String {
        let mut output = markdown::heading(
            1,
            &format!(
                "API changes: {} -> {}",
                markdown::code(&self.from),
                markdown::code(&self.to)
            ),
        );
        output.push('\n');

        if !self.diff.has_changes() {
            output.push_str("No public API changes.\n");
            return output;
        }
        output.push_str(&format!("{}\n", self.diff.summary.text()));

        for (kind, records) in self.sections() {
            output.push('\n');
            output.push_str(&markdown::heading(2, kind.title()));
            output.push('\n');
            for record in records {
                let breaking = if record.is_breaking() { " **(breaking)**" } else { "" };
                output.push_str(&format!(
                    "- {}: {}{}\n",
                    markdown::code(&record.qualified_name),
                    markdown::escape(&detail(record)),
                    breaking
                ));
            }
        }

        output
    }
}

/// Print the report and pick the exit code.
pub fn emit(report: &DiffReport, config: &OutputConfig, fail_on_breaking: bool) -> ExitCode {
    output::print(report, config);
    if fail_on_breaking && report.diff.has_breaking_changes() {
        ExitCode::from(BREAKING_EXIT_CODE)
    } else {
        ExitCode::SUCCESS
    }
}

/// Run the diff command.
pub fn run(
    repo: &Path,
    from_rev: Option<&str>,
    to_rev: Option<&str>,
    fail_on_breaking: bool,
    options: &ExtractOptions,
    config: &OutputConfig,
) -> anyhow::Result<ExitCode> {
    let start = Instant::now();

    let from = match from_rev {
        Some(rev) => Revision::parse(rev),
        None => default_base_revision(repo)
            .context("no --from-rev given and no default base revision found")?,
    };
    let to = to_rev.map(Revision::parse).unwrap_or(Revision::WorkingTree);

    let resolver = GitWorktreeResolver::new(repo);
    let diff = compare(&resolver, &from, &to, options)
        .with_context(|| format!("failed to compare {} with {}", from, to))?;

    debug!(
        changes = diff.changes.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "diff complete"
    );

    let report = DiffReport::new(from.label(), to.label(), diff);
    Ok(emit(&report, config, fail_on_breaking))
}

#[cfg(test)]
mod tests {
    use super::*;
    use difflog_core::compare_sources;

    fn report(old: &str, new: &str) -> DiffReport {
        let diff = compare_sources(old, "old.py", new, "new.py").unwrap();
        DiffReport::new("old.py", "new.py", diff)
    }

    #[test]
    fn test_text_groups_by_kind() {
        colored::control::set_override(false);
        let text = report(
            "def f(x): ...\ndef gone(): ...\n",
            "def f(x, y=1): ...\ndef new(): ...\n",
        )
        .to_text();

        assert!(text.starts_with("API DIFF: old.py -> new.py\n"));
        assert!(text.contains("Added (1):\n  + new: function added\n"));
        assert!(text.contains("Removed (1):\n  ⚠ gone: function removed\n"));
        assert!(text.contains("Signature changes (1):\n  ~ f: parameter 'y' added (default 1)\n"));
        assert!(text.find("Added").unwrap() < text.find("Removed").unwrap());
    }

    #[test]
    fn test_text_no_changes() {
        colored::control::set_override(false);
        let text = report("def f(): ...\n", "def f(): ...\n").to_text();
        assert!(text.contains("No public API changes."));
    }

    #[test]
    fn test_markdown_sections() {
        let md = report("def f(x): ...\n", "def f(): ...\n").to_markdown();
        assert!(md.starts_with("# API changes: `old.py` -> `new.py`\n"));
        assert!(md.contains("## Signature changes\n\n- `f`: parameter 'x' removed **(breaking)**\n"));
    }

    #[test]
    fn test_json_has_summary_and_labels() {
        let json = report("X = 1\n", "X = 2\n").to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["from"], "old.py");
        assert_eq!(value["changes"][0]["change_kind"], "value_changed");
        assert_eq!(value["summary"]["value_changed"], 1);
    }

    #[test]
    fn test_detail_strips_name() {
        let diff = compare_sources("def f(): ...\n", "a.py", "", "b.py").unwrap();
        assert_eq!(detail(&diff.changes[0]), "function removed");
    }
}
