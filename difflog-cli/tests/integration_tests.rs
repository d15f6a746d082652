//! Integration tests for the difflog CLI
//!
//! Tests end-to-end command behavior using the CLI binary.
//! Uses tempfile for isolated test directories.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// Get the path to the difflog binary (built by cargo)
fn difflog_binary() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_difflog"));
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Run difflog with the given args in the specified directory
fn run_difflog(dir: &Path, args: &[&str]) -> Output {
    difflog_binary()
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to execute difflog command")
}

/// Get stdout as string
fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Get stderr as string
fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).expect("Failed to write sample file");
}

const WIDGETS_V1: &str = r#"
"""Widgets."""

class Widget:
    def resize(self, w: int) -> None:
        self._w = w

def make(kind: str = "box") -> Widget:
    return Widget()
"#;

const WIDGETS_V2: &str = r#"
"""Widgets."""

class Widget:
    def resize(self, w: int, h: int) -> None:
        self._w = w
        self._h = h

def make(kind: str = "box") -> Widget:
    return Widget()

def _private_helper():
    pass
"#;

/// Create `old/` and `new/` package trees under `dir`
fn setup_trees(dir: &Path) {
    write(dir, "old/pkg/__init__.py", "from .widgets import Widget, make\n");
    write(dir, "old/pkg/widgets.py", WIDGETS_V1);
    write(dir, "new/pkg/__init__.py", "from .widgets import Widget, make\n");
    write(dir, "new/pkg/widgets.py", WIDGETS_V2);
}

fn git(dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .current_dir(dir)
        .args([
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A git repository with `pkg` committed and tagged at v1, then edited to v2
/// in the working tree. Returns `None` when git is unavailable.
fn setup_repo() -> Option<TempDir> {
    let repo = TempDir::new().expect("Failed to create temp dir");
    if !git(repo.path(), &["init", "-q"]) {
        return None;
    }
    write(repo.path(), "pkg/__init__.py", "from .widgets import Widget, make\n");
    write(repo.path(), "pkg/widgets.py", WIDGETS_V1);
    assert!(git(repo.path(), &["add", "."]));
    assert!(git(repo.path(), &["commit", "-q", "-m", "v1"]));
    assert!(git(repo.path(), &["tag", "v1"]));
    write(repo.path(), "pkg/widgets.py", WIDGETS_V2);
    Some(repo)
}

// ============================================================================
// Dirs Command Tests
// ============================================================================

#[test]
fn test_dirs_reports_signature_change() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_trees(temp_dir.path());

    let output = run_difflog(temp_dir.path(), &["dirs", "old", "new"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("Signature changes (1):"), "got: {}", out);
    assert!(out.contains("pkg.Widget.resize: parameter 'h' added"), "got: {}", out);
    assert!(!out.contains("_private_helper"));
    assert!(!out.contains("pkg.make"));
}

#[test]
fn test_dirs_json_format_produces_valid_json() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_trees(temp_dir.path());

    let output = run_difflog(temp_dir.path(), &["dirs", "old", "new", "--format", "json"]);
    assert!(output.status.success());

    let json: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("Output should be valid JSON");
    assert_eq!(json["from"], "old");
    assert_eq!(json["to"], "new");
    let changes = json["changes"].as_array().unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["qualified_name"], "pkg.Widget.resize");
    assert_eq!(changes[0]["change_kind"], "signature_changed");
    assert_eq!(changes[0]["sub_changes"][0]["type"], "param_added");
    assert_eq!(json["summary"]["breaking_changes"], 1);
}

#[test]
fn test_dirs_markdown_format() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_trees(temp_dir.path());

    let output = run_difflog(temp_dir.path(), &["dirs", "old", "new", "--format", "markdown"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.starts_with("# API changes: `old` -> `new`"));
    assert!(out.contains("## Signature changes"));
    assert!(out.contains("- `pkg.Widget.resize`: parameter 'h' added **(breaking)**"));
}

#[test]
fn test_dirs_identical_trees_no_changes() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_trees(temp_dir.path());

    let output = run_difflog(temp_dir.path(), &["dirs", "old", "old", "--no-color"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No public API changes."));
}

#[test]
fn test_fail_on_breaking_exit_code() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_trees(temp_dir.path());

    let output = run_difflog(temp_dir.path(), &["dirs", "old", "new", "--fail-on-breaking"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("pkg.Widget.resize"));

    // Adding a symbol is not breaking
    write(temp_dir.path(), "newer/pkg/__init__.py", "from .widgets import Widget, make\nVERSION = '2'\n");
    write(temp_dir.path(), "newer/pkg/widgets.py", WIDGETS_V1);
    let output = run_difflog(temp_dir.path(), &["dirs", "old", "newer", "--fail-on-breaking"]);
    assert_eq!(output.status.code(), Some(0), "stdout: {}", stdout(&output));
    assert!(stdout(&output).contains("pkg.VERSION: constant added"));
}

#[test]
fn test_dirs_missing_directory_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_trees(temp_dir.path());

    let output = run_difflog(temp_dir.path(), &["dirs", "old", "missing"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).starts_with("error: "), "stderr: {}", stderr(&output));
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_dirs_syntax_error_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_trees(temp_dir.path());
    write(temp_dir.path(), "new/pkg/widgets.py", "def broken(:\n    pass\n");

    let output = run_difflog(temp_dir.path(), &["dirs", "old", "new"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("widgets.py"), "stderr: {}", err);
    assert!(stdout(&output).is_empty());
}

// ============================================================================
// Files Command Tests
// ============================================================================

#[test]
fn test_files_compares_single_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write(temp_dir.path(), "a.py", "def f(x: int) -> int:\n    return x\n");
    write(temp_dir.path(), "b.py", "def f(x: int, y: int = 0) -> int:\n    return x + y\n");

    let output = run_difflog(temp_dir.path(), &["files", "a.py", "b.py", "--no-color"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("  ~ f: parameter 'y' added (default 0)"), "got: {}", out);
}

#[test]
fn test_files_missing_file_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write(temp_dir.path(), "a.py", "X = 1\n");

    let output = run_difflog(temp_dir.path(), &["files", "a.py", "nope.py"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("nope.py"));
}

#[test]
fn test_files_at_git_revision() {
    let Some(repo) = setup_repo() else {
        return;
    };

    let output = run_difflog(
        repo.path(),
        &["files", "pkg/widgets.py", "pkg/widgets.py", "--from-rev", "v1", "--format", "json"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["from"], "v1:pkg/widgets.py");
    assert_eq!(json["changes"][0]["qualified_name"], "Widget.resize");
}

// ============================================================================
// Diff Command Tests
// ============================================================================

#[test]
fn test_diff_defaults_to_latest_tag_and_working_tree() {
    let Some(repo) = setup_repo() else {
        return;
    };

    let output = run_difflog(repo.path(), &["diff", "--format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["from"], "v1");
    assert_eq!(json["to"], "working tree");
    assert_eq!(json["changes"].as_array().unwrap().len(), 1);
    assert_eq!(json["changes"][0]["qualified_name"], "pkg.Widget.resize");

    // The checkout is cleaned up again
    let worktrees = Command::new("git")
        .current_dir(repo.path())
        .args(["worktree", "list"])
        .output()
        .unwrap();
    assert_eq!(stdout(&worktrees).lines().count(), 1);
}

#[test]
fn test_diff_between_two_revisions() {
    let Some(repo) = setup_repo() else {
        return;
    };
    assert!(git(repo.path(), &["commit", "-q", "-am", "v2"]));

    let output = run_difflog(
        repo.path(),
        &["diff", "--from-rev", "v1", "--to-rev", "HEAD", "--fail-on-breaking"],
    );
    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("pkg.Widget.resize"));

    let output = run_difflog(repo.path(), &["diff", "--from-rev", "HEAD", "--to-rev", "HEAD"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No public API changes."));
}

#[test]
fn test_diff_unknown_revision_fails() {
    let Some(repo) = setup_repo() else {
        return;
    };

    let output = run_difflog(repo.path(), &["diff", "--from-rev", "no-such-tag"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.starts_with("error: "), "stderr: {}", err);
    assert!(err.contains("no-such-tag"), "stderr: {}", err);
}

// ============================================================================
// Extract Command Tests
// ============================================================================

#[test]
fn test_extract_json_model() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_trees(temp_dir.path());

    let output = run_difflog(&temp_dir.path().join("new"), &["extract", "--format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["pkg.Widget.resize"]["kind"], "method");
    assert_eq!(json["pkg.make"]["kind"], "function");
    assert!(json.get("pkg.widgets._private_helper").is_none());
}

#[test]
fn test_extract_text_lists_symbols() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_trees(temp_dir.path());

    let output = run_difflog(temp_dir.path(), &["extract", "old", "--no-color"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("def resize(w: int) -> None"), "got: {}", out);
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_config_sets_default_format() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_trees(temp_dir.path());
    write(temp_dir.path(), ".difflog.toml", "[output]\nformat = \"json\"\n");

    let output = run_difflog(temp_dir.path(), &["dirs", "old", "new"]);
    assert!(output.status.success());
    assert!(serde_json::from_str::<serde_json::Value>(&stdout(&output)).is_ok());

    // CLI flag wins over the file
    let output = run_difflog(temp_dir.path(), &["dirs", "old", "new", "--format", "text"]);
    assert!(stdout(&output).starts_with("API DIFF:"));
}

#[test]
fn test_invalid_config_is_ignored_with_warning() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_trees(temp_dir.path());
    write(temp_dir.path(), ".difflog.toml", "[output\nformat = ");

    let output = run_difflog(temp_dir.path(), &["dirs", "old", "new", "--no-color"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("API DIFF:"));
    assert!(stderr(&output).contains(".difflog.toml"));
}

#[test]
fn test_config_excludes_paths() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    setup_trees(temp_dir.path());
    write(temp_dir.path(), "new/pkg/experimental/__init__.py", "def beta(): ...\n");
    write(temp_dir.path(), ".difflog.toml", "[extract]\nexclude = [\"experimental/\"]\n");

    let output = run_difflog(temp_dir.path(), &["dirs", "old", "new", "--format", "json"]);
    assert!(output.status.success());
    assert!(!stdout(&output).contains("experimental"));
}

#[test]
fn test_help_lists_commands() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = run_difflog(temp_dir.path(), &["--help"]);
    assert!(output.status.success());
    let out = stdout(&output);
    for cmd in ["diff", "dirs", "files", "extract"] {
        assert!(out.contains(cmd), "help should mention {}", cmd);
    }
}
