//! End-to-end properties of extraction and diffing.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use difflog_core::{
    compare, compare_sources, diff, extract, extract_with, ChangeKind, DirectoryResolver, Error,
    ExtractOptions, GitWorktreeResolver, ParamKind, Revision, ScanOptions, SubChange,
};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

const WIDGETS_V1: &str = r#"
"""Widgets."""

class Widget:
    """A resizable widget."""

    def resize(self, w: int) -> None:
        self._w = w

    def _layout(self):
        pass

def _helper():
    pass
"#;

const WIDGETS_V2: &str = r#"
"""Widgets."""

class Widget:
    """A resizable widget."""

    def resize(self, w: int, h: int) -> None:
        self._w = w
        self._h = h

    def _layout(self, force=False):
        pass

def _helper(x):
    pass
"#;

fn package(root: &Path, widgets: &str) {
    write(root, "pkg/__init__.py", "from .widgets import Widget\n");
    write(root, "pkg/widgets.py", widgets);
}

#[test]
fn extraction_is_deterministic() {
    let dir = TempDir::new().unwrap();
    package(dir.path(), WIDGETS_V1);
    write(dir.path(), "pkg/zeta.py", "Z = 1\n");
    write(dir.path(), "pkg/alpha.py", "def a(): ...\n");

    let first = extract(dir.path()).unwrap();
    let second = extract(dir.path()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_json_pretty().unwrap(), second.to_json_pretty().unwrap());

    let names: Vec<_> = first.names().collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn identity_diff_is_empty() {
    let dir = TempDir::new().unwrap();
    package(dir.path(), WIDGETS_V1);
    let model = extract(dir.path()).unwrap();
    assert!(diff(&model, &model).is_empty());
}

#[test]
fn diff_is_symmetric() {
    let old = compare_sources(
        "def f(x): ...\ndef gone(): ...\nclass C(A): ...\n",
        "old.py",
        "def f(x, y=1): ...\ndef new(): ...\nclass C(B): ...\n",
        "new.py",
    )
    .unwrap();
    let back = compare_sources(
        "def f(x, y=1): ...\ndef new(): ...\nclass C(B): ...\n",
        "new.py",
        "def f(x): ...\ndef gone(): ...\nclass C(A): ...\n",
        "old.py",
    )
    .unwrap();

    let names = |changes: &[difflog_core::ChangeRecord]| -> BTreeSet<String> {
        changes.iter().map(|c| c.qualified_name.clone()).collect()
    };
    assert_eq!(names(&old.changes), names(&back.changes));

    let swapped = |kind: ChangeKind| match kind {
        ChangeKind::Added => ChangeKind::Removed,
        ChangeKind::Removed => ChangeKind::Added,
        other => other,
    };
    let forward: BTreeSet<_> = old
        .changes
        .iter()
        .map(|c| (c.qualified_name.clone(), swapped(c.change_kind)))
        .collect();
    let backward: BTreeSet<_> = back
        .changes
        .iter()
        .map(|c| (c.qualified_name.clone(), c.change_kind))
        .collect();
    assert_eq!(forward, backward);
}

#[test]
fn adding_symbols_only_yields_added_records() {
    let base = "def f(x): ...\nclass C:\n    def m(self): ...\n";
    let extended = format!("{}\ndef g(): ...\nclass D:\n    def n(self): ...\n", base);

    let result = compare_sources(base, "m.py", &extended, "m.py").unwrap();
    let records: Vec<_> = result
        .changes
        .iter()
        .map(|c| (c.qualified_name.as_str(), c.change_kind))
        .collect();
    assert_eq!(
        records,
        vec![
            ("D", ChangeKind::Added),
            ("D.n", ChangeKind::Added),
            ("g", ChangeKind::Added),
        ]
    );
}

#[test]
fn parameter_with_default_is_one_signature_change() {
    let result = compare_sources(
        "def f(x: int) -> int:\n    return x\n",
        "m.py",
        "def f(x: int, y: int = 0) -> int:\n    return x + y\n",
        "m.py",
    )
    .unwrap();

    assert_eq!(result.changes.len(), 1);
    let record = &result.changes[0];
    assert_eq!(record.qualified_name, "f");
    assert_eq!(record.change_kind, ChangeKind::SignatureChanged);
    assert_eq!(
        record.sub_changes,
        vec![SubChange::ParamAdded {
            name: "y".to_string(),
            kind: ParamKind::PositionalOrKeyword,
            default: Some("0".to_string()),
            annotation: Some("int".to_string()),
        }]
    );
    assert!(!result.has_breaking_changes());
}

#[test]
fn private_symbols_never_reported() {
    let dir = TempDir::new().unwrap();
    package(dir.path(), WIDGETS_V1);
    let model = extract(dir.path()).unwrap();
    assert!(model.names().all(|n| !n.contains("._") || n.contains(".__")));
    assert!(model.contains("pkg.Widget.resize"));
    assert!(!model.contains("pkg.Widget._layout"));
}

#[test]
fn widget_resize_end_to_end() {
    let old = TempDir::new().unwrap();
    let new = TempDir::new().unwrap();
    package(old.path(), WIDGETS_V1);
    package(new.path(), WIDGETS_V2);

    let resolver = DirectoryResolver::new(old.path().parent().unwrap());
    let name = |dir: &TempDir| dir.path().file_name().unwrap().to_string_lossy().to_string();
    let result = compare(
        &resolver,
        &Revision::Git(name(&old)),
        &Revision::Git(name(&new)),
        &ExtractOptions::default(),
    )
    .unwrap();

    assert_eq!(result.changes.len(), 1, "{:?}", result.changes);
    let record = &result.changes[0];
    assert_eq!(record.qualified_name, "pkg.Widget.resize");
    assert_eq!(record.change_kind, ChangeKind::SignatureChanged);
    assert_eq!(
        record.sub_changes,
        vec![SubChange::ParamAdded {
            name: "h".to_string(),
            kind: ParamKind::PositionalOrKeyword,
            default: None,
            annotation: Some("int".to_string()),
        }]
    );
    assert!(record.is_breaking());
}

fn git(dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com", "-c", "commit.gpgsign=false"])
        .args(args)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[test]
fn widget_resize_between_git_revisions() {
    let repo = TempDir::new().unwrap();
    if !git(repo.path(), &["init", "-q"]) {
        return;
    }
    package(repo.path(), WIDGETS_V1);
    assert!(git(repo.path(), &["add", "."]));
    assert!(git(repo.path(), &["commit", "-q", "-m", "v1"]));
    assert!(git(repo.path(), &["tag", "v1"]));
    package(repo.path(), WIDGETS_V2);

    let resolver = GitWorktreeResolver::new(repo.path());
    let result = compare(
        &resolver,
        &Revision::Git("v1".to_string()),
        &Revision::WorkingTree,
        &ExtractOptions::default(),
    )
    .unwrap();

    let records: Vec<_> = result
        .changes
        .iter()
        .map(|c| (c.qualified_name.as_str(), c.change_kind))
        .collect();
    assert_eq!(records, vec![("pkg.Widget.resize", ChangeKind::SignatureChanged)]);
}

#[test]
fn syntax_error_in_either_revision_fails() {
    let good = TempDir::new().unwrap();
    let bad = TempDir::new().unwrap();
    package(good.path(), WIDGETS_V1);
    package(bad.path(), "class Widget:\n    def resize(self, w: int -> None:\n        pass\n");

    let resolver = DirectoryResolver::new(good.path().parent().unwrap());
    let name = |dir: &TempDir| dir.path().file_name().unwrap().to_string_lossy().to_string();

    for (from, to) in [(name(&good), name(&bad)), (name(&bad), name(&good))] {
        let err = compare(
            &resolver,
            &Revision::Git(from),
            &Revision::Git(to),
            &ExtractOptions::default(),
        )
        .unwrap_err();
        match err {
            Error::Extraction { revision, path, .. } => {
                assert_eq!(revision, Some(name(&bad)));
                assert!(path.to_string_lossy().ends_with("widgets.py"));
            }
            other => panic!("expected extraction error, got {:?}", other),
        }
    }
}

#[test]
fn unknown_directory_is_resolver_error() {
    let dir = TempDir::new().unwrap();
    package(dir.path(), WIDGETS_V1);
    let resolver = DirectoryResolver::new(dir.path());
    let err = compare(
        &resolver,
        &Revision::Git("missing".to_string()),
        &Revision::WorkingTree,
        &ExtractOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Resolver { .. }));
}

#[test]
fn moving_a_reexported_definition_is_not_a_change() {
    let old = TempDir::new().unwrap();
    let new = TempDir::new().unwrap();
    write(old.path(), "pkg/__init__.py", "from ._old_home import Widget\n");
    write(old.path(), "pkg/_old_home.py", "class Widget:\n    def resize(self, w): ...\n");
    write(new.path(), "pkg/__init__.py", "from ._new_home import Widget\n");
    write(new.path(), "pkg/_new_home.py", "class Widget:\n    def resize(self, w): ...\n");

    let before = extract(old.path()).unwrap();
    let after = extract(new.path()).unwrap();
    assert_eq!(
        before.get("pkg.Widget").unwrap().canonical_source.as_deref(),
        Some("pkg._old_home.Widget")
    );
    assert!(diff(&before, &after).is_empty());
}

#[test]
fn kind_change_takes_priority() {
    let result = compare_sources(
        "def Thing(x: int) -> int: ...\n",
        "m.py",
        "class Thing(Base):\n    pass\n",
        "m.py",
    )
    .unwrap();
    assert_eq!(result.changes.len(), 1);
    assert_eq!(result.changes[0].change_kind, ChangeKind::KindChanged);
}

#[test]
fn dunder_all_limits_module_api() {
    let result = compare_sources(
        "__all__ = ['api']\ndef api(): ...\ndef internal_helper(): ...\n",
        "m.py",
        "__all__ = ['api']\ndef api(): ...\ndef internal_helper(x): ...\n",
        "m.py",
    )
    .unwrap();
    assert!(result.changes.is_empty());
}

#[test]
fn formatting_only_changes_are_ignored() {
    let result = compare_sources(
        "def f(x: Dict[str,int]={'a':1}) -> Optional[ int ]: ...\n",
        "m.py",
        "def f(\n    x: Dict[str, int] = {'a': 1},\n) -> Optional[int]:\n    ...\n",
        "m.py",
    )
    .unwrap();
    assert!(result.changes.is_empty(), "{:?}", result.changes);
}

#[test]
fn redundant_parentheses_are_ignored() {
    let result = compare_sources(
        "X = 1\ndef f(x: int = 0, y: str = 'a' and 'b') -> int: ...\n",
        "m.py",
        "X = (\n    1\n)\ndef f(x: (int) = ((0)), y: str = ('a'  and 'b')) -> (int): ...\n",
        "m.py",
    )
    .unwrap();
    assert!(result.changes.is_empty(), "{:?}", result.changes);
}

#[test]
fn renaming_to_private_is_one_removal() {
    let result = compare_sources("def api(): ...\n", "m.py", "def _api(): ...\n", "m.py").unwrap();
    let records: Vec<_> = result
        .changes
        .iter()
        .map(|c| (c.qualified_name.as_str(), c.change_kind))
        .collect();
    assert_eq!(records, vec![("api", ChangeKind::Removed)]);
    assert!(result.changes[0].is_breaking());
}

#[test]
fn private_definition_published_under_public_alias() {
    let old = TempDir::new().unwrap();
    let new = TempDir::new().unwrap();
    write(old.path(), "pkg/__init__.py", "from ._core import _Widget as Widget\n");
    write(old.path(), "pkg/_core.py", "class _Widget:\n    def resize(self, w): ...\n");
    write(new.path(), "pkg/__init__.py", "from ._core import _Widget as Widget\n");
    write(new.path(), "pkg/_core.py", "class _Widget:\n    def resize(self, w, h): ...\n");

    let before = extract(old.path()).unwrap();
    assert!(before.contains("pkg.Widget"));
    assert!(before.contains("pkg.Widget.resize"));
    assert!(!before.names().any(|n| n.contains("_Widget")));

    let after = extract(new.path()).unwrap();
    let changes = diff(&before, &after);
    assert_eq!(changes.len(), 1, "{:?}", changes);
    assert_eq!(changes[0].qualified_name, "pkg.Widget.resize");
    assert_eq!(changes[0].change_kind, ChangeKind::SignatureChanged);
}

#[cfg(unix)]
#[test]
fn symlinked_module_is_extracted() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "pkg/__init__.py", "");
    write(dir.path(), "shared/impl.py", "def tool(): ...\n");
    std::os::unix::fs::symlink(
        dir.path().join("shared/impl.py"),
        dir.path().join("pkg/impl.py"),
    )
    .unwrap();

    let options = ExtractOptions {
        scan: ScanOptions {
            packages: vec![PathBuf::from("pkg")],
            ..ScanOptions::default()
        },
        ..ExtractOptions::default()
    };
    let model = extract_with(dir.path(), &options).unwrap();
    assert!(model.contains("pkg.impl"));
    assert!(model.contains("pkg.impl.tool"));
}

#[cfg(unix)]
#[test]
fn dangling_symlink_fails_extraction() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "pkg/__init__.py", "def api(): ...\n");
    std::os::unix::fs::symlink(dir.path().join("missing.py"), dir.path().join("pkg/gone.py")).unwrap();

    let err = extract(dir.path()).unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{:?}", err);
}
