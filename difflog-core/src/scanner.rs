//! Python module discovery using the `ignore` crate.
//!
//! Finds the importable modules of a source tree: every `.py` file reachable
//! through a chain of packages (directories holding `__init__.py`), plus the
//! top-level modules of the source base. Walking honors `.gitignore` and a set
//! of gitignore-style exclude globs.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Directories never scanned unless the caller replaces the exclude list.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "tests/",
    "test/",
    "docs/",
    "build/",
    ".venv/",
    "venv/",
    "__pycache__/",
];

/// Top-level scripts that are tooling rather than library modules.
const TOOLING_FILES: &[&str] = &["setup.py", "conftest.py", "noxfile.py", "fabfile.py", "manage.py"];

/// Where and what to scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Package directories relative to the root. Empty means autodetect.
    pub packages: Vec<PathBuf>,
    /// Gitignore-style globs excluded from the walk.
    pub exclude: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            packages: Vec::new(),
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A discovered module file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFile {
    /// Dotted module name (`pkg.sub.mod`).
    pub name: String,
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Path relative to the scanned root, `/`-separated.
    pub relative_path: String,
    /// Whether the file is a package `__init__.py`.
    pub is_package: bool,
}

/// Whether a module, class or attribute name is public by naming convention.
///
/// Dunder names (`__init__`, `__version__`) are public; any other name with a
/// leading underscore is private.
pub fn is_public_name(name: &str) -> bool {
    !name.starts_with('_') || is_dunder(name)
}

pub fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn is_package_dir(dir: &Path) -> bool {
    dir.join("__init__.py").is_file()
}

/// The directory module names are computed from: `root/src` when it holds a
/// package, otherwise `root`.
pub fn source_base(root: &Path) -> PathBuf {
    let src = root.join("src");
    if src.is_dir() {
        if let Ok(entries) = std::fs::read_dir(&src) {
            let has_package = entries
                .filter_map(|e| e.ok())
                .any(|e| e.path().is_dir() && is_package_dir(&e.path()));
            if has_package {
                return src;
            }
        }
    }
    root.to_path_buf()
}

/// Discover the modules of a source tree, sorted by module name.
pub fn discover_modules(root: &Path, options: &ScanOptions) -> Result<Vec<ModuleFile>> {
    if !root.is_dir() {
        return Err(Error::Io {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "source root is not a directory"),
        });
    }

    // (walk root, base for module names)
    let mut scan_roots: Vec<(PathBuf, PathBuf)> = Vec::new();
    if options.packages.is_empty() {
        let base = source_base(root);
        scan_roots.push((base.clone(), base));
    } else {
        for package in &options.packages {
            let dir = root.join(package);
            if !dir.is_dir() {
                return Err(Error::Io {
                    path: dir,
                    source: io::Error::new(io::ErrorKind::NotFound, "declared package directory not found"),
                });
            }
            let base = match dir.parent() {
                Some(parent) if is_package_dir(&dir) => parent.to_path_buf(),
                _ => dir.clone(),
            };
            scan_roots.push((dir, base));
        }
    }

    let mut modules: BTreeMap<String, ModuleFile> = BTreeMap::new();
    for (walk_root, base) in &scan_roots {
        for path in walk_python_files(walk_root, &options.exclude)? {
            if let Some(module) = module_for_path(root, base, &path) {
                modules.entry(module.name.clone()).or_insert(module);
            }
        }
    }

    debug!(root = %root.display(), count = modules.len(), "discovered modules");
    Ok(modules.into_values().collect())
}

/// All `.py` files under `walk_root`, symlinks followed.
///
/// Any entry the walker cannot read fails the whole walk: a skipped file would
/// show up as removed API.
fn walk_python_files(walk_root: &Path, exclude: &[String]) -> Result<Vec<PathBuf>> {
    let mut builder = WalkBuilder::new(walk_root);
    builder
        .hidden(true) // skip .venv, .tox, .git
        .git_ignore(true)
        .git_exclude(true)
        .git_global(false)
        .require_git(false)
        .parents(false)
        .follow_links(true);

    if !exclude.is_empty() {
        let mut override_builder = OverrideBuilder::new(walk_root);
        for pattern in exclude {
            // A leading `!` turns an override glob into an ignore rule.
            if let Err(e) = override_builder.add(&format!("!{}", pattern)) {
                warn!(pattern = %pattern, error = %e, "invalid exclude pattern");
            }
        }
        match override_builder.build() {
            Ok(overrides) => {
                builder.overrides(overrides);
            }
            Err(e) => warn!(error = %e, "ignoring exclude patterns"),
        }
    }

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = entry.map_err(|e| walk_error(walk_root, e))?;
        let path = entry.path();
        if path.extension().map_or(true, |ext| ext != "py") {
            continue;
        }
        match entry.file_type() {
            Some(ft) if ft.is_file() => files.push(entry.into_path()),
            Some(ft) if ft.is_dir() => {}
            _ if entry.path_is_symlink() => {
                return Err(Error::Io {
                    path: path.to_path_buf(),
                    source: io::Error::new(io::ErrorKind::InvalidData, "symlink does not point to a file"),
                });
            }
            _ => {}
        }
    }
    Ok(files)
}

/// Turn a walker error into an I/O error naming the offending path.
fn walk_error(walk_root: &Path, err: ignore::Error) -> Error {
    let path = match err {
        ignore::Error::WithPath { ref path, .. } => path.clone(),
        _ => walk_root.to_path_buf(),
    };
    let message = err.to_string();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message));
    Error::Io { path, source }
}

/// Map a file to its module, or `None` if it is not importable API.
fn module_for_path(root: &Path, base: &Path, path: &Path) -> Option<ModuleFile> {
    let rel = path.strip_prefix(base).ok()?;
    let segments: Vec<&str> = rel.iter().filter_map(|s| s.to_str()).collect();
    let (file_name, dirs) = segments.split_last()?;
    let stem = file_name.strip_suffix(".py")?;

    if dirs.is_empty() && TOOLING_FILES.contains(file_name) {
        return None;
    }

    // Every directory between the base and the file must be a package.
    let mut dir = base.to_path_buf();
    for segment in dirs {
        dir.push(segment);
        if !is_package_dir(&dir) {
            return None;
        }
    }

    let is_package = stem == "__init__";
    if is_package && dirs.is_empty() {
        return None;
    }

    let mut name_segments: Vec<&str> = dirs.to_vec();
    if !is_package {
        name_segments.push(stem);
    }
    // Private modules are still discovered: their symbols may be re-exported
    // from a public package.
    if stem == "__main__" || name_segments.iter().any(|s| !is_identifier(s)) {
        return None;
    }

    let relative_path = path
        .strip_prefix(root)
        .unwrap_or(path)
        .iter()
        .filter_map(|s| s.to_str())
        .collect::<Vec<_>>()
        .join("/");

    Some(ModuleFile {
        name: name_segments.join("."),
        path: path.to_path_buf(),
        relative_path,
        is_package,
    })
}
