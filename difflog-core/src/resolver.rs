//! Revision resolution: turning a revision identifier into a source tree.
//!
//! Git revisions are checked out with `git worktree add --detach` into a
//! temporary directory, so the caller's working tree is never touched and
//! two revisions can be materialized at the same time. The checkout is
//! removed again when the [`SourceTree`] is dropped.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// A revision to compare.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Revision {
    /// The files currently on disk, including uncommitted changes.
    WorkingTree,
    /// Anything `git rev-parse` understands: a tag, branch, or commit hash.
    Git(String),
}

impl Revision {
    /// Parse a user-supplied revision. `WORKING` (any case) and the empty
    /// string name the working tree.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("working") {
            Revision::WorkingTree
        } else {
            Revision::Git(s.to_string())
        }
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::WorkingTree => f.write_str("working tree"),
            Revision::Git(rev) => f.write_str(rev),
        }
    }
}

/// Something that can be extracted: a directory on disk, possibly owned.
#[derive(Debug)]
pub struct SourceTree {
    root: PathBuf,
    checkout: Option<Checkout>,
}

impl SourceTree {
    /// A tree that is not owned and is left alone on drop.
    pub fn borrowed(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            checkout: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the tree is a temporary checkout.
    pub fn is_checkout(&self) -> bool {
        self.checkout.is_some()
    }
}

/// A registered git worktree inside a temporary directory.
#[derive(Debug)]
struct Checkout {
    repo: PathBuf,
    path: PathBuf,
    // Held for its Drop; removes whatever git left behind.
    _dir: TempDir,
}

impl Drop for Checkout {
    fn drop(&mut self) {
        let result = Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .args(["worktree", "remove", "--force"])
            .arg(&self.path)
            .output();
        match result {
            Ok(output) if output.status.success() => {
                info!(path = %self.path.display(), "removed worktree");
            }
            Ok(output) => {
                warn!(
                    path = %self.path.display(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "failed to remove worktree"
                );
                let _ = Command::new("git")
                    .arg("-C")
                    .arg(&self.repo)
                    .args(["worktree", "prune"])
                    .output();
            }
            Err(e) => warn!(error = %e, "failed to run git worktree remove"),
        }
    }
}

/// Turns revisions into source trees.
pub trait RevisionResolver: Sync {
    fn materialize(&self, revision: &Revision) -> Result<SourceTree>;
}

fn run_git(repo: &Path, args: &[&str], revision: &str) -> Result<Output> {
    debug!(repo = %repo.display(), ?args, "git");
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .map_err(|e| Error::resolver(revision, format!("failed to run git: {}", e)))
}

fn stderr_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("git exited with {}", output.status)
    } else {
        stderr
    }
}

/// Resolves git revisions of one repository with temporary worktrees.
#[derive(Clone, Debug)]
pub struct GitWorktreeResolver {
    repo: PathBuf,
}

impl GitWorktreeResolver {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// Full commit hash of `rev`, or a resolver error if it names no commit.
    pub fn verify(&self, rev: &str) -> Result<String> {
        let spec = format!("{}^{{commit}}", rev);
        let output = run_git(&self.repo, &["rev-parse", "--verify", "--quiet", &spec], rev)?;
        if !output.status.success() {
            return Err(Error::resolver(rev, "unknown revision or not a commit"));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Location of `repo` relative to the top of its repository (`""` at the top).
    fn prefix(&self, rev: &str) -> Result<PathBuf> {
        let output = run_git(&self.repo, &["rev-parse", "--show-prefix"], rev)?;
        if !output.status.success() {
            return Err(Error::resolver(rev, stderr_message(&output)));
        }
        Ok(PathBuf::from(String::from_utf8_lossy(&output.stdout).trim()))
    }
}

impl RevisionResolver for GitWorktreeResolver {
    fn materialize(&self, revision: &Revision) -> Result<SourceTree> {
        let rev = match revision {
            Revision::WorkingTree => return Ok(SourceTree::borrowed(&self.repo)),
            Revision::Git(rev) => rev.as_str(),
        };

        let commit = self.verify(rev)?;
        let prefix = self.prefix(rev)?;

        let dir = tempfile::Builder::new()
            .prefix("difflog-")
            .tempdir()
            .map_err(|e| Error::resolver(rev, format!("cannot create temporary directory: {}", e)))?;
        let path = dir.path().join("tree");
        let path_arg = path.to_string_lossy().to_string();

        let output = run_git(&self.repo, &["worktree", "add", "--detach", &path_arg, &commit], rev)?;
        if !output.status.success() {
            return Err(Error::resolver(rev, stderr_message(&output)));
        }
        info!(revision = rev, commit = %commit, path = %path.display(), "created worktree");

        let root = if prefix.as_os_str().is_empty() {
            path.clone()
        } else {
            path.join(&prefix)
        };
        Ok(SourceTree {
            root,
            checkout: Some(Checkout {
                repo: self.repo.clone(),
                path,
                _dir: dir,
            }),
        })
    }
}

/// Resolves revisions as plain directories relative to a base directory.
#[derive(Clone, Debug)]
pub struct DirectoryResolver {
    base: PathBuf,
}

impl DirectoryResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl RevisionResolver for DirectoryResolver {
    fn materialize(&self, revision: &Revision) -> Result<SourceTree> {
        let path = match revision {
            Revision::WorkingTree => self.base.clone(),
            Revision::Git(name) => self.base.join(name),
        };
        if !path.is_dir() {
            return Err(Error::resolver(revision.label(), format!("{} is not a directory", path.display())));
        }
        Ok(SourceTree::borrowed(path))
    }
}

/// The revision to compare against by default: the latest tag reachable from
/// `HEAD`, else `HEAD^`.
pub fn default_base_revision(repo: &Path) -> Result<Revision> {
    let output = run_git(repo, &["describe", "--tags", "--abbrev=0"], "HEAD")?;
    if output.status.success() {
        let tag = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !tag.is_empty() {
            debug!(tag = %tag, "using latest tag as base revision");
            return Ok(Revision::Git(tag));
        }
    }

    let resolver = GitWorktreeResolver::new(repo);
    resolver
        .verify("HEAD^")
        .map(|_| Revision::Git("HEAD^".to_string()))
        .map_err(|_| Error::resolver("HEAD^", "repository has no tags and HEAD has no parent commit"))
}

/// Contents of `path` (relative to `repo`) at `revision`.
pub fn git_file_content(repo: &Path, revision: &Revision, path: &str) -> Result<String> {
    match revision {
        Revision::WorkingTree => {
            let full = repo.join(path);
            std::fs::read_to_string(&full).map_err(|source| Error::Io { path: full, source })
        }
        Revision::Git(rev) => {
            // `./` makes the path relative to `repo` rather than the repository top.
            let spec = format!("{}:./{}", rev, path.trim_start_matches("./"));
            let output = run_git(repo, &["show", &spec], rev)?;
            if !output.status.success() {
                return Err(Error::resolver(rev.as_str(), stderr_message(&output)));
            }
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }
    }
}
