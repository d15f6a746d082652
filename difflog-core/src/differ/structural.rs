//! Generic structural comparison of two JSON trees.
//!
//! The differ serializes each symbol into a comparable view and hands both
//! views to [`diff_values`], which reports where they differ as a flat list of
//! [`Delta`]s. Nothing in this module knows about Python.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use regex::Regex;
use serde_json::Value;

/// One step in a path into a JSON tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object field, or element of a keyed array identified by its key.
    Key(String),
    /// Element of a positional array.
    Index(usize),
}

/// What happened at a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaKind {
    Added,
    Removed,
    ValueChanged,
    TypeChanged,
    /// Common elements of an ordered keyed array changed their relative order.
    /// `before` / `after` hold the keys in each order.
    Reordered,
}

/// A single difference between two trees.
#[derive(Clone, Debug, PartialEq)]
pub struct Delta {
    pub path: Vec<PathSegment>,
    pub kind: DeltaKind,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl Delta {
    /// Dotted form of the path (`signature.parameters.x.default`, `bases[1]`).
    pub fn dotted_path(&self) -> String {
        dotted(&self.path)
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Value>| v.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{:?} {}: {} -> {}",
            self.kind,
            self.dotted_path(),
            show(&self.before),
            show(&self.after)
        )
    }
}

fn dotted(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Index(i) => out.push_str(&format!("[{}]", i)),
        }
    }
    out
}

/// Comparison options. Patterns match the dotted path of a node.
#[derive(Clone, Debug, Default)]
pub struct DiffOptions {
    exclude_paths: Vec<Regex>,
    keyed_arrays: Vec<(Regex, String)>,
    unordered_arrays: Vec<Regex>,
}

impl DiffOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip every node whose dotted path matches `pattern`.
    pub fn exclude_path(mut self, pattern: Regex) -> Self {
        self.exclude_paths.push(pattern);
        self
    }

    /// Match elements of arrays at `pattern` by their `key` field instead of
    /// by position.
    pub fn keyed_array(mut self, pattern: Regex, key: impl Into<String>) -> Self {
        self.keyed_arrays.push((pattern, key.into()));
        self
    }

    /// Ignore element order of keyed arrays at `pattern`.
    pub fn unordered_array(mut self, pattern: Regex) -> Self {
        self.unordered_arrays.push(pattern);
        self
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.exclude_paths.iter().any(|re| re.is_match(path))
    }

    fn array_key(&self, path: &str) -> Option<&str> {
        self.keyed_arrays
            .iter()
            .find(|(re, _)| re.is_match(path))
            .map(|(_, key)| key.as_str())
    }

    fn is_unordered(&self, path: &str) -> bool {
        self.unordered_arrays.iter().any(|re| re.is_match(path))
    }
}

/// Compare two JSON trees.
///
/// Deltas come out in a deterministic order: object fields in sorted key
/// order, array elements in before/after order.
pub fn diff_values(before: &Value, after: &Value, options: &DiffOptions) -> Vec<Delta> {
    let mut out = Vec::new();
    let mut path = Vec::new();
    diff_node(&mut path, before, after, options, &mut out);
    out
}

fn push(out: &mut Vec<Delta>, path: &[PathSegment], kind: DeltaKind, before: Option<&Value>, after: Option<&Value>) {
    out.push(Delta {
        path: path.to_vec(),
        kind,
        before: before.cloned(),
        after: after.cloned(),
    });
}

fn diff_node(path: &mut Vec<PathSegment>, before: &Value, after: &Value, options: &DiffOptions, out: &mut Vec<Delta>) {
    if before == after {
        return;
    }
    let dotted_path = dotted(path);
    if !path.is_empty() && options.is_excluded(&dotted_path) {
        return;
    }

    match (before, after) {
        (Value::Object(a), Value::Object(b)) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            for key in keys {
                path.push(PathSegment::Key(key.clone()));
                match (a.get(key), b.get(key)) {
                    (Some(x), Some(y)) => diff_node(path, x, y, options, out),
                    (x, y) => {
                        if !options.is_excluded(&dotted(path)) {
                            let kind = if x.is_some() { DeltaKind::Removed } else { DeltaKind::Added };
                            push(out, path, kind, x, y);
                        }
                    }
                }
                path.pop();
            }
        }
        (Value::Array(a), Value::Array(b)) => match options.array_key(&dotted_path) {
            Some(key) => {
                let ordered = !options.is_unordered(&dotted_path);
                diff_keyed(path, a, b, key, ordered, options, out);
            }
            None => diff_positional(path, a, b, options, out),
        },
        _ => {
            let kind = if same_type(before, after) {
                DeltaKind::ValueChanged
            } else {
                DeltaKind::TypeChanged
            };
            push(out, path, kind, Some(before), Some(after));
        }
    }
}

fn same_type(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

fn element_key(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => value.to_string(),
    }
}

fn diff_keyed(
    path: &mut Vec<PathSegment>,
    before: &[Value],
    after: &[Value],
    key: &str,
    ordered: bool,
    options: &DiffOptions,
    out: &mut Vec<Delta>,
) {
    let before_keys: Vec<String> = before.iter().map(|v| element_key(v, key)).collect();
    let after_keys: Vec<String> = after.iter().map(|v| element_key(v, key)).collect();
    let after_index: HashMap<&str, usize> = after_keys
        .iter()
        .enumerate()
        .map(|(i, k)| (k.as_str(), i))
        .collect();
    let before_index: HashMap<&str, usize> = before_keys
        .iter()
        .enumerate()
        .map(|(i, k)| (k.as_str(), i))
        .collect();

    for (i, k) in before_keys.iter().enumerate() {
        path.push(PathSegment::Key(k.clone()));
        match after_index.get(k.as_str()) {
            Some(&j) => diff_node(path, &before[i], &after[j], options, out),
            None => push(out, path, DeltaKind::Removed, Some(&before[i]), None),
        }
        path.pop();
    }
    for (j, k) in after_keys.iter().enumerate() {
        if !before_index.contains_key(k.as_str()) {
            path.push(PathSegment::Key(k.clone()));
            push(out, path, DeltaKind::Added, None, Some(&after[j]));
            path.pop();
        }
    }

    if ordered {
        let common_before: Vec<&String> = before_keys
            .iter()
            .filter(|k| after_index.contains_key(k.as_str()))
            .collect();
        let common_after: Vec<&String> = after_keys
            .iter()
            .filter(|k| before_index.contains_key(k.as_str()))
            .collect();
        if common_before != common_after {
            let to_value = |keys: &[&String]| Value::Array(keys.iter().map(|k| Value::String((*k).clone())).collect());
            out.push(Delta {
                path: path.clone(),
                kind: DeltaKind::Reordered,
                before: Some(to_value(&common_before)),
                after: Some(to_value(&common_after)),
            });
        }
    }
}

enum Edit {
    Keep,
    Delete(usize),
    Insert(usize),
}

/// Longest-common-subsequence alignment of two sequences.
fn align(before: &[Value], after: &[Value]) -> Vec<Edit> {
    let (n, m) = (before.len(), after.len());
    // lcs[i][j]: LCS length of before[i..] and after[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if before[i] == after[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut edits = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if before[i] == after[j] {
            edits.push(Edit::Keep);
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            edits.push(Edit::Delete(i));
            i += 1;
        } else {
            edits.push(Edit::Insert(j));
            j += 1;
        }
    }
    edits.extend((i..n).map(Edit::Delete));
    edits.extend((j..m).map(Edit::Insert));
    edits
}

fn diff_positional(path: &mut Vec<PathSegment>, before: &[Value], after: &[Value], options: &DiffOptions, out: &mut Vec<Delta>) {
    let edits = align(before, after);

    let mut deleted: Vec<usize> = Vec::new();
    let mut inserted: Vec<usize> = Vec::new();
    let flush = |deleted: &mut Vec<usize>, inserted: &mut Vec<usize>, path: &mut Vec<PathSegment>, out: &mut Vec<Delta>| {
        // A removal and an addition at the same spot is a modification.
        let paired = deleted.len().min(inserted.len());
        for (&i, &j) in deleted.iter().zip(inserted.iter()) {
            path.push(PathSegment::Index(i));
            diff_node(path, &before[i], &after[j], options, out);
            path.pop();
        }
        for &i in &deleted[paired..] {
            path.push(PathSegment::Index(i));
            push(out, path, DeltaKind::Removed, Some(&before[i]), None);
            path.pop();
        }
        for &j in &inserted[paired..] {
            path.push(PathSegment::Index(j));
            push(out, path, DeltaKind::Added, None, Some(&after[j]));
            path.pop();
        }
        deleted.clear();
        inserted.clear();
    };

    for edit in edits {
        match edit {
            Edit::Keep => flush(&mut deleted, &mut inserted, &mut *path, &mut *out),
            Edit::Delete(i) => deleted.push(i),
            Edit::Insert(j) => inserted.push(j),
        }
    }
    flush(&mut deleted, &mut inserted, path, out);
}
