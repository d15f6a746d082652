//! Comparator logic for diffing API models.
//!
//! Each shared symbol is serialized into a comparable JSON view and run
//! through the structural primitive; the resulting deltas are classified into
//! change records by where in the view they occur.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

use super::changes::{ApiDiff, ChangeKind, ChangeRecord, SubChange};
use super::structural::{diff_values, Delta, DeltaKind, DiffOptions, PathSegment};
use crate::model::{ApiModel, ParamKind, Parameter, Symbol};

/// Fields that never produce a change record.
static IGNORED_FIELDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(qualified_name|has_docstring|canonical_source|is_public)$").unwrap());
static PARAMETER_ARRAYS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^signature\.(parameters|keyword_only)$").unwrap());
static KEYWORD_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^signature\.keyword_only$").unwrap());

static DIFF_OPTIONS: Lazy<DiffOptions> = Lazy::new(|| {
    DiffOptions::new()
        .exclude_path(IGNORED_FIELDS.clone())
        .keyed_array(PARAMETER_ARRAYS.clone(), "name")
        .unordered_array(KEYWORD_ARRAY.clone())
});

fn parameter_value(param: &Parameter) -> Value {
    json!({
        "name": param.name,
        "kind": param.kind,
        "default": param.default,
        "annotation": param.annotation,
    })
}

/// The view of a symbol handed to the structural primitive.
///
/// Positional parameters form an ordered array and keyword parameters an
/// unordered one, so reordering keyword-only parameters is not a change.
fn comparable(symbol: &Symbol) -> Value {
    let signature = symbol.signature.as_ref().map(|sig| {
        json!({
            "parameters": sig.positional().map(parameter_value).collect::<Vec<_>>(),
            "keyword_only": sig.keyword().map(parameter_value).collect::<Vec<_>>(),
        })
    });

    json!({
        "qualified_name": symbol.qualified_name,
        "kind": symbol.kind,
        "signature": signature,
        "is_async": symbol.is_async,
        "return_annotation": symbol.return_annotation,
        "bases": symbol.bases,
        "decorators": symbol.decorators,
        "annotation": symbol.annotation,
        "value": symbol.value,
        "has_docstring": symbol.has_docstring,
        "canonical_source": symbol.canonical_source,
        "is_public": symbol.is_public,
    })
}

/// Diff two API models.
///
/// Records are sorted by qualified name, then by change kind.
pub fn diff(before: &ApiModel, after: &ApiModel) -> Vec<ChangeRecord> {
    let mut records = Vec::new();

    for symbol in before.iter() {
        match after.get(&symbol.qualified_name) {
            None => records.push(ChangeRecord::removed(symbol.clone())),
            Some(other) => records.extend(compare_symbols(symbol, other)),
        }
    }
    for symbol in after.iter() {
        if !before.contains(&symbol.qualified_name) {
            records.push(ChangeRecord::added(symbol.clone()));
        }
    }

    records.sort_by(|a, b| {
        a.qualified_name
            .cmp(&b.qualified_name)
            .then(a.change_kind.cmp(&b.change_kind))
    });
    debug!(before = before.len(), after = after.len(), records = records.len(), "diffed models");
    records
}

/// Diff two API models and summarize the result.
pub fn diff_models(before: &ApiModel, after: &ApiModel) -> ApiDiff {
    ApiDiff::new(diff(before, after))
}

/// Change records for a symbol present on both sides.
pub fn compare_symbols(before: &Symbol, after: &Symbol) -> Vec<ChangeRecord> {
    let deltas = diff_values(&comparable(before), &comparable(after), &DIFF_OPTIONS);
    if deltas.is_empty() {
        return Vec::new();
    }

    let kind_changed = deltas
        .iter()
        .any(|d| matches!(d.path.as_slice(), [PathSegment::Key(k)] if k == "kind"));
    let sub_changes = if kind_changed {
        vec![SubChange::KindChanged {
            before: before.kind,
            after: after.kind,
        }]
    } else {
        classify(&deltas)
    };

    let mut grouped: BTreeMap<ChangeKind, Vec<SubChange>> = BTreeMap::new();
    for change in sub_changes {
        grouped.entry(change.change_kind()).or_default().push(change);
    }

    grouped
        .into_iter()
        .map(|(change_kind, sub_changes)| ChangeRecord {
            qualified_name: after.qualified_name.clone(),
            change_kind,
            before: Some(before.clone()),
            after: Some(after.clone()),
            sub_changes,
        })
        .collect()
}

fn opt_string(value: &Option<Value>) -> Option<String> {
    value.as_ref().and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn string(value: &Option<Value>) -> String {
    opt_string(value).unwrap_or_default()
}

fn strings(value: &Option<Value>) -> Vec<String> {
    value
        .as_ref()
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(|i| i.as_str()).map(|s| s.to_string()).collect())
        .unwrap_or_default()
}

fn param_kind(value: &Option<Value>) -> Option<ParamKind> {
    value.clone().and_then(|v| serde_json::from_value(v).ok())
}

fn parameter(value: &Option<Value>) -> Option<Parameter> {
    value.clone().and_then(|v| serde_json::from_value(v).ok())
}

/// Turn the deltas of one symbol into sub-changes.
fn classify(deltas: &[Delta]) -> Vec<SubChange> {
    use PathSegment::{Index, Key};

    let mut changes = Vec::new();
    let mut added_params: Vec<Parameter> = Vec::new();
    let mut removed_params: Vec<Parameter> = Vec::new();

    for delta in deltas {
        match delta.path.as_slice() {
            [Key(sig), Key(_)] if sig == "signature" && delta.kind == DeltaKind::Reordered => {
                changes.push(SubChange::ParamReordered {
                    before: strings(&delta.before),
                    after: strings(&delta.after),
                });
            }
            [Key(sig), Key(_), Key(_)] if sig == "signature" => match delta.kind {
                DeltaKind::Added => added_params.extend(parameter(&delta.after)),
                DeltaKind::Removed => removed_params.extend(parameter(&delta.before)),
                _ => {}
            },
            [Key(sig), Key(_), Key(name), Key(field)] if sig == "signature" => match field.as_str() {
                "default" => changes.push(SubChange::ParamDefaultChanged {
                    name: name.clone(),
                    before: opt_string(&delta.before),
                    after: opt_string(&delta.after),
                }),
                "kind" => {
                    if let (Some(before), Some(after)) = (param_kind(&delta.before), param_kind(&delta.after)) {
                        changes.push(SubChange::ParamKindChanged {
                            name: name.clone(),
                            before,
                            after,
                        });
                    }
                }
                "annotation" => changes.push(SubChange::ParamAnnotationChanged {
                    name: name.clone(),
                    before: opt_string(&delta.before),
                    after: opt_string(&delta.after),
                }),
                _ => {}
            },
            [Key(field)] => match field.as_str() {
                "is_async" => changes.push(SubChange::AsyncChanged {
                    before: delta.before.as_ref().and_then(|v| v.as_bool()).unwrap_or(false),
                    after: delta.after.as_ref().and_then(|v| v.as_bool()).unwrap_or(false),
                }),
                "return_annotation" => changes.push(SubChange::ReturnAnnotationChanged {
                    before: opt_string(&delta.before),
                    after: opt_string(&delta.after),
                }),
                "annotation" => changes.push(SubChange::ConstantAnnotationChanged {
                    before: opt_string(&delta.before),
                    after: opt_string(&delta.after),
                }),
                "value" => changes.push(SubChange::ValueChanged {
                    before: opt_string(&delta.before),
                    after: opt_string(&delta.after),
                }),
                _ => {}
            },
            [Key(field), Index(position)] if field == "bases" || field == "decorators" => {
                let position = *position;
                let is_base = field == "bases";
                let change = match delta.kind {
                    DeltaKind::Added if is_base => SubChange::BaseAdded {
                        position,
                        value: string(&delta.after),
                    },
                    DeltaKind::Added => SubChange::DecoratorAdded {
                        position,
                        value: string(&delta.after),
                    },
                    DeltaKind::Removed if is_base => SubChange::BaseRemoved {
                        position,
                        value: string(&delta.before),
                    },
                    DeltaKind::Removed => SubChange::DecoratorRemoved {
                        position,
                        value: string(&delta.before),
                    },
                    _ if is_base => SubChange::BaseModified {
                        position,
                        before: string(&delta.before),
                        after: string(&delta.after),
                    },
                    _ => SubChange::DecoratorModified {
                        position,
                        before: string(&delta.before),
                        after: string(&delta.after),
                    },
                };
                changes.push(change);
            }
            _ => {}
        }
    }

    // A parameter that moved between the positional and keyword groups shows
    // up as removed on one side and added on the other.
    for removed in removed_params {
        match added_params.iter().position(|a| a.name == removed.name) {
            Some(index) => {
                let added = added_params.remove(index);
                if removed.kind != added.kind {
                    changes.push(SubChange::ParamKindChanged {
                        name: removed.name.clone(),
                        before: removed.kind,
                        after: added.kind,
                    });
                }
                if removed.default != added.default {
                    changes.push(SubChange::ParamDefaultChanged {
                        name: removed.name.clone(),
                        before: removed.default.clone(),
                        after: added.default.clone(),
                    });
                }
                if removed.annotation != added.annotation {
                    changes.push(SubChange::ParamAnnotationChanged {
                        name: removed.name.clone(),
                        before: removed.annotation,
                        after: added.annotation,
                    });
                }
            }
            None => changes.push(SubChange::ParamRemoved {
                name: removed.name,
                kind: removed.kind,
                default: removed.default,
                annotation: removed.annotation,
            }),
        }
    }
    for added in added_params {
        changes.push(SubChange::ParamAdded {
            name: added.name,
            kind: added.kind,
            default: added.default,
            annotation: added.annotation,
        });
    }

    changes
}
