//! Change records and result structures for API diffs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{ParamKind, Symbol, SymbolKind};

/// Category of a change record.
///
/// Declaration order is the order records of one symbol are reported in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    SignatureChanged,
    AnnotationChanged,
    BaseChanged,
    KindChanged,
    DecoratorChanged,
    ValueChanged,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 8] = [
        ChangeKind::Added,
        ChangeKind::Removed,
        ChangeKind::SignatureChanged,
        ChangeKind::AnnotationChanged,
        ChangeKind::BaseChanged,
        ChangeKind::KindChanged,
        ChangeKind::DecoratorChanged,
        ChangeKind::ValueChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::SignatureChanged => "signature_changed",
            ChangeKind::AnnotationChanged => "annotation_changed",
            ChangeKind::BaseChanged => "base_changed",
            ChangeKind::KindChanged => "kind_changed",
            ChangeKind::DecoratorChanged => "decorator_changed",
            ChangeKind::ValueChanged => "value_changed",
        }
    }

    /// Section title used by reports.
    pub fn title(&self) -> &'static str {
        match self {
            ChangeKind::Added => "Added",
            ChangeKind::Removed => "Removed",
            ChangeKind::SignatureChanged => "Signature changes",
            ChangeKind::AnnotationChanged => "Annotation changes",
            ChangeKind::BaseChanged => "Base class changes",
            ChangeKind::KindChanged => "Kind changes",
            ChangeKind::DecoratorChanged => "Decorator changes",
            ChangeKind::ValueChanged => "Value changes",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finer-grained entry inside a change record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubChange {
    ParamAdded {
        name: String,
        kind: ParamKind,
        default: Option<String>,
        annotation: Option<String>,
    },
    ParamRemoved {
        name: String,
        kind: ParamKind,
        default: Option<String>,
        annotation: Option<String>,
    },
    ParamDefaultChanged {
        name: String,
        before: Option<String>,
        after: Option<String>,
    },
    ParamReordered {
        before: Vec<String>,
        after: Vec<String>,
    },
    ParamKindChanged {
        name: String,
        before: ParamKind,
        after: ParamKind,
    },
    AsyncChanged {
        before: bool,
        after: bool,
    },
    ParamAnnotationChanged {
        name: String,
        before: Option<String>,
        after: Option<String>,
    },
    ReturnAnnotationChanged {
        before: Option<String>,
        after: Option<String>,
    },
    ConstantAnnotationChanged {
        before: Option<String>,
        after: Option<String>,
    },
    BaseAdded {
        position: usize,
        value: String,
    },
    BaseRemoved {
        position: usize,
        value: String,
    },
    BaseModified {
        position: usize,
        before: String,
        after: String,
    },
    DecoratorAdded {
        position: usize,
        value: String,
    },
    DecoratorRemoved {
        position: usize,
        value: String,
    },
    DecoratorModified {
        position: usize,
        before: String,
        after: String,
    },
    ValueChanged {
        before: Option<String>,
        after: Option<String>,
    },
    KindChanged {
        before: SymbolKind,
        after: SymbolKind,
    },
}

fn show(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("<none>")
}

fn param_label(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::PositionalOrKeyword => "parameter",
        ParamKind::PositionalOnly => "positional-only parameter",
        ParamKind::VarPositional => "var-positional parameter",
        ParamKind::KeywordOnly => "keyword-only parameter",
        ParamKind::VarKeyword => "var-keyword parameter",
    }
}

impl SubChange {
    /// The record category this entry belongs to.
    pub fn change_kind(&self) -> ChangeKind {
        match self {
            SubChange::ParamAdded { .. }
            | SubChange::ParamRemoved { .. }
            | SubChange::ParamDefaultChanged { .. }
            | SubChange::ParamReordered { .. }
            | SubChange::ParamKindChanged { .. }
            | SubChange::AsyncChanged { .. } => ChangeKind::SignatureChanged,
            SubChange::ParamAnnotationChanged { .. }
            | SubChange::ReturnAnnotationChanged { .. }
            | SubChange::ConstantAnnotationChanged { .. } => ChangeKind::AnnotationChanged,
            SubChange::BaseAdded { .. } | SubChange::BaseRemoved { .. } | SubChange::BaseModified { .. } => {
                ChangeKind::BaseChanged
            }
            SubChange::DecoratorAdded { .. }
            | SubChange::DecoratorRemoved { .. }
            | SubChange::DecoratorModified { .. } => ChangeKind::DecoratorChanged,
            SubChange::ValueChanged { .. } => ChangeKind::ValueChanged,
            SubChange::KindChanged { .. } => ChangeKind::KindChanged,
        }
    }

    /// Whether existing callers can break.
    pub fn is_breaking(&self) -> bool {
        match self {
            SubChange::ParamAdded { kind, default, .. } => default.is_none() && !kind.is_variadic(),
            SubChange::ParamRemoved { .. }
            | SubChange::ParamReordered { .. }
            | SubChange::ParamKindChanged { .. }
            | SubChange::AsyncChanged { .. }
            | SubChange::BaseRemoved { .. }
            | SubChange::KindChanged { .. } => true,
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SubChange::ParamAdded {
                name, kind, default, ..
            } => match default {
                Some(d) => format!("{} '{}' added (default {})", param_label(*kind), name, d),
                None => format!("{} '{}' added", param_label(*kind), name),
            },
            SubChange::ParamRemoved { name, kind, .. } => {
                format!("{} '{}' removed", param_label(*kind), name)
            }
            SubChange::ParamDefaultChanged { name, before, after } => format!(
                "default of parameter '{}' changed from {} to {}",
                name,
                show(before),
                show(after)
            ),
            SubChange::ParamReordered { before, after } => format!(
                "parameters reordered from ({}) to ({})",
                before.join(", "),
                after.join(", ")
            ),
            SubChange::ParamKindChanged { name, before, after } => {
                format!("parameter '{}' changed from {} to {}", name, before, after)
            }
            SubChange::AsyncChanged { after, .. } => {
                if *after {
                    "became async".to_string()
                } else {
                    "is no longer async".to_string()
                }
            }
            SubChange::ParamAnnotationChanged { name, before, after } => format!(
                "annotation of parameter '{}' changed from {} to {}",
                name,
                show(before),
                show(after)
            ),
            SubChange::ReturnAnnotationChanged { before, after } => {
                format!("return annotation changed from {} to {}", show(before), show(after))
            }
            SubChange::ConstantAnnotationChanged { before, after } => {
                format!("annotation changed from {} to {}", show(before), show(after))
            }
            SubChange::BaseAdded { position, value } => {
                format!("base '{}' added at position {}", value, position)
            }
            SubChange::BaseRemoved { position, value } => {
                format!("base '{}' removed from position {}", value, position)
            }
            SubChange::BaseModified { position, before, after } => {
                format!("base at position {} changed from '{}' to '{}'", position, before, after)
            }
            SubChange::DecoratorAdded { position, value } => {
                format!("decorator '@{}' added at position {}", value, position)
            }
            SubChange::DecoratorRemoved { position, value } => {
                format!("decorator '@{}' removed from position {}", value, position)
            }
            SubChange::DecoratorModified { position, before, after } => format!(
                "decorator at position {} changed from '@{}' to '@{}'",
                position, before, after
            ),
            SubChange::ValueChanged { before, after } => {
                format!("value changed from {} to {}", show(before), show(after))
            }
            SubChange::KindChanged { before, after } => {
                format!("kind changed from {} to {}", before, after)
            }
        }
    }
}

/// One classified change to one symbol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub qualified_name: String,
    pub change_kind: ChangeKind,
    pub before: Option<Symbol>,
    pub after: Option<Symbol>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_changes: Vec<SubChange>,
}

impl ChangeRecord {
    pub fn added(symbol: Symbol) -> Self {
        Self {
            qualified_name: symbol.qualified_name.clone(),
            change_kind: ChangeKind::Added,
            before: None,
            after: Some(symbol),
            sub_changes: Vec::new(),
        }
    }

    pub fn removed(symbol: Symbol) -> Self {
        Self {
            qualified_name: symbol.qualified_name.clone(),
            change_kind: ChangeKind::Removed,
            before: Some(symbol),
            after: None,
            sub_changes: Vec::new(),
        }
    }

    /// Kind of the symbol, taken from whichever side is present.
    pub fn symbol_kind(&self) -> Option<SymbolKind> {
        self.after.as_ref().or(self.before.as_ref()).map(|s| s.kind)
    }

    pub fn is_breaking(&self) -> bool {
        self.change_kind == ChangeKind::Removed || self.sub_changes.iter().any(|c| c.is_breaking())
    }

    /// One-line description, e.g. `pkg.f: parameter 'y' added (default 0)`.
    pub fn describe(&self) -> String {
        let detail = match self.change_kind {
            ChangeKind::Added | ChangeKind::Removed => {
                let kind = self.symbol_kind().map(|k| k.as_str()).unwrap_or("symbol");
                format!("{} {}", kind, self.change_kind)
            }
            _ => self
                .sub_changes
                .iter()
                .map(|c| c.describe())
                .collect::<Vec<_>>()
                .join("; "),
        };
        format!("{}: {}", self.qualified_name, detail)
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Summary statistics for a diff.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub added: u32,
    pub removed: u32,
    pub signature_changed: u32,
    pub annotation_changed: u32,
    pub base_changed: u32,
    pub kind_changed: u32,
    pub decorator_changed: u32,
    pub value_changed: u32,

    pub breaking_changes: u32,
}

impl DiffSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment counters for one record.
    pub fn record(&mut self, record: &ChangeRecord) {
        *self.counter(record.change_kind) += 1;
        if record.is_breaking() {
            self.breaking_changes += 1;
        }
    }

    fn counter(&mut self, kind: ChangeKind) -> &mut u32 {
        match kind {
            ChangeKind::Added => &mut self.added,
            ChangeKind::Removed => &mut self.removed,
            ChangeKind::SignatureChanged => &mut self.signature_changed,
            ChangeKind::AnnotationChanged => &mut self.annotation_changed,
            ChangeKind::BaseChanged => &mut self.base_changed,
            ChangeKind::KindChanged => &mut self.kind_changed,
            ChangeKind::DecoratorChanged => &mut self.decorator_changed,
            ChangeKind::ValueChanged => &mut self.value_changed,
        }
    }

    pub fn count(&self, kind: ChangeKind) -> u32 {
        match kind {
            ChangeKind::Added => self.added,
            ChangeKind::Removed => self.removed,
            ChangeKind::SignatureChanged => self.signature_changed,
            ChangeKind::AnnotationChanged => self.annotation_changed,
            ChangeKind::BaseChanged => self.base_changed,
            ChangeKind::KindChanged => self.kind_changed,
            ChangeKind::DecoratorChanged => self.decorator_changed,
            ChangeKind::ValueChanged => self.value_changed,
        }
    }

    pub fn total(&self) -> u32 {
        ChangeKind::ALL.iter().map(|k| self.count(*k)).sum()
    }

    /// Generate human-readable summary string.
    pub fn text(&self) -> String {
        let parts: Vec<String> = ChangeKind::ALL
            .iter()
            .filter(|k| self.count(**k) > 0)
            .map(|k| format!("{} {}", self.count(*k), k.as_str().replace('_', " ")))
            .collect();

        if parts.is_empty() {
            "No changes".to_string()
        } else if self.breaking_changes > 0 {
            format!("{} ({} breaking)", parts.join(", "), self.breaking_changes)
        } else {
            parts.join(", ")
        }
    }
}

/// Complete result of comparing two API models.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDiff {
    /// Records sorted by qualified name, then change kind.
    pub changes: Vec<ChangeRecord>,
    pub summary: DiffSummary,
}

impl ApiDiff {
    pub fn new(changes: Vec<ChangeRecord>) -> Self {
        let mut summary = DiffSummary::new();
        for change in &changes {
            summary.record(change);
        }
        Self { changes, summary }
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn has_breaking_changes(&self) -> bool {
        self.summary.breaking_changes > 0
    }

    /// Records of one category, in report order.
    pub fn by_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &ChangeRecord> {
        self.changes.iter().filter(move |c| c.change_kind == kind)
    }
}
