//! The API model shared between the extractor and the differ.
//!
//! An [`ApiModel`] is an ordered map from qualified name to [`Symbol`]. It only
//! ever holds public symbols, and its iteration order is the sorted order of
//! qualified names, so two models built from the same source are identical
//! regardless of the order files were discovered in.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of an exported symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Module,
    Class,
    Function,
    Method,
    Property,
    Constant,
}

impl SymbolKind {
    pub const ALL: [SymbolKind; 6] = [
        SymbolKind::Module,
        SymbolKind::Class,
        SymbolKind::Function,
        SymbolKind::Method,
        SymbolKind::Property,
        SymbolKind::Constant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Module => "module",
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Property => "property",
            SymbolKind::Constant => "constant",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SymbolKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SymbolKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown symbol kind: '{}'", s))
    }
}

/// How a parameter can be passed at a call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::PositionalOnly => "positional-only",
            ParamKind::PositionalOrKeyword => "positional or keyword",
            ParamKind::VarPositional => "var-positional",
            ParamKind::KeywordOnly => "keyword-only",
            ParamKind::VarKeyword => "var-keyword",
        }
    }

    /// Parameters whose call-site position is observable.
    pub fn is_positional(&self) -> bool {
        matches!(
            self,
            ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword | ParamKind::VarPositional
        )
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self, ParamKind::VarPositional | ParamKind::VarKeyword)
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parameter of a normalized signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    /// Normalized default expression; `Some` means a default is present.
    pub default: Option<String>,
    /// Normalized annotation; `None` marks an unannotated parameter.
    pub annotation: Option<String>,
}

impl Parameter {
    /// Whether callers must supply this parameter.
    pub fn is_required(&self) -> bool {
        self.default.is_none() && !self.kind.is_variadic()
    }

    /// Render the parameter the way it would appear in a `def`.
    pub fn render(&self) -> String {
        let mut s = match self.kind {
            ParamKind::VarPositional => format!("*{}", self.name),
            ParamKind::VarKeyword => format!("**{}", self.name),
            _ => self.name.clone(),
        };
        if let Some(ref t) = self.annotation {
            s.push_str(": ");
            s.push_str(t);
        }
        if let Some(ref d) = self.default {
            if self.annotation.is_some() {
                s.push_str(" = ");
            } else {
                s.push('=');
            }
            s.push_str(d);
        }
        s
    }
}

/// A normalized call signature.
///
/// Positional parameters keep source order, keyword-only parameters are sorted
/// by name, and `**kwargs` comes last.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub parameters: Vec<Parameter>,
}

impl Signature {
    /// Build a signature, normalizing parameter order.
    pub fn new(parameters: Vec<Parameter>) -> Self {
        let (positional, rest): (Vec<_>, Vec<_>) =
            parameters.into_iter().partition(|p| p.kind.is_positional());
        let (mut keyword_only, var_keyword): (Vec<_>, Vec<_>) =
            rest.into_iter().partition(|p| p.kind == ParamKind::KeywordOnly);
        keyword_only.sort_by(|a, b| a.name.cmp(&b.name));

        let mut parameters = positional;
        parameters.extend(keyword_only);
        parameters.extend(var_keyword);
        Self { parameters }
    }

    pub fn positional(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.kind.is_positional())
    }

    /// Keyword-only parameters and `**kwargs`.
    pub fn keyword(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| !p.kind.is_positional())
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Render as `(a, /, b: int = 1, *args, c, **kw)`.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        let mut seen_var_positional = false;
        let mut kw_marker_done = false;
        let last_positional_only = self
            .parameters
            .iter()
            .rposition(|p| p.kind == ParamKind::PositionalOnly);

        for (i, p) in self.parameters.iter().enumerate() {
            if p.kind == ParamKind::VarPositional {
                seen_var_positional = true;
            }
            if p.kind == ParamKind::KeywordOnly && !seen_var_positional && !kw_marker_done {
                parts.push("*".to_string());
                kw_marker_done = true;
            }
            parts.push(p.render());
            if Some(i) == last_positional_only {
                parts.push("/".to_string());
            }
        }
        format!("({})", parts.join(", "))
    }
}

/// One exported identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub qualified_name: String,
    pub kind: SymbolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_annotation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    #[serde(default)]
    pub is_async: bool,
    /// Declared type of a constant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    /// Normalized right-hand side of a constant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub has_docstring: bool,
    /// Definition-site qualified name of a re-exported symbol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_source: Option<String>,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

impl Symbol {
    pub fn new(qualified_name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            kind,
            signature: None,
            return_annotation: None,
            bases: Vec::new(),
            decorators: Vec::new(),
            is_async: false,
            annotation: None,
            value: None,
            has_docstring: false,
            canonical_source: None,
            is_public: true,
        }
    }

    /// Last segment of the qualified name.
    pub fn name(&self) -> &str {
        self.qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.qualified_name)
    }

    /// One-line rendering of the symbol's declaration.
    pub fn declaration(&self) -> String {
        match self.kind {
            SymbolKind::Function | SymbolKind::Method => {
                let sig = self
                    .signature
                    .as_ref()
                    .map(|s| s.render())
                    .unwrap_or_else(|| "()".to_string());
                let ret = self
                    .return_annotation
                    .as_ref()
                    .map(|t| format!(" -> {}", t))
                    .unwrap_or_default();
                let prefix = if self.is_async { "async def " } else { "def " };
                format!("{}{}{}{}", prefix, self.name(), sig, ret)
            }
            SymbolKind::Class => {
                if self.bases.is_empty() {
                    format!("class {}", self.name())
                } else {
                    format!("class {}({})", self.name(), self.bases.join(", "))
                }
            }
            SymbolKind::Property => match self.return_annotation {
                Some(ref t) => format!("property {}: {}", self.name(), t),
                None => format!("property {}", self.name()),
            },
            SymbolKind::Constant => {
                let mut s = self.name().to_string();
                if let Some(ref t) = self.annotation {
                    s.push_str(": ");
                    s.push_str(t);
                }
                if let Some(ref v) = self.value {
                    s.push_str(" = ");
                    s.push_str(v);
                }
                s
            }
            SymbolKind::Module => format!("module {}", self.qualified_name),
        }
    }
}

/// Normalized snapshot of one revision's public symbols.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiModel {
    symbols: BTreeMap<String, Symbol>,
}

impl ApiModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a symbol, replacing any previous symbol with the same name.
    pub fn insert(&mut self, symbol: Symbol) -> Option<Symbol> {
        self.symbols.insert(symbol.qualified_name.clone(), symbol)
    }

    pub fn remove(&mut self, qualified_name: &str) -> Option<Symbol> {
        self.symbols.remove(qualified_name)
    }

    pub fn get(&self, qualified_name: &str) -> Option<&Symbol> {
        self.symbols.get(qualified_name)
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.symbols.contains_key(qualified_name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in ascending qualified-name order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(|k| k.as_str())
    }

    /// The symbol named `qualified_name` and every symbol nested under it.
    pub fn subtree(&self, qualified_name: &str) -> Vec<&Symbol> {
        let prefix = format!("{}.", qualified_name);
        self.symbols
            .range(qualified_name.to_string()..)
            .take_while(|(k, _)| k.as_str() == qualified_name || k.starts_with(&prefix))
            .map(|(_, v)| v)
            .collect()
    }

    /// Direct children of a namespace (module or class).
    pub fn children(&self, qualified_name: &str) -> Vec<&Symbol> {
        let prefix = if qualified_name.is_empty() {
            String::new()
        } else {
            format!("{}.", qualified_name)
        };
        self.symbols
            .iter()
            .filter(|(k, _)| {
                k.starts_with(&prefix) && k.len() > prefix.len() && !k[prefix.len()..].contains('.')
            })
            .map(|(_, v)| v)
            .collect()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a model previously written with [`ApiModel::to_json_pretty`].
    ///
    /// A symbol whose `kind` is not one of the known kinds fails with
    /// [`Error::ModelMismatch`] instead of being coerced.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(json)?;
        if let Some(map) = raw.as_object() {
            for (name, symbol) in map {
                let kind = symbol.get("kind").and_then(|k| k.as_str()).unwrap_or("");
                if kind.parse::<SymbolKind>().is_err() {
                    return Err(Error::ModelMismatch {
                        qualified_name: name.clone(),
                        kind: kind.to_string(),
                    });
                }
            }
        }
        Ok(serde_json::from_value(raw)?)
    }
}

impl FromIterator<Symbol> for ApiModel {
    fn from_iter<I: IntoIterator<Item = Symbol>>(iter: I) -> Self {
        let mut model = ApiModel::new();
        for symbol in iter {
            model.insert(symbol);
        }
        model
    }
}
