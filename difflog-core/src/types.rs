//! Syntax-level definitions produced by the Python parser.
//!
//! These types mirror what is written in one source file: classes, functions,
//! assignments and imports in declaration order, before any visibility rule or
//! normalization across modules is applied. The extractor turns them into the
//! [`ApiModel`](crate::model::ApiModel).

use serde::{Deserialize, Serialize};

use crate::model::ParamKind;

/// A function/method parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub kind: ParamKind,
    pub type_annotation: Option<String>,
    pub default_value: Option<String>,
}

impl ParameterDef {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            type_annotation: None,
            default_value: None,
        }
    }
}

/// A function or method definition.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub parameters: Vec<ParameterDef>,
    pub return_type: Option<String>,
    /// Decorator expressions without the leading `@`, in source order.
    pub decorators: Vec<String>,
    pub is_async: bool,
    pub docstring: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
}

impl FunctionDef {
    /// Decorator names with call arguments stripped (`lru_cache(1)` -> `lru_cache`).
    pub fn decorator_names(&self) -> impl Iterator<Item = &str> {
        self.decorators.iter().map(|d| decorator_name(d))
    }

    pub fn has_decorator(&self, names: &[&str]) -> bool {
        self.decorator_names().any(|d| names.contains(&d))
    }
}

/// A class definition.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<String>,
    pub decorators: Vec<String>,
    /// Class body in declaration order.
    pub body: Vec<Definition>,
    pub docstring: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
}

/// A module- or class-level assignment target.
///
/// `a = b = 1` and `x, y = 1, 2` produce one `AttributeDef` per bound name.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    pub annotation: Option<String>,
    pub value: Option<String>,
    pub line: u32,
}

/// One definition in a module or class body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Definition {
    Class(ClassDef),
    Function(FunctionDef),
    Attribute(AttributeDef),
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Definition::Class(c) => &c.name,
            Definition::Function(f) => &f.name,
            Definition::Attribute(a) => &a.name,
        }
    }
}

/// An import statement binding names in a module namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDef {
    /// Imported module as written (`os.path`, `.sub`, `..pkg.mod`).
    pub module: String,
    /// `(name, alias)` pairs for `from` imports; `*` for wildcard imports.
    pub names: Vec<(String, Option<String>)>,
    /// Alias of a plain `import a.b as c`.
    pub alias: Option<String>,
    pub is_from: bool,
    pub line_number: u32,
}

impl ImportDef {
    pub fn is_wildcard(&self) -> bool {
        self.is_from && self.names.iter().any(|(n, _)| n == "*")
    }

    /// Number of leading dots of a relative import.
    pub fn relative_level(&self) -> usize {
        self.module.chars().take_while(|c| *c == '.').count()
    }
}

/// A parsed module/file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModuleDef {
    /// Dotted module name (`pkg.sub`), empty for a standalone file.
    pub name: String,
    pub path: String,
    pub imports: Vec<ImportDef>,
    pub body: Vec<Definition>,
    pub module_docstring: Option<String>,
    /// Literal `__all__`, when the module declares one.
    pub all: Option<Vec<String>>,
    pub total_lines: u32,
    /// Whether this is a package `__init__` module.
    pub is_package: bool,
}

/// Strip call arguments from a decorator expression.
pub fn decorator_name(decorator: &str) -> &str {
    match decorator.find('(') {
        Some(idx) => decorator[..idx].trim(),
        None => decorator.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decorator_name() {
        assert_eq!(decorator_name("property"), "property");
        assert_eq!(decorator_name("functools.lru_cache(maxsize=1)"), "functools.lru_cache");
        assert_eq!(decorator_name("x.setter"), "x.setter");
    }

    #[test]
    fn test_function_has_decorator() {
        let func = FunctionDef {
            name: "f".to_string(),
            decorators: vec!["typing.overload".to_string(), "cache(3)".to_string()],
            ..Default::default()
        };
        assert!(func.has_decorator(&["typing.overload"]));
        assert!(func.has_decorator(&["cache"]));
        assert!(!func.has_decorator(&["property"]));
    }

    #[test]
    fn test_import_helpers() {
        let import = ImportDef {
            module: "..core".to_string(),
            names: vec![("*".to_string(), None)],
            is_from: true,
            ..Default::default()
        };
        assert!(import.is_wildcard());
        assert_eq!(import.relative_level(), 2);
    }

    #[test]
    fn test_module_def_serialization() {
        let module = ModuleDef {
            name: "pkg".to_string(),
            path: "pkg/__init__.py".to_string(),
            is_package: true,
            ..Default::default()
        };

        let json = serde_json::to_string(&module).unwrap();
        assert!(json.contains("\"name\":\"pkg\""));
    }
}
