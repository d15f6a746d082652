//! Symbol extraction: from parsed modules to an [`ApiModel`].
//!
//! The extractor applies the visibility convention, resolves per-scope
//! rebinding (including `@overload` stubs and property accessors) and moves
//! symbols re-exported by a package `__init__` to their public import path.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::model::{ApiModel, ParamKind, Parameter, Signature, Symbol, SymbolKind};
use crate::parser::{self, parse_files_parallel};
use crate::scanner::{discover_modules, is_dunder, is_public_name, ScanOptions};
use crate::types::{AttributeDef, ClassDef, Definition, FunctionDef, ImportDef, ModuleDef};

const PROPERTY_DECORATORS: &[&str] = &[
    "property",
    "cached_property",
    "functools.cached_property",
    "abc.abstractproperty",
    "abstractproperty",
];

const OVERLOAD_DECORATORS: &[&str] = &["overload", "typing.overload", "typing_extensions.overload"];

const STATIC_DECORATORS: &[&str] = &["staticmethod"];

/// Options for extracting a whole source tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractOptions {
    pub scan: ScanOptions,
    /// Parser threads; `None` uses the global rayon pool.
    pub num_threads: Option<usize>,
}

/// Extract the public API of a source tree with default options.
pub fn extract(root: &Path) -> Result<ApiModel> {
    extract_with(root, &ExtractOptions::default())
}

/// Extract the public API of a source tree.
///
/// Any file that fails to parse aborts the extraction. When several files
/// fail, the error reported is the one of the first module by name.
pub fn extract_with(root: &Path, options: &ExtractOptions) -> Result<ApiModel> {
    let files = discover_modules(root, &options.scan)?;
    debug!(root = %root.display(), modules = files.len(), "extracting");

    let modules = parse_files_parallel(&files, options.num_threads)
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    let model = build_model(&modules);
    debug!(symbols = model.len(), "extracted");
    Ok(model)
}

/// Extract the public API of a single file held in memory.
///
/// Symbols are named relative to the file (`Widget.resize`), and no module
/// symbol is recorded.
pub fn extract_source(source: &str, path: &str) -> Result<ApiModel> {
    let module = parser::parse_source(source, path)?;
    Ok(build_model(std::slice::from_ref(&module)))
}

/// Assemble the model from parsed modules.
///
/// The result does not depend on the order of `modules`.
pub fn build_model(modules: &[ModuleDef]) -> ApiModel {
    let mut sorted: Vec<&ModuleDef> = modules.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut model = ApiModel::new();
    // Module-level bindings that are not public where they are defined. They
    // stay in the model until re-exports are applied, since a package may
    // publish them under a public alias.
    let mut hidden: BTreeSet<String> = BTreeSet::new();
    for module in &sorted {
        if !module.name.is_empty() {
            let mut symbol = Symbol::new(module.name.clone(), SymbolKind::Module);
            symbol.has_docstring = module.module_docstring.is_some();
            model.insert(symbol);
        }

        let visible = |name: &str| match module.all {
            Some(ref all) => all.iter().any(|n| n == name),
            None => is_public_name(name),
        };
        for symbol in scope_symbols(&module.name, &module.body, Scope::Module, &|_: &str| true) {
            let local = if module.name.is_empty() {
                symbol.qualified_name.as_str()
            } else {
                &symbol.qualified_name[module.name.len() + 1..]
            };
            if !local.contains('.') && !visible(local) {
                hidden.insert(symbol.qualified_name.clone());
            }
            model.insert(symbol);
        }
    }

    apply_reexports(&mut model, &sorted, &hidden);

    // Whatever is still hidden, or still lives in a private module, is not
    // public API. Private modules only contribute what a package re-exported.
    let dropped: Vec<&str> = sorted
        .iter()
        .filter(|m| m.name.split('.').any(|segment| !is_public_name(segment)))
        .map(|m| m.name.as_str())
        .chain(hidden.iter().map(String::as_str))
        .collect();
    let private: Vec<String> = model
        .names()
        .filter(|name| dropped.iter().any(|prefix| is_within(name, prefix)))
        .map(|name| name.to_string())
        .collect();
    for name in private {
        model.remove(&name);
    }

    model
}

/// Whether `name` is `prefix` itself or nested below it.
fn is_within(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scope {
    Module,
    Class,
}

/// The surviving binding of one name in a scope.
enum Binding<'a> {
    Class(&'a ClassDef),
    Function { def: &'a FunctionDef, is_overload: bool },
    Property { getter: &'a FunctionDef, accessors: Vec<String> },
    Attribute(&'a AttributeDef),
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Resolve the bindings of one scope and turn the visible ones into symbols.
fn scope_symbols(prefix: &str, body: &[Definition], scope: Scope, visible: &dyn Fn(&str) -> bool) -> Vec<Symbol> {
    let mut bindings: BTreeMap<&str, Binding> = BTreeMap::new();

    for definition in body {
        match definition {
            Definition::Class(class) => {
                bindings.insert(&class.name, Binding::Class(class));
            }
            Definition::Attribute(attr) => {
                // Dunder assignments (`__all__`, `__slots__`) are metadata.
                if is_dunder(&attr.name) {
                    continue;
                }
                bindings.insert(&attr.name, Binding::Attribute(attr));
            }
            Definition::Function(func) => {
                let accessor = func.decorator_names().find(|d| {
                    *d == format!("{}.setter", func.name) || *d == format!("{}.deleter", func.name)
                });
                if let (Some(accessor), Some(Binding::Property { accessors, .. })) =
                    (accessor, bindings.get_mut(func.name.as_str()))
                {
                    if !accessors.iter().any(|a| a == accessor) {
                        accessors.push(accessor.to_string());
                    }
                    continue;
                }

                if scope == Scope::Class && func.has_decorator(PROPERTY_DECORATORS) {
                    bindings.insert(
                        &func.name,
                        Binding::Property {
                            getter: func,
                            accessors: Vec::new(),
                        },
                    );
                    continue;
                }

                let is_overload = func.has_decorator(OVERLOAD_DECORATORS);
                if is_overload {
                    if let Some(Binding::Function { is_overload: false, .. }) = bindings.get(func.name.as_str()) {
                        continue;
                    }
                }
                bindings.insert(&func.name, Binding::Function { def: func, is_overload });
            }
        }
    }

    let mut symbols = Vec::new();
    for (name, binding) in bindings {
        if !visible(name) {
            continue;
        }
        let qualified_name = qualify(prefix, name);
        match binding {
            Binding::Class(class) => {
                symbols.push(class_symbol(&qualified_name, class));
                symbols.extend(scope_symbols(&qualified_name, &class.body, Scope::Class, &is_public_name));
            }
            Binding::Function { def, .. } => {
                symbols.push(function_symbol(&qualified_name, def, scope));
            }
            Binding::Property { getter, accessors } => {
                symbols.push(property_symbol(&qualified_name, getter, accessors));
            }
            Binding::Attribute(attr) => {
                symbols.push(constant_symbol(&qualified_name, attr));
            }
        }
    }
    symbols
}

fn class_symbol(qualified_name: &str, class: &ClassDef) -> Symbol {
    let mut symbol = Symbol::new(qualified_name, SymbolKind::Class);
    symbol.bases = class.bases.clone();
    symbol.decorators = class.decorators.clone();
    symbol.has_docstring = class.docstring.is_some();
    symbol
}

fn function_symbol(qualified_name: &str, func: &FunctionDef, scope: Scope) -> Symbol {
    let kind = match scope {
        Scope::Module => SymbolKind::Function,
        Scope::Class => SymbolKind::Method,
    };

    let mut params = func.parameters.iter().peekable();
    // Drop the implicit receiver (`self` / `cls`).
    if scope == Scope::Class && !func.has_decorator(STATIC_DECORATORS) {
        params.next_if(|p| matches!(p.kind, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword));
    }
    let parameters = params
        .map(|p| Parameter {
            name: p.name.clone(),
            kind: p.kind,
            default: p.default_value.clone(),
            annotation: p.type_annotation.clone(),
        })
        .collect();

    let mut symbol = Symbol::new(qualified_name, kind);
    symbol.signature = Some(Signature::new(parameters));
    symbol.return_annotation = func.return_type.clone();
    symbol.decorators = func
        .decorators
        .iter()
        .filter(|d| !OVERLOAD_DECORATORS.contains(&crate::types::decorator_name(d)))
        .cloned()
        .collect();
    symbol.is_async = func.is_async;
    symbol.has_docstring = func.docstring.is_some();
    symbol
}

fn property_symbol(qualified_name: &str, getter: &FunctionDef, accessors: Vec<String>) -> Symbol {
    let mut symbol = Symbol::new(qualified_name, SymbolKind::Property);
    symbol.return_annotation = getter.return_type.clone();
    symbol.decorators = getter.decorators.clone();
    symbol.decorators.extend(accessors);
    symbol.has_docstring = getter.docstring.is_some();
    symbol
}

fn constant_symbol(qualified_name: &str, attr: &AttributeDef) -> Symbol {
    let mut symbol = Symbol::new(qualified_name, SymbolKind::Constant);
    symbol.annotation = attr.annotation.clone();
    symbol.value = attr.value.clone();
    symbol
}

/// Absolute module name targeted by a `from` import inside `package`.
fn resolve_import_module(package: &str, import: &ImportDef) -> Option<String> {
    let level = import.relative_level();
    let rest = &import.module[level..];
    if level == 0 {
        return Some(rest.to_string());
    }

    // Level 1 in an `__init__` is the package itself.
    let mut segments: Vec<&str> = package.split('.').collect();
    for _ in 1..level {
        segments.pop()?;
    }
    if segments.is_empty() {
        return None;
    }
    let mut resolved = segments.join(".");
    if !rest.is_empty() {
        resolved.push('.');
        resolved.push_str(rest);
    }
    Some(resolved)
}

/// Move symbols re-exported by package `__init__` modules to their public name.
///
/// Wildcard imports only pick up names that are public in their source module.
fn apply_reexports(model: &mut ApiModel, modules: &[&ModuleDef], hidden: &BTreeSet<String>) {
    let mut packages: Vec<&&ModuleDef> = modules
        .iter()
        .filter(|m| m.is_package && !m.name.is_empty())
        .collect();
    // Deepest first, so `a.b` re-exports are in place before `a` looks at them.
    packages.sort_by(|a, b| {
        let depth = |m: &ModuleDef| m.name.matches('.').count();
        depth(b).cmp(&depth(a)).then_with(|| a.name.cmp(&b.name))
    });

    for package in packages {
        let visible = |name: &str| match package.all {
            Some(ref all) => all.iter().any(|n| n == name),
            None => is_public_name(name),
        };

        for import in package.imports.iter().filter(|i| i.is_from) {
            let Some(source) = resolve_import_module(&package.name, import) else {
                continue;
            };
            if !modules.iter().any(|m| m.name == source) {
                continue;
            }

            let mut names: Vec<(String, String)> = Vec::new();
            if import.is_wildcard() {
                for child in model.children(&source) {
                    if child.kind != SymbolKind::Module && !hidden.contains(&child.qualified_name) {
                        names.push((child.name().to_string(), child.name().to_string()));
                    }
                }
            } else {
                for (name, alias) in &import.names {
                    names.push((name.clone(), alias.clone().unwrap_or_else(|| name.clone())));
                }
            }

            for (name, target) in names {
                if !visible(&target) {
                    continue;
                }
                let from = qualify(&source, &name);
                let to = qualify(&package.name, &target);
                move_symbol(model, &from, &to);
            }
        }
    }
}

/// Re-root `from` and its members at `to`, recording the definition site.
fn move_symbol(model: &mut ApiModel, from: &str, to: &str) {
    if from == to {
        return;
    }
    match model.get(from) {
        Some(symbol) if symbol.kind != SymbolKind::Module => {}
        _ => return,
    }

    let names: Vec<String> = model
        .subtree(from)
        .iter()
        .map(|s| s.qualified_name.clone())
        .collect();
    for name in names {
        if let Some(mut symbol) = model.remove(&name) {
            let suffix = &name[from.len()..];
            if symbol.canonical_source.is_none() {
                symbol.canonical_source = Some(name.clone());
            }
            symbol.qualified_name = format!("{}{}", to, suffix);
            model.insert(symbol);
        }
    }
    debug!(from, to, "re-exported");
}
