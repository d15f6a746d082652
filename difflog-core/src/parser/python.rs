//! Python AST extractor using tree-sitter.
//!
//! Walks module and class bodies and records definitions as written. Function
//! bodies are never entered, and the source is never imported or executed.

use tree_sitter::{Node, Parser};

use super::helpers::{
    count_lines, find_child_by_type, first_syntax_error, get_end_line, get_expr_text,
    get_node_text, get_start_line, string_literal_value,
};
use crate::error::{Error, Result};
use crate::model::ParamKind;
use crate::types::{
    AttributeDef, ClassDef, Definition, FunctionDef, ImportDef, ModuleDef, ParameterDef,
};

/// Parse Python source code.
///
/// Fails with [`Error::Extraction`] if the source contains a syntax error.
pub fn parse(source: &str, file_path: &str) -> Result<ModuleDef> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| Error::extraction(file_path, None, format!("failed to load Python grammar: {}", e)))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| Error::extraction(file_path, None, "parser produced no syntax tree"))?;
    let root = tree.root_node();

    if let Some((line, message)) = first_syntax_error(&root, source) {
        return Err(Error::extraction(file_path, Some(line), message));
    }

    let mut module = ModuleDef {
        path: file_path.to_string(),
        total_lines: count_lines(source),
        module_docstring: leading_docstring(&root, source),
        ..Default::default()
    };

    let mut body = Body::default();
    extract_body(&root, source, &mut body);
    module.body = body.definitions;
    module.imports = body.imports;
    module.all = body.all;

    Ok(module)
}

/// Definitions collected from one module or class body.
#[derive(Default)]
struct Body {
    definitions: Vec<Definition>,
    imports: Vec<ImportDef>,
    all: Option<Vec<String>>,
}

/// Walk the direct statements of a module or class block.
fn extract_body(block: &Node, source: &str, body: &mut Body) {
    let mut cursor = block.walk();
    for child in block.named_children(&mut cursor) {
        match child.kind() {
            "import_statement" => {
                body.imports.extend(extract_import(&child, source));
            }
            "import_from_statement" => {
                body.imports.push(extract_from_import(&child, source));
            }
            "class_definition" => {
                body.definitions
                    .push(Definition::Class(extract_class(&child, source, Vec::new())));
            }
            "function_definition" => {
                body.definitions
                    .push(Definition::Function(extract_function(&child, source, Vec::new())));
            }
            "decorated_definition" => {
                if let Some(def) = extract_decorated(&child, source) {
                    body.definitions.push(def);
                }
            }
            "expression_statement" => {
                extract_expression_statement(&child, source, body);
            }
            _ => {}
        }
    }
}

/// Regular `import a.b [as c], d` statement, one entry per module.
fn extract_import(node: &Node, source: &str) -> Vec<ImportDef> {
    let mut imports = Vec::new();
    let line_number = get_start_line(node);

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "dotted_name" => imports.push(ImportDef {
                module: get_expr_text(&child, source),
                line_number,
                ..Default::default()
            }),
            "aliased_import" => {
                let module = child
                    .child_by_field_name("name")
                    .map(|n| get_expr_text(&n, source))
                    .unwrap_or_default();
                let alias = child
                    .child_by_field_name("alias")
                    .map(|n| get_node_text(&n, source).to_string());
                imports.push(ImportDef {
                    module,
                    alias,
                    line_number,
                    ..Default::default()
                });
            }
            _ => {}
        }
    }

    imports
}

/// `from x import a [as b], c` / `from . import *` statement.
fn extract_from_import(node: &Node, source: &str) -> ImportDef {
    let module = node
        .child_by_field_name("module_name")
        .map(|n| get_expr_text(&n, source))
        .unwrap_or_default();

    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.children_by_field_name("name", &mut cursor) {
        match child.kind() {
            "dotted_name" => {
                names.push((get_expr_text(&child, source), None));
            }
            "aliased_import" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| get_expr_text(&n, source))
                    .unwrap_or_default();
                let alias = child
                    .child_by_field_name("alias")
                    .map(|n| get_node_text(&n, source).to_string());
                names.push((name, alias));
            }
            _ => {}
        }
    }

    if find_child_by_type(node, "wildcard_import").is_some() {
        names.push(("*".to_string(), None));
    }

    ImportDef {
        module,
        names,
        alias: None,
        is_from: true,
        line_number: get_start_line(node),
    }
}

/// Extract class definition.
fn extract_class(node: &Node, source: &str, decorators: Vec<String>) -> ClassDef {
    let mut class_def = ClassDef {
        name: node
            .child_by_field_name("name")
            .map(|n| get_node_text(&n, source).to_string())
            .unwrap_or_default(),
        decorators,
        start_line: get_start_line(node),
        end_line: get_end_line(node),
        ..Default::default()
    };

    if let Some(args) = node.child_by_field_name("superclasses") {
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            // `metaclass=...` and friends are not bases.
            if matches!(arg.kind(), "keyword_argument" | "comment" | "dictionary_splat") {
                continue;
            }
            class_def.bases.push(get_expr_text(&arg, source));
        }
    }

    if let Some(block) = node.child_by_field_name("body") {
        class_def.docstring = leading_docstring(&block, source);
        let mut body = Body::default();
        extract_body(&block, source, &mut body);
        class_def.body = body.definitions;
    }

    class_def
}

/// Extract function/method definition.
fn extract_function(node: &Node, source: &str, decorators: Vec<String>) -> FunctionDef {
    let mut func_def = FunctionDef {
        name: node
            .child_by_field_name("name")
            .map(|n| get_node_text(&n, source).to_string())
            .unwrap_or_default(),
        decorators,
        start_line: get_start_line(node),
        end_line: get_end_line(node),
        ..Default::default()
    };

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "async" {
            func_def.is_async = true;
            break;
        }
    }

    if let Some(params) = node.child_by_field_name("parameters") {
        func_def.parameters = extract_parameters(&params, source);
    }
    if let Some(ret) = node.child_by_field_name("return_type") {
        func_def.return_type = Some(get_expr_text(&ret, source));
    }
    if let Some(block) = node.child_by_field_name("body") {
        func_def.docstring = leading_docstring(&block, source);
    }

    func_def
}

/// Extract function parameters with their call-site kinds.
fn extract_parameters(node: &Node, source: &str) -> Vec<ParameterDef> {
    let mut params: Vec<ParameterDef> = Vec::new();
    // Set once a bare `*` or `*args` has been seen.
    let mut keyword_only = false;

    let current_kind = |keyword_only: bool| {
        if keyword_only {
            ParamKind::KeywordOnly
        } else {
            ParamKind::PositionalOrKeyword
        }
    };

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "identifier" => {
                params.push(ParameterDef::new(
                    get_node_text(&child, source),
                    current_kind(keyword_only),
                ));
            }
            "typed_parameter" => {
                let Some(inner) = child.named_child(0) else {
                    continue;
                };
                let mut param = match inner.kind() {
                    "list_splat_pattern" => {
                        keyword_only = true;
                        ParameterDef::new(splat_name(&inner, source), ParamKind::VarPositional)
                    }
                    "dictionary_splat_pattern" => {
                        ParameterDef::new(splat_name(&inner, source), ParamKind::VarKeyword)
                    }
                    _ => ParameterDef::new(get_node_text(&inner, source), current_kind(keyword_only)),
                };
                if let Some(t) = child.child_by_field_name("type") {
                    param.type_annotation = Some(get_expr_text(&t, source));
                }
                params.push(param);
            }
            "default_parameter" | "typed_default_parameter" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| get_node_text(&n, source).to_string())
                    .unwrap_or_default();
                let mut param = ParameterDef::new(name, current_kind(keyword_only));
                if let Some(t) = child.child_by_field_name("type") {
                    param.type_annotation = Some(get_expr_text(&t, source));
                }
                if let Some(v) = child.child_by_field_name("value") {
                    param.default_value = Some(get_expr_text(&v, source));
                }
                params.push(param);
            }
            "list_splat_pattern" => {
                keyword_only = true;
                params.push(ParameterDef::new(
                    splat_name(&child, source),
                    ParamKind::VarPositional,
                ));
            }
            "dictionary_splat_pattern" => {
                params.push(ParameterDef::new(
                    splat_name(&child, source),
                    ParamKind::VarKeyword,
                ));
            }
            "keyword_separator" => {
                keyword_only = true;
            }
            "positional_separator" => {
                for param in params.iter_mut() {
                    if param.kind == ParamKind::PositionalOrKeyword {
                        param.kind = ParamKind::PositionalOnly;
                    }
                }
            }
            _ => {}
        }
    }

    params
}

fn splat_name(node: &Node, source: &str) -> String {
    find_child_by_type(node, "identifier")
        .map(|n| get_node_text(&n, source).to_string())
        .unwrap_or_default()
}

/// Extract decorated class or function.
fn extract_decorated(node: &Node, source: &str) -> Option<Definition> {
    let mut decorators = Vec::new();

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "decorator" {
            let text = get_node_text(&child, source);
            decorators.push(super::helpers::normalize_expr(text.trim_start_matches('@')));
        }
    }

    let definition = node.child_by_field_name("definition")?;
    match definition.kind() {
        "class_definition" => Some(Definition::Class(extract_class(&definition, source, decorators))),
        "function_definition" => Some(Definition::Function(extract_function(
            &definition,
            source,
            decorators,
        ))),
        _ => None,
    }
}

/// Assignments and `__all__` declarations.
fn extract_expression_statement(node: &Node, source: &str, body: &mut Body) {
    let Some(expr) = node.named_child(0) else {
        return;
    };

    match expr.kind() {
        "assignment" => {
            let mut targets = Vec::new();
            let mut current = expr;
            let annotation = current
                .child_by_field_name("type")
                .map(|t| get_expr_text(&t, source));

            // `a = b = 1` nests the second assignment as the right-hand side.
            let value = loop {
                if let Some(left) = current.child_by_field_name("left") {
                    collect_targets(&left, source, &mut targets);
                }
                match current.child_by_field_name("right") {
                    Some(right) if right.kind() == "assignment" => current = right,
                    other => break other,
                }
            };

            if targets.iter().any(|t| t == "__all__") {
                if let Some(value) = value {
                    body.all = Some(string_list(&value, source));
                }
            }

            let value_text = value.map(|v| get_expr_text(&v, source));
            let line = get_start_line(node);
            for name in targets {
                body.definitions.push(Definition::Attribute(AttributeDef {
                    name,
                    annotation: annotation.clone(),
                    value: value_text.clone(),
                    line,
                }));
            }
        }
        "augmented_assignment" => {
            let is_all = expr
                .child_by_field_name("left")
                .is_some_and(|l| get_node_text(&l, source) == "__all__");
            if is_all {
                if let Some(right) = expr.child_by_field_name("right") {
                    body.all
                        .get_or_insert_with(Vec::new)
                        .extend(string_list(&right, source));
                }
            }
        }
        _ => {}
    }
}

/// Names bound by an assignment target.
fn collect_targets(node: &Node, source: &str, targets: &mut Vec<String>) {
    match node.kind() {
        "identifier" => targets.push(get_node_text(node, source).to_string()),
        "pattern_list" | "tuple_pattern" | "list_pattern" | "expression_list" | "tuple"
        | "list" | "list_splat_pattern" | "parenthesized_expression" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_targets(&child, source, targets);
            }
        }
        // Attribute and subscript targets do not bind names in this scope.
        _ => {}
    }
}

/// String literals of a list/tuple expression, following `+` concatenation.
fn string_list(node: &Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    match node.kind() {
        "list" | "tuple" | "parenthesized_expression" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "string" {
                    names.push(string_literal_value(get_node_text(&child, source)));
                }
            }
        }
        "binary_operator" => {
            for field in ["left", "right"] {
                if let Some(operand) = node.child_by_field_name(field) {
                    names.extend(string_list(&operand, source));
                }
            }
        }
        _ => {}
    }
    names
}

/// The docstring of a module or block, if its first statement is a string.
fn leading_docstring(block: &Node, source: &str) -> Option<String> {
    let mut cursor = block.walk();
    for stmt in block.named_children(&mut cursor) {
        match stmt.kind() {
            "comment" => continue,
            "expression_statement" => {
                return find_child_by_type(&stmt, "string")
                    .map(|s| string_literal_value(get_node_text(&s, source)).trim().to_string());
            }
            _ => return None,
        }
    }
    None
}
