//! Helper functions for tree-sitter AST navigation and expression normalization.

use tree_sitter::Node;

/// Get the text content of a node.
pub fn get_node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    let start = node.start_byte();
    let end = node.end_byte();
    if start < source.len() && end <= source.len() && start < end {
        &source[start..end]
    } else {
        ""
    }
}

/// Normalized text of an expression node.
///
/// Redundant outer parentheses are dropped, so `(1)` and `1` read the same.
pub fn get_expr_text(node: &Node, source: &str) -> String {
    normalize_expr(get_node_text(&strip_parens(*node), source))
}

/// The expression inside any number of `parenthesized_expression` wrappers,
/// looking through the `type` node that holds an annotation.
pub fn strip_parens(mut node: Node) -> Node {
    loop {
        let mut cursor = node.walk();
        let mut named = node
            .named_children(&mut cursor)
            .filter(|child| child.kind() != "comment");
        let inner = match node.kind() {
            "parenthesized_expression" => named.next(),
            "type" => match (named.next(), named.next()) {
                (Some(only), None) if only.kind() == "parenthesized_expression" => Some(only),
                _ => None,
            },
            _ => None,
        };
        match inner {
            Some(inner) => node = inner,
            None => return node,
        }
    }
}

/// Find the first child of a specific type.
#[allow(clippy::manual_find)]
pub fn find_child_by_type<'a>(node: &Node<'a>, type_name: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == type_name {
            return Some(child);
        }
    }
    None
}

/// Get line number (1-indexed) from a node.
pub fn get_start_line(node: &Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// Get end line number (1-indexed) from a node.
pub fn get_end_line(node: &Node) -> u32 {
    node.end_position().row as u32 + 1
}

/// Count total lines in source.
pub fn count_lines(source: &str) -> u32 {
    source.lines().count() as u32
}

/// Locate the first syntax error in document order.
///
/// Returns the 1-indexed line and a short description.
pub fn first_syntax_error(root: &Node, source: &str) -> Option<(u32, String)> {
    if !root.has_error() {
        return None;
    }

    let mut stack = vec![*root];
    while let Some(node) = stack.pop() {
        if node.is_missing() {
            return Some((get_start_line(&node), format!("missing '{}'", node.kind())));
        }
        if node.is_error() {
            let snippet: String = get_node_text(&node, source)
                .lines()
                .next()
                .unwrap_or("")
                .chars()
                .take(40)
                .collect();
            return Some((get_start_line(&node), format!("invalid syntax near '{}'", snippet.trim())));
        }
        if !node.has_error() {
            continue;
        }
        // Push in reverse so the leftmost child is visited first.
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    Some((get_start_line(root), "invalid syntax".to_string()))
}

/// Extract string content, removing prefix and quotes.
pub fn string_literal_value(text: &str) -> String {
    let body = text.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if body.len() >= 2 * quote.len() && body.starts_with(quote) && body.ends_with(quote) {
            return body[quote.len()..body.len() - quote.len()].to_string();
        }
    }
    body.to_string()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Keywords that can appear inside an expression and always keep a space
/// on either side.
const EXPR_KEYWORDS: &[&str] = &[
    "and", "as", "async", "await", "else", "for", "from", "if", "in", "is", "lambda", "not", "or", "yield",
];

fn is_keyword(word: &str) -> bool {
    EXPR_KEYWORDS.contains(&word)
}

fn trailing_word(out: &str) -> &str {
    &out[out.trim_end_matches(is_word_char).len()..]
}

fn leading_word(chars: &[char], start: usize) -> String {
    chars[start..].iter().take_while(|c| is_word_char(**c)).collect()
}

/// Canonical string form of a Python expression.
///
/// Comments and insignificant whitespace are dropped, string literals are kept
/// verbatim, a single space follows every comma, `|` and expression keywords
/// (`and`, `if`, `not`, ...) are surrounded by spaces, and trailing commas
/// before `]` / `}` are removed. Two expressions that only
/// differ in layout normalize to the same string.
pub fn normalize_expr(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '"' || c == '\'' {
            let end = string_end(&chars, i);
            let last = out.chars().last();
            if last == Some(',')
                || (pending_space && last.is_some_and(is_word_char))
                || is_keyword(trailing_word(&out))
            {
                out.push(' ');
            }
            pending_space = false;
            out.extend(&chars[i..end]);
            i = end;
            continue;
        }

        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            pending_space = true;
            continue;
        }

        if c.is_whitespace() || c == '\\' {
            pending_space = true;
            i += 1;
            continue;
        }

        match c {
            ',' => {
                out.push(',');
            }
            '|' => {
                while out.ends_with(' ') {
                    out.pop();
                }
                out.push_str(" | ");
            }
            ']' | '}' | ')' => {
                while out.ends_with(' ') {
                    out.pop();
                }
                if c != ')' && out.ends_with(',') {
                    out.pop();
                }
                out.push(c);
            }
            _ => {
                let starts_word = is_word_char(c) && (i == 0 || !is_word_char(chars[i - 1]));
                let space = match out.chars().last() {
                    None => false,
                    Some(',') => true,
                    Some(last) => {
                        (pending_space && is_word_char(last) && is_word_char(c))
                            || ((starts_word || !is_word_char(c))
                                && c != ':'
                                && is_keyword(trailing_word(&out)))
                            || (starts_word
                                && !matches!(last, '(' | '[' | '{' | ' ')
                                && is_keyword(&leading_word(&chars, i)))
                    }
                };
                if space {
                    out.push(' ');
                }
                out.push(c);
            }
        }
        pending_space = false;
        i += 1;
    }

    out.trim().to_string()
}

/// Index one past the end of the string literal starting at `start`.
fn string_end(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let triple = start + 2 < chars.len() && chars[start + 1] == quote && chars[start + 2] == quote;
    let mut i = if triple { start + 3 } else { start + 1 };

    while i < chars.len() {
        if chars[i] == '\\' {
            i += 2;
            continue;
        }
        if chars[i] == quote {
            if !triple {
                return i + 1;
            }
            if i + 2 < chars.len() && chars[i + 1] == quote && chars[i + 2] == quote {
                return i + 3;
            }
        }
        i += 1;
    }
    chars.len()
}
