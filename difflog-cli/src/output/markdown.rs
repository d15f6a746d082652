//! Markdown building blocks for changelog-style output.

/// Inline code span, widening the fence when the text contains backticks.
pub fn code(text: &str) -> String {
    let mut run = 0;
    let mut max_run = 0;
    for c in text.chars() {
        if c == '`' {
            run += 1;
            max_run = max_run.max(run);
        } else {
            run = 0;
        }
    }
    let fence = "`".repeat(max_run + 1);
    if max_run > 0 {
        format!("{} {} {}", fence, text, fence)
    } else {
        format!("{}{}{}", fence, text, fence)
    }
}

pub fn heading(level: usize, text: &str) -> String {
    format!("{} {}\n", "#".repeat(level.clamp(1, 6)), text)
}

/// Escape the characters that would otherwise turn plain text into markup.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '[' | ']' | '<' | '>' | '|') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_plain() {
        assert_eq!(code("pkg.f"), "`pkg.f`");
    }

    #[test]
    fn test_code_with_backtick() {
        assert_eq!(code("a`b"), "`` a`b ``");
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(heading(2, "Added"), "## Added\n");
        assert_eq!(heading(9, "x"), "###### x\n");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("__init__ | *args"), "\\_\\_init\\_\\_ \\| \\*args");
    }
}
