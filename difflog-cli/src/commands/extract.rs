//! Extract command - print the public API model of a source tree

use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use difflog_core::{extract_with, ApiModel, ExtractOptions, SymbolKind};
use serde::Serialize;

use crate::output::{self, markdown, OutputConfig, Outputter};

/// An extracted model. Serializes as the bare model, so `--format json`
/// output can be loaded back with `ApiModel::from_json`.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ModelReport {
    pub model: ApiModel,
}

/// Nesting depth of a symbol below its top-level package.
fn depth(qualified_name: &str) -> usize {
    qualified_name.matches('.').count()
}

impl Outputter for ModelReport {
    fn to_text(&self) -> String {
        if self.model.is_empty() {
            return format!("{}\n", "No public symbols found.".dimmed());
        }

        let mut output = String::new();
        for symbol in self.model.iter() {
            let indent = "  ".repeat(depth(&symbol.qualified_name));
            let kind = format!("{:<8}", symbol.kind.as_str());
            let line = match symbol.kind {
                SymbolKind::Module => format!("{}{} {}", indent, kind.dimmed(), symbol.qualified_name.cyan().bold()),
                _ => format!("{}{} {}", indent, kind.dimmed(), symbol.declaration()),
            };
            output.push_str(&line);
            output.push('\n');
        }
        output
    }

    fn to_markdown(&self) -> String {
        let mut output = markdown::heading(1, "Public API");
        output.push('\n');
        if self.model.is_empty() {
            output.push_str("No public symbols found.\n");
            return output;
        }

        output.push_str("| Name | Kind | Declaration |\n");
        output.push_str("|------|------|-------------|\n");
        for symbol in self.model.iter() {
            output.push_str(&format!(
                "| {} | {} | {} |\n",
                markdown::code(&symbol.qualified_name),
                symbol.kind.as_str(),
                markdown::code(&symbol.declaration()).replace('|', "\\|")
            ));
        }
        output
    }
}

/// Run the extract command.
pub fn run(path: &Path, options: &ExtractOptions, config: &OutputConfig) -> anyhow::Result<()> {
    let model = extract_with(path, options)
        .with_context(|| format!("failed to extract {}", path.display()))?;
    output::print(&ModelReport { model }, config);
    Ok(())
}
