//! Output formatting module for the difflog CLI
//!
//! Every report can be rendered as text (human-readable, colored on a TTY),
//! json (machine-readable) or markdown (changelog-ready).

use clap::ValueEnum;
use serde::Serialize;
use std::io::IsTerminal;
use std::str::FromStr;

mod json;
pub mod markdown;

pub use self::json::JsonOutput;

/// Output format for CLI results
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable report grouped by change kind (default)
    #[default]
    Text,
    /// JSON format for machine consumption
    Json,
    /// Markdown changelog sections
    Markdown,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("Unknown output format: '{}'", s)),
        }
    }
}

/// Configuration for output rendering
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub no_color: bool,
}

impl OutputConfig {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            no_color: false,
        }
    }

    /// Create an OutputConfig with TTY detection and optional color override.
    ///
    /// `Some(true)` forces colors on, `Some(false)` forces them off, and
    /// `None` enables them only when stdout is a terminal.
    pub fn auto_detect_with_color_override(
        format: OutputFormat,
        color_override: Option<bool>,
    ) -> Self {
        let use_color = color_override.unwrap_or_else(|| std::io::stdout().is_terminal());
        Self {
            no_color: !use_color,
            ..Self::new(format)
        }
    }

    pub fn use_colors(&self) -> bool {
        !self.no_color
    }

    /// Make the global `colored` switch follow this config.
    pub fn apply_color_override(&self) {
        colored::control::set_override(self.use_colors());
    }

    /// Builder: disable colors
    pub fn without_colors(mut self) -> Self {
        self.no_color = true;
        self
    }
}

/// Types that can be rendered in every output format.
pub trait Outputter: Serialize {
    /// Render as text
    fn to_text(&self) -> String;

    /// Render as JSON
    fn to_json(&self) -> String {
        JsonOutput::format(self)
    }

    /// Render as markdown
    fn to_markdown(&self) -> String;

    /// Render using the format specified in config
    fn render(&self, config: &OutputConfig) -> String {
        match config.format {
            OutputFormat::Text => self.to_text(),
            OutputFormat::Json => self.to_json(),
            OutputFormat::Markdown => self.to_markdown(),
        }
    }
}

/// Render and print to stdout.
pub fn print<T: Outputter>(data: &T, config: &OutputConfig) {
    let rendered = data.render(config);
    if rendered.ends_with('\n') {
        print!("{}", rendered);
    } else {
        println!("{}", rendered);
    }
}
