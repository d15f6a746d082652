//! difflog CLI - Public API diffs for Python packages
//!
//! Compares the public API of a Python package between two git revisions,
//! two directories or two files, without importing any of the code.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::*;
use config::DifflogConfig;
use output::{OutputConfig, OutputFormat};

/// Public API diffs for Python packages.
#[derive(Parser)]
#[command(name = "difflog")]
#[command(author, version)]
#[command(about = "Report changes to the public API of a Python package")]
#[command(propagate_version = true)]
#[command(after_help = "Examples:
  difflog diff                        Latest tag (or HEAD^) vs working tree
  difflog diff --from-rev v1.2.0      A release vs working tree
  difflog dirs old/ new/              Two source trees on disk
  difflog files a.py b.py             Two single files
  difflog extract --format json       Dump the API model

Exit codes: 0 success, 1 error, 2 breaking changes with --fail-on-breaking")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format (overrides config default)
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the public API between two git revisions
    Diff {
        /// Base revision (default: latest tag, else HEAD^)
        #[arg(long)]
        from_rev: Option<String>,

        /// Target revision (default: the working tree)
        #[arg(long)]
        to_rev: Option<String>,

        /// Repository directory
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Exit with code 2 when a breaking change is found
        #[arg(long)]
        fail_on_breaking: bool,
    },

    /// Compare the public API of two source trees
    Dirs {
        /// Old source tree
        old_dir: PathBuf,

        /// New source tree
        new_dir: PathBuf,

        /// Exit with code 2 when a breaking change is found
        #[arg(long)]
        fail_on_breaking: bool,
    },

    /// Compare the public API of two Python files
    Files {
        /// Old file
        old_file: PathBuf,

        /// New file
        new_file: PathBuf,

        /// Read the old file at this git revision instead of from disk
        #[arg(long)]
        from_rev: Option<String>,

        /// Read the new file at this git revision instead of from disk
        #[arg(long)]
        to_rev: Option<String>,

        /// Repository directory, for --from-rev / --to-rev
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Exit with code 2 when a breaking change is found
        #[arg(long)]
        fail_on_breaking: bool,
    },

    /// Print the public API model of a source tree
    Extract {
        /// Source tree (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

/// Output settings: CLI flag > config default > text.
fn output_config(cli: &Cli, config: &DifflogConfig) -> OutputConfig {
    let format = cli.format.unwrap_or_else(|| {
        config
            .default_format()
            .and_then(|f| match f.parse() {
                Ok(format) => Some(format),
                Err(e) => {
                    tracing::warn!("Ignoring configured output format: {}", e);
                    None
                }
            })
            .unwrap_or_default()
    });

    let output = OutputConfig::auto_detect_with_color_override(format, config.use_color());
    if cli.no_color {
        output.without_colors()
    } else {
        output
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_root = match &cli.command {
        Commands::Diff { repo, .. } | Commands::Files { repo, .. } => repo.as_path(),
        _ => Path::new("."),
    };
    let config = DifflogConfig::load(config_root);
    let output = output_config(&cli, &config);
    output.apply_color_override();
    let options = config.extract_options();

    match cli.command {
        Commands::Diff {
            ref from_rev,
            ref to_rev,
            ref repo,
            fail_on_breaking,
        } => diff::run(
            repo,
            from_rev.as_deref(),
            to_rev.as_deref(),
            fail_on_breaking,
            &options,
            &output,
        ),
        Commands::Dirs {
            ref old_dir,
            ref new_dir,
            fail_on_breaking,
        } => dirs::run(old_dir, new_dir, fail_on_breaking, &options, &output),
        Commands::Files {
            ref old_file,
            ref new_file,
            ref from_rev,
            ref to_rev,
            ref repo,
            fail_on_breaking,
        } => files::run(
            old_file,
            new_file,
            repo,
            from_rev.as_deref(),
            to_rev.as_deref(),
            fail_on_breaking,
            &output,
        ),
        Commands::Extract { ref path } => {
            extract::run(path, &options, &output).map(|_| ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
