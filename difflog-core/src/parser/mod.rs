//! Python AST parsing module.
//!
//! Provides parallel parsing of discovered modules using the tree-sitter
//! Python grammar. Each file is converted to a syntax-level `ModuleDef`.

use rayon::prelude::*;
use tracing::debug;

use crate::error::{Error, Result};
use crate::scanner::ModuleFile;
use crate::types::ModuleDef;

pub mod python;

pub(crate) mod helpers;

pub use helpers::normalize_expr;

/// Parse multiple modules in parallel using rayon.
///
/// Results come back in the order of `files`, one per input. The number of
/// threads is controlled by the global pool unless `num_threads` is given.
pub fn parse_files_parallel(files: &[ModuleFile], num_threads: Option<usize>) -> Vec<Result<ModuleDef>> {
    let pool = match num_threads {
        Some(n) if n > 0 => rayon::ThreadPoolBuilder::new().num_threads(n).build().ok(),
        _ => None,
    };

    let parse_fn = |file: &ModuleFile| -> Result<ModuleDef> {
        let source = std::fs::read_to_string(&file.path).map_err(|source| Error::Io {
            path: file.path.clone(),
            source,
        })?;
        let mut module = parse_source(&source, &file.relative_path)?;
        module.name = file.name.clone();
        module.is_package = file.is_package;
        debug!(module = %module.name, lines = module.total_lines, "parsed");
        Ok(module)
    };

    match pool {
        Some(pool) => pool.install(|| files.par_iter().map(parse_fn).collect()),
        None => files.par_iter().map(parse_fn).collect(),
    }
}

/// Parse Python source held in memory.
pub fn parse_source(source: &str, path: &str) -> Result<ModuleDef> {
    python::parse(source, path)
}
