//! Error types for difflog-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for difflog-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while extracting or comparing API models.
///
/// Every variant is fatal for the comparison it occurs in. None of them is
/// ever folded into an empty diff.
#[derive(Error, Debug)]
pub enum Error {
    /// A source file could not be parsed.
    #[error("{}", extraction_message(.revision, .path, .line, .message))]
    Extraction {
        /// Revision the file belongs to, when known.
        revision: Option<String>,
        /// File that failed to parse.
        path: PathBuf,
        /// 1-indexed line of the first syntax error, when known.
        line: Option<u32>,
        /// Description of the failure.
        message: String,
    },

    /// A revision identifier could not be turned into a source tree.
    #[error("cannot resolve revision '{revision}': {message}")]
    Resolver {
        /// The revision that failed to resolve.
        revision: String,
        /// Description of the failure.
        message: String,
    },

    /// A symbol carries a kind outside the recognized set.
    #[error("symbol '{qualified_name}' has unrecognized kind '{kind}'")]
    ModelMismatch {
        /// Symbol that carried the kind.
        qualified_name: String,
        /// The offending kind string.
        kind: String,
    },

    /// Reading a source file failed.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Model (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn extraction_message(
    revision: &Option<String>,
    path: &std::path::Path,
    line: &Option<u32>,
    message: &str,
) -> String {
    let mut out = String::from("failed to parse ");
    out.push_str(&path.display().to_string());
    if let Some(line) = line {
        out.push_str(&format!(":{}", line));
    }
    if let Some(revision) = revision {
        out.push_str(&format!(" at revision '{}'", revision));
    }
    out.push_str(&format!(": {}", message));
    out
}

impl Error {
    /// Build an extraction error for a file.
    pub fn extraction(path: impl Into<PathBuf>, line: Option<u32>, message: impl Into<String>) -> Self {
        Error::Extraction {
            revision: None,
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Build a resolver error for a revision.
    pub fn resolver(revision: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Resolver {
            revision: revision.into(),
            message: message.into(),
        }
    }

    /// Attach the revision an extraction error belongs to.
    ///
    /// Other variants are returned unchanged.
    pub fn at_revision(self, label: &str) -> Self {
        match self {
            Error::Extraction {
                path,
                line,
                message,
                ..
            } => Error::Extraction {
                revision: Some(label.to_string()),
                path,
                line,
                message,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_display() {
        let err = Error::extraction("pkg/mod.py", Some(3), "unexpected token");
        assert_eq!(err.to_string(), "failed to parse pkg/mod.py:3: unexpected token");

        let err = err.at_revision("v1.2.0");
        assert!(err.to_string().contains("at revision 'v1.2.0'"));
        assert!(err.to_string().contains("pkg/mod.py:3"));
    }

    #[test]
    fn test_resolver_display() {
        let err = Error::resolver("nope", "unknown revision");
        assert!(err.to_string().contains("'nope'"));
        // Only extraction errors carry a revision label.
        let err = err.at_revision("other");
        assert!(matches!(err, Error::Resolver { ref revision, .. } if revision == "nope"));
    }

    #[test]
    fn test_model_mismatch_display() {
        let err = Error::ModelMismatch {
            qualified_name: "pkg.thing".to_string(),
            kind: "widget".to_string(),
        };
        assert!(err.to_string().contains("pkg.thing"));
        assert!(err.to_string().contains("widget"));
    }
}
