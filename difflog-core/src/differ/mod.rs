//! API diff engine.
//!
//! Compares two [`ApiModel`](crate::model::ApiModel)s symbol by symbol. Shared
//! symbols go through a generic structural comparison ([`structural`]) whose
//! deltas are re-classified into typed change records ([`changes`]).
//!
//! # Example
//!
//! ```
//! use difflog_core::differ::{diff, ChangeKind};
//! use difflog_core::extractor::extract_source;
//!
//! let before = extract_source("def f(x: int) -> int: ...\n", "m.py").unwrap();
//! let after = extract_source("def f(x: int, y: int = 0) -> int: ...\n", "m.py").unwrap();
//!
//! let records = diff(&before, &after);
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].change_kind, ChangeKind::SignatureChanged);
//! ```

pub mod changes;
pub mod comparator;
pub mod structural;

pub use changes::{ApiDiff, ChangeKind, ChangeRecord, DiffSummary, SubChange};
pub use comparator::{compare_symbols, diff, diff_models};
pub use structural::{diff_values, Delta, DeltaKind, DiffOptions, PathSegment};
