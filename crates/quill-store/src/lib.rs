//! File-backed entity store for issue and pull-request lifecycle records.
//!
//! One YAML file per record under `.quill/issues/` and `.quill/prs/`; every
//! write is a whole-file atomic rewrite so readers never observe a partial
//! record. The store is the single source of truth for lifecycle state; all
//! status transitions go through it.

pub mod record;
pub mod store;

pub use record::{IssueRecord, IssueStatus, PrRecord, PrStatus, ThreadComment};
pub use store::{EntityStore, NewIssue};
