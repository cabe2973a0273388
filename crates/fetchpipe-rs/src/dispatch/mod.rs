//! Component F: binding a parsed payload to [`template::MediaTemplate`]s.
//!
//! - [`xml`] / [`json`] — format-specific parsing and path evaluation.
//! - [`payload`] — the format-agnostic node handle and query entry point.
//! - [`template`] — `MediaTemplate` and the dispatch algorithm itself.

pub mod json;
pub mod payload;
pub mod template;
pub mod xml;

pub use payload::{query_in_scope, PayloadNode};
pub use template::{dispatch, DispatchOutcome, DispatchedNode, KeyFlags, MediaTemplate, PrivateKeyDecl};
