//! Component E plus the spec-level `Operation`/`ResultData` model:
//!
//! - [`model`] — `Operation`, `ResultData`, `Requirement` (§3).
//! - [`matcher`] — selecting the matching operation, and the
//!   `may_resolve` "collect missing keys" path (§4.E, §7).
//! - [`paging`] — the `(skip, count, max_page_size)` translator (§6).

pub mod matcher;
pub mod model;
pub mod paging;

pub use model::{Operation, OperationKind, PayloadFormat, Requirement, ResultData};
