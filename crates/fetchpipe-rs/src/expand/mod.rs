//! Component A: placeholder expansion.
//!
//! - [`string::ExpandableString`] — a parsed template with the
//!   UNKNOWN/EXPANDABLE/UNEXPANDABLE lifecycle.
//! - [`context::ExpandContext`] — the per-operation context expansion reads
//!   from (current media, private keys, search text, paging options,
//!   capture buffers).
//! - [`load`] — the one-time `%conf:…%`/`%str:…%` resolution pass applied
//!   while a spec document is loaded, before any runtime
//!   `ExpandableString` is constructed.

pub mod context;
mod handlers;
pub mod load;
pub mod string;

pub use context::{ExpandContext, OperationOptions};
pub use load::{resolve_load_tokens, Strings};
pub use string::ExpandableString;
