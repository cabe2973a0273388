//! Component C: the `FetchData` tree and its evaluator.
//!
//! - [`tree`] — the five fetch-node variants plus the REST/regexp support
//!   types (§3, §6).
//! - [`fetcher::Fetcher`] — the recursive async evaluator (§4.C).
//! - [`transport::HttpTransport`] — the HTTP/REST seam, so the evaluator
//!   can be exercised against a stub transport in tests.
//! - [`retry`] — backoff policy for transient transport failures.

pub mod fetcher;
pub mod retry;
pub mod transport;
pub mod tree;

pub use fetcher::Fetcher;
pub use tree::FetchData;
