//! Error kinds surfaced to hosts, and the internal kinds recovered locally.
//!
//! Per the error-handling design: a fetch chain that completes with `None`
//! short-circuits upward without becoming an error (an empty expansion, an
//! invalid spec-declared regex, a missing metadata key); only a genuine
//! failure — an HTTP error, a cancel, an unparsable payload — propagates as
//! a [`PipelineError`], which the operation boundary then maps to one of the
//! five caller-visible [`SourceError`] kinds.

use thiserror::Error;

/// Errors surfaced to the host media framework at the operation boundary.
///
/// Every operation (`browse`, `search`, `resolve`) maps any underlying
/// [`PipelineError`] to exactly one of these, per §7. `Cancelled` is mapped
/// identically regardless of which operation kind was cancelled.
#[derive(Debug, Error, Clone)]
pub enum SourceError {
    /// The cooperative cancel token for this operation was signalled.
    #[error("operation was cancelled")]
    Cancelled,
    /// A browse operation's fetch-and-dispatch pipeline failed.
    #[error("browse failed: {0}")]
    BrowseFailed(String),
    /// A search operation's fetch-and-dispatch pipeline failed.
    #[error("search failed: {0}")]
    SearchFailed(String),
    /// A resolve operation's fetch-and-dispatch pipeline failed.
    #[error("resolve failed: {0}")]
    ResolveFailed(String),
    /// The root fetch of an operation could not produce a payload at all
    /// (network failure, non-2xx response, REST call setup failure).
    #[error("unable to read source: {0}")]
    UnableToReadSource(String),
}

impl SourceError {
    /// Map a [`PipelineError`] to the caller-visible kind for `kind`.
    ///
    /// `kind` names which operation was running (`"browse"`, `"search"`,
    /// `"resolve"`); `Cancelled` ignores it.
    pub fn from_pipeline(err: PipelineError, kind: OperationKind) -> Self {
        if matches!(err, PipelineError::Cancelled) {
            return SourceError::Cancelled;
        }
        if matches!(err, PipelineError::UnableToReadSource(_)) {
            return SourceError::UnableToReadSource(err.to_string());
        }
        match kind {
            OperationKind::Browse => SourceError::BrowseFailed(err.to_string()),
            OperationKind::Search => SourceError::SearchFailed(err.to_string()),
            OperationKind::Resolve => SourceError::ResolveFailed(err.to_string()),
        }
    }
}

/// Which of the three public operations is running. Used only to pick the
/// right [`SourceError`] variant on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// List children of a container media.
    Browse,
    /// Query by free-text search.
    Search,
    /// Fill in requested keys on an existing media.
    Resolve,
}

/// Internal pipeline failures. Most of these never reach a caller: they are
/// recovered locally per §7 and either become "no result" (`None` from the
/// fetch chain) or are absorbed at a specific node. Only [`Cancelled`],
/// [`HttpFailed`], [`UnableToReadSource`], and [`RestCallFailed`] propagate
/// all the way to an operation boundary.
///
/// [`Cancelled`]: PipelineError::Cancelled
/// [`HttpFailed`]: PipelineError::HttpFailed
/// [`UnableToReadSource`]: PipelineError::UnableToReadSource
/// [`RestCallFailed`]: PipelineError::RestCallFailed
#[derive(Debug, Error, Clone)]
pub enum PipelineError {
    /// The operation's cancel token was signalled.
    #[error("operation has been cancelled")]
    Cancelled,
    /// An HTTP GET (from a `url` fetch node) failed.
    #[error("fetch failed: {0}")]
    HttpFailed(String),
    /// A REST call could not even be issued (bad endpoint, signing failure).
    #[error("cannot invoke REST call: {0}")]
    RestCallFailed(String),
    /// The root fetch of an operation produced a payload that could not be
    /// parsed as the declared format (XML or JSON).
    #[error("unable to read source: {0}")]
    UnableToReadSource(String),
}

/// Errors raised while loading a declarative spec document.
#[derive(Debug, Error)]
pub enum SpecError {
    /// The XML document itself did not parse.
    #[error("malformed spec document: {0}")]
    MalformedXml(#[from] roxmltree::Error),
    /// A required child element or attribute was absent.
    #[error("missing required element or attribute: {0}")]
    MissingElement(String),
    /// An attribute had the wrong shape (e.g. non-integer `api`).
    #[error("invalid attribute '{attribute}' on <{element}>: {reason}")]
    InvalidAttribute {
        /// Element name the bad attribute was found on.
        element: String,
        /// Attribute name.
        attribute: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A fetch-node tag the grammar does not recognize.
    #[error("unknown fetch node '<{0}>'")]
    UnknownFetchNode(String),
    /// The spec's declared `api` version fell outside the host's supported range.
    #[error("api version {found} outside supported range [{min}, {max}]")]
    ApiVersionOutOfRange {
        /// Declared version.
        found: i64,
        /// Host's minimum supported version.
        min: i64,
        /// Host's maximum supported version.
        max: i64,
    },
}
