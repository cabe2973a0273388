//! A declarative fetch-pipeline media source engine.
//!
//! A specification document (`<source>` XML, §6) describes a tree of fetch
//! nodes — HTTP GET, OAuth/REST calls, regex extraction, string replace —
//! plus a set of media templates that bind the fetched payload (XML or
//! JSON) to typed media records. [`Source`] loads one such spec and answers
//! the three operations a host media framework calls: [`Source::browse`],
//! [`Source::search`], and [`Source::resolve`].
//!
//! # Getting started
//!
//! ```ignore
//! use fetchpipe::{Source, ReqwestTransport, NullScriptEngine, DefaultKeyRegistry, spec};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let xml = std::fs::read_to_string("source.xml")?;
//! let parsed = spec::load(&xml, 1, 5)?;
//! let transport = Arc::new(ReqwestTransport::new(Default::default()));
//! let source = Source::new(parsed, transport, Arc::new(NullScriptEngine), Arc::new(DefaultKeyRegistry));
//!
//! let results = source.browse(None, &["id".to_string(), "title".to_string()], 0, 20, "call-1").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Where to find things
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`spec`] | Parses a `<source>` document into a [`spec::Spec`]. |
//! | [`source`] | [`Source`], the assembled entry point over a loaded spec. |
//! | [`fetch`] | The [`fetch::FetchData`] pipeline tree and its evaluator. |
//! | [`dispatch`] | Binds a parsed payload to media templates (XPath/JSONPath). |
//! | [`expand`] | `%…%` placeholder substitution against [`expand::ExpandContext`]. |
//! | [`operation`] | Operation selection and the skip/count paging translator. |
//! | [`media`] | [`media::Media`] records and metadata value typing. |
//! | [`cache`] | TTL-scoped cache of parsed payloads, by result id. |
//! | [`cancel`] | Cooperative per-operation cancel tokens. |

pub mod cache;
pub mod cancel;
pub mod config;
pub mod dataref;
pub mod dispatch;
pub mod error;
pub mod expand;
pub mod fetch;
pub mod materialize;
pub mod media;
pub mod operation;
pub mod script;
pub mod source;
pub mod spec;

pub use config::SourceConfig;
pub use dataref::DataRef;
pub use error::SourceError;
pub use fetch::retry::RetryConfig;
pub use fetch::transport::{HttpTransport, ReqwestTransport};
pub use media::{DefaultKeyRegistry, KeyRegistry, Media, MetadataValue};
pub use script::{NullScriptEngine, ScriptEngine};
pub use source::{MayResolve, Source};
pub use spec::Spec;
