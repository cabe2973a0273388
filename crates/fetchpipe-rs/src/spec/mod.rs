//! The in-memory specification: the result of loading a source's XML
//! document (§6), ready to back a [`crate::source::Source`].

pub mod load;

use crate::config::SourceConfig;
use crate::dispatch::MediaTemplate;
use crate::expand::Strings;
use crate::operation::Operation;

pub use load::load;

/// A fully parsed specification: everything [`crate::source::Source`] needs
/// to answer browse/search/resolve calls, independent of any particular
/// request.
pub struct Spec {
    /// Declared source id, used to scope `%priv:…%` lookups and config env
    /// overrides.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// Optional icon reference (URL or resource name — opaque to the core).
    pub icon: Option<String>,
    /// Declared `api` attribute, already validated against the host's
    /// supported range at load time.
    pub api_version: i64,
    /// Declared `autosplit` page size limit; zero disables paging
    /// translation (§6).
    pub autosplit: i64,
    /// Declared `user-agent` attribute, if any.
    pub user_agent: Option<String>,
    /// Resolved `<config>` defaults, overridable by environment.
    pub config: SourceConfig,
    /// Declared `<strings>` tables.
    pub strings: Strings,
    /// Raw `<script>` body run once at load, if declared.
    pub script_body: Option<String>,
    /// Declared `<search>` operations, in declaration order.
    pub search: Vec<Operation>,
    /// Declared `<browse>` operations, in declaration order.
    pub browse: Vec<Operation>,
    /// Declared `<resolve>` operations, in declaration order.
    pub resolve: Vec<Operation>,
    /// Declared media templates from `<provide>`, in declaration order.
    pub templates: Vec<MediaTemplate>,
}
