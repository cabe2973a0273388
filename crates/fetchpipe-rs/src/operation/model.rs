//! Spec-level types: [`Operation`], [`ResultData`], and their supporting
//! pieces (§3).

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::expand::ExpandableString;
use crate::fetch::FetchData;
use crate::media::MediaType;

/// The payload format a [`ResultData`] is parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// XML, parsed with `sxd_document` and queried with XPath.
    Xml,
    /// JSON, parsed with `serde_json` and queried with JSONPath.
    Json,
}

/// A root fetch plus its cache policy, shared by id across operations
/// (§3, §4.D).
pub struct ResultData {
    /// The declared id other operations can `ref="…"` to reuse this.
    pub id: String,
    /// The root of the fetch-pipeline tree.
    pub root: FetchData,
    /// How long a successful fetch's parsed payload stays valid. Zero means
    /// never cache.
    pub cache_ttl: Duration,
    /// Which format to parse the fetched body as.
    pub format: PayloadFormat,
}

/// One `<key name="…">match-regex</key>` requirement entry (§4.E).
pub struct Requirement {
    /// Metadata key name to test.
    pub key: String,
    /// Optional anchored regex the key's string value must match in full.
    /// Compiled once at spec-load time.
    pub pattern: Option<Regex>,
}

impl Requirement {
    /// Does `value` satisfy this requirement's pattern (or is there none)?
    pub fn matches(&self, value: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern
                .find(value)
                .is_some_and(|m| m.start() == 0 && m.end() == value.len()),
            None => true,
        }
    }
}

/// Which public operation kind an [`Operation`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// List children of a container media.
    Browse,
    /// Query by free-text search.
    Search,
    /// Fill in requested keys on an existing media.
    Resolve,
}

/// A declared `<browse>`, `<search>`, or `<resolve>` operation (§3).
pub struct Operation {
    /// The spec-declared id.
    pub id: String,
    /// Which kind of request this operation answers.
    pub kind: OperationKind,
    /// Skip template, expanded against the incoming request context.
    pub skip: ExpandableString,
    /// Count template.
    pub count: ExpandableString,
    /// Required media type; the input media's type must be a subtype of
    /// this (§4.E step 1).
    pub media_type: MediaType,
    /// Requirement entries, tested in declaration order.
    pub requirements: Vec<Requirement>,
    /// The resolve-key name this operation resolves, if declared via
    /// `key="…"` on a `<resolve>` element.
    pub resolve_key: Option<String>,
    /// The `any="true"` flag: this resolve operation applies regardless of
    /// which key was requested, as long as requirements match.
    pub resolve_any: bool,
    /// The root fetch this operation evaluates, shared by id with any
    /// sibling operation declaring the same `ref`.
    pub result: Arc<ResultData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirement_without_pattern_always_matches() {
        let req = Requirement {
            key: "id".to_string(),
            pattern: None,
        };
        assert!(req.matches("anything"));
    }

    #[test]
    fn requirement_pattern_must_match_in_full() {
        let req = Requirement {
            key: "id".to_string(),
            pattern: Some(Regex::new("^[0-9]+$").unwrap()),
        };
        assert!(req.matches("123"));
        assert!(!req.matches("123abc"));
        assert!(!req.matches(""));
    }
}
