//! A payload-format-agnostic node handle, and the query entry point that
//! picks XML or JSON evaluation based on a [`crate::operation::PayloadFormat`].

use serde_json::Value as JsonValue;
use sxd_xpath::nodeset::Node as XmlNode;

use super::{json, xml};
use crate::cache::ParsedPayload;
use crate::operation::PayloadFormat;

/// One matched node from either an XML or a JSON payload.
pub enum PayloadNode<'a> {
    /// A node borrowed from an `sxd_document` document.
    Xml(XmlNode<'a>),
    /// An owned JSON value (JSONPath matches are collected, not borrowed).
    Json(JsonValue),
}

impl PayloadNode<'_> {
    /// The node's text content, for typed key conversion and private-key
    /// expansion scoped to this node.
    pub fn text(&self) -> String {
        match self {
            PayloadNode::Xml(node) => node.string_value(),
            PayloadNode::Json(value) => json_scalar_to_string(value),
        }
    }
}

fn json_scalar_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Evaluate `expr` against `payload`'s document/root, honoring XML
/// namespace registrations. Returns the matched nodes in document order
/// for XML, or JSONPath match order for JSON.
pub fn query<'a>(
    payload: &'a ParsedPayload,
    format: PayloadFormat,
    namespaces: &[(String, String)],
    expr: &str,
) -> Vec<PayloadNode<'a>> {
    match (payload, format) {
        (ParsedPayload::Xml(package), PayloadFormat::Xml) => {
            let document: sxd_document::dom::Document<'a> = package.as_document();
            xml::query(&document, namespaces, expr)
                .into_iter()
                .map(PayloadNode::Xml)
                .collect()
        }
        (ParsedPayload::Json(root), PayloadFormat::Json) => {
            json::query(root, expr).into_iter().map(PayloadNode::Json).collect()
        }
        _ => Vec::new(),
    }
}

/// Evaluate `expr` with `node` itself as the context, for private-key
/// expressions scoped to one matched node (§4.G step 2). Returns the first
/// match's text, or `None` if nothing matched.
pub fn query_in_scope(node: &PayloadNode<'_>, namespaces: &[(String, String)], expr: &str) -> Option<String> {
    match node {
        PayloadNode::Xml(node) => xml::query_node(*node, namespaces, expr)
            .into_iter()
            .next()
            .map(|n| n.string_value()),
        PayloadNode::Json(value) => json::query(value, expr).into_iter().next().map(|v| {
            json_scalar_to_string(&v)
        }),
    }
}
