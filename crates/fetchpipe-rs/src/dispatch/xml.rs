//! XML payload parsing and XPath querying, via `sxd_document`/`sxd_xpath`.

use sxd_document::{dom::Document, parser, Package};
use sxd_xpath::{nodeset::Node, Context, Factory, Value as XPathValue};

use crate::error::PipelineError;

/// Parse `body` as an XML document.
pub fn parse(body: &str) -> Result<Package, PipelineError> {
    parser::parse(body).map_err(|e| PipelineError::UnableToReadSource(e.to_string()))
}

/// Evaluate `expr` against `document`'s root, with `namespaces` registered
/// as prefix -> URI bindings (§4.F step c). Returns the matched nodes in
/// document order; a non-nodeset result or a compile failure is treated as
/// "no match" rather than a hard error, matching "a missing path skips the
/// template" (§4.F step b).
pub fn query<'d>(
    document: &Document<'d>,
    namespaces: &[(String, String)],
    expr: &str,
) -> Vec<Node<'d>> {
    query_node(document.root().into(), namespaces, expr)
}

/// Evaluate `expr` with `context_node` as the evaluation context, rather
/// than the document root. Used for private-key expressions scoped to one
/// matched node (§4.G step 2).
pub fn query_node<'d>(
    context_node: Node<'d>,
    namespaces: &[(String, String)],
    expr: &str,
) -> Vec<Node<'d>> {
    let factory = Factory::new();
    let xpath = match factory.build(expr) {
        Ok(Some(xpath)) => xpath,
        _ => return Vec::new(),
    };
    let mut context = Context::new();
    for (prefix, uri) in namespaces {
        context.set_namespace(prefix, uri);
    }
    match xpath.evaluate(&context, context_node) {
        Ok(XPathValue::Nodeset(nodes)) => nodes.document_order(),
        _ => Vec::new(),
    }
}

/// Render a queried node's text content, for typed key conversion in
/// `ItemMaterializer`.
pub fn node_text(node: &Node<'_>) -> String {
    node.string_value()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_queries_simple_document() {
        let package = parse("<root><item id=\"1\">first</item><item id=\"2\">second</item></root>")
            .unwrap();
        let document = package.as_document();
        let nodes = query(&document, &[], "//item");
        assert_eq!(nodes.len(), 2);
        assert_eq!(node_text(&nodes[0]), "first");
    }

    #[test]
    fn malformed_xml_is_rejected() {
        assert!(parse("<root><unclosed>").is_err());
    }

    #[test]
    fn unmatched_path_yields_no_nodes() {
        let package = parse("<root/>").unwrap();
        let document = package.as_document();
        assert!(query(&document, &[], "//missing").is_empty());
    }
}
