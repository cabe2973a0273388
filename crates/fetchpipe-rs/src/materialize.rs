//! Component G: [`ItemMaterializer`] — turns dispatched nodes into
//! [`SendItem`]s, spawning per-key fetches and honoring private keys and
//! use-resolve re-entry (§4.G).

use futures::future::join_all;

use crate::cancel::CancelToken;
use crate::dispatch::{query_in_scope, DispatchedNode, MediaTemplate};
use crate::error::PipelineError;
use crate::expand::ExpandContext;
use crate::fetch::Fetcher;
use crate::media::{convert_value, KeyRegistry, Media};
use crate::operation::OperationKind;

/// A media record in flight: keys are populated, then (if
/// `apply_resolve` is set) the caller re-enters the pipeline via a nested
/// resolve before the record is considered complete (§3, §4.G).
pub struct SendItem {
    /// The record under construction.
    pub media: Media,
    /// Set when a `use="resolve"` key was skipped here and must be filled
    /// in by a nested resolve call before this item is final.
    pub apply_resolve: bool,
}

/// Build [`SendItem`]s for each dispatched node, merging `requested_keys`
/// with each node's template's mandatory keys, expanding private keys
/// scoped to the node, and fetching every other key concurrently.
///
/// Keys registered `use="resolve"` are left unset (with
/// [`SendItem::apply_resolve`] set) when `operation_kind` is not
/// [`OperationKind::Resolve`] — the caller is responsible for re-entering
/// the pipeline afterwards (kept out of this module to avoid a dependency
/// cycle with the `Source` that owns both the operation table and the
/// materializer).
pub async fn materialize<'a>(
    dispatched: Vec<DispatchedNode<'a>>,
    templates: &[MediaTemplate],
    requested_keys: &[String],
    operation_kind: OperationKind,
    fetcher: &Fetcher,
    registry: &dyn KeyRegistry,
    ctx: &ExpandContext,
    cancel: &CancelToken,
) -> Result<Vec<SendItem>, PipelineError> {
    let mut items = Vec::with_capacity(dispatched.len());
    for dispatched_node in dispatched {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let template = &templates[dispatched_node.template_index];
        let mut media = Media::new(template.media_type);

        for priv_decl in &template.private_keys {
            let expr = priv_decl.path.expand(ctx);
            if let Some(value) =
                query_in_scope(&dispatched_node.node, &template.namespaces, &expr)
            {
                media.private.insert(priv_decl.name.clone(), value);
            }
        }

        let mut merged_keys: Vec<String> = requested_keys.to_vec();
        for key in &template.mandatory_keys {
            if !merged_keys.contains(key) {
                merged_keys.push(key.clone());
            }
        }

        let use_resolve_keys = template.use_resolve_keys();
        let mut apply_resolve = false;
        let mut pending_fetches = Vec::new();
        for key in &merged_keys {
            if media.keys.contains_key(key) {
                continue;
            }
            if operation_kind != OperationKind::Resolve && use_resolve_keys.contains(key) {
                apply_resolve = true;
                continue;
            }
            if let Some((_, fetch_data)) = template.keys.iter().find(|(name, _)| name == key) {
                pending_fetches.push((key.clone(), fetch_data));
            }
        }

        let fetched = join_all(
            pending_fetches
                .iter()
                .map(|(name, fetch_data)| async move {
                    let value = fetcher.fetch(fetch_data, ctx, cancel).await?;
                    Ok::<_, PipelineError>((name.clone(), value))
                }),
        )
        .await;

        for result in fetched {
            let (name, value) = result?;
            if let Some(raw) = value {
                let kind = registry.value_kind(&name);
                media.keys.insert(name, convert_value(raw, kind));
            }
        }

        items.push(SendItem {
            media,
            apply_resolve,
        });
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{xml, PayloadNode};
    use crate::expand::{ExpandableString, OperationOptions};
    use crate::fetch::FetchData;
    use crate::media::{DefaultKeyRegistry, MediaType};
    use crate::operation::PayloadFormat;
    use crate::script::NullScriptEngine;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct NullTransport;

    #[async_trait]
    impl crate::fetch::transport::HttpTransport for NullTransport {
        async fn get(&self, _url: &str) -> Result<String, PipelineError> {
            Ok(String::new())
        }
        async fn call(
            &self,
            _request: crate::fetch::transport::RestRequest,
        ) -> Result<String, PipelineError> {
            Ok(String::new())
        }
    }

    fn fetcher() -> Fetcher {
        Fetcher::new(Arc::new(NullTransport), Arc::new(NullScriptEngine))
    }

    fn ctx() -> ExpandContext {
        ExpandContext::new("s", None, HashMap::new(), "", OperationOptions::default(), 0)
    }

    #[tokio::test]
    async fn scenario_one_empty_private_key_leaves_title_unset() {
        let package = xml::parse(r#"<root><item id="id"/></root>"#).unwrap();
        let document = package.as_document();
        let nodes = xml::query(&document, &[], "//item");
        let dispatched = vec![DispatchedNode {
            template_index: 0,
            node: PayloadNode::Xml(nodes[0]),
        }];
        let template = MediaTemplate {
            media_type: MediaType::Media,
            format: PayloadFormat::Xml,
            operation_id_filter: None,
            namespaces: vec![],
            query: Some(ExpandableString::new("//item")),
            select: None,
            keys: vec![(
                "id".to_string(),
                FetchData::Raw(ExpandableString::new("%key:id%")),
            )],
            key_flags: HashMap::new(),
            mandatory_keys: vec!["id".to_string(), "title".to_string()],
            private_keys: vec![crate::dispatch::PrivateKeyDecl {
                name: "id".to_string(),
                path: ExpandableString::new("@id"),
            }],
        };
        let templates = vec![template];
        let cancel = CancelToken::default();
        let context = ctx();
        let items = materialize(
            dispatched,
            &templates,
            &[],
            OperationKind::Browse,
            &fetcher(),
            &DefaultKeyRegistry,
            &context,
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(items.len(), 1);
        assert!(!items[0].media.keys.contains_key("title"));
        assert_eq!(items[0].media.private.get("id"), Some(&"id".to_string()));
    }

    #[tokio::test]
    async fn use_resolve_key_is_deferred_outside_resolve() {
        let package = xml::parse("<root><item/></root>").unwrap();
        let document = package.as_document();
        let nodes = xml::query(&document, &[], "//item");
        let dispatched = vec![DispatchedNode {
            template_index: 0,
            node: PayloadNode::Xml(nodes[0]),
        }];
        let mut flags = HashMap::new();
        flags.insert(
            "description".to_string(),
            crate::dispatch::KeyFlags {
                use_resolve: true,
                ..Default::default()
            },
        );
        let template = MediaTemplate {
            media_type: MediaType::Media,
            format: PayloadFormat::Xml,
            operation_id_filter: None,
            namespaces: vec![],
            query: Some(ExpandableString::new("//item")),
            select: None,
            keys: vec![],
            key_flags: flags,
            mandatory_keys: vec!["description".to_string()],
            private_keys: vec![],
        };
        let templates = vec![template];
        let cancel = CancelToken::default();
        let context = ctx();
        let items = materialize(
            dispatched,
            &templates,
            &[],
            OperationKind::Browse,
            &fetcher(),
            &DefaultKeyRegistry,
            &context,
            &cancel,
        )
        .await
        .unwrap();
        assert!(items[0].apply_resolve);
        assert!(!items[0].media.keys.contains_key("description"));
    }
}
