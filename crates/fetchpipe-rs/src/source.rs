//! The assembled source: wires the Operation table, TemplateDispatcher,
//! ItemMaterializer, ResultCache, CancellationBroker and Fetcher together
//! behind the three public operations (§2 "Data flow").

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{ParsedPayload, ResultCache};
use crate::cancel::{CancelToken, CancellationBroker};
use crate::dispatch::{dispatch, json, xml};
use crate::error::{OperationKind as ErrorOperationKind, PipelineError, SourceError};
use crate::expand::{ExpandContext, OperationOptions};
use crate::fetch::Fetcher;
use crate::fetch::transport::HttpTransport;
use crate::materialize::materialize;
use crate::media::{deserialize_private_keys, serialize_private_keys, KeyRegistry, Media};
use crate::operation::matcher::{check_requirements, select, RequirementOutcome};
use crate::operation::{Operation, OperationKind, PayloadFormat};
use crate::script::ScriptEngine;
use crate::spec::Spec;

/// Outcome of the `may_resolve` introspection path (§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MayResolve {
    /// No resolve operation can ever produce `key` for this media.
    No,
    /// A resolve operation matches as-is.
    Yes,
    /// A resolve operation would match if the caller additionally supplied
    /// these keys.
    Missing(Vec<String>),
}

fn error_kind(kind: OperationKind) -> ErrorOperationKind {
    match kind {
        OperationKind::Browse => ErrorOperationKind::Browse,
        OperationKind::Search => ErrorOperationKind::Search,
        OperationKind::Resolve => ErrorOperationKind::Resolve,
    }
}

/// A loaded specification bound to live collaborators, answering
/// browse/search/resolve requests.
pub struct Source {
    spec: Spec,
    fetcher: Fetcher,
    cache: ResultCache,
    cancel_broker: CancellationBroker,
    registry: Arc<dyn KeyRegistry>,
}

impl Source {
    /// Build a source from a parsed spec and its collaborators.
    pub fn new(
        spec: Spec,
        transport: Arc<dyn HttpTransport>,
        script: Arc<dyn ScriptEngine>,
        registry: Arc<dyn KeyRegistry>,
    ) -> Self {
        Self {
            spec,
            fetcher: Fetcher::new(transport, script),
            cache: ResultCache::new(),
            cancel_broker: CancellationBroker::new(),
            registry,
        }
    }

    /// The underlying spec, for host metadata display (name/description/icon).
    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    /// Signal the cancel token registered for `operation_call_id`, if any
    /// operation with that id is still in flight.
    pub fn cancel(&self, operation_call_id: &str) -> bool {
        self.cancel_broker.cancel(operation_call_id)
    }

    /// Browse a container media, or the source root when `media` is `None`.
    pub async fn browse(
        &self,
        media: Option<Media>,
        requested_keys: &[String],
        skip: i64,
        count: i64,
        operation_call_id: &str,
    ) -> Result<Vec<Media>, SourceError> {
        let operation = select(&self.spec.browse, media.as_ref())
            .ok_or_else(|| SourceError::BrowseFailed("no matching browse operation".to_string()))?;
        self.run(operation, media, "", requested_keys, skip, count, operation_call_id)
            .await
            .map_err(|e| SourceError::from_pipeline(e, ErrorOperationKind::Browse))
    }

    /// Search by free text. Always uses `search[0]`, unconditionally (§4.E).
    pub async fn search(
        &self,
        search_text: &str,
        requested_keys: &[String],
        skip: i64,
        count: i64,
        operation_call_id: &str,
    ) -> Result<Vec<Media>, SourceError> {
        let operation = self
            .spec
            .search
            .first()
            .ok_or_else(|| SourceError::SearchFailed("no search operation declared".to_string()))?;
        self.run(operation, None, search_text, requested_keys, skip, count, operation_call_id)
            .await
            .map_err(|e| SourceError::from_pipeline(e, ErrorOperationKind::Search))
    }

    /// Resolve additional keys on an existing media.
    pub async fn resolve(
        &self,
        media: Media,
        requested_keys: &[String],
        operation_call_id: &str,
    ) -> Result<Media, SourceError> {
        let operation = pick_resolve(&self.spec.resolve, Some(&media), requested_keys)
            .ok_or_else(|| SourceError::ResolveFailed("no matching resolve operation".to_string()))?;
        let items = self
            .run(operation, Some(media.clone()), "", requested_keys, 0, 1, operation_call_id)
            .await
            .map_err(|e| SourceError::from_pipeline(e, ErrorOperationKind::Resolve))?;
        Ok(items.into_iter().next().unwrap_or(media))
    }

    /// `may_resolve` introspection: can some resolve operation populate
    /// `requested_key` on `media`, and if not yet, which keys would make it
    /// match (§7)?
    pub fn may_resolve(&self, media: &Media, requested_key: &str) -> MayResolve {
        let mut best_missing: Option<Vec<String>> = None;
        for operation in &self.spec.resolve {
            let key_ok = operation.resolve_any
                || operation.resolve_key.as_deref() == Some(requested_key);
            if !key_ok {
                continue;
            }
            match check_requirements(operation, media) {
                RequirementOutcome::Satisfied => return MayResolve::Yes,
                RequirementOutcome::Missing(missing) => {
                    if best_missing.is_none() {
                        best_missing = Some(missing);
                    }
                }
                RequirementOutcome::Rejected => continue,
            }
        }
        match best_missing {
            Some(missing) => MayResolve::Missing(missing),
            None => MayResolve::No,
        }
    }

    async fn run(
        &self,
        operation: &Operation,
        media: Option<Media>,
        search_text: &str,
        requested_keys: &[String],
        skip: i64,
        count: i64,
        operation_call_id: &str,
    ) -> Result<Vec<Media>, PipelineError> {
        let cancel = self.cancel_broker.register(operation_call_id);
        let result = self.run_inner(operation, media, search_text, requested_keys, skip, count, &cancel).await;
        self.cancel_broker.release(operation_call_id);
        result
    }

    async fn run_inner(
        &self,
        operation: &Operation,
        media: Option<Media>,
        search_text: &str,
        requested_keys: &[String],
        skip: i64,
        count: i64,
        cancel: &CancelToken,
    ) -> Result<Vec<Media>, PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let private_keys = media
            .as_ref()
            .map(|m| m.private.clone())
            .unwrap_or_default();
        let ctx = ExpandContext::new(
            &self.spec.id,
            media.clone(),
            private_keys,
            search_text,
            OperationOptions { skip, count },
            self.spec.autosplit,
        );

        let effective_skip = operation.skip.expand(&ctx).trim().parse().unwrap_or(0);
        let effective_count = operation.count.expand(&ctx).trim().parse().unwrap_or(0);

        let payload = self.load_payload(operation, &ctx, cancel).await?;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let outcome = dispatch(
            &payload,
            &self.spec.templates,
            operation.kind,
            &operation.id,
            effective_skip,
            effective_count,
            &ctx,
        );

        let mut items = materialize(
            outcome.nodes,
            &self.spec.templates,
            requested_keys,
            operation.kind,
            &self.fetcher,
            self.registry.as_ref(),
            &ctx,
            cancel,
        )
        .await?;

        for item in &mut items {
            if !item.apply_resolve {
                continue;
            }
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let Some(resolve_op) = pick_resolve(&self.spec.resolve, Some(&item.media), requested_keys) else {
                continue;
            };
            let nested_ctx = ExpandContext::new(
                &self.spec.id,
                Some(item.media.clone()),
                item.media.private.clone(),
                "",
                OperationOptions { skip: 0, count: 1 },
                self.spec.autosplit,
            );
            let nested_payload = self.load_payload(resolve_op, &nested_ctx, cancel).await?;
            let nested_outcome = dispatch(
                &nested_payload,
                &self.spec.templates,
                resolve_op.kind,
                &resolve_op.id,
                0,
                1,
                &nested_ctx,
            );
            let nested_items = materialize(
                nested_outcome.nodes,
                &self.spec.templates,
                requested_keys,
                resolve_op.kind,
                &self.fetcher,
                self.registry.as_ref(),
                &nested_ctx,
                cancel,
            )
            .await?;
            if let Some(nested) = nested_items.into_iter().next() {
                item.media.keys.extend(nested.media.keys);
                item.media.private.extend(nested.media.private);
            }
        }

        Ok(items.into_iter().map(|item| item.media).collect())
    }

    async fn load_payload(
        &self,
        operation: &Operation,
        ctx: &ExpandContext,
        cancel: &CancelToken,
    ) -> Result<ParsedPayload, PipelineError> {
        let result = &operation.result;
        if let Some(cached) = self.cache.get(&result.id) {
            return Ok(cached);
        }
        let body = self
            .fetcher
            .fetch(&result.root, ctx, cancel)
            .await?
            .ok_or_else(|| PipelineError::UnableToReadSource("pipeline produced no payload".to_string()))?;
        let payload = match result.format {
            PayloadFormat::Xml => ParsedPayload::Xml(Arc::new(xml::parse(&body)?)),
            PayloadFormat::Json => ParsedPayload::Json(Arc::new(json::parse(&body)?)),
        };
        self.cache.put(result.id.clone(), payload.clone(), result.cache_ttl);
        Ok(payload)
    }
}

fn pick_resolve<'a>(
    operations: &'a [Operation],
    media: Option<&Media>,
    requested_keys: &[String],
) -> Option<&'a Operation> {
    operations.iter().find(|op| {
        let key_ok = op.resolve_any
            || op
                .resolve_key
                .as_deref()
                .is_some_and(|k| requested_keys.iter().any(|rk| rk == k));
        if !key_ok {
            return false;
        }
        let type_ok = media
            .and_then(|m| m.media_type)
            .is_none_or(|media_type| op.media_type.is_supertype_of(media_type));
        if !type_ok {
            return false;
        }
        match media {
            Some(media) => op
                .requirements
                .iter()
                .all(|req| media.key_as_str(&req.key).is_some_and(|value| req.matches(value))),
            None => op.requirements.is_empty(),
        }
    })
}

/// Render a media's private keys to the JSON form a host persists between
/// calls (§6).
pub fn private_keys_to_json(media: &Media) -> String {
    serialize_private_keys(&media.private)
}

/// Parse a media's private keys from the JSON form a host supplies back in
/// on a later resolve call (§6).
pub fn private_keys_from_json(json: &str) -> Result<HashMap<String, String>, serde_json::Error> {
    deserialize_private_keys(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::ExpandableString;
    use crate::fetch::FetchData;
    use crate::media::{DefaultKeyRegistry, MediaType};
    use crate::operation::ResultData;
    use crate::script::NullScriptEngine;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StubTransport {
        body: String,
    }

    #[async_trait]
    impl HttpTransport for StubTransport {
        async fn get(&self, _url: &str) -> Result<String, PipelineError> {
            Ok(self.body.clone())
        }
        async fn call(&self, _request: crate::fetch::transport::RestRequest) -> Result<String, PipelineError> {
            Ok(self.body.clone())
        }
    }

    fn spec_with_one_browse(body: &str) -> (Spec, Arc<StubTransport>) {
        let result = Arc::new(ResultData {
            id: "r1".to_string(),
            root: FetchData::Raw(ExpandableString::new(body)),
            cache_ttl: Duration::ZERO,
            format: PayloadFormat::Xml,
        });
        let operation = Operation {
            id: "b1".to_string(),
            kind: OperationKind::Browse,
            skip: ExpandableString::new("%param:skip%"),
            count: ExpandableString::new("%param:count%"),
            media_type: MediaType::Media,
            requirements: vec![],
            resolve_key: None,
            resolve_any: false,
            result,
        };
        let template = crate::dispatch::MediaTemplate {
            media_type: MediaType::Media,
            format: PayloadFormat::Xml,
            operation_id_filter: None,
            namespaces: vec![],
            query: Some(ExpandableString::new("//item")),
            select: None,
            keys: vec![("id".to_string(), FetchData::Raw(ExpandableString::new("%key:id%")))],
            key_flags: HashMap::new(),
            mandatory_keys: vec!["id".to_string()],
            private_keys: vec![],
        };
        let spec = Spec {
            id: "test-source".to_string(),
            name: "Test".to_string(),
            description: None,
            icon: None,
            api_version: 1,
            autosplit: 0,
            user_agent: None,
            config: crate::config::SourceConfig::default(),
            strings: crate::expand::Strings::default(),
            script_body: None,
            search: vec![],
            browse: vec![operation],
            resolve: vec![],
            templates: vec![template],
        };
        (spec, Arc::new(StubTransport { body: body.to_string() }))
    }

    fn source(spec: Spec, transport: Arc<StubTransport>) -> Source {
        Source::new(spec, transport, Arc::new(NullScriptEngine), Arc::new(DefaultKeyRegistry))
    }

    #[tokio::test]
    async fn browse_returns_dispatched_media() {
        let (spec, transport) = spec_with_one_browse("<root><item id=\"1\"/><item id=\"2\"/></root>");
        let src = source(spec, transport);
        let items = src.browse(None, &[], 0, 10, "call-1").await.unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn cache_is_reused_across_calls() {
        let (spec, transport) = spec_with_one_browse("<root><item id=\"1\"/></root>");
        let mut spec = spec;
        spec.browse[0].result = Arc::new(ResultData {
            id: "r1".to_string(),
            root: FetchData::Raw(ExpandableString::new("<root><item id=\"1\"/></root>")),
            cache_ttl: Duration::from_secs(60),
            format: PayloadFormat::Xml,
        });
        let src = source(spec, transport);
        src.browse(None, &[], 0, 10, "call-1").await.unwrap();
        assert_eq!(src.cache.len(), 1);
        let second = src.browse(None, &[], 0, 10, "call-2").await.unwrap();
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn cancel_before_dispatch_short_circuits() {
        let (spec, transport) = spec_with_one_browse("<root><item id=\"1\"/></root>");
        let src = source(spec, transport);
        let cancel = CancelToken::default();
        cancel.cancel();
        let operation = &src.spec.browse[0];
        let result = src
            .run_inner(operation, None, "", &[], 0, 10, &cancel)
            .await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }
}
