//! Integration coverage for the concrete scenarios in the "testable
//! properties" list, driven end to end through [`fetchpipe::spec::load`]
//! and [`fetchpipe::Source`] rather than through hand-built module types.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fetchpipe::fetch::transport::{HttpTransport, RestRequest};
use fetchpipe::{DefaultKeyRegistry, NullScriptEngine, Source};

const SPEC_XML: &str = r#"
    <source api="3" autosplit="0" user-agent="fetchpipe-scenarios">
        <id>scenarios</id>
        <name>Scenarios Source</name>
        <operation>
            <browse id="b1" skip="%param:skip%" count="%param:count%">
                <result id="root"><url>http://example.test/browse</url></result>
            </browse>
            <resolve id="r1" key="description" count="1">
                <result id="resolve" cache="60"><url>http://example.test/resolve</url></result>
            </resolve>
        </operation>
        <provide>
            <template type="media" format="xml" query="//item" select="//item">
                <priv name="id">@id</priv>
            </template>
        </provide>
    </source>
"#;

fn source(transport: Arc<dyn HttpTransport>) -> Source {
    let spec = fetchpipe::spec::load(SPEC_XML, 1, 5).unwrap();
    Source::new(spec, transport, Arc::new(NullScriptEngine), Arc::new(DefaultKeyRegistry))
}

#[tokio::test]
async fn scenario_five_resolve_cache_issues_one_fetch() {
    struct Transport {
        body: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpTransport for Transport {
        async fn get(&self, _url: &str) -> Result<String, fetchpipe::error::PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
        async fn call(
            &self,
            _request: RestRequest,
        ) -> Result<String, fetchpipe::error::PipelineError> {
            unreachable!()
        }
    }

    let transport = Arc::new(Transport {
        body: "<root><item id=\"1\"/></root>".to_string(),
        calls: AtomicUsize::new(0),
    });
    let src = source(transport.clone());

    let mut media = fetchpipe::Media::new(fetchpipe::media::MediaType::Media);
    media
        .keys
        .insert("id".to_string(), fetchpipe::MetadataValue::Str("1".to_string()));

    let first = src
        .resolve(media.clone(), &["description".to_string()], "call-1")
        .await
        .unwrap();
    let second = src
        .resolve(media, &["description".to_string()], "call-2")
        .await
        .unwrap();

    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.private.get("id"), Some(&"1".to_string()));
    assert_eq!(first.private.get("id"), second.private.get("id"));
}

#[tokio::test]
async fn scenario_six_cancel_before_response_yields_no_media() {
    struct StallingTransport {
        gate: tokio::sync::Notify,
    }

    #[async_trait]
    impl HttpTransport for StallingTransport {
        async fn get(&self, _url: &str) -> Result<String, fetchpipe::error::PipelineError> {
            self.gate.notified().await;
            Ok("<root><item id=\"1\"/></root>".to_string())
        }
        async fn call(
            &self,
            _request: RestRequest,
        ) -> Result<String, fetchpipe::error::PipelineError> {
            unreachable!()
        }
    }

    let spec = fetchpipe::spec::load(SPEC_XML, 1, 5).unwrap();
    let transport = Arc::new(StallingTransport {
        gate: tokio::sync::Notify::new(),
    });
    let src = Arc::new(Source::new(
        spec,
        transport.clone(),
        Arc::new(NullScriptEngine),
        Arc::new(DefaultKeyRegistry),
    ));

    let browsing = tokio::spawn({
        let src = src.clone();
        async move { src.browse(None, &[], 0, 10, "call-1").await }
    });

    // Give the browse call a chance to register its cancel token and block
    // on the stalled GET before we cancel it.
    tokio::task::yield_now().await;
    assert!(src.cancel("call-1"));
    // Cancellation is cooperative: it's only observed at the next checkpoint,
    // so let the stalled fetch complete and allow run_inner to notice.
    transport.gate.notify_one();

    let result = browsing.await.unwrap();
    assert!(matches!(result, Err(fetchpipe::SourceError::Cancelled)));
}

#[tokio::test]
async fn end_to_end_browse_dispatches_items_from_loaded_spec() {
    struct Transport {
        body: String,
    }

    #[async_trait]
    impl HttpTransport for Transport {
        async fn get(&self, _url: &str) -> Result<String, fetchpipe::error::PipelineError> {
            Ok(self.body.clone())
        }
        async fn call(
            &self,
            _request: RestRequest,
        ) -> Result<String, fetchpipe::error::PipelineError> {
            unreachable!()
        }
    }

    let transport = Arc::new(Transport {
        body: "<root><item id=\"1\"/><item id=\"2\"/><item id=\"3\"/></root>".to_string(),
    });
    let src = source(transport);

    let items = src.browse(None, &[], 0, 10, "call-1").await.unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].private.get("id"), Some(&"1".to_string()));
    assert_eq!(items[1].private.get("id"), Some(&"2".to_string()));
    assert_eq!(items[2].private.get("id"), Some(&"3".to_string()));
}
