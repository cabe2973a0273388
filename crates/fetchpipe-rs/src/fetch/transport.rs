//! [`HttpTransport`]: the seam between the fetch evaluator and the network,
//! so tests can supply a stub instead of making real HTTP calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::retry::{is_transient_error, RetryConfig};
use super::tree::{HttpMethod, OAuthCredentials};
use crate::error::PipelineError;

/// A fully-expanded REST call, ready to issue.
pub struct RestRequest {
    /// Base endpoint URL.
    pub endpoint: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Expanded function path suffix.
    pub function: String,
    /// Expanded `(name, value)` parameters.
    pub params: Vec<(String, String)>,
    /// Expanded `Referer` header value, if any.
    pub referer: Option<String>,
    /// OAuth1 credentials, if this endpoint is signed.
    pub oauth: Option<OAuthCredentials>,
}

/// HTTP access the fetch evaluator needs: a plain GET (for `url` nodes) and
/// a REST call (for `rest` nodes, optionally OAuth1-signed).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Fetch `url` and return its response body.
    async fn get(&self, url: &str) -> Result<String, PipelineError>;
    /// Issue a REST call and return its response body.
    async fn call(&self, request: RestRequest) -> Result<String, PipelineError>;
}

/// A pooled `reqwest::Client` plus whatever OAuth1 signer it was built
/// with, shared by every call against one `(endpoint, oauth)` pair.
struct Proxy {
    client: reqwest::Client,
}

/// The production [`HttpTransport`]: a `reqwest`-backed client pool keyed
/// per `(endpoint, oauth-present)` pair, for the lifetime of the source
/// (§4.C, §5).
pub struct ReqwestTransport {
    proxies: Mutex<HashMap<(String, bool), Arc<Proxy>>>,
    retry: RetryConfig,
}

/// Pool key shared by every plain `url`-node GET. §4.C pools REST proxies
/// per `(endpoint, oauth)` pair, and groups every non-OAuth REST endpoint
/// under the same plain proxy pattern; `url` nodes have no endpoint
/// identity of their own; fetches to arbitrarily many distinct URLs in one
/// source reuse this single entry rather than growing the pool without
/// bound.
const URL_NODE_PROXY_KEY: &str = "\0url";

impl ReqwestTransport {
    /// Build a transport with the given retry policy.
    pub fn new(retry: RetryConfig) -> Self {
        Self {
            proxies: Mutex::new(HashMap::new()),
            retry,
        }
    }

    fn proxy_for(&self, endpoint: &str, has_oauth: bool) -> Arc<Proxy> {
        let mut proxies = self.proxies.lock().unwrap();
        proxies
            .entry((endpoint.to_string(), has_oauth))
            .or_insert_with(|| {
                Arc::new(Proxy {
                    client: reqwest::Client::new(),
                })
            })
            .clone()
    }

    /// Number of distinct `(endpoint, oauth)` proxies created so far.
    /// Exposed for tests exercising the pooling guarantee (§8 scenario 4).
    pub fn proxy_count(&self) -> usize {
        self.proxies.lock().unwrap().len()
    }

    async fn with_retry<F, Fut>(&self, mut attempt: F) -> Result<String, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<String, PipelineError>>,
    {
        let mut last_err = None;
        for n in 0..=self.retry.max_retries {
            match attempt().await {
                Ok(body) => return Ok(body),
                Err(err) if is_transient_error(&err.to_string()) && n < self.retry.max_retries => {
                    tokio::time::sleep(self.retry.delay_for_attempt(n)).await;
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.expect("loop runs at least once"))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<String, PipelineError> {
        let proxy = self.proxy_for(URL_NODE_PROXY_KEY, false);
        self.with_retry(|| {
            let client = proxy.client.clone();
            let url = url.to_string();
            async move {
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| PipelineError::HttpFailed(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(PipelineError::HttpFailed(format!(
                        "HTTP {} from {url}",
                        response.status()
                    )));
                }
                response
                    .text()
                    .await
                    .map_err(|e| PipelineError::HttpFailed(e.to_string()))
            }
        })
        .await
    }

    async fn call(&self, request: RestRequest) -> Result<String, PipelineError> {
        let has_oauth = request.oauth.is_some();
        let proxy = self.proxy_for(&request.endpoint, has_oauth);
        let url = format!("{}{}", request.endpoint, request.function);
        self.with_retry(|| {
            let client = proxy.client.clone();
            let url = url.clone();
            let request = &request;
            async move {
                let mut builder = match request.method {
                    HttpMethod::Get => client.get(&url).query(&request.params),
                    HttpMethod::Post => client.post(&url).form(&request.params),
                };
                if let Some(referer) = &request.referer {
                    builder = builder.header(reqwest::header::REFERER, referer);
                }
                if let Some(oauth) = &request.oauth {
                    builder = builder.header(
                        reqwest::header::AUTHORIZATION,
                        sign_oauth1(&url, request.method, &request.params, oauth),
                    );
                }
                let response = builder
                    .send()
                    .await
                    .map_err(|e| PipelineError::RestCallFailed(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(PipelineError::HttpFailed(format!(
                        "HTTP {} from {url}",
                        response.status()
                    )));
                }
                response
                    .text()
                    .await
                    .map_err(|e| PipelineError::HttpFailed(e.to_string()))
            }
        })
        .await
    }
}

fn sign_oauth1(
    url: &str,
    method: HttpMethod,
    params: &[(String, String)],
    oauth: &OAuthCredentials,
) -> String {
    let token = oauth1_request::Token::from_parts(
        oauth.consumer_key.as_str(),
        oauth.consumer_secret.as_str(),
        oauth.token.as_str(),
        oauth.token_secret.as_str(),
    );
    let method_name = match method {
        HttpMethod::Get => "GET",
        HttpMethod::Post => "POST",
    };
    let mut signer = oauth1_request::Signer::new(method_name, url, &token, oauth1_request::HmacSha1);
    for (name, value) in params {
        signer.parameter(name, value);
    }
    signer.finish()
}
