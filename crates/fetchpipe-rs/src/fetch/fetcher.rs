//! Component C: the recursive [`FetchData`] evaluator.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use regex::Regex;

use super::transport::{HttpTransport, RestRequest};
use super::tree::{FetchData, RegexpInput, RegexpNode, ReplaceNode, RestNode};
use crate::cancel::CancelToken;
use crate::error::PipelineError;
use crate::expand::ExpandContext;
use crate::script::ScriptEngine;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Evaluates a [`FetchData`] tree against shared collaborators: the
/// transport for `url`/`rest` nodes, the script engine for `script` nodes,
/// and the operation's cancel token.
pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    script: Arc<dyn ScriptEngine>,
}

impl Fetcher {
    /// Build a fetcher over the given transport and script engine.
    pub fn new(transport: Arc<dyn HttpTransport>, script: Arc<dyn ScriptEngine>) -> Self {
        Self { transport, script }
    }

    /// Evaluate `node` against `ctx`, honoring `cancel`.
    ///
    /// Returns `Ok(None)` for every locally-recovered "no result" case
    /// (empty expansion, invalid regex, empty REST parameter) per §7; only
    /// cancellation and genuine transport failures return `Err`.
    pub fn fetch<'a>(
        &'a self,
        node: &'a FetchData,
        ctx: &'a ExpandContext,
        cancel: &'a CancelToken,
    ) -> BoxFuture<'a, Result<Option<String>, PipelineError>> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            match node {
                FetchData::Raw(template) => Ok(Some(template.expand(ctx))),
                FetchData::Url(nested) => self.fetch_url(nested, ctx, cancel).await,
                FetchData::Rest(rest) => self.fetch_rest(rest, ctx, cancel).await,
                FetchData::Replace(replace) => self.fetch_replace(replace, ctx, cancel).await,
                FetchData::Regexp(regexp) => self.fetch_regexp(regexp, ctx, cancel).await,
                FetchData::Script(template) => {
                    let body = template.expand(ctx);
                    Ok(self.script.execute(&body).await)
                }
            }
        })
    }

    async fn fetch_url(
        &self,
        nested: &FetchData,
        ctx: &ExpandContext,
        cancel: &CancelToken,
    ) -> Result<Option<String>, PipelineError> {
        match self.fetch(nested, ctx, cancel).await? {
            None => Ok(None),
            Some(url) if url.is_empty() => Ok(None),
            Some(url) => {
                let body = self.transport.get(&url).await?;
                Ok(Some(body))
            }
        }
    }

    async fn fetch_rest(
        &self,
        rest: &RestNode,
        ctx: &ExpandContext,
        cancel: &CancelToken,
    ) -> Result<Option<String>, PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let function = rest.function.expand(ctx);
        if function.is_empty() {
            return Ok(None);
        }
        let mut params = Vec::with_capacity(rest.params.len());
        for param in &rest.params {
            let value = param.value.expand(ctx);
            if value.is_empty() {
                return Ok(None);
            }
            params.push((param.name.clone(), value));
        }
        let referer = rest.referer.as_ref().map(|r| r.expand(ctx));
        let request = RestRequest {
            endpoint: rest.endpoint.clone(),
            method: rest.method,
            function,
            params,
            referer,
            oauth: rest.oauth.clone(),
        };
        let body = self.transport.call(request).await?;
        Ok(Some(body))
    }

    async fn fetch_replace(
        &self,
        replace: &ReplaceNode,
        ctx: &ExpandContext,
        cancel: &CancelToken,
    ) -> Result<Option<String>, PipelineError> {
        let input = self
            .fetch(&replace.input, ctx, cancel)
            .await?
            .unwrap_or_default();
        let pattern = replace.expression.expand(ctx);
        let regex = match Regex::new(&pattern) {
            Ok(regex) => regex,
            Err(err) => {
                tracing::warn!(pattern, error = %err, "invalid replace expression");
                return Ok(None);
            }
        };
        let replacement = replace
            .replacement
            .as_ref()
            .map(|r| r.expand(ctx))
            .unwrap_or_default();
        let result = regex.replace_all(&input, replacement.as_str());
        Ok(Some(result.into_owned()))
    }

    async fn fetch_regexp(
        &self,
        node: &RegexpNode,
        ctx: &ExpandContext,
        cancel: &CancelToken,
    ) -> Result<Option<String>, PipelineError> {
        for sub in &node.sub_regexps {
            let Some(id) = sub.output_id.clone() else {
                continue;
            };
            if let Some(value) = Box::pin(self.fetch_regexp(sub, ctx, cancel)).await? {
                ctx.set_buffer(id, value);
            }
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let input = match &node.input {
            RegexpInput::BufferRef { buffer_id, decode } => {
                let raw = ctx.buffer(buffer_id).unwrap_or_default();
                if *decode { decode_text(&raw) } else { raw }
            }
            RegexpInput::Nested { fetch, decode } => {
                let raw = self.fetch(fetch, ctx, cancel).await?.unwrap_or_default();
                if *decode { decode_text(&raw) } else { raw }
            }
        };
        let pattern = node.expression.expand(ctx);
        let pattern = if pattern.is_empty() {
            "(?ms)(.*)".to_string()
        } else {
            pattern
        };
        let regex = match Regex::new(&pattern) {
            Ok(regex) => regex,
            Err(err) => {
                tracing::warn!(pattern, error = %err, "invalid regexp expression");
                return Ok(None);
            }
        };
        let output_template = node.output.expand(ctx);
        let output_template = if output_template.is_empty() {
            "$1".to_string()
        } else {
            backreferences_to_dollar(&output_template)
        };

        let mut result = String::new();
        let mut matched_any = false;
        for caps in regex.captures_iter(&input) {
            matched_any = true;
            let mut expanded = String::new();
            caps.expand(&output_template, &mut expanded);
            result.push_str(&expanded);
            if !node.repeat {
                break;
            }
        }
        if !matched_any || result.is_empty() {
            return Ok(None);
        }
        Ok(Some(result))
    }
}

fn decode_text(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

/// Translate sed-style `\1`..`\9` back-references (the grammar's documented
/// output syntax) into the `$1`..`$9` form `regex::Captures::expand` uses.
/// A literal `\\` or `$` is preserved by escaping `$` as `$$`.
fn backreferences_to_dollar(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek() {
                Some(d) if d.is_ascii_digit() => {
                    out.push('$');
                    out.push(*d);
                    chars.next();
                }
                Some('\\') => {
                    out.push('\\');
                    chars.next();
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}
