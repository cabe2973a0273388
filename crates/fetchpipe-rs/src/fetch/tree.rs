//! [`FetchData`]: the recursive pipeline tree (§3, §6).

use crate::expand::ExpandableString;

/// HTTP method a `rest` node issues its call with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// `GET`.
    Get,
    /// `POST`.
    Post,
}

impl HttpMethod {
    /// Parse the `method="…"` attribute, defaulting to `GET` (§6).
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_uppercase).as_deref() {
            Some("POST") => HttpMethod::Post,
            _ => HttpMethod::Get,
        }
    }
}

/// OAuth1 credentials for a `rest` node's `oauth="…"` attribute. The
/// attribute names an OAuth profile the spec's host environment resolves;
/// we model the resolved, ready-to-sign credential set.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    /// Consumer key.
    pub consumer_key: String,
    /// Consumer secret.
    pub consumer_secret: String,
    /// User access token.
    pub token: String,
    /// User access token secret.
    pub token_secret: String,
}

/// A single `<param name="…">value</param>` entry of a `rest` node.
#[derive(Debug)]
pub struct RestParam {
    /// Parameter name (sent verbatim, never expanded).
    pub name: String,
    /// Parameter value template.
    pub value: ExpandableString,
}

/// A `rest` fetch node: an HTTP/REST call with expandable function path,
/// parameters, and optional referer/OAuth.
#[derive(Debug)]
pub struct RestNode {
    /// Base endpoint URL.
    pub endpoint: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Resolved OAuth credentials, if the node declares `oauth="…"`.
    pub oauth: Option<OAuthCredentials>,
    /// Optional `Referer` header value template.
    pub referer: Option<ExpandableString>,
    /// Path suffix appended to `endpoint`.
    pub function: ExpandableString,
    /// Ordered query/body parameters.
    pub params: Vec<RestParam>,
}

/// A `replace` fetch node: apply a regex substitution over an input's
/// output.
#[derive(Debug)]
pub struct ReplaceNode {
    /// The input whose output text is transformed.
    pub input: Box<FetchData>,
    /// Regex pattern template.
    pub expression: ExpandableString,
    /// Replacement template; absent means "replace with empty string".
    pub replacement: Option<ExpandableString>,
}

/// Where a `regexp` node's input text comes from.
#[derive(Debug)]
pub enum RegexpInput {
    /// `<input ref="buf_id"/>` — read a previously captured buffer.
    BufferRef {
        /// Buffer id to read.
        buffer_id: String,
        /// Percent-decode the buffer contents before matching (restored
        /// from the original `RegExpInput.decode` field).
        decode: bool,
    },
    /// `<input>…</input>` wrapping a nested fetch.
    Nested {
        /// The nested fetch producing the input text.
        fetch: Box<FetchData>,
        /// Percent-decode the fetched text before matching.
        decode: bool,
    },
}

/// A `regexp` fetch node: evaluate sub-regexes in order (populating shared
/// capture buffers), then match the main expression against the input.
#[derive(Debug)]
pub struct RegexpNode {
    /// Sub-regexps evaluated strictly in order before `input`/`expression`.
    /// Only sub-nodes that declare an `output_id` survive spec loading
    /// (§9 Open Question: a sub-node without one is dead code, matching the
    /// original's silent-discard behavior).
    pub sub_regexps: Vec<RegexpNode>,
    /// Where the text to match comes from.
    pub input: RegexpInput,
    /// Regex pattern template, defaulting to `(?ms)(.*)` when absent.
    pub expression: ExpandableString,
    /// When true, iterate every match and concatenate each match's expanded
    /// `output`; otherwise only the first match is used.
    pub repeat: bool,
    /// Output template, evaluated per match with `\N` back-references
    /// substituted, defaulting to `\1`.
    pub output: ExpandableString,
    /// If present, this node's result is stored under this id in the
    /// shared buffer map instead of being returned as a plain fetch result.
    pub output_id: Option<String>,
}

/// A node in the recursive fetch-pipeline tree (§3).
#[derive(Debug)]
pub enum FetchData {
    /// A literal expandable string.
    Raw(ExpandableString),
    /// Fetch the nested node's output as a URL via HTTP GET.
    Url(Box<FetchData>),
    /// An HTTP/REST call.
    Rest(RestNode),
    /// A regex substitution over a nested input.
    Replace(ReplaceNode),
    /// Regex extraction with ordered sub-regexp buffers.
    Regexp(RegexpNode),
    /// A `<script>` node, executed through the host's [`crate::script::ScriptEngine`].
    Script(ExpandableString),
}
