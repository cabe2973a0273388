//! Component F: [`MediaTemplate`] and the dispatch algorithm that binds a
//! parsed payload to templates, honoring global skip/count (§4.F).

use std::collections::HashSet;

use crate::cache::ParsedPayload;
use crate::expand::{ExpandContext, ExpandableString};
use crate::fetch::FetchData;
use crate::media::MediaType;
use crate::operation::{OperationKind, PayloadFormat};

use super::payload::{self, PayloadNode};

/// A private key declaration: an XPath (XML) or JSONPath (JSON) expression
/// evaluated within the scope of the matched node, producing the value
/// stored under `name` (§4.G step 2).
pub struct PrivateKeyDecl {
    /// Private key name.
    pub name: String,
    /// Path expression template, expanded then evaluated against the node.
    pub path: ExpandableString,
}

/// A `<key name="…">` entry's registration flags, derived at spec load
/// time and consulted by [`crate::materialize`] (§4.G step 3, §5).
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyFlags {
    /// `force="true"`: always included even if not requested.
    pub force: bool,
    /// `slow="true"`: expensive to fetch, excluded from default key sets.
    pub slow: bool,
    /// `use="resolve"`: populated by re-entering the pipeline via a nested
    /// resolve call rather than a direct fetch.
    pub use_resolve: bool,
}

/// A rule binding a payload sub-tree to a typed media record (§3).
pub struct MediaTemplate {
    /// The media type records built from this template carry.
    pub media_type: MediaType,
    /// Which payload format this template applies to.
    pub format: PayloadFormat,
    /// Restrict this template to one operation id, if set.
    pub operation_id_filter: Option<String>,
    /// XML namespace prefix -> URI bindings registered before evaluating
    /// `query`/`select` (ignored for JSON payloads).
    pub namespaces: Vec<(String, String)>,
    /// Path template for browse/search.
    pub query: Option<ExpandableString>,
    /// Path template for resolve.
    pub select: Option<ExpandableString>,
    /// Ordered key -> fetch mapping.
    pub keys: Vec<(String, FetchData)>,
    /// Flags per key name, keyed the same as `keys`.
    pub key_flags: std::collections::HashMap<String, KeyFlags>,
    /// Keys that are always included regardless of the caller's requested
    /// key list (mirrors `force="true"` but enumerated for convenience).
    pub mandatory_keys: Vec<String>,
    /// Private key declarations.
    pub private_keys: Vec<PrivateKeyDecl>,
}

impl MediaTemplate {
    /// Key names registered as `use="resolve"` on this template.
    pub fn use_resolve_keys(&self) -> HashSet<String> {
        self.key_flags
            .iter()
            .filter(|(_, flags)| flags.use_resolve)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// One node selected for materialization, tagged with which template
/// produced it.
pub struct DispatchedNode<'a> {
    /// Index into the template list this node came from.
    pub template_index: usize,
    /// The matched payload node.
    pub node: PayloadNode<'a>,
}

/// Result of running the dispatch algorithm once.
pub struct DispatchOutcome<'a> {
    /// The window of nodes to materialize, in emission order.
    pub nodes: Vec<DispatchedNode<'a>>,
    /// Total number of matches accumulated across all consulted templates
    /// (may exceed `nodes.len()` when more results exist beyond the
    /// window).
    pub total: usize,
}

fn payload_format(payload: &ParsedPayload) -> PayloadFormat {
    match payload {
        ParsedPayload::Xml(_) => PayloadFormat::Xml,
        ParsedPayload::Json(_) => PayloadFormat::Json,
    }
}

/// Run the dispatch algorithm (§4.F) over `templates` in declaration order.
pub fn dispatch<'a>(
    payload: &'a ParsedPayload,
    templates: &'a [MediaTemplate],
    operation_kind: OperationKind,
    operation_id: &str,
    skip: i64,
    count: i64,
    ctx: &ExpandContext,
) -> DispatchOutcome<'a> {
    let skip = skip.max(0) as usize;
    let count = count.max(0) as usize;
    let want = skip.saturating_add(count);
    let format = payload_format(payload);

    let mut windows: Vec<(usize, Vec<PayloadNode<'a>>)> = Vec::new();
    let mut total = 0usize;

    for (index, template) in templates.iter().enumerate() {
        if template.format != format {
            continue;
        }
        if let Some(filter) = &template.operation_id_filter
            && filter != operation_id
        {
            continue;
        }
        let path = match operation_kind {
            OperationKind::Resolve => template.select.as_ref(),
            OperationKind::Browse | OperationKind::Search => template.query.as_ref(),
        };
        let Some(path) = path else { continue };
        let expr = path.expand(ctx);
        let nodes = payload::query(payload, template.format, &template.namespaces, &expr);
        if nodes.is_empty() {
            continue;
        }
        total += nodes.len();
        windows.push((index, nodes));
        if total >= want {
            break;
        }
    }

    if total <= skip {
        return DispatchOutcome {
            nodes: Vec::new(),
            total,
        };
    }

    let emit = (total - skip).min(count);
    let mut remaining_skip = skip;
    let mut remaining_emit = emit;
    let mut result = Vec::with_capacity(emit);
    'windows: for (template_index, nodes) in windows {
        for node in nodes {
            if remaining_skip > 0 {
                remaining_skip -= 1;
                continue;
            }
            if remaining_emit == 0 {
                break 'windows;
            }
            result.push(DispatchedNode {
                template_index,
                node,
            });
            remaining_emit -= 1;
        }
    }

    DispatchOutcome {
        nodes: result,
        total,
    }
}
