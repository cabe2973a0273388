//! Parses a specification document (§6 grammar) into an in-memory [`super::Spec`],
//! via `roxmltree`'s one-shot DOM.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use roxmltree::{Document, Node};

use crate::config::SourceConfig;
use crate::dispatch::{KeyFlags, MediaTemplate, PrivateKeyDecl};
use crate::error::SpecError;
use crate::expand::{resolve_load_tokens, ExpandableString, Strings};
use crate::fetch::FetchData;
use crate::fetch::tree::{HttpMethod, OAuthCredentials, RegexpInput, RegexpNode, ReplaceNode, RestNode, RestParam};
use crate::media::MediaType;
use crate::operation::{Operation, OperationKind, PayloadFormat, Requirement, ResultData};

use super::Spec;

fn direct_text(node: Node) -> String {
    node.children()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

fn child(node: Node, name: &str) -> Option<Node> {
    node.children().find(|n| n.is_element() && n.has_tag_name(name))
}

fn children(node: Node, name: &str) -> impl Iterator<Item = Node> {
    node.children()
        .filter(move |n| n.is_element() && n.has_tag_name(name))
}

fn required_attr<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, SpecError> {
    node.attribute(name).ok_or_else(|| SpecError::InvalidAttribute {
        element: node.tag_name().name().to_string(),
        attribute: name.to_string(),
        reason: "required attribute missing".to_string(),
    })
}

fn parse_bool_attr(node: Node, name: &str) -> bool {
    node.attribute(name).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn parse_int_attr(node: Node, name: &str, default: i64) -> Result<i64, SpecError> {
    match node.attribute(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| SpecError::InvalidAttribute {
            element: node.tag_name().name().to_string(),
            attribute: name.to_string(),
            reason: format!("'{value}' is not an integer"),
        }),
    }
}

/// Build an [`ExpandableString`] from load-time text: `%conf:NAME%`/`%str:ID%`
/// tokens are resolved immediately against `config`/`strings`; every other
/// token is left untouched for runtime expansion.
fn expandable(text: &str, spec_id: &str, config: &SourceConfig, strings: &Strings) -> ExpandableString {
    ExpandableString::new(&resolve_load_tokens(text, spec_id, config, strings))
}

/// Parse a "FetchData position": a node whose own element children include
/// one of the five fetch-node tags, or whose only content is text/CDATA
/// (the `raw` case), per §6's grammar note "a text/CDATA node is `raw`".
fn parse_fetch_position(
    node: Node,
    spec_id: &str,
    config: &SourceConfig,
    strings: &Strings,
) -> Result<FetchData, SpecError> {
    if let Some(fetch_node) = node.children().find(|n| {
        n.is_element()
            && matches!(n.tag_name().name(), "script" | "url" | "rest" | "replace" | "regexp")
    }) {
        parse_fetch_node(fetch_node, spec_id, config, strings)
    } else {
        Ok(FetchData::Raw(expandable(&direct_text(node), spec_id, config, strings)))
    }
}

fn parse_fetch_node(
    node: Node,
    spec_id: &str,
    config: &SourceConfig,
    strings: &Strings,
) -> Result<FetchData, SpecError> {
    match node.tag_name().name() {
        "script" => Ok(FetchData::Script(expandable(&direct_text(node), spec_id, config, strings))),
        "url" => Ok(FetchData::Url(Box::new(parse_fetch_position(
            node, spec_id, config, strings,
        )?))),
        "rest" => Ok(FetchData::Rest(parse_rest(node, spec_id, config, strings)?)),
        "replace" => Ok(FetchData::Replace(parse_replace(node, spec_id, config, strings)?)),
        "regexp" => Ok(FetchData::Regexp(parse_regexp(node, spec_id, config, strings)?)),
        other => Err(SpecError::UnknownFetchNode(other.to_string())),
    }
}

fn parse_rest(
    node: Node,
    spec_id: &str,
    config: &SourceConfig,
    strings: &Strings,
) -> Result<RestNode, SpecError> {
    let endpoint = required_attr(node, "endpoint")?.to_string();
    let method = HttpMethod::parse(node.attribute("method"));
    let oauth = node.attribute("oauth").map(|profile| OAuthCredentials {
        consumer_key: config.resolve(spec_id, &format!("{profile}.consumer_key")).unwrap_or_default(),
        consumer_secret: config
            .resolve(spec_id, &format!("{profile}.consumer_secret"))
            .unwrap_or_default(),
        token: config.resolve(spec_id, &format!("{profile}.token")).unwrap_or_default(),
        token_secret: config.resolve(spec_id, &format!("{profile}.token_secret")).unwrap_or_default(),
    });
    let referer = node
        .attribute("referer")
        .map(|v| expandable(v, spec_id, config, strings));
    let function = child(node, "function")
        .map(|n| expandable(&direct_text(n), spec_id, config, strings))
        .unwrap_or_else(|| ExpandableString::new(""));
    let params = children(node, "param")
        .map(|n| {
            Ok(RestParam {
                name: required_attr(n, "name")?.to_string(),
                value: expandable(&direct_text(n), spec_id, config, strings),
            })
        })
        .collect::<Result<Vec<_>, SpecError>>()?;
    Ok(RestNode {
        endpoint,
        method,
        oauth,
        referer,
        function,
        params,
    })
}

fn parse_replace(
    node: Node,
    spec_id: &str,
    config: &SourceConfig,
    strings: &Strings,
) -> Result<ReplaceNode, SpecError> {
    let input_node = child(node, "input").ok_or_else(|| SpecError::MissingElement("input".to_string()))?;
    let input = Box::new(parse_fetch_position(input_node, spec_id, config, strings)?);
    let expression_node = child(node, "expression").ok_or_else(|| SpecError::MissingElement("expression".to_string()))?;
    let expression = expandable(&direct_text(expression_node), spec_id, config, strings);
    let replacement = child(node, "replacement").map(|n| expandable(&direct_text(n), spec_id, config, strings));
    Ok(ReplaceNode {
        input,
        expression,
        replacement,
    })
}

fn parse_regexp(
    node: Node,
    spec_id: &str,
    config: &SourceConfig,
    strings: &Strings,
) -> Result<RegexpNode, SpecError> {
    // Sub-nodes without an `id` (this node's own output_id) are dead code in
    // the original and are silently discarded here too (§9 Open Question).
    let sub_regexps = children(node, "regexp")
        .filter(|n| n.attribute("id").is_some())
        .map(|n| parse_regexp(n, spec_id, config, strings))
        .collect::<Result<Vec<_>, SpecError>>()?;

    let input_node = child(node, "input").ok_or_else(|| SpecError::MissingElement("input".to_string()))?;
    let decode = parse_bool_attr(input_node, "decode");
    let input = match input_node.attribute("ref") {
        Some(buffer_id) => RegexpInput::BufferRef {
            buffer_id: buffer_id.to_string(),
            decode,
        },
        None => RegexpInput::Nested {
            fetch: Box::new(parse_fetch_position(input_node, spec_id, config, strings)?),
            decode,
        },
    };

    let (output, output_id) = match child(node, "output") {
        Some(n) => (
            expandable(&direct_text(n), spec_id, config, strings),
            n.attribute("id").map(str::to_string),
        ),
        None => (ExpandableString::new("\\1"), None),
    };

    let expression_node = child(node, "expression").ok_or_else(|| SpecError::MissingElement("expression".to_string()))?;
    let repeat = parse_bool_attr(expression_node, "repeat");
    let expression = expandable(&direct_text(expression_node), spec_id, config, strings);

    Ok(RegexpNode {
        sub_regexps,
        input,
        expression,
        repeat,
        output,
        output_id,
    })
}

fn parse_format(node: Node) -> PayloadFormat {
    match node.attribute("format") {
        Some("json") => PayloadFormat::Json,
        _ => PayloadFormat::Xml,
    }
}

fn parse_result(
    node: Node,
    spec_id: &str,
    config: &SourceConfig,
    strings: &Strings,
    results: &mut HashMap<String, Arc<ResultData>>,
) -> Result<Arc<ResultData>, SpecError> {
    if let Some(ref_id) = node.attribute("ref") {
        return results
            .get(ref_id)
            .cloned()
            .ok_or_else(|| SpecError::InvalidAttribute {
                element: "result".to_string(),
                attribute: "ref".to_string(),
                reason: format!("no result declared with id '{ref_id}'"),
            });
    }
    let root = parse_fetch_position(node, spec_id, config, strings)?;
    let cache_ttl = Duration::from_secs(parse_int_attr(node, "cache", 0)?.max(0) as u64);
    let format = parse_format(node);
    let result = Arc::new(ResultData {
        id: node.attribute("id").unwrap_or_default().to_string(),
        root,
        cache_ttl,
        format,
    });
    if let Some(id) = node.attribute("id") {
        results.insert(id.to_string(), result.clone());
    }
    Ok(result)
}

fn parse_requirements(node: Node) -> Result<Vec<Requirement>, SpecError> {
    let Some(require) = child(node, "require") else {
        return Ok(Vec::new());
    };
    children(require, "key")
        .map(|n| {
            let key = required_attr(n, "name")?.to_string();
            let text = direct_text(n);
            let pattern = if text.trim().is_empty() {
                None
            } else {
                Some(Regex::new(&text).map_err(|e| SpecError::InvalidAttribute {
                    element: "key".to_string(),
                    attribute: "(text)".to_string(),
                    reason: e.to_string(),
                })?)
            };
            Ok(Requirement { key, pattern })
        })
        .collect()
}

fn parse_operation(
    node: Node,
    kind: OperationKind,
    spec_id: &str,
    config: &SourceConfig,
    strings: &Strings,
    results: &mut HashMap<String, Arc<ResultData>>,
) -> Result<Operation, SpecError> {
    let id = required_attr(node, "id")?.to_string();
    let skip = expandable(node.attribute("skip").unwrap_or("0"), spec_id, config, strings);
    let count = expandable(node.attribute("count").unwrap_or("0"), spec_id, config, strings);
    let media_type = MediaType::parse(node.attribute("type").unwrap_or("media"));
    let requirements = parse_requirements(node)?;
    let resolve_key = node.attribute("key").map(str::to_string);
    let resolve_any = parse_bool_attr(node, "any");
    let result_node = child(node, "result").ok_or_else(|| SpecError::MissingElement("result".to_string()))?;
    let result = parse_result(result_node, spec_id, config, strings, results)?;
    Ok(Operation {
        id,
        kind,
        skip,
        count,
        media_type,
        requirements,
        resolve_key,
        resolve_any,
        result,
    })
}

fn parse_key_flags(node: Node) -> KeyFlags {
    KeyFlags {
        force: parse_bool_attr(node, "force"),
        slow: parse_bool_attr(node, "slow"),
        use_resolve: node.attribute("use") == Some("resolve"),
    }
}

fn parse_template(
    node: Node,
    spec_id: &str,
    config: &SourceConfig,
    strings: &Strings,
) -> Result<MediaTemplate, SpecError> {
    let media_type = MediaType::parse(node.attribute("type").unwrap_or("media"));
    let format = parse_format(node);
    let operation_id_filter = node.attribute("ref").map(str::to_string);
    let namespaces = node
        .namespaces()
        .filter_map(|ns| ns.name().map(|prefix| (prefix.to_string(), ns.uri().to_string())))
        .collect();
    let query = node.attribute("query").map(|v| expandable(v, spec_id, config, strings));
    let select = node.attribute("select").map(|v| expandable(v, spec_id, config, strings));

    let mut keys = Vec::new();
    let mut key_flags = HashMap::new();
    let mut mandatory_keys = Vec::new();
    let mut private_keys = Vec::new();

    for key_node in children(node, "key") {
        let name = required_attr(key_node, "name")?.to_string();
        let flags = parse_key_flags(key_node);
        if flags.force {
            mandatory_keys.push(name.clone());
        }
        if !flags.use_resolve {
            keys.push((name.clone(), parse_fetch_position(key_node, spec_id, config, strings)?));
        }
        key_flags.insert(name, flags);
    }
    for priv_node in children(node, "priv") {
        private_keys.push(PrivateKeyDecl {
            name: required_attr(priv_node, "name")?.to_string(),
            path: expandable(&direct_text(priv_node), spec_id, config, strings),
        });
    }

    Ok(MediaTemplate {
        media_type,
        format,
        operation_id_filter,
        namespaces,
        query,
        select,
        keys,
        key_flags,
        mandatory_keys,
        private_keys,
    })
}

fn parse_strings(root: Node) -> Strings {
    let tables = children(root, "strings")
        .map(|table_node| {
            let lang = table_node.attribute("lang").map(str::to_string);
            let entries = children(table_node, "string")
                .filter_map(|n| {
                    n.attribute("id")
                        .map(|id| (id.to_string(), direct_text(n)))
                })
                .collect();
            (lang, entries)
        })
        .collect();
    Strings::new(tables)
}

fn parse_config(root: Node) -> SourceConfig {
    let mut defaults = HashMap::new();
    if let Some(config_node) = child(root, "config") {
        for option in children(config_node, "option") {
            if let Some(name) = option.attribute("name") {
                defaults.insert(name.to_string(), direct_text(option));
            }
        }
    }
    SourceConfig::new(defaults)
}

/// Parse a specification document. `api_min`/`api_max` bound the
/// host-supplied valid range for the root `api` attribute (§6).
pub fn load(xml: &str, api_min: i64, api_max: i64) -> Result<Spec, SpecError> {
    let document: Document = Document::parse(xml)?;
    let root = document.root_element();

    let api_version = parse_int_attr(root, "api", 0)?;
    if api_version < api_min || api_version > api_max {
        return Err(SpecError::ApiVersionOutOfRange {
            found: api_version,
            min: api_min,
            max: api_max,
        });
    }
    let autosplit = parse_int_attr(root, "autosplit", 0)?.max(0);
    let user_agent = root.attribute("user-agent").map(str::to_string);

    let id = child(root, "id")
        .map(direct_text)
        .ok_or_else(|| SpecError::MissingElement("id".to_string()))?;
    let name = child(root, "name")
        .map(direct_text)
        .ok_or_else(|| SpecError::MissingElement("name".to_string()))?;
    let description = child(root, "description").map(direct_text);
    let icon = child(root, "icon").map(direct_text);

    let config = parse_config(root);
    let strings = parse_strings(root);
    let script_body = child(root, "script").map(direct_text);

    let operation_node = child(root, "operation").ok_or_else(|| SpecError::MissingElement("operation".to_string()))?;
    let mut results = HashMap::new();
    let search = children(operation_node, "search")
        .map(|n| parse_operation(n, OperationKind::Search, &id, &config, &strings, &mut results))
        .collect::<Result<Vec<_>, SpecError>>()?;
    let browse = children(operation_node, "browse")
        .map(|n| parse_operation(n, OperationKind::Browse, &id, &config, &strings, &mut results))
        .collect::<Result<Vec<_>, SpecError>>()?;
    let resolve = children(operation_node, "resolve")
        .map(|n| parse_operation(n, OperationKind::Resolve, &id, &config, &strings, &mut results))
        .collect::<Result<Vec<_>, SpecError>>()?;

    let provide_node = child(root, "provide").ok_or_else(|| SpecError::MissingElement("provide".to_string()))?;
    let templates = provide_node
        .children()
        .filter(|n| n.is_element())
        .map(|n| parse_template(n, &id, &config, &strings))
        .collect::<Result<Vec<_>, SpecError>>()?;

    Ok(Spec {
        id,
        name,
        description,
        icon,
        api_version,
        autosplit,
        user_agent,
        config,
        strings,
        script_body,
        search,
        browse,
        resolve,
        templates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        <source api="3" autosplit="20" user-agent="fetchpipe-test">
            <id>sample</id>
            <name>Sample Source</name>
            <config>
                <option name="page_size">25</option>
            </config>
            <operation>
                <search id="s1" skip="0" count="%conf:page_size%">
                    <result format="xml">http://example.test/search?q=%param:search_text%</result>
                </search>
                <browse id="b1">
                    <require>
                        <key name="id">^[0-9]+$</key>
                    </require>
                    <result id="shared" cache="60">http://example.test/browse</result>
                </browse>
                <resolve id="r1" key="description">
                    <result ref="shared"/>
                </resolve>
            </operation>
            <provide>
                <template type="media" format="xml" query="//item" select="//item">
                    <key name="id" force="true">%key:id%</key>
                    <priv name="token">@token</priv>
                </template>
            </provide>
        </source>
    "#;

    #[test]
    fn parses_minimal_spec() {
        let spec = load(MINIMAL, 1, 5).unwrap();
        assert_eq!(spec.id, "sample");
        assert_eq!(spec.search.len(), 1);
        assert_eq!(spec.browse.len(), 1);
        assert_eq!(spec.resolve.len(), 1);
        assert_eq!(spec.templates.len(), 1);
        assert_eq!(spec.browse[0].requirements.len(), 1);
    }

    #[test]
    fn shared_result_is_reused_by_id() {
        let spec = load(MINIMAL, 1, 5).unwrap();
        assert!(Arc::ptr_eq(&spec.browse[0].result, &spec.resolve[0].result));
    }

    #[test]
    fn out_of_range_api_version_is_rejected() {
        assert!(matches!(
            load(MINIMAL, 10, 20),
            Err(SpecError::ApiVersionOutOfRange { .. })
        ));
    }

    #[test]
    fn config_default_resolves_through_conf_token() {
        let spec = load(MINIMAL, 1, 5).unwrap();
        assert_eq!(spec.search[0].count.raw(), "25");
    }

    #[test]
    fn malformed_xml_is_rejected() {
        assert!(matches!(load("<source", 1, 5), Err(SpecError::MalformedXml(_))));
    }
}
