//! The ordered handler chain §4.A describes, applied to a pre-parsed
//! segment list. Each handler owns exactly one token prefix; unrecognized
//! or load-only tokens are left in the output verbatim.

use super::context::ExpandContext;
use super::string::Segment;

const PARAM_NAMES: &[&str] = &[
    "search_text",
    "skip",
    "count",
    "page_number",
    "page_size",
    "page_offset",
];

pub(super) fn expand_segments(segments: &[Segment], ctx: &ExpandContext) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Percent => out.push('%'),
            Segment::Key(name) => out.push_str(&expand_key(ctx, name)),
            Segment::Param(name) => out.push_str(&expand_param(ctx, name)),
            Segment::Buf(id) => out.push_str(&ctx.buffer(id).unwrap_or_default()),
            Segment::Priv(name) => out.push_str(&ctx.private(name).unwrap_or_default()),
            Segment::LoadOnly(body) => out.push_str(&format!("%{body}%")),
            Segment::Unknown(raw) => out.push_str(raw),
        }
    }
    out
}

fn expand_key(ctx: &ExpandContext, name: &str) -> String {
    match ctx.media().and_then(|m| m.key_as_string(name)) {
        Some(value) => value,
        None => {
            tracing::warn!(key = name, "unknown metadata key in %key:…% expansion");
            String::new()
        }
    }
}

fn expand_param(ctx: &ExpandContext, name: &str) -> String {
    if !PARAM_NAMES.contains(&name) {
        tracing::warn!(param = name, "unknown %param:…% name");
        return String::new();
    }
    let options = ctx.options();
    let paging = ctx.paging();
    match name {
        "search_text" => ctx.search_text().to_string(),
        "skip" => options.skip.to_string(),
        "count" => options.count.to_string(),
        "page_number" => paging.page_number.to_string(),
        "page_size" => paging.page_size.to_string(),
        "page_offset" => paging.page_offset.to_string(),
        _ => unreachable!("checked against PARAM_NAMES above"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::super::context::OperationOptions;
    use super::*;
    use crate::expand::string::ExpandableString;
    use crate::media::{Media, MediaType};

    fn ctx(options: OperationOptions, search_text: &str) -> ExpandContext {
        ExpandContext::new("src", None, HashMap::new(), search_text, options, 0)
    }

    #[test]
    fn scenario_two_param_expansion() {
        let ctx = ctx(
            OperationOptions {
                skip: 0,
                count: 1,
            },
            "test",
        );
        assert_eq!(
            ExpandableString::new("%param:search_text%").expand(&ctx),
            "test"
        );
        assert_eq!(ExpandableString::new("%param:count%").expand(&ctx), "1");
        assert_eq!(ExpandableString::new("%param:skip%").expand(&ctx), "0");
        assert_eq!(
            ExpandableString::new("%param:page_number%").expand(&ctx),
            "0"
        );
        assert_eq!(
            ExpandableString::new("%param:page_size%").expand(&ctx),
            "1"
        );
        assert_eq!(
            ExpandableString::new("%param:page_offset%").expand(&ctx),
            "0"
        );
        assert_eq!(ExpandableString::new("%%").expand(&ctx), "%");
    }

    #[test]
    fn scenario_one_empty_private_key_leaves_title_unset() {
        let media = Media::new(MediaType::Media);
        let ctx = ExpandContext::new(
            "src",
            Some(media),
            HashMap::new(),
            "",
            OperationOptions::default(),
            0,
        );
        assert_eq!(ExpandableString::new("%key:title%").expand(&ctx), "");
    }

    #[test]
    fn unknown_param_expands_to_empty() {
        let ctx = ctx(OperationOptions::default(), "");
        assert_eq!(
            ExpandableString::new("%param:bogus%").expand(&ctx),
            ""
        );
    }

    #[test]
    fn unexpandable_short_circuits() {
        let ctx = ctx(OperationOptions::default(), "");
        let template = ExpandableString::new("plain text, no tokens");
        assert_eq!(template.expand(&ctx), "plain text, no tokens");
        // Second call exercises the UNEXPANDABLE short-circuit path.
        assert_eq!(template.expand(&ctx), "plain text, no tokens");
    }

    #[test]
    fn idempotence_law() {
        let ctx = ctx(
            OperationOptions {
                skip: 1,
                count: 2,
            },
            "q",
        );
        let template = ExpandableString::new("%param:search_text%-%param:count%");
        let once = template.expand(&ctx);
        let twice = template.expand(&ctx);
        assert_eq!(once, twice);
    }
}
