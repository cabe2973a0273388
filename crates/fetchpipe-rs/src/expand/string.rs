//! [`ExpandableString`]: a template parsed once into literal/token segments,
//! with the UNKNOWN/EXPANDABLE/UNEXPANDABLE lifecycle from §3.

use std::sync::Mutex;

use super::context::ExpandContext;

/// One parsed piece of a template: either literal text or a recognized
/// `%…%` token. Unrecognized tokens are kept as their raw source text so
/// they round-trip unchanged (§4.A: "if none matches, the literal token is
/// left in place").
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    Literal(String),
    Percent,
    Key(String),
    Param(String),
    Buf(String),
    Priv(String),
    /// `%conf:…%` / `%str:…%` — only meaningful during spec loading. If one
    /// survives into a runtime `ExpandableString` (it shouldn't, once the
    /// loader's pre-pass has run) it is treated like an unrecognized token.
    LoadOnly(String),
    Unknown(String),
}

fn parse(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = template;
    loop {
        match rest.find('%') {
            None => {
                if !rest.is_empty() {
                    segments.push(Segment::Literal(rest.to_string()));
                }
                break;
            }
            Some(start) => {
                if start > 0 {
                    segments.push(Segment::Literal(rest[..start].to_string()));
                }
                let after = &rest[start + 1..];
                match after.find('%') {
                    None => {
                        // Unterminated '%': emit literally and stop.
                        segments.push(Segment::Literal(rest[start..].to_string()));
                        break;
                    }
                    Some(end) => {
                        let body = &after[..end];
                        segments.push(parse_token(body));
                        rest = &after[end + 1..];
                    }
                }
            }
        }
    }
    segments
}

fn parse_token(body: &str) -> Segment {
    if body.is_empty() {
        return Segment::Percent;
    }
    let raw = format!("%{body}%");
    match body.split_once(':') {
        Some(("key", name)) => Segment::Key(name.to_string()),
        Some(("param", name)) => Segment::Param(name.to_string()),
        Some(("buf", id)) => Segment::Buf(id.to_string()),
        Some(("priv", name)) => Segment::Priv(name.to_string()),
        Some(("conf", name)) => Segment::LoadOnly(format!("conf:{name}")),
        Some(("str", id)) => Segment::LoadOnly(format!("str:{id}")),
        _ => Segment::Unknown(raw),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExpandState {
    Unknown,
    Expandable,
    Unexpandable,
}

/// A template string with `%…%` placeholders, expanded lazily against an
/// [`ExpandContext`] and memoized per §3's lifecycle.
pub struct ExpandableString {
    raw: String,
    segments: Vec<Segment>,
    state: Mutex<ExpandState>,
}

impl ExpandableString {
    /// Parse `template` once. Parsing never fails: unrecognized tokens are
    /// kept as literal text.
    pub fn new(template: impl Into<String>) -> Self {
        let raw = template.into();
        let segments = parse(&raw);
        Self {
            raw,
            segments,
            state: Mutex::new(ExpandState::Unknown),
        }
    }

    /// The original, unparsed template text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Expand against `ctx`. Once a prior call observed the output equal
    /// the input template (no placeholders present, or every token
    /// resolved back to its own literal form), this short-circuits without
    /// recomputing a substitution.
    pub fn expand(&self, ctx: &ExpandContext) -> String {
        {
            let state = self.state.lock().unwrap();
            if *state == ExpandState::Unexpandable {
                return self.raw.clone();
            }
        }
        let output = super::handlers::expand_segments(&self.segments, ctx);
        let mut state = self.state.lock().unwrap();
        if *state == ExpandState::Unknown {
            *state = if output == self.raw {
                ExpandState::Unexpandable
            } else {
                ExpandState::Expandable
            };
        }
        output
    }
}

impl std::fmt::Debug for ExpandableString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpandableString")
            .field("raw", &self.raw)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_escape_round_trips() {
        let segments = parse("%%");
        assert_eq!(segments, vec![Segment::Percent]);
    }

    #[test]
    fn mixed_literal_and_tokens() {
        let segments = parse("hello %key:title% world %param:skip%");
        assert_eq!(
            segments,
            vec![
                Segment::Literal("hello ".to_string()),
                Segment::Key("title".to_string()),
                Segment::Literal(" world ".to_string()),
                Segment::Param("skip".to_string()),
            ]
        );
    }

    #[test]
    fn unrecognized_prefix_is_kept_literal() {
        let segments = parse("%nonsense:foo%");
        assert_eq!(segments, vec![Segment::Unknown("%nonsense:foo%".to_string())]);
    }

    #[test]
    fn unterminated_percent_is_literal() {
        let segments = parse("abc % def");
        assert_eq!(segments, vec![Segment::Literal("abc % def".to_string())]);
    }

    #[test]
    fn plain_literal_has_no_tokens() {
        let segments = parse("no tokens here");
        assert_eq!(
            segments,
            vec![Segment::Literal("no tokens here".to_string())]
        );
    }
}
