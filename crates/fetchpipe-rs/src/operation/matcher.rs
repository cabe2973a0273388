//! Component E: [`OperationMatcher`], selecting which declared operation
//! answers a browse/resolve request, and the `may_resolve` introspection
//! path (§4.E, §7).

use super::model::Operation;
use crate::media::Media;

/// Outcome of checking one operation's requirements against a media in
/// "collect missing keys" mode (§7, may-resolve introspection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementOutcome {
    /// Every requirement is present and matches.
    Satisfied,
    /// At least one required key is absent from `media`; the named keys,
    /// in declaration order, would need to be supplied.
    Missing(Vec<String>),
    /// A required key is present but its value fails the attached regex —
    /// no set of additional keys can make this operation match.
    Rejected,
}

/// Selects the first operation (in declaration order) whose required media
/// type is a supertype of `media`'s type (when `media` is given) and whose
/// requirements all match (§4.E steps 1-3).
///
/// Used for browse and resolve; search always uses `operations[0]`
/// unconditionally and never calls this (§4.E: "requirements are not
/// consulted for search").
pub fn select<'a>(operations: &'a [Operation], media: Option<&Media>) -> Option<&'a Operation> {
    operations
        .iter()
        .filter(|op| {
            media
                .and_then(|m| m.media_type)
                .is_none_or(|media_type| op.media_type.is_supertype_of(media_type))
        })
        .find(|op| requirements_match(op, media))
}

fn requirements_match(op: &Operation, media: Option<&Media>) -> bool {
    op.requirements.iter().all(|req| match media {
        Some(media) => media
            .key_as_str(&req.key)
            .is_some_and(|value| req.matches(value)),
        None => false,
    })
}

/// Check `op`'s requirements against `media` in "collect missing keys"
/// mode, for the `may_resolve` introspection path (§7).
pub fn check_requirements(op: &Operation, media: &Media) -> RequirementOutcome {
    let mut missing = Vec::new();
    for req in &op.requirements {
        match media.key_as_str(&req.key) {
            Some(value) => {
                if !req.matches(value) {
                    return RequirementOutcome::Rejected;
                }
            }
            None => missing.push(req.key.clone()),
        }
    }
    if missing.is_empty() {
        RequirementOutcome::Satisfied
    } else {
        RequirementOutcome::Missing(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaType;
    use crate::operation::model::{OperationKind, PayloadFormat, Requirement, ResultData};
    use regex::Regex;
    use std::sync::Arc;

    fn result() -> Arc<ResultData> {
        Arc::new(ResultData {
            id: "r".to_string(),
            root: crate::fetch::FetchData::Raw(crate::expand::ExpandableString::new("")),
            cache_ttl: std::time::Duration::ZERO,
            format: PayloadFormat::Xml,
        })
    }

    fn op(requirements: Vec<Requirement>) -> Operation {
        Operation {
            id: "op".to_string(),
            kind: OperationKind::Browse,
            skip: crate::expand::ExpandableString::new("0"),
            count: crate::expand::ExpandableString::new("0"),
            media_type: MediaType::Media,
            requirements,
            resolve_key: None,
            resolve_any: false,
            result: result(),
        }
    }

    #[test]
    fn first_matching_operation_wins_by_declaration_order() {
        let req_fails = Requirement {
            key: "id".to_string(),
            pattern: Some(Regex::new("^none$").unwrap()),
        };
        let req_any = Requirement {
            key: "id".to_string(),
            pattern: None,
        };
        let ops = vec![op(vec![req_fails]), op(vec![req_any])];
        let mut media = Media::new(MediaType::Media);
        media
            .keys
            .insert("id".to_string(), crate::media::MetadataValue::Str("x".to_string()));
        let selected = select(&ops, Some(&media));
        assert!(std::ptr::eq(selected.unwrap(), &ops[1]));
    }

    #[test]
    fn missing_required_key_collects_as_missing() {
        let req = Requirement {
            key: "token".to_string(),
            pattern: None,
        };
        let operation = op(vec![req]);
        let media = Media::new(MediaType::Media);
        assert_eq!(
            check_requirements(&operation, &media),
            RequirementOutcome::Missing(vec!["token".to_string()])
        );
    }

    #[test]
    fn present_but_rejected_value_short_circuits() {
        let req = Requirement {
            key: "id".to_string(),
            pattern: Some(Regex::new("^[0-9]+$").unwrap()),
        };
        let operation = op(vec![req]);
        let mut media = Media::new(MediaType::Media);
        media.keys.insert(
            "id".to_string(),
            crate::media::MetadataValue::Str("not-a-number".to_string()),
        );
        assert_eq!(
            check_requirements(&operation, &media),
            RequirementOutcome::Rejected
        );
    }
}
