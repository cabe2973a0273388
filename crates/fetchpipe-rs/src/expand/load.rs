//! Spec-load-time resolution of `%conf:NAME%` and `%str:ID%` tokens.
//!
//! These two token kinds are only meaningful once, while a spec document is
//! being loaded (§4.A): `%conf:NAME%` reads the source's declared
//! configuration, `%str:ID%` reads a localized string. Runtime
//! [`super::string::ExpandableString`] values are built from text that has
//! already had this pass applied, so their own tokenizer never needs to
//! carry a live config/strings reference around for the lifetime of the
//! source.

use crate::config::SourceConfig;

/// Ordered fall-back chain of localized string tables, keyed by `lang`
/// (absent `lang` in the spec means the default locale and is stored under
/// `None`), matching `xml_spec_get_located_strings` in the original.
#[derive(Debug, Clone, Default)]
pub struct Strings {
    tables: Vec<(Option<String>, std::collections::HashMap<String, String>)>,
}

impl Strings {
    /// Construct from the spec's `<strings lang="…">` blocks, in
    /// declaration order.
    pub fn new(
        tables: Vec<(Option<String>, std::collections::HashMap<String, String>)>,
    ) -> Self {
        Self { tables }
    }

    /// Resolve `id`, preferring `preferred_lang` and otherwise trying every
    /// declared table in order (the default-locale table first, as the
    /// original's fall-back chain does).
    pub fn resolve(&self, id: &str, preferred_lang: Option<&str>) -> Option<String> {
        if let Some(lang) = preferred_lang
            && let Some((_, table)) = self
                .tables
                .iter()
                .find(|(l, _)| l.as_deref() == Some(lang))
            && let Some(value) = table.get(id)
        {
            return Some(value.clone());
        }
        self.tables.iter().find_map(|(_, table)| table.get(id).cloned())
    }
}

/// Percent-token kinds recognized only during this pre-pass.
fn resolve_token(body: &str, spec_id: &str, config: &SourceConfig, strings: &Strings) -> Option<String> {
    if let Some(name) = body.strip_prefix("conf:") {
        return config.resolve(spec_id, name).or(Some(String::new()));
    }
    if let Some(id) = body.strip_prefix("str:") {
        return strings.resolve(id, None).or(Some(String::new()));
    }
    None
}

/// Replace every `%conf:NAME%`/`%str:ID%` token in `template` with its
/// resolved value, leaving every other token (`%key:…%`, `%param:…%`,
/// `%buf:…%`, `%priv:…%`, `%%`, unknown prefixes) untouched for the runtime
/// [`super::string::ExpandableString`] tokenizer to parse later.
pub fn resolve_load_tokens(
    template: &str,
    spec_id: &str,
    config: &SourceConfig,
    strings: &Strings,
) -> String {
    let mut out = String::new();
    let mut rest = template;
    loop {
        match rest.find('%') {
            None => {
                out.push_str(rest);
                break;
            }
            Some(start) => {
                out.push_str(&rest[..start]);
                let after = &rest[start + 1..];
                match after.find('%') {
                    None => {
                        out.push_str(&rest[start..]);
                        break;
                    }
                    Some(end) => {
                        let body = &after[..end];
                        match resolve_token(body, spec_id, config, strings) {
                            Some(resolved) => out.push_str(&resolved),
                            None => {
                                out.push('%');
                                out.push_str(body);
                                out.push('%');
                            }
                        }
                        rest = &after[end + 1..];
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn conf_token_resolves_from_default() {
        let mut defaults = HashMap::new();
        defaults.insert("base-url".to_string(), "https://example.com".to_string());
        let config = SourceConfig::new(defaults);
        let strings = Strings::default();
        let resolved = resolve_load_tokens("%conf:base-url%/feed", "spec", &config, &strings);
        assert_eq!(resolved, "https://example.com/feed");
    }

    #[test]
    fn str_token_falls_back_through_tables() {
        let mut default_table = HashMap::new();
        default_table.insert("greeting".to_string(), "hello".to_string());
        let strings = Strings::new(vec![(None, default_table)]);
        let config = SourceConfig::default();
        let resolved = resolve_load_tokens("%str:greeting%, world", "spec", &config, &strings);
        assert_eq!(resolved, "hello, world");
    }

    #[test]
    fn runtime_tokens_survive_the_pass_untouched() {
        let config = SourceConfig::default();
        let strings = Strings::default();
        let resolved =
            resolve_load_tokens("%key:title% - %param:skip%", "spec", &config, &strings);
        assert_eq!(resolved, "%key:title% - %param:skip%");
    }
}
