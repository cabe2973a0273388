//! Source-level configuration: the spec's `<config>` block, overridable by
//! environment variables the same way the teacher's harness config is
//! overridable by builder methods.

use std::collections::HashMap;
use std::env;

/// Defaults and runtime overrides for a spec's named configuration options.
///
/// `%conf:NAME%` (§4.A) resolves against this at spec-load time: the spec's
/// declared default is used unless an environment variable named
/// `FETCHPIPE_<SPEC_ID>_<NAME>` (uppercased) is set.
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    defaults: HashMap<String, String>,
}

impl SourceConfig {
    /// Build a config from the spec's declared `name -> default` pairs.
    pub fn new(defaults: HashMap<String, String>) -> Self {
        Self { defaults }
    }

    /// Resolve `name`, preferring an env-var override scoped to `spec_id`.
    pub fn resolve(&self, spec_id: &str, name: &str) -> Option<String> {
        let env_key = format!(
            "FETCHPIPE_{}_{}",
            spec_id.to_uppercase().replace('-', "_"),
            name.to_uppercase().replace('-', "_")
        );
        if let Ok(value) = env::var(&env_key) {
            return Some(value);
        }
        self.defaults.get(name).cloned()
    }

    /// Insert or overwrite a default programmatically (used by the CLI's
    /// `--set name=value` flag).
    pub fn set_default(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.defaults.insert(name.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_spec_default() {
        let mut defaults = HashMap::new();
        defaults.insert("page_size".to_string(), "25".to_string());
        let config = SourceConfig::new(defaults);
        assert_eq!(
            config.resolve("my-spec", "page_size"),
            Some("25".to_string())
        );
    }

    #[test]
    fn missing_key_resolves_to_none() {
        let config = SourceConfig::default();
        assert_eq!(config.resolve("my-spec", "nope"), None);
    }

    #[test]
    fn env_override_takes_precedence() {
        let mut defaults = HashMap::new();
        defaults.insert("api-key".to_string(), "default-key".to_string());
        let config = SourceConfig::new(defaults);
        // SAFETY-equivalent: test-only env mutation, single-threaded test run.
        unsafe {
            env::set_var("FETCHPIPE_MY_SPEC_API_KEY", "override-key");
        }
        assert_eq!(
            config.resolve("my-spec", "api-key"),
            Some("override-key".to_string())
        );
        unsafe {
            env::remove_var("FETCHPIPE_MY_SPEC_API_KEY");
        }
    }
}
