//! Media records: the typed output of browse/search/resolve, and the
//! metadata key/value model the expander and dispatcher read and write.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// The media kind a template or requirement is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// The default, untyped media kind.
    Media,
    /// A browsable container.
    Box,
    /// A playable audio item.
    Audio,
    /// A playable video item.
    Video,
    /// A displayable image item.
    Image,
}

impl MediaType {
    /// Parse the `type="…"` attribute value from a `<provide>` template or
    /// operation's `key` attribute. Unrecognized values fall back to
    /// [`MediaType::Media`], matching the grammar's stated default.
    pub fn parse(value: &str) -> Self {
        match value {
            "box" => MediaType::Box,
            "audio" => MediaType::Audio,
            "video" => MediaType::Video,
            "image" => MediaType::Image,
            _ => MediaType::Media,
        }
    }

    /// Is `self` the same type as, or the untyped supertype of, `other`?
    ///
    /// `Media` is the supertype every other kind satisfies a "required media
    /// type" check against (§4.E step 1: "required media type is a
    /// supertype of the input media's type").
    pub fn is_supertype_of(&self, other: MediaType) -> bool {
        *self == MediaType::Media || *self == other
    }
}

/// A typed metadata value. Coercion to string for `%key:NAME%` expansion
/// follows §4.A: `%d` for integer, `%f` for float, raw for string.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    /// A string value, substituted verbatim.
    Str(String),
    /// An integer value, formatted in base 10.
    Int(i64),
    /// A floating point value, formatted with the `C` locale's `.` decimal
    /// separator (Rust's default `Display` for `f64` already matches this).
    Float(f64),
    /// An ISO-8601 datetime value.
    DateTime(DateTime<Utc>),
}

impl MetadataValue {
    /// Render for placeholder substitution or private-key serialization.
    pub fn to_expand_string(&self) -> String {
        match self {
            MetadataValue::Str(s) => s.clone(),
            MetadataValue::Int(i) => i.to_string(),
            MetadataValue::Float(f) => f.to_string(),
            MetadataValue::DateTime(dt) => dt.to_rfc3339(),
        }
    }

    /// Render as the plain string this value holds, if it is a string.
    /// Used by [`crate::operation::matcher`] requirement checks, which only
    /// ever test string-typed keys (§4.E step 2).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A media record: in flight during materialization, or complete once
/// returned to a caller.
#[derive(Debug, Clone, Default)]
pub struct Media {
    /// The media type this record was produced under.
    pub media_type: Option<MediaType>,
    /// Public metadata keys (id, title, url, …).
    pub keys: HashMap<String, MetadataValue>,
    /// Private keys: source-scoped state persisted through serialization so
    /// a later resolve call can consume it (§3, "Private key").
    pub private: HashMap<String, String>,
}

impl Media {
    /// Build an empty record of the given type.
    pub fn new(media_type: MediaType) -> Self {
        Self {
            media_type: Some(media_type),
            keys: HashMap::new(),
            private: HashMap::new(),
        }
    }

    /// Look up a public key's string coercion, as `%key:NAME%` needs.
    pub fn key_as_string(&self, name: &str) -> Option<String> {
        self.keys.get(name).map(MetadataValue::to_expand_string)
    }

    /// Look up a public key's raw string value, for requirement regex
    /// matching (§4.E step 2, "the media must expose the required key as a
    /// string").
    pub fn key_as_str(&self, name: &str) -> Option<&str> {
        self.keys.get(name).and_then(MetadataValue::as_str)
    }
}

/// The value kind a fetched string should be converted to before being
/// stored on a media record (§4.G step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataValueKind {
    /// Keep as a string.
    Str,
    /// Parse in base 10.
    Int,
    /// Parse with `.` as the decimal separator.
    Float,
    /// Parse as ISO-8601/RFC 3339.
    DateTime,
}

/// Resolves the declared value kind for a metadata key name.
///
/// The declarative format never names a key's type itself — that lives in
/// the host media-framework's key registry, explicitly out of scope (§1).
/// This trait is the seam a host implements to supply it; [`DefaultKeyRegistry`]
/// treats every key as a string, which is always a safe fallback.
pub trait KeyRegistry: Send + Sync {
    /// The value kind `key` should be parsed as.
    fn value_kind(&self, key: &str) -> MetadataValueKind;
}

/// A [`KeyRegistry`] that never coerces: every key is a string.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultKeyRegistry;

impl KeyRegistry for DefaultKeyRegistry {
    fn value_kind(&self, _key: &str) -> MetadataValueKind {
        MetadataValueKind::Str
    }
}

/// Convert a fetched string into the metadata value `kind` calls for.
/// A value that fails to parse as its declared kind falls back to a string
/// rather than discarding the fetch result.
pub fn convert_value(raw: String, kind: MetadataValueKind) -> MetadataValue {
    match kind {
        MetadataValueKind::Str => MetadataValue::Str(raw),
        MetadataValueKind::Int => raw
            .parse::<i64>()
            .map(MetadataValue::Int)
            .unwrap_or(MetadataValue::Str(raw)),
        MetadataValueKind::Float => raw
            .parse::<f64>()
            .map(MetadataValue::Float)
            .unwrap_or(MetadataValue::Str(raw)),
        MetadataValueKind::DateTime => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| MetadataValue::DateTime(dt.with_timezone(&Utc)))
            .unwrap_or(MetadataValue::Str(raw)),
    }
}

/// Serialize a private-key mapping to the JSON object form described in §6.
pub fn serialize_private_keys(private: &HashMap<String, String>) -> String {
    serde_json::to_string(private).unwrap_or_else(|_| "{}".to_string())
}

/// Deserialize a private-key mapping from its JSON object form. Rejects
/// non-object roots and non-string values with a parse error, per §6.
pub fn deserialize_private_keys(
    text: &str,
) -> Result<HashMap<String, String>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => Ok((k, s)),
                _ => Err(serde::de::Error::custom(format!(
                    "private key '{k}' is not a string"
                ))),
            })
            .collect(),
        _ => Err(serde::de::Error::custom(
            "private-keys root must be a JSON object",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_supertype_matches_anything() {
        assert!(MediaType::Media.is_supertype_of(MediaType::Audio));
        assert!(!MediaType::Audio.is_supertype_of(MediaType::Video));
        assert!(MediaType::Video.is_supertype_of(MediaType::Video));
    }

    #[test]
    fn private_key_round_trip() {
        let mut private = HashMap::new();
        private.insert("token".to_string(), "abc".to_string());
        let json = serialize_private_keys(&private);
        let back = deserialize_private_keys(&json).unwrap();
        assert_eq!(back, private);
    }

    #[test]
    fn private_keys_reject_non_object_root() {
        assert!(deserialize_private_keys("[1,2,3]").is_err());
    }

    #[test]
    fn private_keys_reject_non_string_values() {
        assert!(deserialize_private_keys(r#"{"a": 1}"#).is_err());
    }

    #[test]
    fn convert_value_parses_declared_kind() {
        assert_eq!(
            convert_value("42".to_string(), MetadataValueKind::Int),
            MetadataValue::Int(42)
        );
        assert_eq!(
            convert_value("3.5".to_string(), MetadataValueKind::Float),
            MetadataValue::Float(3.5)
        );
    }

    #[test]
    fn convert_value_falls_back_to_string_on_parse_failure() {
        assert_eq!(
            convert_value("not-a-number".to_string(), MetadataValueKind::Int),
            MetadataValue::Str("not-a-number".to_string())
        );
    }

    #[test]
    fn default_registry_always_reports_string() {
        let registry = DefaultKeyRegistry;
        assert_eq!(registry.value_kind("anything"), MetadataValueKind::Str);
    }
}
