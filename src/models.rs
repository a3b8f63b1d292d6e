use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// === API Request Models ===

/// The query parameters for a `GET /dl/mp3` or `GET /dl/mp4` request.
#[derive(Deserialize, Debug)]
pub struct DlQuery {
    pub url: Option<String>,
    pub ftype: Option<String>,
    pub quality: Option<String>,
    pub full: Option<String>,
}

impl DlQuery {
    pub fn format_input(&self) -> Option<OptionInput> {
        self.ftype.as_ref().map(|s| OptionInput::Text(s.clone()))
    }

    pub fn quality_input(&self) -> Option<OptionInput> {
        self.quality.as_ref().map(|s| OptionInput::Text(s.clone()))
    }

    /// The full envelope is only returned for the exact string "true".
    pub fn wants_full(&self) -> bool {
        self.full.as_deref() == Some("true")
    }
}

/// A raw quality/format option as supplied by a caller.
///
/// The HTTP surface always produces `Text`; the other variants exist for
/// library callers handing in JSON values directly. Untagged so that a JSON
/// number, string, or anything else lands in the right arm.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum OptionInput {
    Integer(u64),
    Float(f64),
    Text(String),
    Other(Value),
}

impl OptionInput {
    /// JSON values the option surface reads as "nothing was supplied":
    /// null, false, zero, and the empty string.
    pub fn is_falsy(&self) -> bool {
        match self {
            OptionInput::Integer(n) => *n == 0,
            OptionInput::Float(v) => *v == 0.0,
            OptionInput::Text(s) => s.is_empty(),
            OptionInput::Other(v) => v.is_null() || matches!(v, Value::Bool(false)),
        }
    }

    /// The JSON type name used in validation error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            OptionInput::Integer(_) | OptionInput::Float(_) => "number",
            OptionInput::Text(_) => "string",
            OptionInput::Other(v) => match v {
                Value::Null => "null",
                Value::Bool(_) => "boolean",
                Value::Number(_) => "number",
                Value::String(_) => "string",
                Value::Array(_) => "array",
                Value::Object(_) => "object",
            },
        }
    }
}

// === Metadata Models ===

/// Format entries grouped by container extension, then by vertical
/// resolution (or "noresolution" for audio-only streams). Entries keep
/// their encounter order within each bucket.
pub type FormatGroups = BTreeMap<String, BTreeMap<String, Vec<Value>>>;

/// A pointer from one of the tool's selected ("requested") formats into
/// the grouped format structure.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RequestedFormatRef {
    pub ext: String,
    pub res: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u64>,
    pub index: usize,
}

// === Media Payload Model ===

/// The downloaded media itself, attached to the envelope as `media`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MediaPayload {
    /// Base64 of the file contents. An empty file encodes a single null byte.
    pub binary: String,
    /// Byte count of the file before encoding.
    pub length: u64,
    /// Reported bitrate like "128kbps", or "unknown".
    pub bitrate: String,
    /// Human-readable size like "3.4M", or "unknown".
    pub size: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn option_inputs_deserialize_into_the_right_arm() {
        let n: OptionInput = serde_json::from_value(json!(128)).unwrap();
        assert!(matches!(n, OptionInput::Integer(128)));

        let f: OptionInput = serde_json::from_value(json!(99.5)).unwrap();
        assert!(matches!(f, OptionInput::Float(_)));

        // Negative numbers cannot be u64, so they land in the float arm.
        let neg: OptionInput = serde_json::from_value(json!(-160)).unwrap();
        assert!(matches!(neg, OptionInput::Float(_)));

        let s: OptionInput = serde_json::from_value(json!("720p")).unwrap();
        assert!(matches!(s, OptionInput::Text(_)));

        let b: OptionInput = serde_json::from_value(json!(true)).unwrap();
        assert!(matches!(b, OptionInput::Other(_)));
    }

    #[test]
    fn type_names_match_the_json_vocabulary() {
        assert_eq!(OptionInput::Integer(1).type_name(), "number");
        assert_eq!(OptionInput::Float(0.5).type_name(), "number");
        assert_eq!(OptionInput::Text("x".into()).type_name(), "string");
        assert_eq!(OptionInput::Other(json!(null)).type_name(), "null");
        assert_eq!(OptionInput::Other(json!([1])).type_name(), "array");
        assert_eq!(OptionInput::Other(json!({})).type_name(), "object");
    }

    #[test]
    fn falsy_inputs_read_as_absent() {
        for falsy in [
            OptionInput::Integer(0),
            OptionInput::Float(0.0),
            OptionInput::Text(String::new()),
            OptionInput::Other(json!(null)),
            OptionInput::Other(json!(false)),
        ] {
            assert!(falsy.is_falsy(), "{:?}", falsy);
        }
        for truthy in [
            OptionInput::Integer(1),
            OptionInput::Float(0.5),
            OptionInput::Text("0".into()),
            OptionInput::Other(json!(true)),
        ] {
            assert!(!truthy.is_falsy(), "{:?}", truthy);
        }
    }

    #[test]
    fn full_flag_requires_the_exact_string() {
        let q = |full: Option<&str>| DlQuery {
            url: Some("https://example.com/v".into()),
            ftype: None,
            quality: None,
            full: full.map(str::to_string),
        };
        assert!(q(Some("true")).wants_full());
        assert!(!q(Some("True")).wants_full());
        assert!(!q(Some("1")).wants_full());
        assert!(!q(None).wants_full());
    }
}
