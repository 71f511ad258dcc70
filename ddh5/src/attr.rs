//! Attribute codec for container metadata.
//!
//! Attributes attached to groups and datasets are free-form values supplied
//! by the caller as [`serde_json::Value`]. The container format can only
//! store a small set of primitive attribute types, captured by [`AttrValue`].
//! This module converts between the two.
//!
//! Encoding is a deliberate two-step process: first a native-type mapping is
//! attempted, and any value without a native representation is downgraded to
//! its canonical string form. The fallback is a designed, lossy path — never
//! an error — so arbitrary caller metadata can always be persisted.
//!
//! The module also owns the reserved metadata-key convention: keys of the
//! form `__name__` are metadata; everything else on a group or dataset
//! (e.g. `unit`, `axes`) is structural and skipped by metadata enumeration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A metadata value in the form the container can store natively.
///
/// Every variant has a fixed wire representation; free-form values are
/// reduced to one of these by [`encode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// A signed integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A UTF-8 string.
    Str(String),
    /// A raw byte string. Decodes back to text.
    Bytes(Vec<u8>),
    /// A fixed-type integer array.
    IntArray(Vec<i64>),
    /// A fixed-type float array.
    FloatArray(Vec<f64>),
    /// A sequence of strings in fixed-width encoded form.
    ///
    /// Each element occupies exactly `width` bytes, NUL-padded on the right.
    /// Decodes back to a string sequence.
    CharArray {
        /// Bytes per element.
        width: usize,
        /// Concatenated padded elements.
        data: Vec<u8>,
    },
}

/// Encodes a free-form value into a storable attribute.
///
/// Native mappings: booleans and integers become [`AttrValue::Int`], floats
/// become [`AttrValue::Float`], strings become [`AttrValue::Str`], and
/// homogeneous arrays of integers, floats, or strings become the matching
/// fixed-type array (string sequences via the fixed-width encoding).
///
/// Everything else — null, objects, mixed or nested arrays — has no native
/// representation and is stored as its canonical JSON string form. That
/// conversion is lossy by design: decoding yields the string, not the
/// original value.
pub fn encode(value: &Value) -> AttrValue {
    match try_encode_native(value) {
        Some(attr) => attr,
        None => AttrValue::Str(canonical_string(value)),
    }
}

/// The native-type step of [`encode`]; `None` means "fall back to string".
fn try_encode_native(value: &Value) -> Option<AttrValue> {
    match value {
        Value::Bool(b) => Some(AttrValue::Int(i64::from(*b))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(AttrValue::Int(i))
            } else {
                n.as_f64().map(AttrValue::Float)
            }
        }
        Value::String(s) => Some(AttrValue::Str(s.clone())),
        Value::Array(items) => try_encode_array(items),
        Value::Null | Value::Object(_) => None,
    }
}

/// Encodes a homogeneous array, or `None` if the elements are mixed/nested.
fn try_encode_array(items: &[Value]) -> Option<AttrValue> {
    if items.iter().all(|v| v.as_i64().is_some()) {
        let ints = items.iter().map(|v| v.as_i64().unwrap_or(0)).collect();
        return Some(AttrValue::IntArray(ints));
    }
    if items.iter().all(|v| v.as_f64().is_some()) {
        let floats = items.iter().map(|v| v.as_f64().unwrap_or(0.0)).collect();
        return Some(AttrValue::FloatArray(floats));
    }
    if items.iter().all(Value::is_string) {
        let strings: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
        return Some(encode_str_seq(&strings));
    }
    None
}

/// Encodes a string sequence into the fixed-width character-array form.
pub fn encode_str_seq<S: AsRef<str>>(items: &[S]) -> AttrValue {
    let width = items
        .iter()
        .map(|s| s.as_ref().len())
        .max()
        .unwrap_or(0)
        .max(1);

    let mut data = Vec::with_capacity(width * items.len());
    for item in items {
        let bytes = item.as_ref().as_bytes();
        data.extend_from_slice(bytes);
        data.resize(data.len() + (width - bytes.len()), 0);
    }

    AttrValue::CharArray { width, data }
}

/// Canonical string form used by the lossy fallback.
///
/// Compact JSON rendering, except bare strings which render without quotes.
fn canonical_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decodes a stored attribute back into a free-form value.
///
/// Byte strings decode to text and character arrays decode to string
/// sequences; numeric types map back directly. Values that went through the
/// string fallback come back as strings.
pub fn decode(attr: &AttrValue) -> Value {
    match attr {
        AttrValue::Int(i) => Value::from(*i),
        AttrValue::Float(f) => {
            serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number)
        }
        AttrValue::Str(s) => Value::String(s.clone()),
        AttrValue::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
        AttrValue::IntArray(items) => Value::from(items.clone()),
        AttrValue::FloatArray(items) => Value::from(items.clone()),
        AttrValue::CharArray { width, data } => {
            Value::from(decode_char_array(*width, data))
        }
    }
}

/// Decodes a stored attribute into a string sequence, if it holds one.
pub fn decode_str_seq(attr: &AttrValue) -> Option<Vec<String>> {
    match attr {
        AttrValue::CharArray { width, data } => Some(decode_char_array(*width, data)),
        _ => None,
    }
}

fn decode_char_array(width: usize, data: &[u8]) -> Vec<String> {
    if width == 0 {
        return Vec::new();
    }
    data.chunks(width)
        .map(|chunk| {
            let end = chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len());
            String::from_utf8_lossy(&chunk[..end]).into_owned()
        })
        .collect()
}

/// Reserved prefix/suffix marking a key as metadata.
const META_TAG: &str = "__";

/// Whether `key` follows the reserved metadata naming convention.
///
/// Metadata keys are wrapped in double underscores (`__name__`). All
/// attribute enumeration in the storage layer goes through this single
/// classifier, so structural attributes like `unit` and `axes` are never
/// mistaken for metadata.
pub fn is_meta_key(key: &str) -> bool {
    key.len() > 2 * META_TAG.len() && key.starts_with(META_TAG) && key.ends_with(META_TAG)
}

/// Wraps a plain name into its reserved metadata-key form.
///
/// Names that already carry the convention are returned unchanged.
pub fn to_meta_key(name: &str) -> String {
    if is_meta_key(name) {
        name.to_string()
    } else {
        format!("{META_TAG}{name}{META_TAG}")
    }
}

/// Strips the reserved wrapping from a metadata key.
///
/// Keys not following the convention are returned unchanged.
pub fn strip_meta_key(key: &str) -> &str {
    if is_meta_key(key) {
        &key[META_TAG.len()..key.len() - META_TAG.len()]
    } else {
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_round_trip() {
        assert_eq!(encode(&json!(42)), AttrValue::Int(42));
        assert_eq!(encode(&json!(true)), AttrValue::Int(1));
        assert_eq!(encode(&json!(2.5)), AttrValue::Float(2.5));
        assert_eq!(encode(&json!("volt")), AttrValue::Str("volt".to_string()));

        assert_eq!(decode(&AttrValue::Int(42)), json!(42));
        assert_eq!(decode(&AttrValue::Float(2.5)), json!(2.5));
        assert_eq!(decode(&AttrValue::Str("volt".into())), json!("volt"));
    }

    #[test]
    fn test_homogeneous_arrays() {
        assert_eq!(
            encode(&json!([1, 2, 3])),
            AttrValue::IntArray(vec![1, 2, 3])
        );
        assert_eq!(
            encode(&json!([1.0, 2.5])),
            AttrValue::FloatArray(vec![1.0, 2.5])
        );
        // Mixed int/float promotes to float.
        assert_eq!(
            encode(&json!([1, 2.5])),
            AttrValue::FloatArray(vec![1.0, 2.5])
        );

        assert_eq!(decode(&AttrValue::IntArray(vec![1, 2])), json!([1, 2]));
    }

    #[test]
    fn test_string_sequence_fixed_width() {
        let encoded = encode(&json!(["x", "phase"]));
        match &encoded {
            AttrValue::CharArray { width, data } => {
                assert_eq!(*width, 5);
                assert_eq!(data.len(), 10);
            }
            other => panic!("expected CharArray, got {other:?}"),
        }
        assert_eq!(decode(&encoded), json!(["x", "phase"]));
        assert_eq!(
            decode_str_seq(&encoded),
            Some(vec!["x".to_string(), "phase".to_string()])
        );
    }

    #[test]
    fn test_empty_string_sequence() {
        let encoded = encode_str_seq::<&str>(&[]);
        assert_eq!(decode(&encoded), json!([] as [String; 0]));
    }

    #[test]
    fn test_bytes_decode_to_text() {
        let attr = AttrValue::Bytes(b"raw note".to_vec());
        assert_eq!(decode(&attr), json!("raw note"));
    }

    #[test]
    fn test_string_fallback_is_lossy_not_error() {
        // Objects have no native representation.
        let encoded = encode(&json!({"a": 1}));
        assert_eq!(encoded, AttrValue::Str("{\"a\":1}".to_string()));
        assert_eq!(decode(&encoded), json!("{\"a\":1}"));

        // Mixed arrays fall back too.
        let encoded = encode(&json!([1, "x"]));
        assert_eq!(encoded, AttrValue::Str("[1,\"x\"]".to_string()));

        // Null falls back.
        assert_eq!(encode(&json!(null)), AttrValue::Str("null".to_string()));
    }

    #[test]
    fn test_meta_key_convention() {
        assert!(is_meta_key("__created__"));
        assert!(!is_meta_key("unit"));
        assert!(!is_meta_key("____"));
        assert!(!is_meta_key("__x"));

        assert_eq!(to_meta_key("created"), "__created__");
        assert_eq!(to_meta_key("__created__"), "__created__");
        assert_eq!(strip_meta_key("__created__"), "created");
        assert_eq!(strip_meta_key("unit"), "unit");
    }
}
