//! Structured parameter values
//!
//! [`ParamValue`] is the structured value a caller supplies for a document
//! parameter. Unlike `serde_json::Value` it can hold non-finite floats, which
//! translators must render as explicit constructors.

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;

/// Ordered parameter mapping; insertion order is rendering order
pub type Parameters = IndexMap<String, ParamValue>;

/// A structured parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Absent value (`None`, `NULL`, `nothing` depending on the target)
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point, possibly non-finite
    Float(f64),
    /// Text
    Str(String),
    /// Ordered sequence
    List(Vec<ParamValue>),
    /// Ordered mapping with string keys
    Map(Parameters),
}

impl ParamValue {
    /// Borrow the text of a string value
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the value's kind, used in diagnostics
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Convert into JSON for metadata storage
    ///
    /// JSON has no non-finite numbers, so `NaN` and the infinities are stored
    /// as the strings `"NaN"`, `"Infinity"` and `"-Infinity"`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or_else(|| Value::String(non_finite_marker(*f).to_string()), Value::Number),
            Self::Str(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn non_finite_marker(f: f64) -> &'static str {
    if f.is_nan() {
        "NaN"
    } else if f.is_sign_negative() {
        "-Infinity"
    } else {
        "Infinity"
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::Str(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for ParamValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Parameters> for ParamValue {
    fn from(map: Parameters) -> Self {
        Self::Map(map)
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Self::Float(f) => serializer.serialize_str(non_finite_marker(*f)),
            Self::Str(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ParamValueVisitor)
    }
}

struct ParamValueVisitor;

impl<'de> Visitor<'de> for ParamValueVisitor {
    type Value = ParamValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a parameter value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<ParamValue, E> {
        Ok(ParamValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ParamValue, E> {
        Ok(ParamValue::Int(v))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ParamValue, E> {
        Ok(i64::try_from(v).map_or(ParamValue::Float(v as f64), ParamValue::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<ParamValue, E> {
        Ok(ParamValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ParamValue, E> {
        Ok(ParamValue::Str(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<ParamValue, E> {
        Ok(ParamValue::Str(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<ParamValue, E> {
        Ok(ParamValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<ParamValue, E> {
        Ok(ParamValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<ParamValue, D::Error> {
        ParamValue::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ParamValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(ParamValue::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ParamValue, A::Error> {
        let mut map = Parameters::new();
        while let Some((key, value)) = access.next_entry::<MapKey, ParamValue>()? {
            map.insert(key.0, value);
        }
        Ok(ParamValue::Map(map))
    }
}

/// Map key that accepts scalar keys and stores their text form
///
/// YAML allows `1: one` or `true: yes`; parameters are always keyed by text.
struct MapKey(String);

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = MapKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a scalar mapping key")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<MapKey, E> {
                Ok(MapKey(v.to_string()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<MapKey, E> {
                Ok(MapKey(if v { "True" } else { "False" }.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<MapKey, E> {
                Ok(MapKey(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<MapKey, E> {
                Ok(MapKey(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<MapKey, E> {
                Ok(MapKey(v.to_string()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<MapKey, E> {
                Ok(MapKey("None".to_string()))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_preserves_order_and_kinds() {
        let value = ParamValue::from(json!({"b": 1, "a": [true, null, 1.5, "x"]}));
        let ParamValue::Map(map) = value else {
            panic!("expected map");
        };
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(map["b"], ParamValue::Int(1));
        assert_eq!(
            map["a"],
            ParamValue::List(vec![
                ParamValue::Bool(true),
                ParamValue::Null,
                ParamValue::Float(1.5),
                ParamValue::Str("x".into()),
            ])
        );
    }

    #[test]
    fn non_finite_floats_become_markers_in_json() {
        assert_eq!(ParamValue::Float(f64::NAN).to_json(), json!("NaN"));
        assert_eq!(ParamValue::Float(f64::INFINITY).to_json(), json!("Infinity"));
        assert_eq!(ParamValue::Float(f64::NEG_INFINITY).to_json(), json!("-Infinity"));
        assert_eq!(ParamValue::Float(2.5).to_json(), json!(2.5));
    }

    #[test]
    fn deserializes_from_yaml_with_scalar_keys() {
        let value: ParamValue = serde_yaml::from_str("foo: [1, 2]\n1: one\nflag: true\n").unwrap();
        let ParamValue::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(map["foo"], ParamValue::from(vec![1i64, 2]));
        assert_eq!(map["1"], ParamValue::from("one"));
        assert_eq!(map["flag"], ParamValue::Bool(true));
    }

    #[test]
    fn serialize_roundtrip_through_json() {
        let mut map = Parameters::new();
        map.insert("x".into(), ParamValue::Int(3));
        map.insert("y".into(), ParamValue::from(vec!["a", "b"]));
        let value = ParamValue::Map(map);

        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"x":3,"y":["a","b"]}"#);
        let back: ParamValue = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn kind_names() {
        assert_eq!(ParamValue::Null.kind_name(), "null");
        assert_eq!(ParamValue::from("s").kind_name(), "str");
        assert_eq!(ParamValue::from("s").as_str(), Some("s"));
        assert_eq!(ParamValue::Int(1).as_str(), None);
    }
}
