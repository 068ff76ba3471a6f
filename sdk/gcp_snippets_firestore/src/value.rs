//! Firestore value model.
//!
//! [`Value`] mirrors the typed values of the Firestore REST API. On the wire
//! every value is a single-key object naming its type, for example
//! `{"integerValue": "5"}` or `{"mapValue": {"fields": {...}}}`.
//!
//! Plain Rust types convert with `From`, and any `serde` entity can be turned
//! into document [`Fields`] with [`to_fields`] and read back with [`from_fields`].

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use gcp_snippets_core::error::{GcpError, GcpResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The fields of a document, keyed by field name.
pub type Fields = BTreeMap<String, Value>;

/// A geographic point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

/// A typed Firestore value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireValue", into = "WireValue")]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    /// RFC 3339 timestamp, as returned by the service.
    Timestamp(String),
    String(String),
    Bytes(Bytes),
    /// Full resource name of another document.
    Reference(String),
    GeoPoint(LatLng),
    Array(Vec<Value>),
    Map(Fields),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct ArrayValue {
    #[serde(default)]
    pub(crate) values: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MapValue {
    #[serde(default)]
    fields: Fields,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum WireValue {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(#[serde(with = "int64_string")] i64),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(#[serde(with = "base64_bytes")] Bytes),
    ReferenceValue(String),
    GeoPointValue(LatLng),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

impl From<WireValue> for Value {
    fn from(wire: WireValue) -> Self {
        match wire {
            WireValue::NullValue(()) => Value::Null,
            WireValue::BooleanValue(b) => Value::Boolean(b),
            WireValue::IntegerValue(i) => Value::Integer(i),
            WireValue::DoubleValue(d) => Value::Double(d),
            WireValue::TimestampValue(t) => Value::Timestamp(t),
            WireValue::StringValue(s) => Value::String(s),
            WireValue::BytesValue(b) => Value::Bytes(b),
            WireValue::ReferenceValue(r) => Value::Reference(r),
            WireValue::GeoPointValue(g) => Value::GeoPoint(g),
            WireValue::ArrayValue(a) => Value::Array(a.values),
            WireValue::MapValue(m) => Value::Map(m.fields),
        }
    }
}

impl From<Value> for WireValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => WireValue::NullValue(()),
            Value::Boolean(b) => WireValue::BooleanValue(b),
            Value::Integer(i) => WireValue::IntegerValue(i),
            Value::Double(d) => WireValue::DoubleValue(d),
            Value::Timestamp(t) => WireValue::TimestampValue(t),
            Value::String(s) => WireValue::StringValue(s),
            Value::Bytes(b) => WireValue::BytesValue(b),
            Value::Reference(r) => WireValue::ReferenceValue(r),
            Value::GeoPoint(g) => WireValue::GeoPointValue(g),
            Value::Array(values) => WireValue::ArrayValue(ArrayValue { values }),
            Value::Map(fields) => WireValue::MapValue(MapValue { fields }),
        }
    }
}

/// 64-bit integers travel as decimal strings; numbers are accepted on input too.
mod int64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        String(String),
        Int(i64),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match StringOrInt::deserialize(deserializer)? {
            StringOrInt::String(s) => s.parse().map_err(serde::de::Error::custom),
            StringOrInt::Int(i) => Ok(i),
        }
    }
}

mod base64_bytes {
    use super::STANDARD;
    use base64::Engine as _;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value as `f64`; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            Value::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// Whether this value can be used as an increment operand.
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Double(_))
    }

    /// Convert a JSON value: integers become [`Value::Integer`], fractional
    /// numbers become [`Value::Double`].
    ///
    /// Unsigned integers above `i64::MAX` have no exact representation and are
    /// rejected.
    pub fn from_json(json: serde_json::Value) -> GcpResult<Self> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if n.is_u64() {
                    return Err(GcpError::Builder(format!(
                        "integer {n} does not fit in a 64-bit signed integer value"
                    )));
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(Value::from_json)
                    .collect::<GcpResult<_>>()?,
            ),
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| Ok((k, Value::from_json(v)?)))
                    .collect::<GcpResult<_>>()?,
            ),
        })
    }

    /// Convert to plain JSON, losing the integer/double distinction.
    ///
    /// Timestamps and references become strings, bytes become base64, and
    /// non-finite doubles become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Timestamp(t) => serde_json::Value::String(t.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::String(STANDARD.encode(b)),
            Value::Reference(r) => serde_json::Value::String(r.clone()),
            Value::GeoPoint(g) => serde_json::json!({
                "latitude": g.latitude,
                "longitude": g.longitude,
            }),
            Value::Array(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_json).collect())
            }
            Value::Map(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Convert a serializable entity into document fields.
///
/// `None` fields skipped by serde are not written; the entity must serialize to
/// a JSON object.
pub fn to_fields<T: Serialize>(entity: &T) -> GcpResult<Fields> {
    match Value::from_json(serde_json::to_value(entity)?)? {
        Value::Map(fields) => Ok(fields),
        other => Err(GcpError::Builder(format!(
            "document data must serialize to a map, got {}",
            other.to_json()
        ))),
    }
}

/// Read document fields back into an entity.
pub fn from_fields<T: DeserializeOwned>(fields: &Fields) -> GcpResult<T> {
    let json = Value::Map(fields.clone()).to_json();
    Ok(serde_json::from_value(json)?)
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<LatLng> for Value {
    fn from(g: LatLng) -> Self {
        Value::GeoPoint(g)
    }
}

impl From<Fields> for Value {
    fn from(fields: Fields) -> Self {
        Value::Map(fields)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_wire_forms() {
        assert_eq!(serde_json::to_value(Value::Null).unwrap(), json!({"nullValue": null}));
        assert_eq!(
            serde_json::to_value(Value::Boolean(false)).unwrap(),
            json!({"booleanValue": false})
        );
        assert_eq!(
            serde_json::to_value(Value::Integer(3_900_000)).unwrap(),
            json!({"integerValue": "3900000"})
        );
        assert_eq!(
            serde_json::to_value(Value::Double(3.14159265)).unwrap(),
            json!({"doubleValue": 3.14159265})
        );
        assert_eq!(
            serde_json::to_value(Value::from("Hello, World")).unwrap(),
            json!({"stringValue": "Hello, World"})
        );
        assert_eq!(
            serde_json::to_value(Value::Bytes(Bytes::from_static(b"hi"))).unwrap(),
            json!({"bytesValue": "aGk="})
        );
    }

    #[test]
    fn nested_wire_forms() {
        let value = Value::Map(Fields::from([
            ("regions".to_string(), Value::from(vec!["west_coast", "socal"])),
            ("empty".to_string(), Value::Array(vec![])),
        ]));

        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({"mapValue": {"fields": {
                "empty": {"arrayValue": {"values": []}},
                "regions": {"arrayValue": {"values": [
                    {"stringValue": "west_coast"},
                    {"stringValue": "socal"}
                ]}}
            }}})
        );
    }

    #[test]
    fn parses_service_values() {
        let json = json!({"mapValue": {"fields": {
            "population": {"integerValue": "860000"},
            "capital": {"booleanValue": true},
            "timestamp": {"timestampValue": "2024-05-01T12:00:00.123456Z"},
            "location": {"geoPointValue": {"latitude": 37.77, "longitude": -122.41}},
            "tags": {"arrayValue": {}},
            "nothing": {"nullValue": null}
        }}});

        let value: Value = serde_json::from_value(json).unwrap();
        let fields = value.as_map().unwrap();
        assert_eq!(fields["population"].as_i64(), Some(860_000));
        assert_eq!(fields["capital"].as_bool(), Some(true));
        assert_eq!(
            fields["timestamp"],
            Value::Timestamp("2024-05-01T12:00:00.123456Z".into())
        );
        assert_eq!(fields["tags"], Value::Array(vec![]));
        assert!(fields["nothing"].is_null());
        assert!(matches!(fields["location"], Value::GeoPoint(_)));
    }

    #[test]
    fn integer_accepts_number_and_rejects_garbage() {
        let v: Value = serde_json::from_value(json!({"integerValue": 42})).unwrap();
        assert_eq!(v, Value::Integer(42));

        let err = serde_json::from_value::<Value>(json!({"integerValue": "forty-two"}));
        assert!(err.is_err());
    }

    #[test]
    fn json_conversion_keeps_integers_and_doubles_apart() {
        let v = Value::from_json(json!({"a": 5, "b": 2.5, "c": [5, true, "hello"]})).unwrap();
        let fields = v.as_map().unwrap();
        assert_eq!(fields["a"], Value::Integer(5));
        assert_eq!(fields["b"], Value::Double(2.5));
        assert_eq!(
            fields["c"],
            Value::Array(vec![Value::Integer(5), Value::Boolean(true), Value::from("hello")])
        );
    }

    #[test]
    fn unsigned_integer_beyond_i64_is_rejected() {
        #[derive(Serialize)]
        struct Counter {
            hits: u64,
        }

        let err = to_fields(&Counter { hits: u64::MAX }).unwrap_err();
        assert!(matches!(err, GcpError::Builder(_)));

        let fields = to_fields(&Counter { hits: i64::MAX as u64 }).unwrap();
        assert_eq!(fields["hits"], Value::Integer(i64::MAX));
    }

    #[test]
    fn entity_round_trip_through_fields() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Town {
            name: String,
            population: i64,
            #[serde(skip_serializing_if = "Option::is_none")]
            capital: Option<bool>,
        }

        let town = Town {
            name: "Springfield".into(),
            population: 30_720,
            capital: None,
        };
        let fields = to_fields(&town).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["population"], Value::Integer(30_720));

        let back: Town = from_fields(&fields).unwrap();
        assert_eq!(back, town);
    }

    #[test]
    fn non_map_entity_is_rejected() {
        let err = to_fields(&vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, GcpError::Builder(_)));
    }

    #[test]
    fn option_and_accessors() {
        assert!(Value::from(None::<i64>).is_null());
        assert_eq!(Value::from(Some(7_i64)).as_i64(), Some(7));
        assert_eq!(Value::Integer(2).as_f64(), Some(2.0));
        assert!(Value::Double(1.5).is_number());
        assert!(!Value::from("x").is_number());
    }
}
