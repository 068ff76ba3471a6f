//! Values a caller can write, including server-side sentinels.

use std::collections::BTreeMap;

use gcp_snippets_core::error::{GcpError, GcpResult};
use serde::Serialize;

use crate::value::{to_fields, Fields, LatLng, Value};

/// A value to write at a field.
///
/// Besides literal values, a field may carry a sentinel that the service
/// interprets as an operation on the stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A literal value.
    Value(Value),
    /// A nested map whose entries may themselves be sentinels.
    Map(BTreeMap<String, FieldValue>),
    /// Remove the field.
    Delete,
    /// Set the field to the commit time.
    ServerTimestamp,
    /// Append each element not already present in the array.
    ArrayUnion(Vec<Value>),
    /// Remove every occurrence of each element from the array.
    ArrayRemove(Vec<Value>),
    /// Add a number to the stored numeric value.
    Increment(Value),
}

impl FieldValue {
    pub fn delete() -> Self {
        FieldValue::Delete
    }

    pub fn server_timestamp() -> Self {
        FieldValue::ServerTimestamp
    }

    pub fn array_union<I, V>(elements: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        FieldValue::ArrayUnion(elements.into_iter().map(Into::into).collect())
    }

    pub fn array_remove<I, V>(elements: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        FieldValue::ArrayRemove(elements.into_iter().map(Into::into).collect())
    }

    /// Increment by an integer or a double.
    pub fn increment(by: impl Into<Value>) -> GcpResult<Self> {
        let by = by.into();
        if !by.is_number() {
            return Err(GcpError::Builder(
                "increment operand must be an integer or a double".into(),
            ));
        }
        Ok(FieldValue::Increment(by))
    }

    /// Whether this is a sentinel rather than literal data.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, FieldValue::Value(_) | FieldValue::Map(_))
    }
}

macro_rules! field_value_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::Value(Value::from(value))
                }
            }
        )*
    };
}

field_value_from!(bool, i64, i32, u32, f64, &str, String, LatLng, Fields);

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        FieldValue::Value(Value::from(values))
    }
}

impl<T: Into<Value>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        FieldValue::Value(Value::from(value))
    }
}

impl From<DocumentData> for FieldValue {
    fn from(data: DocumentData) -> Self {
        FieldValue::Map(data.0)
    }
}

/// The body of a `set`, `create`, or `add` call.
///
/// Keys are literal field names (dots are not interpreted); values may be
/// sentinels at any nesting level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentData(BTreeMap<String, FieldValue>);

impl DocumentData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing any previous value under the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Data taken from a serializable entity.
    pub fn from_entity<T: Serialize>(entity: &T) -> GcpResult<Self> {
        Ok(Self::from(to_fields(entity)?))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    pub(crate) fn into_inner(self) -> BTreeMap<String, FieldValue> {
        self.0
    }
}

impl From<Fields> for DocumentData {
    fn from(fields: Fields) -> Self {
        Self(
            fields
                .into_iter()
                .map(|(k, v)| (k, FieldValue::Value(v)))
                .collect(),
        )
    }
}

impl<K, V> FromIterator<(K, V)> for DocumentData
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Point {
        x: i64,
        label: &'static str,
    }

    #[test]
    fn increment_requires_a_number() {
        assert_eq!(
            FieldValue::increment(50_i64).unwrap(),
            FieldValue::Increment(Value::Integer(50))
        );
        assert!(FieldValue::increment(0.5).is_ok());
        assert!(matches!(
            FieldValue::increment("ten"),
            Err(GcpError::Builder(_))
        ));
    }

    #[test]
    fn sentinel_classification() {
        assert!(FieldValue::delete().is_sentinel());
        assert!(FieldValue::server_timestamp().is_sentinel());
        assert!(FieldValue::array_union(["a"]).is_sentinel());
        assert!(!FieldValue::from("a").is_sentinel());
        assert!(!FieldValue::from(DocumentData::new()).is_sentinel());
    }

    #[test]
    fn document_data_builders() {
        let data = DocumentData::new()
            .with("name", "Los Angeles")
            .with("population", 3_900_000_i64)
            .with("name", "LA");
        assert_eq!(data.len(), 2);

        let collected: DocumentData = [("capital", true)].into_iter().collect();
        assert_eq!(
            collected.iter().next(),
            Some((&"capital".to_string(), &FieldValue::from(true)))
        );
    }

    #[test]
    fn document_data_from_entity() {
        let data = DocumentData::from_entity(&Point { x: 3, label: "p" }).unwrap();
        let fields: Vec<_> = data.iter().collect();
        assert_eq!(fields[0], (&"label".to_string(), &FieldValue::from("p")));
        assert_eq!(fields[1], (&"x".to_string(), &FieldValue::from(3_i64)));
    }
}
