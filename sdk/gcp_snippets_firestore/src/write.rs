//! Encoding of document mutations into commit writes.
//!
//! Every mutation (set, merge, update, create, delete) becomes one [`Write`]
//! in a `documents:commit` request. Literal values go into `update.fields`,
//! sentinels become `updateTransforms`, and deletes are expressed through the
//! update mask.

use std::collections::BTreeMap;
use std::fmt;

use gcp_snippets_core::error::{GcpError, GcpResult};
use serde::{Deserialize, Serialize};

use crate::field_path::FieldPath;
use crate::field_value::{DocumentData, FieldValue};
use crate::value::{ArrayValue, Fields, Value};

/// Options for `set`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    merge: bool,
}

impl SetOptions {
    /// Merge the given fields into an existing document instead of replacing it.
    pub fn merge() -> Self {
        Self { merge: true }
    }

    pub fn is_merge(&self) -> bool {
        self.merge
    }
}

/// A single mutation sent in a commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<DocumentWrite>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_mask: Option<DocumentMask>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub update_transforms: Vec<FieldTransform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_document: Option<Precondition>,
}

/// Document body of an update write.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentWrite {
    pub name: String,
    pub fields: Fields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMask {
    pub field_paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Precondition {
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTransform {
    pub field_path: String,
    #[serde(flatten)]
    pub(crate) kind: TransformKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum TransformKind {
    SetToServerValue(ServerValue),
    Increment(Value),
    AppendMissingElements(ArrayValue),
    RemoveAllFromArray(ArrayValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum ServerValue {
    RequestTime,
}

/// Outcome of one write in a commit.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WriteResult {
    /// Last update time of the document after the write; absent for no-op deletes.
    pub update_time: Option<String>,
    pub transform_results: Vec<Value>,
}

impl fmt::Display for WriteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.update_time.as_deref().unwrap_or("<none>"))
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CommitRequest<'a> {
    pub(crate) writes: &'a [Write],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) transaction: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct CommitResponse {
    pub(crate) write_results: Vec<WriteResult>,
}

fn transform_for(path: &FieldPath, value: FieldValue) -> Option<FieldTransform> {
    let kind = match value {
        FieldValue::ServerTimestamp => TransformKind::SetToServerValue(ServerValue::RequestTime),
        FieldValue::Increment(by) => TransformKind::Increment(by),
        FieldValue::ArrayUnion(values) => TransformKind::AppendMissingElements(ArrayValue { values }),
        FieldValue::ArrayRemove(values) => TransformKind::RemoveAllFromArray(ArrayValue { values }),
        FieldValue::Value(_) | FieldValue::Map(_) | FieldValue::Delete => return None,
    };
    Some(FieldTransform {
        field_path: path.to_wire(),
        kind,
    })
}

fn insert_at(fields: &mut Fields, segments: &[String], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        fields.insert(first.clone(), value);
        return;
    }
    let entry = fields
        .entry(first.clone())
        .or_insert_with(|| Value::Map(Fields::new()));
    if !matches!(entry, Value::Map(_)) {
        *entry = Value::Map(Fields::new());
    }
    if let Value::Map(inner) = entry {
        insert_at(inner, rest, value);
    }
}

#[derive(Default)]
struct Encoded {
    fields: Fields,
    mask: Vec<FieldPath>,
    transforms: Vec<FieldTransform>,
}

/// Walk `set` data. `merge` controls whether deletes are allowed and whether
/// leaf paths are collected into the mask.
fn encode_set_entries(
    encoded: &mut Encoded,
    prefix: Option<&FieldPath>,
    entries: BTreeMap<String, FieldValue>,
    merge: bool,
) -> GcpResult<()> {
    for (name, value) in entries {
        let path = match prefix {
            Some(p) => p.child(name),
            None => FieldPath::new([name])?,
        };
        match value {
            FieldValue::Value(Value::Map(map)) if merge && !map.is_empty() => {
                let nested = map
                    .into_iter()
                    .map(|(k, v)| (k, FieldValue::Value(v)))
                    .collect();
                encode_set_entries(encoded, Some(&path), nested, merge)?;
            }
            FieldValue::Value(v) => {
                insert_at(&mut encoded.fields, path.segments(), v);
                encoded.mask.push(path);
            }
            FieldValue::Map(map) => {
                if map.is_empty() {
                    insert_at(&mut encoded.fields, path.segments(), Value::Map(Fields::new()));
                    encoded.mask.push(path.clone());
                }
                encode_set_entries(encoded, Some(&path), map, merge)?;
            }
            FieldValue::Delete if merge => encoded.mask.push(path),
            FieldValue::Delete => {
                return Err(GcpError::Builder(format!(
                    "FieldValue::Delete at '{path}' requires update() or set() with merge"
                )));
            }
            sentinel => encoded.transforms.extend(transform_for(&path, sentinel)),
        }
    }
    Ok(())
}

/// Encode a `set` (full overwrite or merge).
pub(crate) fn set_write(name: String, data: DocumentData, options: SetOptions) -> GcpResult<Write> {
    let mut encoded = Encoded::default();
    encode_set_entries(&mut encoded, None, data.into_inner(), options.merge)?;

    Ok(Write {
        update: Some(DocumentWrite {
            name,
            fields: encoded.fields,
        }),
        update_mask: options.merge.then(|| DocumentMask {
            field_paths: encoded.mask.iter().map(FieldPath::to_wire).collect(),
        }),
        update_transforms: encoded.transforms,
        ..Default::default()
    })
}

/// Encode a `create`: a full set that fails if the document exists.
pub(crate) fn create_write(name: String, data: DocumentData) -> GcpResult<Write> {
    let mut write = set_write(name, data, SetOptions::default())?;
    write.current_document = Some(Precondition { exists: false });
    Ok(write)
}

/// Collapse a literal-only nested map into a value; `None` if it holds sentinels.
fn literal_map(map: &BTreeMap<String, FieldValue>) -> Option<Value> {
    let mut fields = Fields::new();
    for (k, v) in map {
        let value = match v {
            FieldValue::Value(value) => value.clone(),
            FieldValue::Map(inner) => literal_map(inner)?,
            _ => return None,
        };
        fields.insert(k.clone(), value);
    }
    Some(Value::Map(fields))
}

fn encode_update_map(
    encoded: &mut Encoded,
    path: &FieldPath,
    map: BTreeMap<String, FieldValue>,
) -> GcpResult<Fields> {
    let mut literal = Fields::new();
    for (name, value) in map {
        let child = path.child(name.clone());
        match value {
            FieldValue::Value(v) => {
                literal.insert(name, v);
            }
            FieldValue::Map(inner) => {
                let nested = encode_update_map(encoded, &child, inner)?;
                literal.insert(name, Value::Map(nested));
            }
            FieldValue::Delete => {
                return Err(GcpError::Builder(format!(
                    "FieldValue::Delete at '{child}' must appear at the top level of an update"
                )));
            }
            sentinel => encoded.transforms.extend(transform_for(&child, sentinel)),
        }
    }
    Ok(literal)
}

/// Encode an `update` of existing fields.
///
/// Each key replaces the whole value at its path; paths that are neither
/// equal nor nested in one another may be combined freely.
pub(crate) fn update_write(name: String, updates: Vec<(FieldPath, FieldValue)>) -> GcpResult<Write> {
    if updates.is_empty() {
        return Err(GcpError::Builder("update requires at least one field".into()));
    }

    for (i, (a, _)) in updates.iter().enumerate() {
        for (b, _) in &updates[i + 1..] {
            if a.starts_with(b) || b.starts_with(a) {
                return Err(GcpError::Builder(format!(
                    "conflicting field paths '{a}' and '{b}' in update"
                )));
            }
        }
    }

    let mut encoded = Encoded::default();
    for (path, value) in updates {
        match value {
            FieldValue::Value(v) => {
                insert_at(&mut encoded.fields, path.segments(), v);
                encoded.mask.push(path);
            }
            FieldValue::Map(map) => {
                let literal = match literal_map(&map) {
                    Some(v) => v,
                    None => Value::Map(encode_update_map(&mut encoded, &path, map)?),
                };
                insert_at(&mut encoded.fields, path.segments(), literal);
                encoded.mask.push(path);
            }
            FieldValue::Delete => encoded.mask.push(path),
            sentinel => encoded.transforms.extend(transform_for(&path, sentinel)),
        }
    }
    encoded.mask.sort();

    Ok(Write {
        update: Some(DocumentWrite {
            name,
            fields: encoded.fields,
        }),
        update_mask: Some(DocumentMask {
            field_paths: encoded.mask.iter().map(FieldPath::to_wire).collect(),
        }),
        update_transforms: encoded.transforms,
        current_document: Some(Precondition { exists: true }),
        ..Default::default()
    })
}

pub(crate) fn delete_write(name: String) -> Write {
    Write {
        delete: Some(name),
        ..Default::default()
    }
}

/// Turn `(dotted path, value)` pairs into parsed update entries.
pub(crate) fn parse_updates<I, K, V>(updates: I) -> GcpResult<Vec<(FieldPath, FieldValue)>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<FieldValue>,
{
    updates
        .into_iter()
        .map(|(k, v)| Ok((FieldPath::parse(k.as_ref())?, v.into())))
        .collect()
}
