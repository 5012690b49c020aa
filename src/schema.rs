//! The JADN schema data model: an ordered sequence of type definitions plus
//! optional `info` metadata, deserialized from the tuple-array JSON form
//! mandated by the persisted schema format.

use std::collections::BTreeMap;

use serde::de::{Deserializer, Error as DeError};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::definitions::BaseType;

pub mod checker;
pub mod error;
pub mod meta;

pub use checker::{analyze, check, Analysis};

/// Optional schema-level metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Info {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub imports: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, serde_json::Value>,
}

/// `(ItemID, ItemValue, ItemDesc)` — a field of an `Enumerated` type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumFieldDefinition {
    pub item_id: i64,
    pub item_value: String,
    pub item_desc: String,
}

/// `(FieldID, FieldName, FieldType, FieldOptions, FieldDesc)` — a field of
/// any other container base type with fields (Array, Choice, Map, Record).
#[derive(Debug, Clone, PartialEq)]
pub struct GenFieldDefinition {
    pub field_id: i64,
    pub field_name: String,
    pub field_type: String,
    pub field_options: Vec<String>,
    pub field_desc: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefinition {
    Enum(EnumFieldDefinition),
    Full(GenFieldDefinition),
}

impl FieldDefinition {
    pub fn id(&self) -> i64 {
        match self {
            FieldDefinition::Enum(f) => f.item_id,
            FieldDefinition::Full(f) => f.field_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FieldDefinition::Enum(f) => &f.item_value,
            FieldDefinition::Full(f) => &f.field_name,
        }
    }

    pub fn desc(&self) -> &str {
        match self {
            FieldDefinition::Enum(f) => &f.item_desc,
            FieldDefinition::Full(f) => &f.field_desc,
        }
    }

    pub fn set_desc(&mut self, desc: String) {
        match self {
            FieldDefinition::Enum(f) => f.item_desc = desc,
            FieldDefinition::Full(f) => f.field_desc = desc,
        }
    }

    pub fn as_full(&self) -> Option<&GenFieldDefinition> {
        match self {
            FieldDefinition::Full(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_full_mut(&mut self) -> Option<&mut GenFieldDefinition> {
        match self {
            FieldDefinition::Full(f) => Some(f),
            _ => None,
        }
    }
}

impl Serialize for FieldDefinition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FieldDefinition::Enum(f) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&f.item_id)?;
                seq.serialize_element(&f.item_value)?;
                seq.serialize_element(&f.item_desc)?;
                seq.end()
            }
            FieldDefinition::Full(f) => {
                let mut seq = serializer.serialize_seq(Some(5))?;
                seq.serialize_element(&f.field_id)?;
                seq.serialize_element(&f.field_name)?;
                seq.serialize_element(&f.field_type)?;
                seq.serialize_element(&f.field_options)?;
                seq.serialize_element(&f.field_desc)?;
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for FieldDefinition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v: Vec<serde_json::Value> = Deserialize::deserialize(deserializer)?;
        match v.len() {
            3 => Ok(FieldDefinition::Enum(EnumFieldDefinition {
                item_id: json_i64(&v[0]).map_err(DeError::custom)?,
                item_value: json_str(&v[1]).map_err(DeError::custom)?,
                item_desc: json_str(&v[2]).map_err(DeError::custom)?,
            })),
            5 => Ok(FieldDefinition::Full(GenFieldDefinition {
                field_id: json_i64(&v[0]).map_err(DeError::custom)?,
                field_name: json_str(&v[1]).map_err(DeError::custom)?,
                field_type: json_str(&v[2]).map_err(DeError::custom)?,
                field_options: serde_json::from_value(v[3].clone()).map_err(DeError::custom)?,
                field_desc: json_str(&v[4]).map_err(DeError::custom)?,
            })),
            n => Err(DeError::custom(format!(
                "field definition has {n} elements, expected 3 (enum item) or 5 (full field)"
            ))),
        }
    }
}

fn json_i64(v: &serde_json::Value) -> Result<i64, String> {
    v.as_i64().ok_or_else(|| format!("expected integer, got {v}"))
}

fn json_str(v: &serde_json::Value) -> Result<String, String> {
    v.as_str()
        .map(str::to_owned)
        .ok_or_else(|| format!("expected string, got {v}"))
}

/// A type definition: `(TypeName, BaseType, TypeOptions, TypeDesc[, Fields])`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    pub name: String,
    pub base_type: BaseType,
    pub options: Vec<String>,
    pub desc: String,
    pub fields: Vec<FieldDefinition>,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>, base_type: BaseType) -> Self {
        TypeDefinition {
            name: name.into(),
            base_type,
            options: Vec::new(),
            desc: String::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    pub fn with_fields(mut self, fields: Vec<FieldDefinition>) -> Self {
        self.fields = fields;
        self
    }
}

impl Serialize for TypeDefinition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let include_fields = self.base_type.has_fields() || !self.fields.is_empty();
        let len = if include_fields { 5 } else { 4 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.name)?;
        seq.serialize_element(self.base_type.name())?;
        seq.serialize_element(&self.options)?;
        seq.serialize_element(&self.desc)?;
        if include_fields {
            seq.serialize_element(&self.fields)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for TypeDefinition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v: Vec<serde_json::Value> = Deserialize::deserialize(deserializer)?;
        if v.len() != 4 && v.len() != 5 {
            return Err(DeError::custom(format!(
                "type definition has {} elements, expected 4 or 5",
                v.len()
            )));
        }
        let name = json_str(&v[0]).map_err(DeError::custom)?;
        let base_name = json_str(&v[1]).map_err(DeError::custom)?;
        let base_type = BaseType::from_name(&base_name)
            .ok_or_else(|| DeError::custom(format!("unknown base type {base_name}")))?;
        let options: Vec<String> = serde_json::from_value(v[2].clone()).map_err(DeError::custom)?;
        let desc = json_str(&v[3]).map_err(DeError::custom)?;
        let fields = if v.len() == 5 {
            serde_json::from_value(v[4].clone()).map_err(DeError::custom)?
        } else {
            Vec::new()
        };
        Ok(TypeDefinition { name, base_type, options, desc, fields })
    }
}

/// The top-level persisted schema document: `{ "info"?: .., "types": [TD, ...] }`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Info>,
    pub types: Vec<TypeDefinition>,
}

impl Schema {
    pub fn from_json_value(v: serde_json::Value) -> Result<Schema, serde_json::Error> {
        serde_json::from_value(v)
    }

    pub fn from_json_str(s: &str) -> Result<Schema, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("Schema always serializes")
    }

    pub fn type_by_name(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_definition_round_trips_through_json() {
        let v = serde_json::json!(["T-int", "Integer", [], "an integer"]);
        let td: TypeDefinition = serde_json::from_value(v.clone()).unwrap();
        assert_eq!(td.name, "T-int");
        assert_eq!(td.base_type, BaseType::Integer);
        assert!(td.fields.is_empty());
        assert_eq!(serde_json::to_value(&td).unwrap(), v);
    }

    #[test]
    fn record_field_round_trips() {
        let v = serde_json::json!([
            "T-rec", "Record", [], "",
            [[1, "red", "Integer", [], ""], [2, "green", "Integer", ["[0"], ""]]
        ]);
        let td: TypeDefinition = serde_json::from_value(v.clone()).unwrap();
        assert_eq!(td.fields.len(), 2);
        assert_eq!(td.fields[1].name(), "green");
        assert_eq!(serde_json::to_value(&td).unwrap(), v);
    }

    #[test]
    fn enumerated_item_round_trips() {
        let v = serde_json::json!(["E", "Enumerated", [], "", [[1, "red", ""], [2, "green", ""]]]);
        let td: TypeDefinition = serde_json::from_value(v.clone()).unwrap();
        assert_eq!(td.fields[0].id(), 1);
        assert_eq!(serde_json::to_value(&td).unwrap(), v);
    }

    #[test]
    fn schema_round_trips_with_info() {
        let v = serde_json::json!({
            "info": {"title": "Test"},
            "types": [["T-null", "Null", [], ""]]
        });
        let schema: Schema = serde_json::from_value(v.clone()).unwrap();
        assert_eq!(schema.info.unwrap().title.as_deref(), Some("Test"));
        assert_eq!(schema.types.len(), 1);
    }
}
