//! The JADN meta-schema: a JADN schema describing the shape of a JADN
//! schema. Checking a schema against it is an ordinary `Codec` encode run
//! against this module's fixed `Schema` value, mirroring `jadn.core.check`'s
//! self-hosting bootstrap (`jadn.codec.Codec(meta_schema, verbose_rec=True,
//! verbose_str=True, config=schema)` followed by
//! `meta_schema.encode('Schema', schema)`).

use crate::codec::Codec;
use crate::definitions::BaseType;
use crate::schema::error::ValidationError;
use crate::schema::{FieldDefinition, GenFieldDefinition, Info, Schema, TypeDefinition};

/// Builds the fixed meta-schema describing `Schema`/`Info`/`Type`/`Field`.
///
/// `Fields` is modeled loosely as `ArrayOf(Field)` with a free-form tail
/// rather than a precise union of `GenFieldDefinition`/`EnumFieldDefinition`
/// shapes — JADN has no Choice-of-tuple-arity construct to express "3-tuple
/// or 5-tuple", so the meta-schema only checks the outer envelope and
/// `checker.rs` does the arity-specific field checks.
pub fn meta_schema() -> Schema {
    Schema {
        info: Some(Info {
            title: Some("JADN Meta-schema".to_string()),
            module: Some("http://oasis-open.org/openc2/jadn/v2.0/schema".to_string()),
            ..Info::default()
        }),
        types: vec![
            TypeDefinition::new("Schema", BaseType::Record).with_fields(vec![
                full(1, "info", "Info", &["[0"], "schema info, optional"),
                full(2, "types", "Type", &["]0", "q"], "array of type definitions"),
            ]),
            TypeDefinition::new("Info", BaseType::Record).with_fields(vec![
                full(1, "title", "String", &["[0"], ""),
                full(2, "module", "String", &["[0"], ""),
                full(3, "version", "String", &["[0"], ""),
                full(4, "description", "String", &["[0"], ""),
                full(5, "comments", "String", &["[0"], ""),
                full(6, "copyright", "String", &["[0"], ""),
                full(7, "license", "String", &["[0"], ""),
                full(8, "imports", "Namespaces", &["[0"], ""),
                full(9, "exports", "TypeName", &["[0", "q"], ""),
                full(10, "config", "Config", &["[0"], ""),
            ]),
            TypeDefinition::new("Namespaces", BaseType::MapOf)
                .with_options(vec!["*String".to_string(), "+String".to_string()]),
            TypeDefinition::new("Config", BaseType::Map),
            TypeDefinition::new("TypeName", BaseType::String),
            TypeDefinition::new("Type", BaseType::Array).with_fields(vec![
                full(1, "TypeName", "TypeName", &[], ""),
                full(2, "BaseType", "String", &[], ""),
                full(3, "TypeOptions", "TypeOptions", &[], ""),
                full(4, "TypeDesc", "String", &[], ""),
                full(5, "Fields", "Fields", &["[0"], ""),
            ]),
            TypeDefinition::new("TypeOptions", BaseType::ArrayOf)
                .with_options(vec!["*String".to_string()]),
            TypeDefinition::new("Fields", BaseType::ArrayOf)
                .with_options(vec!["*Field".to_string()]),
            TypeDefinition::new("Field", BaseType::ArrayOf)
                .with_options(vec!["*String".to_string()]),
        ],
    }
}

fn full(
    id: i64,
    name: &str,
    field_type: &str,
    opts: &[&str],
    desc: &str,
) -> FieldDefinition {
    FieldDefinition::Full(GenFieldDefinition {
        field_id: id,
        field_name: name.to_string(),
        field_type: field_type.to_string(),
        field_options: opts.iter().map(|s| s.to_string()).collect(),
        field_desc: desc.to_string(),
    })
}

/// Bootstraps a `Codec` over the meta-schema and encodes the candidate
/// schema's own JSON form through it. A schema that fails this is not
/// itself valid JADN data shaped like `Schema` — e.g. a type definition
/// with the wrong tuple arity, or an `info` block with a field of the
/// wrong JSON type.
pub fn check_against_meta_schema(schema: &Schema) -> Result<(), ValidationError> {
    let meta = meta_schema();
    let mut codec = Codec::new(&meta).map_err(|e| {
        ValidationError::schema_invalid(format!("meta-schema failed to build a codec: {e}"))
    })?;
    codec.set_mode(true, true);

    let schema_value = schema.to_json_value();
    let api_value = crate::value::Value::from_json_str(&schema_value.to_string())?;
    codec
        .encode("Schema", &api_value)
        .map_err(|e| e.with_context("schema does not conform to the JADN meta-schema"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_schema_accepts_a_minimal_schema() {
        let schema = Schema {
            info: None,
            types: vec![TypeDefinition::new("T-str", BaseType::String)],
        };
        check_against_meta_schema(&schema).unwrap();
    }
}
