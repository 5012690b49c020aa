//! Schema-structural checking: `check` validates a parsed [`Schema`] against
//! every invariant the JADN grammar imposes beyond what [`TypeDefinition`]'s
//! `Deserialize` impl already enforces (tuple arity); `analyze` reports
//! unreferenced and undefined type names. Checking an *instance* against a
//! type is the codec's job, not this module's — see `crate::codec`.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::definitions::{
    self, BaseType, Config, ALLOWED_TYPE_OPTIONS, REQUIRED_TYPE_OPTIONS,
};
use crate::schema::error::ValidationError;
use crate::schema::meta::check_against_meta_schema;
use crate::schema::{FieldDefinition, Schema, TypeDefinition};

/// The result of `analyze`: type names referenced but not defined, defined
/// but never referenced, and any dependency cycles (always empty — see
/// `DESIGN.md`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    pub unreferenced: Vec<String>,
    pub undefined: Vec<String>,
    pub cycles: Vec<Vec<String>>,
}

/// Validates a schema's JSON shape against the JADN meta-schema, then
/// enforces the remaining structural invariants: unique/non-reserved type
/// names, valid base types, required/allowed type options, valid format
/// options, field arity/uniqueness/ordinal IDs, multiplicity and `tagid`
/// sanity, and `dir` applicability. Returns the schema unchanged on success.
pub fn check(schema: &Schema) -> Result<(), ValidationError> {
    check_against_meta_schema(schema)?;

    let config = schema
        .info
        .as_ref()
        .map(|_| Config::default())
        .unwrap_or_default();
    let type_name_re = Regex::new(&config.type_name_pattern)
        .map_err(|e| ValidationError::schema_invalid(format!("bad type_name_pattern: {e}")))?;
    let field_name_re = Regex::new(&config.field_name_pattern)
        .map_err(|e| ValidationError::schema_invalid(format!("bad field_name_pattern: {e}")))?;

    let mut seen = BTreeSet::new();
    for t in &schema.types {
        if !seen.insert(t.name.as_str()) {
            return Err(ValidationError::schema_invalid(format!(
                "duplicate type definition {}",
                t.name
            )));
        }
        if BaseType::from_name(&t.name).is_some() {
            return Err(ValidationError::schema_invalid(format!(
                "reserved type name {}",
                t.name
            )));
        }
        if !type_name_re.is_match(&t.name) {
            return Err(ValidationError::schema_invalid(format!(
                "type name {} does not match {}",
                t.name, config.type_name_pattern
            )));
        }

        check_type_options(&t.name, t.base_type, &t.options)?;

        let opts = parse_options(&t.options);
        let flen = if opts.contains_key("enum") || opts.contains_key("pointer") {
            0
        } else {
            t.base_type.field_length()
        };
        if flen == 0 {
            continue;
        }

        let mut fids = BTreeSet::new();
        let mut fnames = BTreeSet::new();
        let ordinal = matches!(t.base_type, BaseType::Array | BaseType::Record);
        for (n, f) in t.fields.iter().enumerate() {
            fids.insert(f.id());
            fnames.insert(f.name());
            if ordinal && f.id() != (n as i64) + 1 {
                return Err(ValidationError::schema_invalid(format!(
                    "item tag error: {}({:?}) [{}] -- {} should be {}",
                    t.name,
                    t.base_type,
                    f.name(),
                    f.id(),
                    n + 1
                )));
            }
            if !field_name_re.is_match(f.name()) {
                return Err(ValidationError::schema_invalid(format!(
                    "field name {}/{} does not match {}",
                    t.name, f.name(), config.field_name_pattern
                )));
            }

            if let FieldDefinition::Full(full) = f {
                check_gen_field(&t.name, full, &fids)?;
            }
        }

        if t.fields.len() != fids.len() || t.fields.len() != fnames.len() {
            return Err(ValidationError::schema_invalid(format!(
                "duplicate field in {}: {} fields, {} unique ids, {} unique names",
                t.name,
                t.fields.len(),
                fids.len(),
                fnames.len()
            )));
        }
    }

    Ok(())
}

/// Splits a field's raw option strings into field options proper (`minc`,
/// `maxc`, `tagid`, `dir`, `key`, `link`, `default`) and type options
/// embedded directly in the field (`minv`, `format`, `pattern`, ... — used
/// when a field narrows a built-in `FieldType` without a separate type
/// definition), mirroring `jadn.ftopts_s2d`'s two-dict split.
fn split_field_options(raw: &[String]) -> (BTreeMap<&'static str, definitions::OptionValue>, BTreeSet<&'static str>) {
    let mut fopts = BTreeMap::new();
    let mut ftopt_names = BTreeSet::new();
    for s in raw {
        if let Some((tag, _)) = definitions::split_option(s) {
            if definitions::field_option_by_tag(tag).is_some() {
                if let Some((name, value)) = definitions::parse_option(s) {
                    fopts.insert(name, value);
                }
            } else if let Some(spec) = definitions::type_option_by_tag(tag) {
                ftopt_names.insert(spec.name);
            }
        }
    }
    (fopts, ftopt_names)
}

fn check_gen_field(
    type_name: &str,
    f: &crate::schema::GenFieldDefinition,
    sibling_ids: &BTreeSet<i64>,
) -> Result<(), ValidationError> {
    let (fopts, ftopt_names) = split_field_options(&f.field_options);
    let minc = fopts.get("minc").and_then(|v| v.as_int()).unwrap_or(1);
    let maxc = fopts.get("maxc").and_then(|v| v.as_int()).unwrap_or(1);
    if minc < 0 || maxc < 0 || (maxc > 0 && maxc < minc) {
        return Err(ValidationError::schema_invalid(format!(
            "{type_name}/{} bad multiplicity {minc} {maxc}",
            f.field_name
        )));
    }

    if let Some(tagid) = fopts.get("tagid").and_then(|v| v.as_int()) {
        if !sibling_ids.contains(&tagid) {
            return Err(ValidationError::schema_invalid(format!(
                "{type_name}/{}({}) choice has bad external tag {tagid}",
                f.field_name, f.field_type
            )));
        }
    }

    if let Some(base) = BaseType::from_name(&f.field_type) {
        let embedded: Vec<String> = f
            .field_options
            .iter()
            .filter(|s| {
                definitions::split_option(s)
                    .map(|(tag, _)| definitions::type_option_by_tag(tag).is_some())
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        check_type_options(&format!("{type_name}/{}", f.field_name), base, &embedded)?;
    } else if !ftopt_names.is_empty() {
        let unique_only = maxc != 1 && ftopt_names.len() == 1 && ftopt_names.contains("unique");
        if !unique_only {
            return Err(ValidationError::schema_invalid(format!(
                "{type_name}/{}({}) cannot have type options on a user-defined type",
                f.field_name, f.field_type
            )));
        }
    }

    if fopts.contains_key("dir") {
        let referenced_has_fields = BaseType::from_name(&f.field_type)
            .map(BaseType::has_fields)
            .unwrap_or(true);
        if BaseType::from_name(&f.field_type).is_some() && !referenced_has_fields {
            return Err(ValidationError::schema_invalid(format!(
                "{type_name}/{}: {} cannot be dir",
                f.field_name, f.field_type
            )));
        }
    }

    Ok(())
}

fn parse_options(raw: &[String]) -> BTreeMap<&'static str, definitions::OptionValue> {
    raw.iter().filter_map(|s| definitions::parse_option(s)).collect()
}

fn check_type_options(
    type_name: &str,
    base_type: BaseType,
    raw_options: &[String],
) -> Result<(), ValidationError> {
    let opts = parse_options(raw_options);
    let names: BTreeSet<&str> = opts.keys().copied().collect();

    let required: BTreeSet<&str> = REQUIRED_TYPE_OPTIONS[&base_type].iter().copied().collect();
    let missing: Vec<&str> = required.difference(&names).copied().collect();
    if !missing.is_empty() {
        return Err(ValidationError::schema_invalid(format!(
            "missing type option {type_name}: {missing:?}"
        )));
    }

    let allowed: BTreeSet<&str> = ALLOWED_TYPE_OPTIONS[&base_type].iter().copied().collect();
    let unsupported: Vec<&str> = names.difference(&allowed).copied().collect();
    if !unsupported.is_empty() {
        return Err(ValidationError::schema_invalid(format!(
            "unsupported type option {type_name} ({base_type:?}): {unsupported:?}"
        )));
    }

    if let (Some(minv), Some(maxv)) = (
        opts.get("minv").and_then(|v| v.as_int()),
        opts.get("maxv").and_then(|v| v.as_int()),
    ) {
        if maxv < minv {
            return Err(ValidationError::schema_invalid(format!(
                "bad value range {type_name} ({base_type:?}): [{minv}..{maxv}]"
            )));
        }
    }

    if let Some(fmt) = opts.get("format").and_then(|v| v.as_text()) {
        if !definitions::is_valid_format(fmt, base_type) {
            return Err(ValidationError::schema_invalid(format!(
                "unsupported format {fmt} in {type_name} {base_type:?}"
            )));
        }
    }

    if names.contains("enum") && names.contains("pointer") {
        return Err(ValidationError::schema_invalid(format!(
            "type cannot be both enum and pointer {type_name} {base_type:?}"
        )));
    }

    if names.contains("and") && names.contains("or") {
        return Err(ValidationError::schema_invalid(format!(
            "unsupported union+intersection in {type_name} {base_type:?}"
        )));
    }

    Ok(())
}

/// Builds `{TypeName: [referenced TypeName, ...]}` across a schema: `ktype`/
/// `vtype`/`and`/`or` type options, `enum`/`pointer` derivation targets, and
/// every field's `FieldType`, recursing into the field's own options the
/// same way a nested anonymous type would be.
pub fn build_deps(schema: &Schema) -> BTreeMap<String, Vec<String>> {
    fn get_refs(base_type: BaseType, options: &[String], fields: &[FieldDefinition]) -> Vec<String> {
        let mut refs = Vec::new();
        for opt in options {
            if let Some((tag, value)) = definitions::split_option(opt) {
                match tag {
                    '+' | '*' | '\u{2229}' | '\u{222a}' if BaseType::from_name(value).is_none() => {
                        refs.push(value.to_string());
                    }
                    '#' | '>' => refs.push(opt.clone()),
                    _ => {}
                }
            }
        }
        if base_type.has_fields() {
            for f in fields {
                if let FieldDefinition::Full(full) = f {
                    if BaseType::from_name(&full.field_type).is_none() {
                        refs.push(full.field_type.clone());
                    }
                    refs.extend(get_refs(BaseType::Record, &full.field_options, &[]));
                }
            }
        }
        refs
    }

    schema
        .types
        .iter()
        .map(|t| (t.name.clone(), get_refs(t.base_type, &t.options, &t.fields)))
        .collect()
}

/// Reports type names referenced somewhere in the schema but not locally
/// defined or imported (`undefined`), and type names defined but never
/// referenced, imported, or exported (`unreferenced`). `cycles` is always
/// empty; see `DESIGN.md`.
pub fn analyze(schema: &Schema) -> Analysis {
    let deps = build_deps(schema);

    let imports: BTreeSet<String> = schema
        .info
        .as_ref()
        .map(|i| i.imports.keys().cloned().collect())
        .unwrap_or_default();
    let exports: BTreeSet<String> = schema
        .info
        .as_ref()
        .map(|i| i.exports.iter().cloned().collect())
        .unwrap_or_default();

    let defs: BTreeSet<String> = deps.keys().cloned().chain(imports.iter().cloned()).collect();

    fn strip_derivation_tag(r: &str) -> String {
        match definitions::split_option(r) {
            Some(('#', v)) | Some(('>', v)) => v.to_string(),
            _ => r.to_string(),
        }
    }

    let refs: BTreeSet<String> = deps
        .values()
        .flatten()
        .map(|r| strip_derivation_tag(r))
        .chain(exports.iter().cloned())
        .collect();

    Analysis {
        unreferenced: defs.difference(&refs).cloned().collect(),
        undefined: refs.difference(&defs).cloned().collect(),
        cycles: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::BaseType;
    use crate::schema::GenFieldDefinition;

    fn full_field(id: i64, name: &str, ty: &str, opts: &[&str]) -> FieldDefinition {
        FieldDefinition::Full(GenFieldDefinition {
            field_id: id,
            field_name: name.to_string(),
            field_type: ty.to_string(),
            field_options: opts.iter().map(|s| s.to_string()).collect(),
            field_desc: String::new(),
        })
    }

    #[test]
    fn rejects_duplicate_type_names() {
        let schema = Schema {
            info: None,
            types: vec![
                TypeDefinition::new("T-a", BaseType::String),
                TypeDefinition::new("T-a", BaseType::Integer),
            ],
        };
        assert!(check(&schema).is_err());
    }

    #[test]
    fn rejects_reserved_type_name() {
        let schema = Schema { info: None, types: vec![TypeDefinition::new("String", BaseType::String)] };
        assert!(check(&schema).is_err());
    }

    #[test]
    fn map_of_requires_ktype_vtype_options() {
        let schema = Schema {
            info: None,
            types: vec![TypeDefinition::new("T-map", BaseType::MapOf)],
        };
        assert!(check(&schema).is_err());
    }

    #[test]
    fn accepts_well_formed_record() {
        let schema = Schema {
            info: None,
            types: vec![TypeDefinition::new("T-rec", BaseType::Record)
                .with_fields(vec![full_field(1, "a", "String", &[]), full_field(2, "b", "Integer", &["[0"])])],
        };
        check(&schema).unwrap();
    }

    #[test]
    fn rejects_out_of_order_record_field_ids() {
        let schema = Schema {
            info: None,
            types: vec![TypeDefinition::new("T-rec", BaseType::Record)
                .with_fields(vec![full_field(2, "a", "String", &[]), full_field(1, "b", "Integer", &[])])],
        };
        assert!(check(&schema).is_err());
    }

    #[test]
    fn analyze_reports_undefined_reference() {
        let schema = Schema {
            info: None,
            types: vec![TypeDefinition::new("T-rec", BaseType::Record)
                .with_fields(vec![full_field(1, "a", "T-missing", &[])])],
        };
        let analysis = analyze(&schema);
        assert!(analysis.undefined.contains(&"T-missing".to_string()));
    }
}
