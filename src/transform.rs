//! Schema transforms: stripping comments, desugaring the four schema
//! extensions (`Multiplicity`, `AnonymousType`, `DerivedEnum`, `MapOfEnum`)
//! into their fully-explicit equivalents, folding them back in, and putting
//! a schema into canonical form. Every pass here produces a schema that
//! `schema::check` would also accept; `simplify` never changes what a
//! schema *means*, only how compactly it says it.

use std::collections::BTreeMap;

use crate::definitions::{self, BaseType, Extension, OptionKind, ALL_EXTENSIONS};
use crate::schema::error::ValidationError;
use crate::schema::{EnumFieldDefinition, FieldDefinition, GenFieldDefinition, Schema, TypeDefinition};

const SYS: &str = "$";

/// Truncates every `TypeDesc`/`FieldDesc`/`ItemDesc` in the schema to `width`
/// characters, appending `".."` when truncated. `width == 0` leaves
/// descriptions untouched (matches `estrip`'s `n > 1` guard only loosely —
/// 0 and 1 both mean "no room for an ellipsis", so both pass through as a
/// plain prefix).
pub fn strip_comments(schema: &Schema, width: usize) -> Schema {
    fn estrip(s: &str, n: usize) -> String {
        if n <= 1 {
            return s.chars().take(n).collect();
        }
        if s.chars().count() > n {
            let head: String = s.chars().take(n.saturating_sub(2)).collect();
            format!("{head}..")
        } else {
            s.to_string()
        }
    }

    let mut sc = schema.clone();
    for tdef in &mut sc.types {
        tdef.desc = estrip(&tdef.desc, width);
        for fdef in &mut tdef.fields {
            let stripped = estrip(fdef.desc(), width);
            fdef.set_desc(stripped);
        }
    }
    sc
}

fn find_opt(opts: &[String], tag: char) -> Option<usize> {
    opts.iter().position(|o| o.chars().next() == Some(tag))
}

fn take_opt(opts: &mut Vec<String>, tag: char) -> Option<String> {
    find_opt(opts, tag).map(|i| opts.remove(i))
}

/// `epname` from the reference transform: the implied type name for a
/// derived-enum or derived-pointer reference, e.g. `"Colors$Enum"` for
/// `#Colors`, or `"Colors$Enum-Id"` if the `id` option is also present.
fn epname(topts: &[String]) -> Option<String> {
    let enum_target = find_opt(topts, '#').map(|i| topts[i][1..].to_string());
    let pointer_target = find_opt(topts, '>').map(|i| topts[i][1..].to_string());
    let (rtype, oname) = if let Some(r) = enum_target {
        (r, "Enum")
    } else if let Some(r) = pointer_target {
        (r, "Pointer")
    } else {
        return None;
    };
    let id_suffix = if find_opt(topts, '=').is_some() { "-Id" } else { "" };
    Some(format!("{rtype}{SYS}{oname}{id_suffix}"))
}

fn enum_items(types: &BTreeMap<String, TypeDefinition>, rtype: &str) -> Vec<FieldDefinition> {
    match types.get(rtype) {
        Some(tdef) if tdef.base_type.has_fields() => tdef.fields.clone(),
        _ => Vec::new(),
    }
}

fn pathnames(types: &BTreeMap<String, TypeDefinition>, rtype: &str, base: &str, out: &mut Vec<(String, String)>) {
    let Some(tdef) = types.get(rtype) else { return };
    if !tdef.base_type.has_fields() {
        return;
    }
    for f in &tdef.fields {
        let FieldDefinition::Full(full) = f else { continue };
        if find_opt(&full.field_options, '<').is_some() {
            pathnames(types, &full.field_type, &format!("{base}{}/", full.field_name), out);
        } else {
            out.push((format!("{base}{}", full.field_name), full.field_desc.clone()));
        }
    }
}

fn pointer_items(types: &BTreeMap<String, TypeDefinition>, rtype: &str) -> Vec<FieldDefinition> {
    let mut paths = Vec::new();
    pathnames(types, rtype, "", &mut paths);
    paths
        .into_iter()
        .enumerate()
        .map(|(n, (name, desc))| FieldDefinition::Enum(EnumFieldDefinition {
            item_id: n as i64 + 1,
            item_value: name,
            item_desc: desc,
        }))
        .collect()
}

/// Replace field multiplicity (`maxc != 1`) with an explicit generated
/// `ArrayOf` type definition, pointing the field at it instead.
fn simplify_multiplicity(tdefs: &mut [TypeDefinition]) -> Vec<TypeDefinition> {
    let mut new_types = Vec::new();
    for tdef in tdefs.iter_mut() {
        if !tdef.base_type.has_fields() {
            continue;
        }
        let tname = tdef.name.clone();
        for fdef in &mut tdef.fields {
            let FieldDefinition::Full(full) = fdef else { continue };
            let opts = definitions_opts(&full.field_options);
            let maxc = opts.get("maxc").and_then(|v| v.as_int()).unwrap_or(1);
            if maxc == 1 {
                continue;
            }
            let minc = opts.get("minc").and_then(|v| v.as_int()).unwrap_or(1);
            let has_unique = find_opt(&full.field_options, 'q').is_some();
            let newname = format!("{tname}{SYS}{}", full.field_name);

            let mut newopts = vec![format!("*{}", full.field_type), format!("{{{}", minc.max(1))];
            if maxc > 1 {
                newopts.push(format!("}}{maxc}"));
            }
            if has_unique {
                newopts.push("q".to_string());
            }
            new_types.push(TypeDefinition::new(newname.clone(), BaseType::ArrayOf).with_options(newopts));

            full.field_type = newname;
            take_opt(&mut full.field_options, ']');
            if minc != 0 {
                take_opt(&mut full.field_options, '[');
            }
            take_opt(&mut full.field_options, 'q');
        }
    }
    new_types
}

fn definitions_opts(raw: &[String]) -> BTreeMap<&'static str, definitions::OptionValue> {
    raw.iter().filter_map(|s| definitions::parse_option(s)).collect()
}

/// Replace inline type-option-bearing fields (a field on a built-in type
/// that also narrows it, e.g. a `String` field with a `%pattern`) with an
/// explicit generated type definition.
fn simplify_anonymous_types(tdefs: &mut [TypeDefinition]) -> Vec<TypeDefinition> {
    let mut new_types: Vec<TypeDefinition> = Vec::new();
    for tdef in tdefs.iter_mut() {
        if !tdef.base_type.has_fields() {
            continue;
        }
        let tname = tdef.name.clone();
        for fdef in &mut tdef.fields {
            let FieldDefinition::Full(full) = fdef else { continue };
            let embedded_type_opts: Vec<String> = full
                .field_options
                .iter()
                .filter(|o| {
                    o.chars()
                        .next()
                        .map(|t| definitions::type_option_by_tag(t).is_some())
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
            if embedded_type_opts.is_empty() {
                continue;
            }
            let name = epname(&full.field_options)
                .unwrap_or_else(|| format!("{tname}{SYS}{}", full.field_name));
            if !new_types.iter().any(|t| t.name == name) {
                assert!(
                    BaseType::from_name(&full.field_type).is_some(),
                    "anonymous type must narrow a built-in base type"
                );
                let base = BaseType::from_name(&full.field_type).unwrap();
                new_types.push(
                    TypeDefinition::new(name.clone(), base).with_options(embedded_type_opts.clone()),
                );
            }
            for o in &embedded_type_opts {
                if let Some(pos) = full.field_options.iter().position(|x| x == o) {
                    full.field_options.remove(pos);
                }
            }
            full.field_type = name;
        }
    }
    new_types
}

/// Generate explicit `Enumerated` types for `#`/`>` (enum/pointer) type
/// options, both on `Enumerated` type definitions directly and on
/// `ArrayOf`/`MapOf` container `vtype`/`ktype` references.
fn simplify_derived_enum(tdefs: &mut Vec<TypeDefinition>) -> Vec<TypeDefinition> {
    let types: BTreeMap<String, TypeDefinition> =
        tdefs.iter().map(|t| (t.name.clone(), t.clone())).collect();
    let mut enums: BTreeMap<String, String> = BTreeMap::new();

    for tdef in tdefs.iter_mut() {
        if tdef.base_type != BaseType::Enumerated {
            continue;
        }
        let Some(rname) = epname(&tdef.options) else { continue };
        let enum_idx = find_opt(&tdef.options, '#');
        let pointer_idx = find_opt(&tdef.options, '>');
        let (idx, is_enum) = match (enum_idx, pointer_idx) {
            (Some(i), _) => (i, true),
            (None, Some(i)) => (i, false),
            (None, None) => continue,
        };
        let rtype = tdef.options[idx][1..].to_string();
        let items = if is_enum { enum_items(&types, &rtype) } else { pointer_items(&types, &rtype) };
        tdef.fields = items;
        tdef.options.remove(idx);
        enums.insert(rname, tdef.name.clone());
    }

    let mut new_types = Vec::new();
    let snapshot: BTreeMap<String, TypeDefinition> = types; // pre-pass view for enum_items lookups
    for tdef in tdefs.iter_mut() {
        if !matches!(tdef.base_type, BaseType::ArrayOf | BaseType::MapOf) {
            continue;
        }
        for tag in ['*', '+'] {
            let Some(idx) = find_opt(&tdef.options, tag) else { continue };
            let value = tdef.options[idx][1..].to_string();
            // the value itself may carry a synthetic '#'/'>' prefix marking a
            // derived-enum/pointer reference rather than a plain type name.
            let Some(name) = epname(&[value.clone()]) else { continue };
            if let Some(existing) = enums.get(&name) {
                tdef.options[idx] = format!("{tag}{existing}");
            } else {
                let rtype = value[1..].to_string();
                let make_enum = value.starts_with('#');
                let items = if make_enum { enum_items(&snapshot, &rtype) } else { pointer_items(&snapshot, &rtype) };
                tdef.options[idx] = format!("{tag}{name}");
                new_types.push(TypeDefinition::new(name, BaseType::Enumerated).with_fields(items));
            }
        }
    }
    new_types
}

/// Replace a `MapOf` whose `ktype` is an `Enumerated` type with an explicit
/// `Map` whose fields are drawn directly from the enum's items.
fn simplify_map_of_enum(tdefs: &mut [TypeDefinition]) {
    let types: BTreeMap<String, TypeDefinition> =
        tdefs.iter().map(|t| (t.name.clone(), t.clone())).collect();

    for tdef in tdefs.iter_mut() {
        if tdef.base_type != BaseType::MapOf {
            continue;
        }
        let opts = definitions_opts(&tdef.options);
        let Some(ktype) = opts.get("ktype").and_then(|v| v.as_text()) else { continue };
        let Some(vtype) = opts.get("vtype").and_then(|v| v.as_text()) else { continue };
        let Some(key_tdef) = types.get(ktype) else { continue };
        if key_tdef.base_type != BaseType::Enumerated {
            continue;
        }
        let newfields = key_tdef
            .fields
            .iter()
            .filter_map(|f| match f {
                FieldDefinition::Enum(e) => Some(FieldDefinition::Full(GenFieldDefinition {
                    field_id: e.item_id,
                    field_name: e.item_value.clone(),
                    field_type: vtype.to_string(),
                    field_options: Vec::new(),
                    field_desc: e.item_desc.clone(),
                })),
                FieldDefinition::Full(_) => None,
            })
            .collect();
        tdef.base_type = BaseType::Map;
        tdef.options.clear();
        tdef.fields = newfields;
    }
}

/// Removes schema extensions, replacing each with its fully-explicit form.
/// Passes always run in this order regardless of `extensions`' iteration
/// order: Multiplicity, AnonymousType, DerivedEnum, MapOfEnum.
pub fn simplify(schema: &Schema, extensions: &[Extension]) -> Result<Schema, ValidationError> {
    for e in extensions {
        if !ALL_EXTENSIONS.contains(e) {
            return Err(ValidationError::schema_invalid("unknown extension"));
        }
    }

    let mut sc = schema.clone();

    if extensions.contains(&Extension::Multiplicity) {
        let new_types = simplify_multiplicity(&mut sc.types);
        sc.types.extend(new_types);
    }
    if extensions.contains(&Extension::AnonymousType) {
        let new_types = simplify_anonymous_types(&mut sc.types);
        sc.types.extend(new_types);
    }
    if extensions.contains(&Extension::DerivedEnum) {
        let new_types = simplify_derived_enum(&mut sc.types);
        sc.types.extend(new_types);
    }
    if extensions.contains(&Extension::MapOfEnum) {
        simplify_map_of_enum(&mut sc.types);
    }

    Ok(sc)
}

/// Re-introduces the four extension shorthands where the fully-explicit form
/// matches the pattern a `simplify` pass would have generated. Not a perfect
/// inverse of `simplify` in general — multiplicity folding is lossy when
/// `minc == 1` happens to equal the no-option default, and the derived-enum/
/// map-of-enum passes only fold back onto an existing named type, never
/// invent one — but on schemas that came out of `simplify` it reconstructs
/// the original shorthand. Passes run in the opposite order from `simplify`
/// so that outer shorthands (MapOfEnum, DerivedEnum) are recognized before
/// the generated helper types they still point into are folded away
/// underneath them (AnonymousType, Multiplicity).
pub fn unfold_extensions(schema: &Schema, extensions: &[Extension]) -> Result<Schema, ValidationError> {
    for e in extensions {
        if !ALL_EXTENSIONS.contains(e) {
            return Err(ValidationError::schema_invalid("unknown extension"));
        }
    }

    let mut sc = schema.clone();

    if extensions.contains(&Extension::MapOfEnum) {
        unfold_map_of_enum(&mut sc.types);
    }
    if extensions.contains(&Extension::DerivedEnum) {
        unfold_derived_enum(&mut sc.types);
    }
    if extensions.contains(&Extension::AnonymousType) {
        unfold_anonymous_types(&mut sc.types);
    }
    if extensions.contains(&Extension::Multiplicity) {
        unfold_multiplicity(&mut sc.types);
    }

    Ok(sc)
}

/// Inverse of `simplify_multiplicity`: finds fields pointed at a
/// `{Owner}${field}`-named `ArrayOf` and folds its `vtype`/bounds/`unique`
/// back onto the field directly.
fn unfold_multiplicity(tdefs: &mut Vec<TypeDefinition>) {
    let by_name: BTreeMap<String, TypeDefinition> =
        tdefs.iter().map(|t| (t.name.clone(), t.clone())).collect();
    let mut consumed: Vec<String> = Vec::new();

    for tdef in tdefs.iter_mut() {
        if !tdef.base_type.has_fields() {
            continue;
        }
        let owner = tdef.name.clone();
        for fdef in &mut tdef.fields {
            let FieldDefinition::Full(full) = fdef else { continue };
            let expected = format!("{owner}{SYS}{}", full.field_name);
            if full.field_type != expected {
                continue;
            }
            let Some(arr) = by_name.get(&expected) else { continue };
            if arr.base_type != BaseType::ArrayOf {
                continue;
            }
            let opts = definitions_opts(&arr.options);
            let Some(vtype) = opts.get("vtype").and_then(|v| v.as_text()) else { continue };
            let minv = opts.get("minv").and_then(|v| v.as_int()).unwrap_or(1);
            let maxv = opts.get("maxv").and_then(|v| v.as_int()).unwrap_or(0);
            let unique = find_opt(&arr.options, 'q').is_some();

            full.field_type = vtype.to_string();
            if find_opt(&full.field_options, '[').is_none() {
                full.field_options.push(format!("[{minv}"));
            }
            full.field_options.push(format!("]{maxv}"));
            if unique {
                full.field_options.push("q".to_string());
            }
            consumed.push(expected);
        }
    }
    tdefs.retain(|t| !consumed.contains(&t.name));
}

/// Inverse of `simplify_anonymous_types`: finds fields pointed at a
/// `{Owner}${field}`-named narrowing of a built-in base type and folds its
/// options back onto the field directly.
fn unfold_anonymous_types(tdefs: &mut Vec<TypeDefinition>) {
    let by_name: BTreeMap<String, TypeDefinition> =
        tdefs.iter().map(|t| (t.name.clone(), t.clone())).collect();
    let mut consumed: Vec<String> = Vec::new();

    for tdef in tdefs.iter_mut() {
        if !tdef.base_type.has_fields() {
            continue;
        }
        let owner = tdef.name.clone();
        for fdef in &mut tdef.fields {
            let FieldDefinition::Full(full) = fdef else { continue };
            let expected = format!("{owner}{SYS}{}", full.field_name);
            if full.field_type != expected {
                continue;
            }
            let Some(anon) = by_name.get(&expected) else { continue };
            if anon.base_type.has_fields() {
                continue;
            }
            full.field_options.extend(anon.options.iter().cloned());
            full.field_type = anon.base_type.name().to_string();
            consumed.push(expected);
        }
    }
    tdefs.retain(|t| !consumed.contains(&t.name));
}

/// Inverse of the `Enumerated`-generating half of `simplify_derived_enum`:
/// folds an explicit `Enumerated` type whose items match another type's
/// fields id-for-id and name-for-name back into a `#rtype` (enum) option.
/// Never reconstructs the `>rtype` (pointer) form — pointer items are
/// path-derived and the original path tree isn't uniquely recoverable from
/// the flattened item list.
fn unfold_derived_enum(tdefs: &mut [TypeDefinition]) {
    let snapshot: Vec<TypeDefinition> = tdefs.to_vec();
    for tdef in tdefs.iter_mut() {
        if tdef.base_type != BaseType::Enumerated || tdef.fields.is_empty() {
            continue;
        }
        if find_opt(&tdef.options, '#').is_some() || find_opt(&tdef.options, '>').is_some() {
            continue;
        }
        let candidate = snapshot.iter().find(|r| {
            r.name != tdef.name
                && r.base_type.has_fields()
                && r.fields.len() == tdef.fields.len()
                && r.fields
                    .iter()
                    .zip(tdef.fields.iter())
                    .all(|(rf, ef)| rf.id() == ef.id() && rf.name() == ef.name())
        });
        if let Some(r) = candidate {
            tdef.fields.clear();
            tdef.options.push(format!("#{}", r.name));
        }
    }
}

/// Inverse of `simplify_map_of_enum`: folds a `Map` whose fields match an
/// existing `Enumerated` type's items id-for-id, name-for-name, and share a
/// single common field type, back into a `MapOf` keyed by that enum.
fn unfold_map_of_enum(tdefs: &mut [TypeDefinition]) {
    let snapshot: Vec<TypeDefinition> = tdefs.to_vec();
    for tdef in tdefs.iter_mut() {
        if tdef.base_type != BaseType::Map || tdef.fields.is_empty() {
            continue;
        }
        let Some(fields): Option<Vec<&GenFieldDefinition>> =
            tdef.fields.iter().map(|f| f.as_full()).collect()
        else {
            continue;
        };
        if fields.iter().any(|f| !f.field_options.is_empty()) {
            continue;
        }
        let vtype = fields[0].field_type.clone();
        if !fields.iter().all(|f| f.field_type == vtype) {
            continue;
        }
        let candidate = snapshot.iter().find(|e| {
            e.base_type == BaseType::Enumerated
                && e.fields.len() == fields.len()
                && e.fields
                    .iter()
                    .zip(fields.iter())
                    .all(|(ef, ff)| ef.id() == ff.field_id && ef.name() == ff.field_name)
        });
        if let Some(e) = candidate {
            tdef.base_type = BaseType::MapOf;
            tdef.options = vec![format!("+{}", e.name), format!("*{vtype}")];
            tdef.fields.clear();
        }
    }
}

fn normalize_option_value(kind: OptionKind, value: &str) -> String {
    match kind {
        OptionKind::Flag => String::new(),
        OptionKind::Text => value.to_string(),
        OptionKind::Int => value.parse::<i64>().map(|n| n.to_string()).unwrap_or_else(|_| value.to_string()),
        OptionKind::Float => value.parse::<f64>().map(|n| n.to_string()).unwrap_or_else(|_| value.to_string()),
    }
}

/// Sorts a type's options into `TYPE_OPTIONS` order and drops `minv=0` —
/// the implicit default everywhere except `Integer`, where `minv` has no
/// implicit default and must stay explicit. Options this crate doesn't
/// recognize are kept, appended after the recognized ones, so canonicalizing
/// is never lossy even on a schema with options ahead of its time.
fn canonicalize_type_options(opts: &[String], base_type: BaseType) -> Vec<String> {
    let mut known = Vec::new();
    let mut unknown = Vec::new();
    for o in opts {
        let Some((tag, value)) = definitions::split_option(o) else {
            unknown.push(o.clone());
            continue;
        };
        match definitions::type_option_by_tag(tag) {
            Some(spec) => {
                let norm = normalize_option_value(spec.kind, value);
                if spec.name == "minv" && base_type != BaseType::Integer && norm == "0" {
                    continue;
                }
                known.push((spec, norm));
            }
            None => unknown.push(o.clone()),
        }
    }
    known.sort_by_key(|(spec, _)| spec.order);
    let mut out: Vec<String> = known.into_iter().map(|(spec, v)| format!("{}{v}", spec.tag)).collect();
    out.extend(unknown);
    out
}

/// Sorts a field's options into `FIELD_OPTIONS` order and drops `minc=1`/
/// `maxc=1`, the implicit single-occurrence default.
fn canonicalize_field_options(opts: &[String]) -> Vec<String> {
    let mut known = Vec::new();
    let mut unknown = Vec::new();
    for o in opts {
        let Some((tag, value)) = definitions::split_option(o) else {
            unknown.push(o.clone());
            continue;
        };
        match definitions::field_option_by_tag(tag) {
            Some(spec) => {
                let norm = normalize_option_value(spec.kind, value);
                if (spec.name == "minc" || spec.name == "maxc") && norm == "1" {
                    continue;
                }
                known.push((spec, norm));
            }
            None => unknown.push(o.clone()),
        }
    }
    known.sort_by_key(|(spec, _)| spec.order);
    let mut out: Vec<String> = known.into_iter().map(|(spec, v)| format!("{}{v}", spec.tag)).collect();
    out.extend(unknown);
    out
}

/// Puts a schema into canonical form: each options list sorted into tag
/// order, default-valued options dropped, numbers reformatted to a single
/// canonical text form. Two schemas that mean the same thing but were
/// written with options in a different order, or with defaults spelled out,
/// canonicalize to the same value. Idempotent: canonicalizing an
/// already-canonical schema is a no-op.
pub fn canonicalize(schema: &Schema) -> Schema {
    let mut sc = schema.clone();
    for tdef in &mut sc.types {
        tdef.options = canonicalize_type_options(&tdef.options, tdef.base_type);
        for fdef in &mut tdef.fields {
            if let FieldDefinition::Full(full) = fdef {
                full.field_options = canonicalize_field_options(&full.field_options);
            }
        }
    }
    sc
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn strip_comments_truncates_with_ellipsis() {
        let mut t = TypeDefinition::new("T-a", BaseType::String);
        t.desc = "a very long description indeed".to_string();
        let schema = Schema { info: None, types: vec![t] };
        let stripped = strip_comments(&schema, 10);
        assert!(stripped.types[0].desc.ends_with(".."));
        assert!(stripped.types[0].desc.chars().count() <= 10);
    }

    #[test]
    fn simplify_multiplicity_generates_array_of() {
        let schema = Schema {
            info: None,
            types: vec![TypeDefinition::new("T-rec", BaseType::Record)
                .with_fields(vec![full_field(1, "tags", "String", &["]0"])])],
        };
        let simplified = simplify(&schema, &[Extension::Multiplicity]).unwrap();
        let rec = simplified.type_by_name("T-rec").unwrap();
        let field_type = rec.fields[0].as_full().unwrap().field_type.clone();
        assert_eq!(field_type, "T-rec$tags");
        let arr = simplified.type_by_name("T-rec$tags").unwrap();
        assert_eq!(arr.base_type, BaseType::ArrayOf);
    }

    #[test]
    fn simplify_map_of_enum_inlines_enumerated_keys() {
        let schema = Schema {
            info: None,
            types: vec![
                TypeDefinition::new("E-color", BaseType::Enumerated).with_fields(vec![
                    FieldDefinition::Enum(EnumFieldDefinition { item_id: 1, item_value: "red".to_string(), item_desc: String::new() }),
                ]),
                TypeDefinition::new("T-map", BaseType::MapOf)
                    .with_options(vec!["+E-color".to_string(), "*Integer".to_string()]),
            ],
        };
        let simplified = simplify(&schema, &[Extension::MapOfEnum]).unwrap();
        let m = simplified.type_by_name("T-map").unwrap();
        assert_eq!(m.base_type, BaseType::Map);
        assert_eq!(m.fields[0].name(), "red");
    }

    fn multiplicity_schema() -> Schema {
        Schema {
            info: None,
            types: vec![TypeDefinition::new("T-rec", BaseType::Record)
                .with_fields(vec![full_field(1, "tags", "String", &["[0", "]0", "q"])])],
        }
    }

    #[test]
    fn simplify_is_idempotent() {
        let schema = multiplicity_schema();
        let once = simplify(&schema, ALL_EXTENSIONS).unwrap();
        let twice = simplify(&once, ALL_EXTENSIONS).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn canonicalize_is_a_fixed_point_regardless_of_option_order_or_defaults() {
        let a = TypeDefinition::new("T-int", BaseType::Integer)
            .with_options(vec!["}100".to_string(), "{0".to_string()]);
        let b = TypeDefinition::new("T-int", BaseType::Integer)
            .with_options(vec!["{0".to_string(), "}100".to_string()]);
        let schema_a = Schema { info: None, types: vec![a] };
        let schema_b = Schema { info: None, types: vec![b] };

        let canon_a = canonicalize(&schema_a);
        let canon_b = canonicalize(&schema_b);
        assert_eq!(canon_a, canon_b);
        assert_eq!(canonicalize(&canon_a), canon_a);

        // minc=1/maxc=1 are dropped as defaults; an explicit minv=0 on a
        // non-Integer type is dropped too, but kept on Integer.
        let rec = TypeDefinition::new("T-rec", BaseType::Record).with_fields(vec![full_field(
            1,
            "f",
            "String",
            &["[1", "]1"],
        )]);
        let schema = Schema { info: None, types: vec![rec] };
        let canon = canonicalize(&schema);
        assert!(canon.types[0].fields[0].as_full().unwrap().field_options.is_empty());
        assert_eq!(canon.types[0].name, "T-rec");

        let str_type = TypeDefinition::new("T-str", BaseType::String).with_options(vec!["{0".to_string()]);
        let int_type = TypeDefinition::new("T-int2", BaseType::Integer).with_options(vec!["{0".to_string()]);
        let mixed = Schema { info: None, types: vec![str_type, int_type] };
        let canon_mixed = canonicalize(&mixed);
        assert!(canon_mixed.types[0].options.is_empty());
        assert_eq!(canon_mixed.types[1].options, vec!["{0".to_string()]);
    }

    #[test]
    fn simplify_of_unfold_matches_canonicalize() {
        let schema = multiplicity_schema();
        let folded = simplify(&schema, &[Extension::Multiplicity]).unwrap();
        let unfolded = unfold_extensions(&folded, &[Extension::Multiplicity]).unwrap();
        let refolded = simplify(&unfolded, &[Extension::Multiplicity]).unwrap();
        assert_eq!(canonicalize(&refolded), canonicalize(&folded));
    }
}
