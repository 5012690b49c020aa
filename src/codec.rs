//! Validating codec: encodes API values (the shape a caller builds/consumes)
//! into wire values (the shape serialized on the wire) and back, against a
//! [`Schema`]'s type definitions. A [`Codec`] is built once per schema and
//! reused across many `encode`/`decode` calls; [`Codec::set_mode`] switches
//! between the four `verbose_rec`/`verbose_str` combinations without
//! rebuilding the type table from scratch.
//!
//! The per-base-type encode/decode functions, the `enctab` dispatch table,
//! and the symbol-table construction (`fx`/`fa` identifier selection,
//! `TypeOpts` defaulting) are ported from the reference implementation's
//! `codec/codec.py` and `codec/__init__.py`. One gap is closed relative to
//! that reference: its `enctab` has no entry for `Null` at all (a 12-of-13
//! table), which this codec fills with a pass-through identity encode/decode
//! so every `BaseType` is actually encodable.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::definitions::{self, BaseType, Config, ALL_EXTENSIONS};
use crate::schema::error::ValidationError;
use crate::schema::{FieldDefinition, GenFieldDefinition, Info, Schema, TypeDefinition};
use crate::transform;
use crate::value::Value;

pub mod format_codec;
pub mod format_validate;

/// A wire or API field/item key: either a field name or an ordinal ID,
/// mirroring the reference's runtime choice between `FieldName` and
/// `FieldID` tuple indices (`fx`/`fa`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Key {
    Id(i64),
    Name(String),
}

impl Key {
    fn to_value(&self) -> Value {
        match self {
            Key::Id(n) => Value::from_i64(*n),
            Key::Name(s) => Value::String(s.clone()),
        }
    }

    fn from_value(v: &Value) -> Option<Key> {
        match v {
            Value::Number(n) => Some(Key::Id(n.0 as i64)),
            Value::String(s) => Some(Key::Name(s.clone())),
            _ => None,
        }
    }
}

/// Which domain (`Id` or `Name`) a type's Fields/Items are keyed by on one
/// side of the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FxKind {
    Id,
    Name,
}

/// A type's options, parsed and (for size-bearing base types) defaulted
/// against [`Config`]. Holds only the options the codec actually consults;
/// `and`/`or`/`enum`/`pointer` are schema-checker or `transform` concerns.
#[derive(Debug, Clone, Default)]
struct TypeOpts {
    id: bool,
    ktype: Option<String>,
    vtype: Option<String>,
    format: Option<String>,
    pattern: Option<Regex>,
    minf: Option<f64>,
    maxf: Option<f64>,
    minv: Option<i64>,
    maxv: Option<i64>,
    unique: bool,
}

/// A field's pre-computed encode/decode inputs: multiplicity, and (for
/// `tagid`-discriminated Choice fields) the sibling tag field in both the
/// API domain (`ctag`, used when encoding/decoding a dict-shaped container)
/// and its raw ordinal ID (`tagid_raw`, used when the container is a plain
/// positional `Array`).
#[derive(Debug, Clone)]
struct FieldEntry {
    minc: i64,
    ctag: Option<Key>,
    tagid_raw: Option<i64>,
}

/// A fully-resolved type, ready to encode/decode without re-consulting the
/// rest of the schema (field lookups still recurse through `Codec::types`
/// by `FieldType` name).
#[derive(Debug, Clone)]
struct TypeEntry {
    tdef: TypeDefinition,
    base_type: BaseType,
    type_opts: TypeOpts,
    /// `Record` only: `true` encodes as a positional array, `false` as an
    /// object. `Map` always encodes as an object regardless of this flag.
    list_encoded: bool,
    fx: FxKind,
    fa: FxKind,
    d_map: BTreeMap<Key, Key>,
    e_map: BTreeMap<Key, Key>,
    fields: BTreeMap<Key, FieldEntry>,
}

/// Serializes (encodes) and deserializes (decodes) [`Value`]s against a
/// [`Schema`]'s type definitions, validating along the way.
///
/// `verbose_rec` controls whether `Record` instances wire-encode as objects
/// (`true`) or positional arrays (`false`); `verbose_str` controls whether
/// field/item identifiers wire-encode as names (`true`) or integer IDs
/// (`false`). A type with the `id` type option always uses IDs on both the
/// API and wire sides regardless of `verbose_str`.
#[derive(Debug, Clone)]
pub struct Codec {
    schema: Schema,
    config: Config,
    types: BTreeMap<String, TypeEntry>,
    verbose_rec: bool,
    verbose_str: bool,
}

impl Codec {
    /// Builds a codec for `schema`, first running it through
    /// [`transform::simplify`] with every extension enabled so the codec
    /// never has to understand `Multiplicity`/`AnonymousType`/`DerivedEnum`/
    /// `MapOfEnum` shorthand directly. Starts in minified mode
    /// (`verbose_rec = false`, `verbose_str = false`); call [`Codec::set_mode`]
    /// to change it.
    pub fn new(schema: &Schema) -> Result<Codec, ValidationError> {
        let simplified = transform::simplify(schema, ALL_EXTENSIONS)?;
        let config = resolve_config(simplified.info.as_ref());
        let mut codec = Codec { schema: simplified, config, types: BTreeMap::new(), verbose_rec: false, verbose_str: false };
        codec.set_mode(false, false);
        Ok(codec)
    }

    /// Rebuilds the internal type table for the given encoding mode. Cheap
    /// relative to `new` (no re-`simplify`), but not free — call it once
    /// per mode change, not per `encode`/`decode` call.
    pub fn set_mode(&mut self, verbose_rec: bool, verbose_str: bool) {
        self.verbose_rec = verbose_rec;
        self.verbose_str = verbose_str;

        let mut types = BTreeMap::new();
        for t in &self.schema.types {
            types.insert(t.name.clone(), build_type_entry(t, &self.config, verbose_rec, verbose_str));
        }
        for base in [BaseType::Binary, BaseType::Boolean, BaseType::Integer, BaseType::Number, BaseType::Null, BaseType::String] {
            types.entry(base.name().to_string()).or_insert_with(|| {
                build_type_entry(&TypeDefinition::new(base.name(), base), &self.config, verbose_rec, verbose_str)
            });
        }
        self.types = types;
    }

    /// Encodes an API value into its wire form under `type_name`.
    pub fn encode(&self, type_name: &str, value: &Value) -> Result<Value, ValidationError> {
        let ts = self.lookup(type_name)?;
        match ts.base_type {
            BaseType::Binary => self.encode_binary(ts, value),
            BaseType::Boolean => self.encode_boolean(ts, value),
            BaseType::Integer => self.encode_integer(ts, value),
            BaseType::Number => self.encode_number(ts, value),
            BaseType::Null => self.encode_null(ts, value),
            BaseType::String => self.encode_string(ts, value),
            BaseType::Enumerated => self.encode_enumerated(ts, value),
            BaseType::Choice => self.encode_choice(ts, value),
            BaseType::Array => self.encode_array(ts, value),
            BaseType::ArrayOf => self.encode_array_of(ts, value),
            BaseType::Map | BaseType::Record => self.encode_maprec(ts, value),
            BaseType::MapOf => self.encode_map_of(ts, value),
        }
    }

    /// Decodes a wire value into its API form under `type_name`.
    pub fn decode(&self, type_name: &str, value: &Value) -> Result<Value, ValidationError> {
        let ts = self.lookup(type_name)?;
        match ts.base_type {
            BaseType::Binary => self.decode_binary(ts, value),
            BaseType::Boolean => self.decode_boolean(ts, value),
            BaseType::Integer => self.decode_integer(ts, value),
            BaseType::Number => self.decode_number(ts, value),
            BaseType::Null => self.decode_null(ts, value),
            BaseType::String => self.decode_string(ts, value),
            BaseType::Enumerated => self.decode_enumerated(ts, value),
            BaseType::Choice => self.decode_choice(ts, value),
            BaseType::Array => self.decode_array(ts, value),
            BaseType::ArrayOf => self.decode_array_of(ts, value),
            BaseType::Map | BaseType::Record => self.decode_maprec(ts, value),
            BaseType::MapOf => self.decode_map_of(ts, value),
        }
    }

    fn lookup(&self, type_name: &str) -> Result<&TypeEntry, ValidationError> {
        self.types
            .get(type_name)
            .ok_or_else(|| ValidationError::schema_invalid(format!("datatype \"{type_name}\" is not defined")))
    }

    // ---- Binary ----

    fn encode_binary(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let bytes = val.as_bytes().map_err(|_| bad_type(ts, val, "Binary"))?;
        check_size(ts, bytes.len())?;
        self.format_encode(ts, val)
    }

    fn decode_binary(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let aval = self.format_decode(ts, val)?;
        let bytes = aval.as_bytes().map_err(|_| bad_type(ts, &aval, "Binary"))?;
        check_size(ts, bytes.len())?;
        Ok(aval)
    }

    // ---- Boolean ----

    fn encode_boolean(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        val.as_bool().map_err(|_| bad_type(ts, val, "Boolean"))?;
        Ok(val.clone())
    }

    fn decode_boolean(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        val.as_bool().map_err(|_| bad_type(ts, val, "Boolean"))?;
        Ok(val.clone())
    }

    // ---- Integer ----

    fn encode_integer(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let n = val.as_number().map_err(|_| bad_type(ts, val, "Integer"))?;
        check_integral(ts, n.0)?;
        check_range(ts, n.0)?;
        self.format_encode(ts, val)
    }

    fn decode_integer(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let aval = self.format_decode(ts, val)?;
        let n = aval.as_number().map_err(|_| bad_type(ts, &aval, "Integer"))?;
        check_integral(ts, n.0)?;
        check_range(ts, n.0)?;
        Ok(aval)
    }

    // ---- Number ----

    fn encode_number(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let n = val.as_number().map_err(|_| bad_type(ts, val, "Number"))?;
        check_frange(ts, n.0)?;
        self.format_encode(ts, val)
    }

    fn decode_number(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let aval = self.format_decode(ts, val)?;
        let n = aval.as_number().map_err(|_| bad_type(ts, &aval, "Number"))?;
        check_frange(ts, n.0)?;
        Ok(aval)
    }

    // ---- Null ----
    //
    // Not present in the reference `enctab`; added here so `Null` is
    // encodable like every other `BaseType` instead of silently failing.

    fn encode_null(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        if !val.is_null() {
            return Err(bad_type(ts, val, "Null"));
        }
        Ok(Value::Null)
    }

    fn decode_null(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        if !val.is_null() {
            return Err(bad_type(ts, val, "Null"));
        }
        Ok(Value::Null)
    }

    // ---- String ----

    fn encode_string(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let s = val.as_str().map_err(|_| bad_type(ts, val, "String"))?;
        check_size(ts, s.chars().count())?;
        check_pattern(ts, s)?;
        self.format_encode(ts, val)
    }

    fn decode_string(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let aval = self.format_decode(ts, val)?;
        let s = aval.as_str().map_err(|_| bad_type(ts, &aval, "String"))?;
        check_size(ts, s.chars().count())?;
        check_pattern(ts, s)?;
        Ok(aval)
    }

    // ---- Enumerated ----

    fn encode_enumerated(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let key = Key::from_value(val).ok_or_else(|| bad_type(ts, val, "an enumerated item"))?;
        ts.e_map
            .get(&key)
            .map(Key::to_value)
            .ok_or_else(|| ValidationError::instance_invalid(format!("{}: {val} is not a valid {}", ts.base_type.name(), ts.tdef.name)))
    }

    fn decode_enumerated(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let key = Key::from_value(val).ok_or_else(|| bad_type(ts, val, "an enumerated item"))?;
        ts.d_map
            .get(&key)
            .map(Key::to_value)
            .ok_or_else(|| ValidationError::instance_invalid(format!("{}: {val} is not a valid {}", ts.base_type.name(), ts.tdef.name)))
    }

    // ---- Choice ----

    fn encode_choice(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let obj = val.as_object().map_err(|_| bad_type(ts, val, "a single-key object"))?;
        if obj.len() != 1 {
            return Err(bad_choice(ts, val));
        }
        let (k, v) = obj.iter().next().unwrap();
        let api_key = Key::from_value(k).ok_or_else(|| bad_value(ts, val))?;
        let wire_key = ts.e_map.get(&api_key).cloned().ok_or_else(|| bad_value(ts, val))?;
        let full = self.field_def(ts, &wire_key).ok_or_else(|| bad_value(ts, val))?;
        let encoded = self.encode(&full.field_type, v)?;
        let mut out = BTreeMap::new();
        out.insert(wire_key.to_value(), encoded);
        Ok(Value::from_map(out))
    }

    fn decode_choice(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let obj = val.as_object().map_err(|_| bad_type(ts, val, "a single-key object"))?;
        if obj.len() != 1 {
            return Err(bad_choice(ts, val));
        }
        let (k, v) = obj.iter().next().unwrap();
        let wire_key = Key::from_value(k).ok_or_else(|| bad_value(ts, val))?;
        let full = self.field_def(ts, &wire_key).ok_or_else(|| bad_value(ts, val))?;
        let api_key = ts.d_map.get(&wire_key).cloned().ok_or_else(|| bad_value(ts, val))?;
        let decoded = self.decode(&full.field_type, v)?;
        let mut out = BTreeMap::new();
        out.insert(api_key.to_value(), decoded);
        Ok(Value::from_map(out))
    }

    fn field_def<'a>(&self, ts: &'a TypeEntry, wire_key: &Key) -> Option<&'a GenFieldDefinition> {
        ts.tdef.fields.iter().find_map(|f| {
            let full = f.as_full()?;
            (field_wire_key(ts, full) == *wire_key).then_some(full)
        })
    }

    // ---- Array ----

    fn encode_array(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let arr = val.as_array().map_err(|_| bad_type(ts, val, "Array"))?;
        check_count(ts, arr)?;
        let nfields = ts.tdef.fields.iter().filter(|f| f.as_full().is_some()).count();
        if arr.len() > nfields {
            return Err(extra_value(ts, vec![format!("{} extra element(s)", arr.len() - nfields)]));
        }

        let mut sval: Vec<Value> = Vec::new();
        for f in &ts.tdef.fields {
            let Some(full) = f.as_full() else { continue };
            let idx = (full.field_id - 1) as usize;
            let entry = ts.fields.get(&Key::Id(full.field_id)).expect("array field entry");
            let av = arr.get(idx).filter(|v| !v.is_null());
            match av {
                Some(v) => {
                    if let Some(tagid) = entry.tagid_raw {
                        let discrim = arr.get((tagid - 1) as usize).cloned().unwrap_or(Value::Null);
                        let mut inner = BTreeMap::new();
                        inner.insert(discrim, v.clone());
                        let encoded = self.encode(&full.field_type, &Value::from_map(inner))?;
                        let sv = encoded.as_object().ok().and_then(|o| o.values().next().cloned()).unwrap_or(Value::Null);
                        sval.push(sv);
                    } else {
                        sval.push(self.encode(&full.field_type, v)?);
                    }
                }
                None => {
                    sval.push(Value::Null);
                    if entry.minc > 0 {
                        return Err(missing_field(ts, val, &full.field_name));
                    }
                }
            }
        }
        while matches!(sval.last(), Some(Value::Null)) {
            sval.pop();
        }
        self.format_encode(ts, &Value::from_array(sval))
    }

    fn decode_array(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let aval = self.format_decode(ts, val)?;
        let arr = aval.as_array().map_err(|_| bad_type(ts, &aval, "Array"))?;
        check_count(ts, arr)?;
        let nfields = ts.tdef.fields.iter().filter(|f| f.as_full().is_some()).count();
        if arr.len() > nfields {
            return Err(extra_value(ts, vec![format!("{} extra element(s)", arr.len() - nfields)]));
        }

        let mut out: Vec<Value> = Vec::new();
        for f in &ts.tdef.fields {
            let Some(full) = f.as_full() else { continue };
            let idx = (full.field_id - 1) as usize;
            let entry = ts.fields.get(&Key::Id(full.field_id)).expect("array field entry");
            let sv = arr.get(idx).filter(|v| !v.is_null());
            match sv {
                Some(v) => {
                    if let Some(tagid) = entry.tagid_raw {
                        let discrim = arr.get((tagid - 1) as usize).cloned().unwrap_or(Value::Null);
                        let mut inner = BTreeMap::new();
                        inner.insert(discrim, v.clone());
                        let decoded = self.decode(&full.field_type, &Value::from_map(inner))?;
                        let av = decoded.as_object().ok().and_then(|o| o.values().next().cloned()).unwrap_or(Value::Null);
                        out.push(av);
                    } else {
                        out.push(self.decode(&full.field_type, v)?);
                    }
                }
                None => {
                    out.push(Value::Null);
                    if entry.minc > 0 {
                        return Err(missing_field(ts, &aval, &full.field_name));
                    }
                }
            }
        }
        while matches!(out.last(), Some(Value::Null)) {
            out.pop();
        }
        Ok(Value::from_array(out))
    }

    // ---- ArrayOf ----

    fn encode_array_of(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let arr = val.as_array().map_err(|_| bad_type(ts, val, "ArrayOf"))?;
        check_size(ts, arr.len())?;
        if ts.type_opts.unique {
            check_unique(ts, arr)?;
        }
        let vtype = vtype_of(ts)?;
        let out = arr.iter().map(|v| self.encode(vtype, v)).collect::<Result<Vec<_>, _>>()?;
        Ok(Value::from_array(out))
    }

    fn decode_array_of(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let arr = val.as_array().map_err(|_| bad_type(ts, val, "ArrayOf"))?;
        check_size(ts, arr.len())?;
        if ts.type_opts.unique {
            check_unique(ts, arr)?;
        }
        let vtype = vtype_of(ts)?;
        let out = arr.iter().map(|v| self.decode(vtype, v)).collect::<Result<Vec<_>, _>>()?;
        Ok(Value::from_array(out))
    }

    // ---- Map / Record ----

    fn encode_maprec(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let obj = val.as_object().map_err(|_| bad_type(ts, val, "an object"))?;
        check_size(ts, obj.len())?;

        let mut list_vals: Vec<Value> = Vec::new();
        let mut map_vals: BTreeMap<Value, Value> = BTreeMap::new();
        let mut known_api_keys: Vec<Value> = Vec::new();

        for f in &ts.tdef.fields {
            let Some(full) = f.as_full() else { continue };
            let api_key = field_api_key(ts, full);
            known_api_keys.push(api_key.clone());
            let wire_key = field_wire_key(ts, full);
            let entry = ts.fields.get(&wire_key).expect("field entry exists");

            let present = obj.get(&api_key).cloned();
            let sv = if let Some(ctag) = &entry.ctag {
                match (obj.get(&ctag.to_value()).cloned(), present) {
                    (Some(cv), Some(pv)) if !cv.is_null() => {
                        let mut inner = BTreeMap::new();
                        inner.insert(cv, pv);
                        let encoded = self.encode(&full.field_type, &Value::from_map(inner))?;
                        encoded.as_object().ok().and_then(|o| o.values().next().cloned())
                    }
                    _ => None,
                }
            } else {
                match present {
                    Some(pv) => Some(self.encode(&full.field_type, &pv)?),
                    None => None,
                }
            };

            if sv.is_none() && entry.minc > 0 {
                return Err(missing_field(ts, val, &full.field_name));
            }

            if ts.list_encoded {
                list_vals.push(sv.unwrap_or(Value::Null));
            } else if let Some(sv) = sv {
                map_vals.insert(wire_key.to_value(), sv);
            }
        }

        let extras: Vec<String> = obj.keys().filter(|k| !known_api_keys.contains(k)).map(|k| k.to_string()).collect();
        if !extras.is_empty() {
            return Err(extra_value(ts, extras));
        }

        if ts.list_encoded {
            while matches!(list_vals.last(), Some(Value::Null)) {
                list_vals.pop();
            }
            self.format_encode(ts, &Value::from_array(list_vals))
        } else {
            self.format_encode(ts, &Value::from_map(map_vals))
        }
    }

    fn decode_maprec(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let sval = self.format_decode(ts, val)?;
        let mut aval: BTreeMap<Value, Value> = BTreeMap::new();

        if ts.list_encoded {
            let arr = sval.as_array().map_err(|_| bad_type(ts, &sval, "an array"))?;
            check_size(ts, arr.len())?;
            let nfields = ts.tdef.fields.iter().filter(|f| f.as_full().is_some()).count();
            if arr.len() > nfields {
                return Err(extra_value(ts, vec![format!("{} extra element(s)", arr.len() - nfields)]));
            }
            for f in &ts.tdef.fields {
                let Some(full) = f.as_full() else { continue };
                let idx = (full.field_id - 1) as usize;
                let sv = arr.get(idx).filter(|v| !v.is_null()).cloned();
                self.decode_maprec_field(ts, full, sv, arr, None, &mut aval, &sval)?;
            }
        } else {
            let obj = sval.as_object().map_err(|_| bad_type(ts, &sval, "an object"))?;
            check_size(ts, obj.len())?;
            let mut known_wire_keys = Vec::new();
            for f in &ts.tdef.fields {
                let Some(full) = f.as_full() else { continue };
                let wire_key = field_wire_key(ts, full);
                known_wire_keys.push(wire_key.to_value());
                let sv = obj.get(&wire_key.to_value()).cloned();
                self.decode_maprec_field(ts, full, sv, &[], Some(obj), &mut aval, &sval)?;
            }
            let extras: Vec<String> = obj.keys().filter(|k| !known_wire_keys.contains(k)).map(|k| k.to_string()).collect();
            if !extras.is_empty() {
                return Err(extra_value(ts, extras));
            }
        }

        Ok(Value::from_map(aval))
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_maprec_field(
        &self,
        ts: &TypeEntry,
        full: &GenFieldDefinition,
        sv: Option<Value>,
        arr: &[Value],
        obj: Option<&BTreeMap<Value, Value>>,
        aval: &mut BTreeMap<Value, Value>,
        whole: &Value,
    ) -> Result<(), ValidationError> {
        let wire_key = field_wire_key(ts, full);
        let entry = ts.fields.get(&wire_key).expect("field entry exists");
        let api_key = field_api_key(ts, full);

        match sv {
            Some(sv) => {
                let decoded = if let Some(tagid) = entry.tagid_raw {
                    let sibling = ts.tdef.fields.iter().find_map(|f| {
                        let fu = f.as_full()?;
                        (fu.field_id == tagid).then_some(fu)
                    });
                    let discrim = match sibling {
                        Some(sib) => {
                            let sib_wire = field_wire_key(ts, sib);
                            if let Some(obj) = obj {
                                obj.get(&sib_wire.to_value()).cloned().unwrap_or(Value::Null)
                            } else {
                                arr.get((sib.field_id - 1) as usize).cloned().unwrap_or(Value::Null)
                            }
                        }
                        None => Value::Null,
                    };
                    let mut inner = BTreeMap::new();
                    inner.insert(discrim, sv);
                    let decoded = self.decode(&full.field_type, &Value::from_map(inner))?;
                    decoded.as_object().ok().and_then(|o| o.values().next().cloned()).unwrap_or(Value::Null)
                } else {
                    self.decode(&full.field_type, &sv)?
                };
                aval.insert(api_key, decoded);
            }
            None => {
                if entry.minc > 0 {
                    return Err(missing_field(ts, whole, &full.field_name));
                }
            }
        }
        Ok(())
    }

    // ---- MapOf ----

    fn encode_map_of(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let obj = val.as_object().map_err(|_| bad_type(ts, val, "MapOf"))?;
        check_size(ts, obj.len())?;
        let ktype = ktype_of(ts)?;
        let vtype = vtype_of(ts)?;
        let mut out = BTreeMap::new();
        for (k, v) in obj.iter() {
            out.insert(self.encode(ktype, k)?, self.encode(vtype, v)?);
        }
        Ok(Value::from_map(out))
    }

    /// Decodes values only, keeping keys unchanged — matches the reference
    /// `_decode_map_of`, which never calls `codec.decode` on a MapOf key.
    fn decode_map_of(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let obj = val.as_object().map_err(|_| bad_type(ts, val, "MapOf"))?;
        check_size(ts, obj.len())?;
        let vtype = vtype_of(ts)?;
        let mut out = BTreeMap::new();
        for (k, v) in obj.iter() {
            out.insert(k.clone(), self.decode(vtype, v)?);
        }
        Ok(Value::from_map(out))
    }

    // ---- format plumbing ----

    fn format_encode(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let fmt = ts.type_opts.format.as_deref().unwrap_or("");
        format_validate::validate(fmt, ts.base_type, val).map_err(|e| ValidationError::instance_invalid(format!("{}: {e}", ts.tdef.name)))?;
        let resolved = resolved_format(ts.base_type, fmt);
        Ok(format_codec::encode(resolved, val)?.unwrap_or_else(|| val.clone()))
    }

    fn format_decode(&self, ts: &TypeEntry, val: &Value) -> Result<Value, ValidationError> {
        let fmt = ts.type_opts.format.as_deref().unwrap_or("");
        let resolved = resolved_format(ts.base_type, fmt);
        let aval = format_codec::decode(resolved, val)?.unwrap_or_else(|| val.clone());
        format_validate::validate(fmt, ts.base_type, &aval).map_err(|e| ValidationError::instance_invalid(format!("{}: {e}", ts.tdef.name)))?;
        Ok(aval)
    }
}

/// Default `format` keyword applied when a type has none: `Binary` defaults
/// to base64url (`b`), `Number` to a no-op `f64`. Every other base type is
/// left as-is (no special wire form without an explicit `format` option).
fn resolved_format(base_type: BaseType, format: &str) -> &str {
    if !format.is_empty() {
        return format;
    }
    match base_type {
        BaseType::Binary => "b",
        BaseType::Number => "f64",
        _ => format,
    }
}

fn vtype_of(ts: &TypeEntry) -> Result<&str, ValidationError> {
    ts.type_opts
        .vtype
        .as_deref()
        .ok_or_else(|| ValidationError::schema_invalid(format!("{}: missing vtype option", ts.tdef.name)))
}

fn ktype_of(ts: &TypeEntry) -> Result<&str, ValidationError> {
    ts.type_opts
        .ktype
        .as_deref()
        .ok_or_else(|| ValidationError::schema_invalid(format!("{}: missing ktype option", ts.tdef.name)))
}

fn field_api_key(ts: &TypeEntry, full: &GenFieldDefinition) -> Value {
    match ts.fa {
        FxKind::Id => Value::from_i64(full.field_id),
        FxKind::Name => Value::String(full.field_name.clone()),
    }
}

fn field_wire_key(ts: &TypeEntry, full: &GenFieldDefinition) -> Key {
    match ts.fx {
        FxKind::Id => Key::Id(full.field_id),
        FxKind::Name => Key::Name(full.field_name.clone()),
    }
}

fn bad_type(ts: &TypeEntry, val: &Value, expected: &str) -> ValidationError {
    ValidationError::instance_invalid(format!("{}({}): {val} is not {expected}", ts.tdef.name, ts.base_type.name()))
}

fn bad_choice(ts: &TypeEntry, val: &Value) -> ValidationError {
    ValidationError::instance_invalid(format!("{}: choice must have exactly one value: {val}", ts.tdef.name))
}

fn bad_value(ts: &TypeEntry, val: &Value) -> ValidationError {
    ValidationError::instance_invalid(format!("{}({}): bad value: {val}", ts.tdef.name, ts.base_type.name()))
}

fn missing_field(ts: &TypeEntry, val: &Value, field_name: &str) -> ValidationError {
    ValidationError::instance_invalid(format!("{}({}): missing required field \"{field_name}\": {val}", ts.tdef.name, ts.base_type.name()))
}

fn extra_value(ts: &TypeEntry, extra: Vec<String>) -> ValidationError {
    ValidationError::instance_invalid(format!("{}({}): unexpected value(s): {}", ts.tdef.name, ts.base_type.name(), extra.join(", ")))
}

fn check_integral(ts: &TypeEntry, n: f64) -> Result<(), ValidationError> {
    if n.fract() != 0.0 {
        return Err(ValidationError::instance_invalid(format!("{}: {n} is not an integer", ts.tdef.name)));
    }
    Ok(())
}

fn check_range(ts: &TypeEntry, n: f64) -> Result<(), ValidationError> {
    if let Some(minv) = ts.type_opts.minv {
        if n < minv as f64 {
            return Err(ValidationError::instance_invalid(format!("{}: {n} < minimum {minv}", ts.tdef.name)));
        }
    }
    if let Some(maxv) = ts.type_opts.maxv {
        if n > maxv as f64 {
            return Err(ValidationError::instance_invalid(format!("{}: {n} > maximum {maxv}", ts.tdef.name)));
        }
    }
    Ok(())
}

fn check_frange(ts: &TypeEntry, n: f64) -> Result<(), ValidationError> {
    if let Some(minf) = ts.type_opts.minf {
        if n < minf {
            return Err(ValidationError::instance_invalid(format!("{}: {n} < minimum {minf}", ts.tdef.name)));
        }
    }
    if let Some(maxf) = ts.type_opts.maxf {
        if n > maxf {
            return Err(ValidationError::instance_invalid(format!("{}: {n} > maximum {maxf}", ts.tdef.name)));
        }
    }
    Ok(())
}

fn check_size(ts: &TypeEntry, len: usize) -> Result<(), ValidationError> {
    let len = len as i64;
    if let Some(minv) = ts.type_opts.minv {
        if len < minv {
            return Err(ValidationError::instance_invalid(format!("{}: length {len} < minimum {minv}", ts.tdef.name)));
        }
    }
    if let Some(maxv) = ts.type_opts.maxv {
        if len > maxv {
            return Err(ValidationError::instance_invalid(format!("{}: length {len} > maximum {maxv}", ts.tdef.name)));
        }
    }
    Ok(())
}

fn check_count(ts: &TypeEntry, vals: &[Value]) -> Result<(), ValidationError> {
    let cnt = vals.iter().filter(|v| !v.is_null()).count();
    check_size(ts, cnt)
}

fn check_pattern(ts: &TypeEntry, s: &str) -> Result<(), ValidationError> {
    if let Some(re) = &ts.type_opts.pattern {
        if !re.is_match(s) {
            return Err(ValidationError::instance_invalid(format!("{}: string \"{s}\" does not match {}", ts.tdef.name, re.as_str())));
        }
    }
    Ok(())
}

fn check_unique(ts: &TypeEntry, vals: &[Value]) -> Result<(), ValidationError> {
    let set: BTreeSet<&Value> = vals.iter().collect();
    if set.len() != vals.len() {
        return Err(bad_value(ts, &Value::from_array(vals.to_vec())));
    }
    Ok(())
}

/// Applies `info.config` overrides from a schema's `$`-prefixed
/// configuration keys on top of [`Config::default`].
fn resolve_config(info: Option<&Info>) -> Config {
    let mut config = Config::default();
    let Some(info) = info else { return config };
    for (k, v) in &info.config {
        match k.as_str() {
            "$MaxBinary" => {
                if let Some(n) = v.as_i64() {
                    config.max_binary = n;
                }
            }
            "$MaxString" => {
                if let Some(n) = v.as_i64() {
                    config.max_string = n;
                }
            }
            "$MaxElements" => {
                if let Some(n) = v.as_i64() {
                    config.max_elements = n;
                }
            }
            "$Sys" => {
                if let Some(s) = v.as_str() {
                    config.sys = s.to_string();
                }
            }
            "$TypeName" => {
                if let Some(s) = v.as_str() {
                    config.type_name_pattern = s.to_string();
                }
            }
            "$FieldName" => {
                if let Some(s) = v.as_str() {
                    config.field_name_pattern = s.to_string();
                }
            }
            "$NSID" => {
                if let Some(s) = v.as_str() {
                    config.nsid_pattern = s.to_string();
                }
            }
            _ => {}
        }
    }
    config
}

/// A type option value referencing a config key (`"{$MaxString"`, tag `{`
/// followed by `$MaxString`) is substituted with that config value's text
/// before parsing — matches the reference's `config_opts`.
fn resolve_option_config_ref(opt: &str, config: &Config) -> String {
    let mut chars = opt.chars();
    let Some(tag) = chars.next() else { return opt.to_string() };
    let rest = chars.as_str();
    if !rest.starts_with('$') {
        return opt.to_string();
    }
    let resolved = match rest {
        "$MaxBinary" => config.max_binary.to_string(),
        "$MaxString" => config.max_string.to_string(),
        "$MaxElements" => config.max_elements.to_string(),
        "$Sys" => config.sys.clone(),
        "$TypeName" => config.type_name_pattern.clone(),
        "$FieldName" => config.field_name_pattern.clone(),
        "$NSID" => config.nsid_pattern.clone(),
        other => other.to_string(),
    };
    format!("{tag}{resolved}")
}

fn parse_type_opts(raw: &[String], config: &Config) -> TypeOpts {
    let mut to = TypeOpts::default();
    for opt in raw {
        let resolved = resolve_option_config_ref(opt, config);
        let Some((name, value)) = definitions::parse_option(&resolved) else { continue };
        match name {
            "id" => to.id = true,
            "ktype" => to.ktype = value.as_text().map(str::to_string),
            "vtype" => to.vtype = value.as_text().map(str::to_string),
            "format" => to.format = value.as_text().map(str::to_string),
            "pattern" => to.pattern = value.as_text().and_then(|p| Regex::new(p).ok()),
            "minf" => to.minf = value.as_float(),
            "maxf" => to.maxf = value.as_float(),
            "minv" => to.minv = value.as_int(),
            "maxv" => to.maxv = value.as_int(),
            "unique" => to.unique = true,
            _ => {}
        }
    }
    to
}

fn field_opt_int(raw: &[String], tag_name: &str) -> Option<i64> {
    raw.iter().find_map(|o| definitions::parse_option(o).and_then(|(name, v)| if name == tag_name { v.as_int() } else { None }))
}

fn build_field_entry(full: &GenFieldDefinition, fa: FxKind, fnames: &BTreeMap<i64, String>) -> FieldEntry {
    let minc = field_opt_int(&full.field_options, "minc").unwrap_or(1);
    let tagid_raw = field_opt_int(&full.field_options, "tagid");
    let ctag = tagid_raw.map(|tid| match fa {
        FxKind::Id => Key::Id(tid),
        FxKind::Name => Key::Name(fnames.get(&tid).cloned().unwrap_or_default()),
    });
    FieldEntry { minc, ctag, tagid_raw }
}

fn build_type_entry(t: &TypeDefinition, config: &Config, verbose_rec: bool, verbose_str: bool) -> TypeEntry {
    let mut type_opts = parse_type_opts(&t.options, config);

    if matches!(
        t.base_type,
        BaseType::Binary | BaseType::String | BaseType::Array | BaseType::ArrayOf | BaseType::Map | BaseType::MapOf | BaseType::Record
    ) {
        let minv = type_opts.minv.unwrap_or(0);
        let mut maxv = type_opts.maxv.unwrap_or(0);
        if maxv == 0 {
            maxv = match t.base_type {
                BaseType::Binary => config.max_binary,
                BaseType::String => config.max_string,
                _ => config.max_elements,
            };
        }
        type_opts.minv = Some(minv);
        type_opts.maxv = Some(maxv);
    }

    let list_encoded = t.base_type == BaseType::Record && !verbose_rec;

    let (fx, fa) = match t.base_type {
        BaseType::Enumerated | BaseType::Array | BaseType::Choice | BaseType::Map | BaseType::Record => {
            let fa = if type_opts.id { FxKind::Id } else { FxKind::Name };
            let fx = if !type_opts.id && t.base_type != BaseType::Array && verbose_str { FxKind::Name } else { FxKind::Id };
            (fx, fa)
        }
        _ => (FxKind::Id, FxKind::Id),
    };

    let mut d_map = BTreeMap::new();
    let mut e_map = BTreeMap::new();
    let mut fields = BTreeMap::new();

    match t.base_type {
        BaseType::Enumerated => {
            for f in &t.fields {
                if let FieldDefinition::Enum(e) = f {
                    let wire = if fx == FxKind::Id { Key::Id(e.item_id) } else { Key::Name(e.item_value.clone()) };
                    let api = if fa == FxKind::Id { Key::Id(e.item_id) } else { Key::Name(e.item_value.clone()) };
                    d_map.insert(wire.clone(), api.clone());
                    e_map.insert(api, wire);
                }
            }
        }
        BaseType::Array | BaseType::Choice | BaseType::Map | BaseType::Record => {
            let fnames: BTreeMap<i64, String> =
                t.fields.iter().filter_map(|f| f.as_full().map(|full| (full.field_id, full.field_name.clone()))).collect();
            for f in &t.fields {
                if let FieldDefinition::Full(full) = f {
                    let wire = if fx == FxKind::Id { Key::Id(full.field_id) } else { Key::Name(full.field_name.clone()) };
                    let api = if fa == FxKind::Id { Key::Id(full.field_id) } else { Key::Name(full.field_name.clone()) };
                    d_map.insert(wire.clone(), api.clone());
                    e_map.insert(api.clone(), wire.clone());
                    fields.insert(wire, build_field_entry(full, fa, &fnames));
                }
            }
        }
        _ => {}
    }

    TypeEntry { tdef: t.clone(), base_type: t.base_type, type_opts, list_encoded, fx, fa, d_map, e_map, fields }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumFieldDefinition, GenFieldDefinition};

    fn full_field(id: i64, name: &str, ty: &str, opts: &[&str]) -> FieldDefinition {
        FieldDefinition::Full(GenFieldDefinition {
            field_id: id,
            field_name: name.to_string(),
            field_type: ty.to_string(),
            field_options: opts.iter().map(|s| s.to_string()).collect(),
            field_desc: String::new(),
        })
    }

    fn schema_of(types: Vec<TypeDefinition>) -> Schema {
        Schema { info: None, types }
    }

    #[test]
    fn encodes_integer_within_range() {
        let t = TypeDefinition::new("T-pct", BaseType::Integer).with_options(vec!["{0".to_string(), "}100".to_string()]);
        let codec = Codec::new(&schema_of(vec![t])).unwrap();
        assert_eq!(codec.encode("T-pct", &Value::from_i64(50)).unwrap(), Value::from_i64(50));
        assert!(codec.encode("T-pct", &Value::from_i64(101)).is_err());
    }

    #[test]
    fn encode_integer_rejects_non_integral_reals() {
        let t = TypeDefinition::new("T-int", BaseType::Integer);
        let codec = Codec::new(&schema_of(vec![t])).unwrap();
        assert_eq!(codec.encode("T-int", &Value::from_i64(35)).unwrap(), Value::from_i64(35));
        assert!(codec.encode("T-int", &Value::from_f64(35.4)).is_err());
        assert!(codec.decode("T-int", &Value::from_f64(35.4)).is_err());
    }

    #[test]
    fn record_round_trips_as_object_in_verbose_mode() {
        let t = TypeDefinition::new("T-point", BaseType::Record)
            .with_fields(vec![full_field(1, "x", "Integer", &[]), full_field(2, "y", "Integer", &["[0"])]);
        let mut codec = Codec::new(&schema_of(vec![t])).unwrap();
        codec.set_mode(true, true);

        let mut obj = BTreeMap::new();
        obj.insert(Value::String("x".to_string()), Value::from_i64(3));
        obj.insert(Value::String("y".to_string()), Value::from_i64(4));
        let api = Value::from_map(obj);

        let wire = codec.encode("T-point", &api).unwrap();
        assert!(wire.as_object().is_ok());
        let back = codec.decode("T-point", &wire).unwrap();
        assert_eq!(back, api);
    }

    #[test]
    fn record_encodes_as_array_with_trailing_optional_stripped() {
        let t = TypeDefinition::new("T-point", BaseType::Record)
            .with_fields(vec![full_field(1, "x", "Integer", &[]), full_field(2, "y", "Integer", &["[0"])]);
        let codec = Codec::new(&schema_of(vec![t])).unwrap(); // default minified: verbose_rec=false

        let mut obj = BTreeMap::new();
        obj.insert(Value::String("x".to_string()), Value::from_i64(3));
        let api = Value::from_map(obj);

        let wire = codec.encode("T-point", &api).unwrap();
        assert_eq!(wire, Value::from_array(vec![Value::from_i64(3)]));
    }

    #[test]
    fn choice_encodes_single_key_and_decodes_back() {
        let choice = TypeDefinition::new("T-choice", BaseType::Choice)
            .with_fields(vec![full_field(1, "a", "Integer", &[]), full_field(2, "b", "String", &[])]);
        let mut codec = Codec::new(&schema_of(vec![choice])).unwrap();
        codec.set_mode(false, true); // minified record, verbose identifiers

        let mut obj = BTreeMap::new();
        obj.insert(Value::String("b".to_string()), Value::String("hi".to_string()));
        let api = Value::from_map(obj);

        let wire = codec.encode("T-choice", &api).unwrap();
        let back = codec.decode("T-choice", &wire).unwrap();
        assert_eq!(back, api);
    }

    #[test]
    fn array_of_enforces_size_bounds() {
        let t = TypeDefinition::new("T-tags", BaseType::ArrayOf).with_options(vec!["*String".to_string(), "}2".to_string()]);
        let codec = Codec::new(&schema_of(vec![t])).unwrap();
        let ok = Value::from_array(vec![Value::String("a".to_string()), Value::String("b".to_string())]);
        assert!(codec.encode("T-tags", &ok).is_ok());
        let too_many = Value::from_array(vec![
            Value::String("a".to_string()),
            Value::String("b".to_string()),
            Value::String("c".to_string()),
        ]);
        assert!(codec.encode("T-tags", &too_many).is_err());
    }

    #[test]
    fn binary_defaults_to_base64url_on_the_wire() {
        let t = TypeDefinition::new("T-blob", BaseType::Binary);
        let codec = Codec::new(&schema_of(vec![t])).unwrap();
        let api = Value::from_bytes(vec![1, 2, 3]);
        let wire = codec.encode("T-blob", &api).unwrap();
        assert!(matches!(wire, Value::String(_)));
        let back = codec.decode("T-blob", &wire).unwrap();
        assert_eq!(back, api);
    }

    #[test]
    fn binary_format_ipv4_addr_round_trips_through_the_codec() {
        let t = TypeDefinition::new("T-addr", BaseType::Binary).with_options(vec!["/ipv4-addr".to_string()]);
        let codec = Codec::new(&schema_of(vec![t])).unwrap();
        let api = Value::from_bytes(vec![10, 0, 0, 1]);
        let wire = codec.encode("T-addr", &api).unwrap();
        assert_eq!(wire, Value::String("10.0.0.1".to_string()));
        let back = codec.decode("T-addr", &wire).unwrap();
        assert_eq!(back, api);
    }

    #[test]
    fn enumerated_minified_encodes_to_item_id() {
        let e = TypeDefinition::new("T-color", BaseType::Enumerated).with_fields(vec![
            FieldDefinition::Enum(EnumFieldDefinition { item_id: 1, item_value: "red".to_string(), item_desc: String::new() }),
            FieldDefinition::Enum(EnumFieldDefinition { item_id: 2, item_value: "blue".to_string(), item_desc: String::new() }),
        ]);
        let codec = Codec::new(&schema_of(vec![e])).unwrap();
        let wire = codec.encode("T-color", &Value::String("blue".to_string())).unwrap();
        assert_eq!(wire, Value::from_i64(2));
        let back = codec.decode("T-color", &wire).unwrap();
        assert_eq!(back, Value::String("blue".to_string()));
    }

    #[test]
    fn null_round_trips() {
        let t = TypeDefinition::new("T-nil", BaseType::Null);
        let codec = Codec::new(&schema_of(vec![t])).unwrap();
        assert_eq!(codec.encode("T-nil", &Value::Null).unwrap(), Value::Null);
        assert!(codec.encode("T-nil", &Value::from_i64(1)).is_err());
    }

    #[test]
    fn tagid_choice_field_discriminates_through_a_sibling() {
        let choice = TypeDefinition::new("T-variant", BaseType::Choice)
            .with_fields(vec![full_field(1, "num", "Integer", &[]), full_field(2, "str", "String", &[])]);
        let rec = TypeDefinition::new("T-wrapper", BaseType::Record).with_fields(vec![
            full_field(1, "kind", "String", &[]),
            full_field(2, "value", "T-variant", &["&1"]),
        ]);
        let mut codec = Codec::new(&schema_of(vec![choice, rec])).unwrap();
        codec.set_mode(true, true);

        let mut obj = BTreeMap::new();
        obj.insert(Value::String("kind".to_string()), Value::String("str".to_string()));
        obj.insert(Value::String("value".to_string()), Value::String("hello".to_string()));
        let api = Value::from_map(obj);

        let wire = codec.encode("T-wrapper", &api).unwrap();
        let back = codec.decode("T-wrapper", &wire).unwrap();
        assert_eq!(back, api);
    }
}
