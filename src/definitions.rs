//! The closed catalog of JADN base types, option tags, and configuration
//! defaults. Pure data; no state, no I/O.

use std::collections::BTreeMap;

/// The twelve fixed kinds every user-defined type reduces to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BaseType {
    Binary,
    Boolean,
    Integer,
    Number,
    Null,
    String,
    Enumerated,
    Choice,
    Array,
    ArrayOf,
    Map,
    MapOf,
    Record,
}

pub const CORE_TYPES: &[BaseType] = &[
    BaseType::Binary,
    BaseType::Boolean,
    BaseType::Integer,
    BaseType::Number,
    BaseType::Null,
    BaseType::String,
    BaseType::Enumerated,
    BaseType::Choice,
    BaseType::Array,
    BaseType::ArrayOf,
    BaseType::Map,
    BaseType::MapOf,
    BaseType::Record,
];

impl BaseType {
    pub fn name(self) -> &'static str {
        match self {
            BaseType::Binary => "Binary",
            BaseType::Boolean => "Boolean",
            BaseType::Integer => "Integer",
            BaseType::Number => "Number",
            BaseType::Null => "Null",
            BaseType::String => "String",
            BaseType::Enumerated => "Enumerated",
            BaseType::Choice => "Choice",
            BaseType::Array => "Array",
            BaseType::ArrayOf => "ArrayOf",
            BaseType::Map => "Map",
            BaseType::MapOf => "MapOf",
            BaseType::Record => "Record",
        }
    }

    pub fn from_name(name: &str) -> Option<BaseType> {
        CORE_TYPES.iter().copied().find(|b| b.name() == name)
    }

    /// Number of tuple elements in a field definition for this base type, or
    /// 0 if the base type has no `Fields` list at all. `Enumerated` fields
    /// are 3-tuples `(ItemID, ItemValue, ItemDesc)`; the other container
    /// types with fields use 5-tuple `GenFieldDefinition`s.
    pub fn field_length(self) -> usize {
        match self {
            BaseType::Enumerated => 3,
            BaseType::Choice | BaseType::Array | BaseType::Map | BaseType::Record => 5,
            _ => 0,
        }
    }

    /// True if this type lists full (5-tuple) fields in its definition.
    pub fn has_fields(self) -> bool {
        self.field_length() == 5
    }
}

/// A JADN type or field option, after splitting the tag character from its
/// value and parsing the value according to the tag's declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Flag,
    Text(String),
    Int(i64),
    Float(f64),
}

impl OptionValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            OptionValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            OptionValue::Float(n) => Some(*n),
            _ => None,
        }
    }
}

/// How an option's value text is parsed once its tag is identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Flag,
    Text,
    Int,
    Float,
}

/// One row of the option tag table: tag character, canonical name, value
/// kind, and canonical sort order (used by `canonicalize`).
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub tag: char,
    pub name: &'static str,
    pub kind: OptionKind,
    pub order: u32,
}

/// Type option tags, in the exact order and with the exact codepoints
/// mandated by the reference implementation's `TYPE_OPTIONS` table.
pub const TYPE_OPTIONS: &[OptionSpec] = &[
    OptionSpec { tag: '=', name: "id", kind: OptionKind::Flag, order: 1 },
    OptionSpec { tag: '+', name: "ktype", kind: OptionKind::Text, order: 2 },
    OptionSpec { tag: '*', name: "vtype", kind: OptionKind::Text, order: 3 },
    OptionSpec { tag: '#', name: "enum", kind: OptionKind::Text, order: 4 },
    OptionSpec { tag: '>', name: "pointer", kind: OptionKind::Text, order: 5 },
    OptionSpec { tag: '/', name: "format", kind: OptionKind::Text, order: 6 },
    OptionSpec { tag: '%', name: "pattern", kind: OptionKind::Text, order: 7 },
    OptionSpec { tag: 'y', name: "minf", kind: OptionKind::Float, order: 8 },
    OptionSpec { tag: 'z', name: "maxf", kind: OptionKind::Float, order: 9 },
    OptionSpec { tag: '{', name: "minv", kind: OptionKind::Int, order: 10 },
    OptionSpec { tag: '}', name: "maxv", kind: OptionKind::Int, order: 11 },
    OptionSpec { tag: 'q', name: "unique", kind: OptionKind::Flag, order: 12 },
    OptionSpec { tag: '\u{2229}', name: "and", kind: OptionKind::Text, order: 13 },
    OptionSpec { tag: '\u{222a}', name: "or", kind: OptionKind::Text, order: 14 },
];

/// Field option tags.
pub const FIELD_OPTIONS: &[OptionSpec] = &[
    OptionSpec { tag: '[', name: "minc", kind: OptionKind::Int, order: 15 },
    OptionSpec { tag: ']', name: "maxc", kind: OptionKind::Int, order: 16 },
    OptionSpec { tag: '&', name: "tagid", kind: OptionKind::Int, order: 17 },
    OptionSpec { tag: '<', name: "dir", kind: OptionKind::Flag, order: 18 },
    OptionSpec { tag: 'K', name: "key", kind: OptionKind::Flag, order: 19 },
    OptionSpec { tag: 'L', name: "link", kind: OptionKind::Flag, order: 20 },
    OptionSpec { tag: '!', name: "default", kind: OptionKind::Text, order: 21 },
];

pub fn type_option_by_tag(tag: char) -> Option<&'static OptionSpec> {
    TYPE_OPTIONS.iter().find(|o| o.tag == tag)
}

pub fn field_option_by_tag(tag: char) -> Option<&'static OptionSpec> {
    FIELD_OPTIONS.iter().find(|o| o.tag == tag)
}

pub fn option_by_tag(tag: char) -> Option<&'static OptionSpec> {
    type_option_by_tag(tag).or_else(|| field_option_by_tag(tag))
}

/// Splits a raw option string (e.g. `"*String"`, `"[0"`, `"q"`) into its tag
/// character and value text. The value is empty for flag options serialized
/// without one, and callers parse it further according to the tag's `kind`.
pub fn split_option(opt: &str) -> Option<(char, &str)> {
    let mut chars = opt.chars();
    let tag = chars.next()?;
    Some((tag, chars.as_str()))
}

/// Parses a raw option string into its resolved `(name, OptionValue)` pair,
/// if the tag is recognized.
pub fn parse_option(opt: &str) -> Option<(&'static str, OptionValue)> {
    let (tag, value) = split_option(opt)?;
    let spec = option_by_tag(tag)?;
    let parsed = match spec.kind {
        OptionKind::Flag => OptionValue::Flag,
        OptionKind::Text => OptionValue::Text(value.to_string()),
        OptionKind::Int => OptionValue::Int(value.parse().ok()?),
        OptionKind::Float => OptionValue::Float(value.parse().ok()?),
    };
    Some((spec.name, parsed))
}

pub fn type_option_by_name(name: &str) -> Option<&'static OptionSpec> {
    TYPE_OPTIONS.iter().find(|o| o.name == name)
}

pub fn field_option_by_name(name: &str) -> Option<&'static OptionSpec> {
    FIELD_OPTIONS.iter().find(|o| o.name == name)
}

lazy_static::lazy_static! {
    /// Required type options per base type.
    pub static ref REQUIRED_TYPE_OPTIONS: BTreeMap<BaseType, Vec<&'static str>> = {
        let mut m = BTreeMap::new();
        m.insert(BaseType::Binary, vec![]);
        m.insert(BaseType::Boolean, vec![]);
        m.insert(BaseType::Integer, vec![]);
        m.insert(BaseType::Number, vec![]);
        m.insert(BaseType::Null, vec![]);
        m.insert(BaseType::String, vec![]);
        m.insert(BaseType::Enumerated, vec![]);
        m.insert(BaseType::Choice, vec![]);
        m.insert(BaseType::Array, vec![]);
        m.insert(BaseType::ArrayOf, vec!["vtype"]);
        m.insert(BaseType::Map, vec![]);
        m.insert(BaseType::MapOf, vec!["ktype", "vtype"]);
        m.insert(BaseType::Record, vec![]);
        m
    };

    /// Allowed type options per base type.
    pub static ref ALLOWED_TYPE_OPTIONS: BTreeMap<BaseType, Vec<&'static str>> = {
        let mut m = BTreeMap::new();
        m.insert(BaseType::Binary, vec!["and", "or", "minv", "maxv", "format"]);
        m.insert(BaseType::Boolean, vec!["and", "or"]);
        m.insert(BaseType::Integer, vec!["and", "or", "minv", "maxv", "format"]);
        m.insert(BaseType::Number, vec!["and", "or", "minf", "maxf", "format"]);
        m.insert(BaseType::Null, vec!["and", "or"]);
        m.insert(BaseType::String, vec!["and", "or", "minv", "maxv", "format", "pattern"]);
        m.insert(BaseType::Enumerated, vec!["and", "or", "id", "enum", "pointer"]);
        m.insert(BaseType::Choice, vec!["and", "or", "id"]);
        m.insert(BaseType::Array, vec!["and", "or", "minv", "maxv", "format"]);
        m.insert(BaseType::ArrayOf, vec!["and", "or", "vtype", "minv", "maxv", "unique"]);
        m.insert(BaseType::Map, vec!["and", "or", "id", "minv", "maxv"]);
        m.insert(BaseType::MapOf, vec!["and", "or", "ktype", "vtype", "minv", "maxv"]);
        m.insert(BaseType::Record, vec!["and", "or", "minv", "maxv"]);
        m
    };
}

/// Format names recognized as valid `format` option values but, per the
/// spec's "implementations MAY delegate to a generic validator" clause,
/// treated as pass-through by the codec's validate/convert stage rather than
/// pulling in a JSON-Schema-vocabulary dependency.
pub const FORMAT_JS_VALIDATE: &[&str] = &[
    "date-time",
    "date",
    "time",
    "duration",
    "idn-email",
    "idn-hostname",
    "ipv4",
    "ipv6",
    "uri",
    "uri-reference",
    "iri",
    "iri-reference",
    "uuid",
    "uri-template",
    "json-pointer",
    "relative-json-pointer",
    "regex",
];

/// Format names with a built-in semantic validator, and the base type each
/// applies to.
pub const FORMAT_VALIDATE: &[(&str, BaseType)] = &[
    ("email", BaseType::String),
    ("hostname", BaseType::String),
    ("eui", BaseType::Binary),
    ("ipv4-addr", BaseType::Binary),
    ("ipv6-addr", BaseType::Binary),
    ("ipv4-net", BaseType::Array),
    ("ipv6-net", BaseType::Array),
    ("i8", BaseType::Integer),
    ("i16", BaseType::Integer),
    ("i32", BaseType::Integer),
    ("i64", BaseType::Integer),
];

/// Format names that affect serialization representation but impose no
/// value-level semantic constraint beyond their base type.
pub const FORMAT_SERIALIZE: &[(&str, BaseType)] = &[
    ("eui", BaseType::Binary),
    ("ipv4-addr", BaseType::Binary),
    ("ipv6-addr", BaseType::Binary),
    ("ipv4-net", BaseType::Array),
    ("ipv6-net", BaseType::Array),
    ("b", BaseType::Binary),
    ("x", BaseType::Binary),
    ("i8", BaseType::Integer),
    ("i16", BaseType::Integer),
    ("i32", BaseType::Integer),
    ("i64", BaseType::Integer),
    ("f16", BaseType::Number),
    ("f32", BaseType::Number),
    ("f64", BaseType::Number),
];

pub fn is_valid_format(name: &str, base: BaseType) -> bool {
    FORMAT_JS_VALIDATE.contains(&name)
        || FORMAT_VALIDATE.iter().any(|(n, b)| *n == name && *b == base)
        || FORMAT_SERIALIZE.iter().any(|(n, b)| *n == name && *b == base)
}

/// Configuration values used when a schema doesn't override them via
/// `info.config`.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub max_binary: i64,
    pub max_string: i64,
    pub max_elements: i64,
    pub sys: String,
    pub type_name_pattern: String,
    pub field_name_pattern: String,
    pub nsid_pattern: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_binary: 255,
            max_string: 255,
            max_elements: 100,
            sys: "$".to_string(),
            type_name_pattern: "^[A-Z][-$A-Za-z0-9]{0,31}$".to_string(),
            field_name_pattern: "^[a-z][_A-Za-z0-9]{0,31}$".to_string(),
            nsid_pattern: "^[A-Za-z][A-Za-z0-9]{0,7}$".to_string(),
        }
    }
}

/// Extension passes `simplify` can be asked to apply, in the order they're
/// always composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Extension {
    Multiplicity,
    AnonymousType,
    DerivedEnum,
    MapOfEnum,
}

pub const ALL_EXTENSIONS: &[Extension] = &[
    Extension::Multiplicity,
    Extension::AnonymousType,
    Extension::DerivedEnum,
    Extension::MapOfEnum,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_type_round_trips_by_name() {
        for bt in CORE_TYPES {
            assert_eq!(BaseType::from_name(bt.name()), Some(*bt));
        }
    }

    #[test]
    fn field_length_matches_reference_table() {
        assert_eq!(BaseType::Binary.field_length(), 0);
        assert_eq!(BaseType::Enumerated.field_length(), 3);
        assert_eq!(BaseType::Record.field_length(), 5);
        assert!(BaseType::Record.has_fields());
        assert!(!BaseType::ArrayOf.has_fields());
    }

    #[test]
    fn map_of_requires_ktype_and_vtype() {
        let req = &REQUIRED_TYPE_OPTIONS[&BaseType::MapOf];
        assert!(req.contains(&"ktype"));
        assert!(req.contains(&"vtype"));
    }

    #[test]
    fn option_tags_match_reference_codepoints() {
        assert_eq!(type_option_by_name("id").unwrap().tag, '=');
        assert_eq!(type_option_by_name("vtype").unwrap().tag, '*');
        assert_eq!(type_option_by_name("format").unwrap().tag, '/');
        assert_eq!(field_option_by_name("tagid").unwrap().tag, '&');
        assert_eq!(field_option_by_name("maxc").unwrap().tag, ']');
    }
}
