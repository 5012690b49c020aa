//! Semantic format validators: checks run on a *decoded* value (a `Value`,
//! already the right JSON shape for its base type) to enforce a `format`
//! option's meaning beyond what the base type alone guarantees.
//!
//! Formats named in [`definitions::FORMAT_JS_VALIDATE`] have no built-in
//! validator here (see `DESIGN.md`'s `jsonschema` decision) and pass
//! through unchecked.

use lazy_static::lazy_static;
use regex::Regex;

use crate::definitions::BaseType;
use crate::value::Value;

lazy_static! {
    // `(?i-u)` rather than `(?i)`: ASCII-only case folding, which needs only
    // the `unicode-perl` feature this crate already builds `regex` with, not
    // the heavier `unicode-case` tables.
    static ref EMAIL_RE: Regex = Regex::new(
        r"(?i-u)^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$"
    ).unwrap();
    // No look-around (the `regex` crate doesn't support it): a label is a
    // run of 1-63 letters/digits/hyphens that neither starts nor ends with
    // a hyphen, expressed as an optional 0-61-char hyphen-permitting middle
    // bracketed by two non-hyphen characters.
    static ref HOSTNAME_LABEL_RE: Regex = Regex::new(r"(?i-u)^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").unwrap();
}

pub fn validate(format: &str, base_type: BaseType, value: &Value) -> Result<(), String> {
    match (base_type, format) {
        (BaseType::String, "email") => {
            let s = value.as_str().map_err(|e| e.to_string())?;
            if EMAIL_RE.is_match(s) { Ok(()) } else { Err(format!("{s} is not a valid email address")) }
        }
        (BaseType::String, "hostname") => {
            let s = value.as_str().map_err(|e| e.to_string())?;
            validate_hostname(s)
        }
        (BaseType::Binary, "eui") => validate_binary_len(value, &[6, 8]),
        (BaseType::Binary, "ipv4-addr") => validate_binary_len(value, &[4]),
        (BaseType::Binary, "ipv6-addr") => validate_binary_len(value, &[16]),
        (BaseType::Array, "ipv4-net") => validate_net(value, 4, 32),
        (BaseType::Array, "ipv6-net") => validate_net(value, 16, 128),
        (BaseType::Integer, "i8") => validate_int_range(value, i8::MIN as i64, i8::MAX as i64),
        (BaseType::Integer, "i16") => validate_int_range(value, i16::MIN as i64, i16::MAX as i64),
        (BaseType::Integer, "i32") => validate_int_range(value, i32::MIN as i64, i32::MAX as i64),
        (BaseType::Integer, "i64") => Ok(()),
        _ => Ok(()),
    }
}

fn validate_hostname(s: &str) -> Result<(), String> {
    if s.len() > 253 {
        return Err(format!("hostname {s} longer than 253 characters"));
    }
    let trimmed = s.strip_suffix('.').unwrap_or(s);
    if trimmed.split('.').all(|label| HOSTNAME_LABEL_RE.is_match(label)) {
        Ok(())
    } else {
        Err(format!("{s} is not a valid hostname"))
    }
}

fn validate_binary_len(value: &Value, allowed: &[usize]) -> Result<(), String> {
    let b = value.as_bytes().map_err(|e| e.to_string())?;
    if allowed.contains(&b.len()) {
        Ok(())
    } else {
        Err(format!("binary value has length {}, expected one of {allowed:?}", b.len()))
    }
}

fn validate_net(value: &Value, addr_len: usize, max_prefix: i64) -> Result<(), String> {
    let arr = value.as_array().map_err(|e| e.to_string())?;
    if arr.len() != 2 {
        return Err("net value must be [address, prefix_length]".to_string());
    }
    let addr = arr[0].as_bytes().map_err(|e| e.to_string())?;
    let prefix = arr[1].as_number().map_err(|e| e.to_string())?.0 as i64;
    if addr.len() != addr_len {
        return Err(format!("net address has length {}, expected {addr_len}", addr.len()));
    }
    if !(0..=max_prefix).contains(&prefix) {
        return Err(format!("net prefix length {prefix} out of range 0..={max_prefix}"));
    }
    Ok(())
}

fn validate_int_range(value: &Value, min: i64, max: i64) -> Result<(), String> {
    let n = value.as_number().map_err(|e| e.to_string())?.0 as i64;
    if (min..=max).contains(&n) {
        Ok(())
    } else {
        Err(format!("{n} out of range {min}..={max}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_email() {
        assert!(validate("email", BaseType::String, &Value::String("a@b.com".to_string())).is_ok());
    }

    #[test]
    fn rejects_email_without_at() {
        assert!(validate("email", BaseType::String, &Value::String("not-an-email".to_string())).is_err());
    }

    #[test]
    fn rejects_oversized_i8() {
        assert!(validate_int_range(&Value::from_i64(200), i8::MIN as i64, i8::MAX as i64).is_err());
    }

    #[test]
    fn unknown_format_passes_through() {
        assert!(validate("date-time", BaseType::Integer, &Value::from_i64(0)).is_ok());
    }

    #[test]
    fn accepts_plain_hostname() {
        assert!(validate("hostname", BaseType::String, &Value::String("example.com".to_string())).is_ok());
    }

    #[test]
    fn rejects_hostname_label_with_leading_or_trailing_hyphen() {
        assert!(validate("hostname", BaseType::String, &Value::String("-bad.example.com".to_string())).is_err());
        assert!(validate("hostname", BaseType::String, &Value::String("bad-.example.com".to_string())).is_err());
    }
}
