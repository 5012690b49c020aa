//! Bidirectional text/wire conversions for `format` options: base64url/hex
//! for `Binary`, dotted/colon IP address notation, and CIDR `"addr/prefix"`
//! for IPv4/IPv6 nets. A format with no entry here is a no-op pass-through
//! (the value's JSON shape already is its wire shape).

use data_encoding::{BASE64URL_NOPAD, HEXUPPER};
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::schema::error::ValidationError;
use crate::value::Value;

fn bad(msg: impl Into<String>) -> ValidationError {
    ValidationError::instance_invalid(msg.into())
}

/// Encode a decoded (API) value to its wire form for `format`, or `None` if
/// `format` has no special wire encoding (caller falls back to the
/// type's default base encoding).
pub fn encode(format: &str, value: &Value) -> Result<Option<Value>, ValidationError> {
    match format {
        "b" => Ok(Some(Value::String(b2s_base64url(value.as_bytes().map_err(|e| bad(e.to_string()))?)))),
        "x" | "eui" => Ok(Some(Value::String(HEXUPPER.encode(value.as_bytes().map_err(|e| bad(e.to_string()))?)))),
        "ipv4-addr" => Ok(Some(Value::String(b2s_ipv4(value)?))),
        "ipv6-addr" => Ok(Some(Value::String(b2s_ipv6(value)?))),
        "ipv4-net" => Ok(Some(Value::String(a2s_net(value, 32, b2s_ipv4)?))),
        "ipv6-net" => Ok(Some(Value::String(a2s_net(value, 128, b2s_ipv6)?))),
        _ => Ok(None),
    }
}

/// Decode a wire value back to its API form for `format`, or `None` if the
/// format has no special wire decoding.
pub fn decode(format: &str, value: &Value) -> Result<Option<Value>, ValidationError> {
    match format {
        "b" => Ok(Some(Value::from_bytes(s2b_base64url(value.as_str().map_err(|e| bad(e.to_string()))?)?))),
        "x" | "eui" => {
            let s = value.as_str().map_err(|e| bad(e.to_string()))?;
            let bytes = HEXUPPER
                .decode(s.to_uppercase().as_bytes())
                .map_err(|e| bad(format!("bad hex string: {e}")))?;
            Ok(Some(Value::from_bytes(bytes)))
        }
        "ipv4-addr" => Ok(Some(Value::from_bytes(s2b_ipv4(value.as_str().map_err(|e| bad(e.to_string()))?)?))),
        "ipv6-addr" => Ok(Some(Value::from_bytes(s2b_ipv6(value.as_str().map_err(|e| bad(e.to_string()))?)?))),
        "ipv4-net" => Ok(Some(s2a_net(value.as_str().map_err(|e| bad(e.to_string()))?, 32, s2b_ipv4)?)),
        "ipv6-net" => Ok(Some(s2a_net(value.as_str().map_err(|e| bad(e.to_string()))?, 128, s2b_ipv6)?)),
        _ => Ok(None),
    }
}

fn b2s_base64url(b: &[u8]) -> String {
    BASE64URL_NOPAD.encode(b)
}

fn s2b_base64url(s: &str) -> Result<Vec<u8>, ValidationError> {
    BASE64URL_NOPAD.decode(s.as_bytes()).map_err(|e| bad(format!("bad base64url string: {e}")))
}

fn b2s_ipv4(value: &Value) -> Result<String, ValidationError> {
    let b = value.as_bytes().map_err(|e| bad(e.to_string()))?;
    let arr: [u8; 4] = b.try_into().map_err(|_| bad("IPv4 address must be 4 bytes"))?;
    Ok(Ipv4Addr::from(arr).to_string())
}

fn s2b_ipv4(s: &str) -> Result<Vec<u8>, ValidationError> {
    s.parse::<Ipv4Addr>().map(|a| a.octets().to_vec()).map_err(|e| bad(format!("bad IPv4 address: {e}")))
}

fn b2s_ipv6(value: &Value) -> Result<String, ValidationError> {
    let b = value.as_bytes().map_err(|e| bad(e.to_string()))?;
    let arr: [u8; 16] = b.try_into().map_err(|_| bad("IPv6 address must be 16 bytes"))?;
    Ok(Ipv6Addr::from(arr).to_string())
}

fn s2b_ipv6(s: &str) -> Result<Vec<u8>, ValidationError> {
    s.parse::<Ipv6Addr>().map(|a| a.octets().to_vec()).map_err(|e| bad(format!("bad IPv6 address: {e}")))
}

fn a2s_net(
    value: &Value,
    max_prefix: i64,
    addr_to_string: fn(&Value) -> Result<String, ValidationError>,
) -> Result<String, ValidationError> {
    let arr = value.as_array().map_err(|e| bad(e.to_string()))?;
    if arr.len() != 2 {
        return Err(bad("net value must be [address, prefix_length]"));
    }
    let prefix = arr[1].as_number().map_err(|e| bad(e.to_string()))?.0 as i64;
    if !(0..=max_prefix).contains(&prefix) {
        return Err(bad(format!("net prefix length {prefix} out of range 0..={max_prefix}")));
    }
    Ok(format!("{}/{prefix}", addr_to_string(&arr[0])?))
}

fn s2a_net(
    s: &str,
    max_prefix: i64,
    string_to_addr: fn(&str) -> Result<Vec<u8>, ValidationError>,
) -> Result<Value, ValidationError> {
    let (addr, prefix) = s.split_once('/').ok_or_else(|| bad(format!("{s} is not in addr/prefix form")))?;
    let prefix_len: i64 = prefix.parse().map_err(|_| bad(format!("bad prefix length in {s}")))?;
    if !(0..=max_prefix).contains(&prefix_len) {
        return Err(bad(format!("net prefix length {prefix_len} out of range 0..={max_prefix}")));
    }
    Ok(Value::from_array(vec![Value::from_bytes(string_to_addr(addr)?), Value::from_i64(prefix_len)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64url_round_trips() {
        let bytes = Value::from_bytes(vec![0xde, 0xad, 0xbe, 0xef]);
        let wire = encode("b", &bytes).unwrap().unwrap();
        let back = decode("b", &wire).unwrap().unwrap();
        assert_eq!(bytes, back);
    }

    #[test]
    fn ipv4_net_round_trips_through_cidr_text() {
        let net = Value::from_array(vec![Value::from_bytes(vec![10, 0, 0, 1]), Value::from_i64(24)]);
        let wire = encode("ipv4-net", &net).unwrap().unwrap();
        assert_eq!(wire, Value::String("10.0.0.1/24".to_string()));
        let back = decode("ipv4-net", &wire).unwrap().unwrap();
        assert_eq!(back, net);
    }

    #[test]
    fn unrecognized_format_is_none() {
        assert!(encode("date-time", &Value::from_i64(1)).unwrap().is_none());
    }
}
