//! Small helpers for reading loosely typed YAML maps.

use serde_yaml::{Mapping, Value};

/// Scalar value as a string. Numbers and booleans are accepted because
/// authors often write `value: 101` for a node identifier.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn get<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

pub(crate) fn get_string(map: &Mapping, key: &str) -> Option<String> {
    get(map, key).and_then(scalar_string)
}

pub(crate) fn get_bool(map: &Mapping, key: &str) -> Option<bool> {
    match get(map, key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Normalize `\r\n` and lone `\r` to `\n`.
pub(crate) fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_string_accepts_numbers() {
        let map: Mapping = serde_yaml::from_str("value: 101\nflag: true\nname: lobby").unwrap();
        assert_eq!(get_string(&map, "value").as_deref(), Some("101"));
        assert_eq!(get_string(&map, "flag").as_deref(), Some("true"));
        assert_eq!(get_string(&map, "name").as_deref(), Some("lobby"));
        assert_eq!(get_string(&map, "missing"), None);
    }

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines("a\r\nb\rc\n"), "a\nb\nc\n");
    }
}
