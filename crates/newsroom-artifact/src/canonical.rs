//! Canonical JSON serialization
//!
//! Objects are written with keys in byte order and no insignificant
//! whitespace, so two semantically equal values always produce the same
//! bytes regardless of how their maps were built.

use serde::Serialize;
use serde_json::Value;

/// Serialize any value into its canonical JSON string
///
/// # Errors
/// Returns error if the value cannot be represented as JSON
pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    let mut out = String::new();
    write_value(&value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut String) -> Result<(), serde_json::Error> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_value(&map[key.as_str()], out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_recursively() {
        let value = json!({"z": [{"b": 1, "a": 2}], "a": "x"});
        assert_eq!(
            to_canonical_string(&value).unwrap(),
            r#"{"a":"x","z":[{"a":2,"b":1}]}"#
        );
    }

    #[test]
    fn escapes_strings() {
        let value = json!({"q": "say \"hi\"\n"});
        assert_eq!(to_canonical_string(&value).unwrap(), r#"{"q":"say \"hi\"\n"}"#);
    }

    #[test]
    fn array_order_is_preserved() {
        let value = json!([3, 1, 2]);
        assert_eq!(to_canonical_string(&value).unwrap(), "[3,1,2]");
    }

    proptest! {
        #[test]
        fn insertion_order_does_not_matter(entries in prop::collection::btree_map("[a-z]{1,6}", 0i64..1000, 0..8)) {
            let forward: serde_json::Map<String, serde_json::Value> =
                entries.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let reversed: serde_json::Map<String, serde_json::Value> =
                entries.iter().rev().map(|(k, v)| (k.clone(), json!(v))).collect();
            let a = to_canonical_string(&forward).unwrap();
            let b = to_canonical_string(&reversed).unwrap();
            prop_assert_eq!(&a, &b);
            let parsed: serde_json::Value = serde_json::from_str(&a).unwrap();
            prop_assert_eq!(parsed, serde_json::Value::Object(forward));
        }
    }
}
