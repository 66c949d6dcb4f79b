// canonical.rs — Deterministic JSON for manifest fingerprints
//
// Canonical JSON: sorted object keys at every level, compact, standard JSON
// string escaping. The fingerprint of an accepted manifest is the SHA-256 of
// these bytes, so two operators holding differently formatted copies of the
// same policy compute the same value.

use serde::Serialize;
use serde_json::Value;

use crate::hash;

/// Serialize any manifest-shaped value to canonical JSON bytes.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    Ok(canonical_json(&value).into_bytes())
}

/// SHA-256 hex of the canonical form.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(hash::sha256_hex(&canonical_bytes(value)?))
}

/// Render `value` with object keys sorted and no insignificant whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Array(items) => write_joined(out, ('[', ']'), items, write_value),
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            write_joined(out, ('{', '}'), &entries, |out, (key, value)| {
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_value(out, value);
            });
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_joined<T>(
    out: &mut String,
    (open, close): (char, char),
    items: &[T],
    mut write_item: impl FnMut(&mut String, &T),
) {
    out.push(open);
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_item(out, item);
    }
    out.push(close);
}
