use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha512};

/// Computes the GA4GH sha512t24u digest of the input.
///
/// The input is hashed with SHA-512 in 1 KiB chunks; the first 24 bytes of
/// the digest are then encoded with base64url, giving a 32 character string.
///
/// # Arguments
///
/// * `input` - The bytes to be processed, as a string slice or byte slice.
///
/// # Returns
///
/// The sha512t24u digest of the input.
pub fn sha512t24u<T: AsRef<[u8]>>(input: T) -> String {
    let mut hasher = Sha512::new();
    for chunk in input.as_ref().chunks(1024) {
        hasher.update(chunk);
    }
    base64_url::encode(&hasher.finalize()[0..24])
}

/// Finish a streaming SHA-512 hasher the sha512t24u way.
pub(crate) fn finalize_t24u(hasher: &mut Sha512) -> String {
    base64_url::encode(&hasher.finalize_reset()[0..24])
}

///
/// Serialise a JSON value in canonical form (RFC-8785 style): object members
/// sorted by key, no insignificant whitespace, and numbers in their shortest
/// form with no trailing `.0`. Logically equal values give identical text.
///
pub fn canonicalize_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => out.push_str(&i.to_string()),
            (None, Some(u), _) => out.push_str(&u.to_string()),
            // shortest round-trip form; 20.0 prints as "20"
            (None, None, Some(f)) => out.push_str(&f.to_string()),
            _ => out.push_str(&n.to_string()),
        },
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(members) => {
            let sorted: BTreeMap<&String, &Value> = members.iter().collect();
            out.push('{');
            for (i, (key, member)) in sorted.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(member, out);
            }
            out.push('}');
        }
        // null, booleans and strings: serde_json already writes these canonically
        other => out.push_str(&other.to_string()),
    }
}
