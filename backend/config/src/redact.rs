//! Safe-to-display snapshots of config and profile values.

use serde_json::Value;

use focusmate_core::mask_secret;

const SENSITIVE_KEYS: &[&str] = &[
    "apiKey",
    "api_key",
    "apikey",
    "accessToken",
    "access_token",
    "token",
    "secret",
    "password",
];

/// Mask every sensitive field, keeping the first 4 characters as a hint.
pub fn redact(value: &Value) -> Value {
    redact_under(value, "")
}

fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

fn redact_under(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) if is_sensitive_key(key) => Value::String(mask_secret(s)),
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_under(v, key)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_under(v, k)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Dotted paths of the fields [`redact`] would mask.
pub fn collect_redacted_paths(value: &Value) -> Vec<String> {
    fn collect(value: &Value, path: &str, key: &str, out: &mut Vec<String>) {
        match value {
            Value::String(s) if !s.is_empty() && is_sensitive_key(key) => {
                out.push(path.to_string())
            }
            Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    collect(v, &format!("{path}[{i}]"), key, out);
                }
            }
            Value::Object(map) => {
                for (k, v) in map {
                    let child = if path.is_empty() {
                        k.clone()
                    } else {
                        format!("{path}.{k}")
                    };
                    collect(v, &child, k, out);
                }
            }
            _ => {}
        }
    }

    let mut paths = Vec::new();
    collect(value, "", "", &mut paths);
    paths
}
