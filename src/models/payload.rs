use serde_json::{Map, Value};

/// Free-form key/value interchange between pipeline stages.
pub type Payload = Map<String, Value>;

/// Shallow-merge `addition` into `base`; later writers win.
///
/// Returns the keys that already existed in `base` and were overwritten.
pub fn merge_into(base: &mut Payload, addition: &Payload) -> Vec<String> {
    let mut overwritten = Vec::new();
    for (key, value) in addition {
        if base.insert(key.clone(), value.clone()).is_some() {
            overwritten.push(key.clone());
        }
    }
    overwritten
}

/// A trimmed, non-empty string value.
pub fn get_str<'a>(payload: &'a Payload, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// String items of an array value; non-string items are ignored.
pub fn get_str_list(payload: &Payload, key: &str) -> Vec<String> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn get_f64(payload: &Payload, key: &str) -> Option<f64> {
    payload.get(key).and_then(Value::as_f64)
}

pub fn get_bool(payload: &Payload, key: &str) -> Option<bool> {
    payload.get(key).and_then(Value::as_bool)
}

/// Approximate size of a payload, used for result metadata.
pub fn payload_size(payload: &Payload) -> usize {
    serde_json::to_string(payload).map(|s| s.len()).unwrap_or(0)
}
