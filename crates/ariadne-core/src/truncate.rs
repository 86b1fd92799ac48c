//! Size caps applied to event payloads before validation
//!
//! Oversized strings are cut at a byte cap and marked with a literal suffix
//! so that validation errors and stored events stay bounded. The pass is
//! idempotent and leaves every other field untouched.

use serde_json::Value;

/// Byte cap for the `name` field of a trace or span
pub const NAME_CAP: usize = 1024;

/// Byte cap for any string value inside a span's `data` payload
pub const DATA_STRING_CAP: usize = 102_400;

/// Appended to every truncated string
pub const TRUNCATION_SUFFIX: &str = "... [truncated]";

/// Apply the size caps to a single parsed event, in place.
///
/// Caps `name` and, for spans, every string value inside `data`, recursing
/// through nested objects. Array elements and non-string values pass through
/// unchanged.
pub fn truncate_event(event: &mut Value) {
    let Some(obj) = event.as_object_mut() else {
        return;
    };

    if let Some(Value::String(name)) = obj.get_mut("name") {
        if let Some(capped) = truncate_str(name, NAME_CAP) {
            *name = capped;
        }
    }

    if let Some(data) = obj.get_mut("data") {
        truncate_data(data);
    }
}

fn truncate_data(value: &mut Value) {
    if let Value::Object(map) = value {
        for entry in map.values_mut() {
            match entry {
                Value::String(s) => {
                    if let Some(capped) = truncate_str(s, DATA_STRING_CAP) {
                        *entry = Value::String(capped);
                    }
                }
                Value::Object(_) => truncate_data(entry),
                _ => {}
            }
        }
    }
}

/// Returns the capped replacement, or `None` when the string fits.
///
/// A string that already ends with the suffix and sits within
/// `cap + suffix` bytes is the output of a previous pass; leaving it alone
/// is what makes truncation idempotent.
fn truncate_str(s: &str, cap: usize) -> Option<String> {
    if s.len() <= cap {
        return None;
    }
    if s.len() <= cap + TRUNCATION_SUFFIX.len() && s.ends_with(TRUNCATION_SUFFIX) {
        return None;
    }

    let mut end = cap;
    while !s.is_char_boundary(end) {
        end -= 1;
    }

    let mut out = String::with_capacity(end + TRUNCATION_SUFFIX.len());
    out.push_str(&s[..end]);
    out.push_str(TRUNCATION_SUFFIX);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_name_at_cap_untouched() {
        let mut event = json!({"type": "trace", "trace_id": "t", "name": "x".repeat(1024)});
        truncate_event(&mut event);
        assert_eq!(event["name"].as_str().unwrap().len(), 1024);
    }

    #[test]
    fn test_name_over_cap_truncated() {
        let mut event = json!({"type": "trace", "trace_id": "t", "name": "x".repeat(1025)});
        truncate_event(&mut event);
        let name = event["name"].as_str().unwrap();
        assert_eq!(name.len(), 1024 + TRUNCATION_SUFFIX.len());
        assert!(name.ends_with(TRUNCATION_SUFFIX));
        assert!(name.starts_with("xxx"));
    }

    #[test]
    fn test_truncation_is_idempotent() {
        let mut event = json!({"type": "trace", "trace_id": "t", "name": "y".repeat(5000)});
        truncate_event(&mut event);
        let once = event.clone();
        truncate_event(&mut event);
        assert_eq!(event, once);
    }

    #[test]
    fn test_idempotent_on_multibyte_boundary() {
        // 1023 ASCII bytes then a 3-byte char straddling the cap
        let s = format!("{}\u{20AC}\u{20AC}", "a".repeat(1023));
        let first = truncate_str(&s, NAME_CAP).unwrap();
        assert!(first.ends_with(TRUNCATION_SUFFIX));
        assert!(truncate_str(&first, NAME_CAP).is_none());
    }

    #[test]
    fn test_data_strings_capped_recursively() {
        let big = "d".repeat(DATA_STRING_CAP + 1);
        let mut event = json!({
            "type": "span",
            "trace_id": "t",
            "span_id": "s",
            "data": {
                "output": big,
                "nested": {"inner": "e".repeat(DATA_STRING_CAP + 10)},
                "count": 42,
                "flag": true,
                "items": ["f".repeat(DATA_STRING_CAP + 10)]
            }
        });
        truncate_event(&mut event);

        let data = &event["data"];
        assert!(data["output"].as_str().unwrap().ends_with(TRUNCATION_SUFFIX));
        assert!(data["nested"]["inner"]
            .as_str()
            .unwrap()
            .ends_with(TRUNCATION_SUFFIX));
        assert_eq!(data["count"], json!(42));
        assert_eq!(data["flag"], json!(true));
        // array elements pass through untouched
        assert_eq!(
            data["items"][0].as_str().unwrap().len(),
            DATA_STRING_CAP + 10
        );
    }

    #[test]
    fn test_other_fields_untouched() {
        let mut event = json!({
            "type": "span",
            "trace_id": "t".repeat(5000),
            "span_id": "s".repeat(5000),
            "kind": "k".repeat(5000)
        });
        let before = event.clone();
        truncate_event(&mut event);
        assert_eq!(event, before);
    }
}
