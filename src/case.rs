//! Key-case conversion between the wire format (camelCase) and Rust-side
//! payloads (snake_case).
//!
//! The two directions are not exact inverses: `HTMLParser` becomes
//! `html_parser`, which camelizes back to `htmlParser`, and a leading
//! underscore is dropped on the way back.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::Result;

static ACRONYM_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").expect("valid regex"));
static WORD_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid regex"));
static SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:_|(/))([a-z0-9]*)").expect("valid regex"));

/// Converts `camelCase`/`PascalCase` into `snake_case`.
///
/// `::` namespace separators become `/` and hyphens become underscores.
pub fn underscore(s: &str) -> String {
    let s = s.replace("::", "/");
    let s = ACRONYM_BOUNDARY.replace_all(&s, "${1}_${2}");
    let s = WORD_BOUNDARY.replace_all(&s, "${1}_${2}");
    s.replace('-', "_").to_lowercase()
}

/// Converts `snake_case` into `camelCase`.
///
/// The leading character is kept as given, so `first_name` becomes
/// `firstName` while `Id` stays `Id`. `/` separators become `::`.
pub fn camelize(s: &str) -> String {
    SEGMENT
        .replace_all(s, |caps: &Captures| {
            let slash = caps.get(1).map_or("", |m| m.as_str());
            format!("{slash}{}", capitalize(&caps[2]))
        })
        .replace('/', "::")
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Returns a copy of `value` with every object key converted to snake_case.
pub fn to_snake_case(value: &Value) -> Value {
    transform_keys(value, &underscore)
}

/// Returns a copy of `value` with every object key converted to camelCase.
pub fn to_camel_case(value: &Value) -> Value {
    transform_keys(value, &camelize)
}

/// Serializes a caller payload and camelizes its keys for the wire.
pub(crate) fn to_wire<T: Serialize + ?Sized>(data: &T) -> Result<Value> {
    Ok(to_camel_case(&serde_json::to_value(data)?))
}

/// Snake-cases a decoded response; an absent body becomes `Value::Null`.
pub(crate) fn from_wire(body: Option<Value>) -> Value {
    body.map(|value| to_snake_case(&value)).unwrap_or(Value::Null)
}

/// Snake-cases a decoded array response; an absent body is an empty list.
pub(crate) fn list_from_wire(body: Option<Value>) -> Result<Vec<Value>> {
    match from_wire(body) {
        Value::Null => Ok(Vec::new()),
        other => Ok(serde_json::from_value(other)?),
    }
}

/// Rewrites keys of objects, of objects nested in objects and of objects held
/// directly in arrays. Other array elements, nested arrays included, are
/// copied unchanged.
fn transform_keys(value: &Value, transform: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(transform_map(map, transform)),
        Value::Array(items) => Value::Array(transform_items(items, transform)),
        other => other.clone(),
    }
}

fn transform_map(map: &Map<String, Value>, transform: &dyn Fn(&str) -> String) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Object(inner) => Value::Object(transform_map(inner, transform)),
                Value::Array(items) => Value::Array(transform_items(items, transform)),
                other => other.clone(),
            };
            (transform(key), value)
        })
        .collect()
}

fn transform_items(items: &[Value], transform: &dyn Fn(&str) -> String) -> Vec<Value> {
    items
        .iter()
        .map(|item| match item {
            Value::Object(inner) => Value::Object(transform_map(inner, transform)),
            other => other.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn underscore_splits_words() {
        assert_eq!(underscore("firstName"), "first_name");
        assert_eq!(underscore("ContactAddress"), "contact_address");
        assert_eq!(underscore("address2"), "address2");
        assert_eq!(underscore("address2Line"), "address2_line");
        assert_eq!(underscore("id"), "id");
    }

    #[test]
    fn underscore_separates_acronyms_from_words() {
        assert_eq!(underscore("HTMLParser"), "html_parser");
        assert_eq!(underscore("contactID"), "contact_id");
    }

    #[test]
    fn underscore_handles_namespaces_and_hyphens() {
        assert_eq!(underscore("Gift::Designation"), "gift/designation");
        assert_eq!(underscore("batch-total"), "batch_total");
    }

    #[test]
    fn camelize_joins_segments() {
        assert_eq!(camelize("first_name"), "firstName");
        assert_eq!(camelize("default_gift_date"), "defaultGiftDate");
        assert_eq!(camelize("address2_line"), "address2Line");
        assert_eq!(camelize("email"), "email");
    }

    #[test]
    fn camelize_keeps_the_leading_character() {
        assert_eq!(camelize("Id"), "Id");
        assert_eq!(camelize("sort_by"), "sortBy");
    }

    #[test]
    fn camelize_restores_namespaces() {
        assert_eq!(camelize("gift/designation"), "gift::Designation");
    }

    #[test]
    fn round_trips_plain_camel_case_keys() {
        for key in ["firstName", "contactAddress", "postalCode", "giftDate", "id", "batchTotal"] {
            assert_eq!(camelize(&underscore(key)), key, "{key}");
        }
    }

    #[test]
    fn acronyms_do_not_round_trip() {
        assert_eq!(camelize(&underscore("HTMLParser")), "htmlParser");
    }

    #[test]
    fn snake_cases_nested_objects() {
        let input = json!({"firstName": "John", "contactAddress": {"postalCode": "1"}});
        assert_eq!(
            to_snake_case(&input),
            json!({"first_name": "John", "contact_address": {"postal_code": "1"}})
        );
    }

    #[test]
    fn transforms_objects_inside_arrays_only() {
        let input = json!({
            "giftDesignations": [{"designationId": 1}, "rawValue", 2, [{"innerKey": true}]],
            "tagNames": ["majorDonor", "boardMember"]
        });
        assert_eq!(
            to_snake_case(&input),
            json!({
                "gift_designations": [{"designation_id": 1}, "rawValue", 2, [{"innerKey": true}]],
                "tag_names": ["majorDonor", "boardMember"]
            })
        );
    }

    #[test]
    fn camel_cases_top_level_arrays() {
        let input = json!([{"gift_type": "Cash"}, {"gift_date": "2024-01-01"}]);
        assert_eq!(
            to_camel_case(&input),
            json!([{"giftType": "Cash"}, {"giftDate": "2024-01-01"}])
        );
    }

    #[test]
    fn leaves_input_untouched() {
        let input = json!({"first_name": "John"});
        let before = input.clone();
        let _ = to_camel_case(&input);
        assert_eq!(input, before);
    }

    #[test]
    fn wire_helpers() {
        #[derive(Serialize)]
        struct Address {
            postal_code: &'static str,
            is_primary: bool,
        }
        assert_eq!(
            to_wire(&Address {
                postal_code: "12345",
                is_primary: true
            })
            .unwrap(),
            json!({"postalCode": "12345", "isPrimary": true})
        );
        assert_eq!(from_wire(None), Value::Null);
        assert_eq!(
            list_from_wire(Some(json!([{"giftId": 1}]))).unwrap(),
            vec![json!({"gift_id": 1})]
        );
        assert!(list_from_wire(None).unwrap().is_empty());
        assert!(list_from_wire(Some(json!({"not": "a list"}))).is_err());
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(to_snake_case(&json!("firstName")), json!("firstName"));
        assert_eq!(to_camel_case(&Value::Null), Value::Null);
    }
}
