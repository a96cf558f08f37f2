/*
 * Responsibility
 * - Turn route params / query / body into a deterministic StoreContext
 * - Every mapping is key-sorted (BTreeMap), recursively
 * - Never fails: anything malformed becomes an empty section
 */
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Number, Value};

pub type CanonicalMap = BTreeMap<String, CanonicalValue>;

/// JSON value whose objects are always key-sorted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<CanonicalValue>),
    Object(CanonicalMap),
}

impl CanonicalValue {
    /// Recursively sort every object in `value` by key.
    pub fn canonicalize(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::canonicalize).collect()),
            Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::canonicalize(v)))
                    .collect(),
            ),
        }
    }
}

/// The request signature sent to the auth server and hashed into the cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreContext {
    pub path: CanonicalMap,
    pub query: CanonicalMap,
    pub body: CanonicalMap,
}

impl StoreContext {
    /// Build the context from raw request parts.
    ///
    /// `body` is expected to be `Some` only when it should participate
    /// (see [`body_participates`]). Top-level body fields listed in
    /// `excluded_body_fields` are dropped.
    pub fn canonicalize(
        path_params: &[(String, String)],
        raw_query: Option<&str>,
        body: Option<Value>,
        excluded_body_fields: &[String],
    ) -> Self {
        Self {
            path: canonicalize_path_params(path_params),
            query: canonicalize_query(raw_query),
            body: canonicalize_body(body, excluded_body_fields),
        }
    }

    /// Stable JSON encoding: field order is fixed by the struct and every
    /// nested map is a BTreeMap, so equal contexts give equal bytes.
    pub fn canonical_json(&self) -> String {
        // Serializing BTreeMap<String, _> of plain JSON values cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn canonicalize_path_params(params: &[(String, String)]) -> CanonicalMap {
    params
        .iter()
        .map(|(name, value)| (name.clone(), path_param_value(value)))
        .collect()
}

/// Route-bound ids are reduced to integers. Only the canonical decimal form
/// converts, so `"007"` stays a string and never shares a key with `7`.
fn path_param_value(raw: &str) -> CanonicalValue {
    let canonical_digits = !raw.is_empty()
        && raw.bytes().all(|b| b.is_ascii_digit())
        && (raw == "0" || !raw.starts_with('0'));

    if canonical_digits && let Ok(id) = raw.parse::<i64>() {
        return CanonicalValue::Number(Number::from(id));
    }
    CanonicalValue::String(raw.to_string())
}

fn canonicalize_query(raw_query: Option<&str>) -> CanonicalMap {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(raw_query.unwrap_or_default().as_bytes()) {
        grouped
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }

    grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                CanonicalValue::String(values.remove(0))
            } else {
                CanonicalValue::Array(values.into_iter().map(CanonicalValue::String).collect())
            };
            (key, value)
        })
        .collect()
}

fn canonicalize_body(body: Option<Value>, excluded: &[String]) -> CanonicalMap {
    let Some(Value::Object(mut fields)) = body else {
        return CanonicalMap::new();
    };

    for name in excluded {
        fields.remove(name);
    }

    match CanonicalValue::canonicalize(Value::Object(fields)) {
        CanonicalValue::Object(map) => map,
        _ => CanonicalMap::new(),
    }
}

/// Whether the body belongs in the context: JSON payloads always, anything
/// else only on non-GET requests.
pub fn body_participates(method: &str, content_type: Option<&str>) -> bool {
    is_json_content(content_type) || !method.eq_ignore_ascii_case("GET")
}

pub fn is_json_content(content_type: Option<&str>) -> bool {
    let Some(mime) = essence(content_type) else {
        return false;
    };
    mime == "application/json" || mime.ends_with("+json")
}

pub fn is_form_content(content_type: Option<&str>) -> bool {
    essence(content_type).as_deref() == Some("application/x-www-form-urlencoded")
}

pub fn is_multipart_content(content_type: Option<&str>) -> bool {
    essence(content_type).as_deref() == Some("multipart/form-data")
}

fn essence(content_type: Option<&str>) -> Option<String> {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
        .filter(|mime| !mime.is_empty())
}

/// Decode a buffered body into the JSON shape the canonicalizer accepts.
/// Undecodable or unsupported payloads yield `None` (empty body section).
pub fn decode_body(content_type: Option<&str>, bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    if is_json_content(content_type) {
        return serde_json::from_slice(bytes).ok();
    }
    if is_form_content(content_type) {
        let fields = url::form_urlencoded::parse(bytes)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect::<serde_json::Map<_, _>>();
        return Some(Value::Object(fields));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn no_exclusions() -> Vec<String> {
        Vec::new()
    }

    #[test]
    fn store_sensors_scenario_context() {
        let ctx = StoreContext::canonicalize(
            &params(&[("storeNumber", "42")]),
            None,
            None,
            &no_exclusions(),
        );

        assert_eq!(
            ctx.canonical_json(),
            r#"{"path":{"storeNumber":42},"query":{},"body":{}}"#
        );
    }

    #[test]
    fn key_order_does_not_change_encoding() {
        let a = StoreContext::canonicalize(
            &params(&[("b", "x"), ("a", "1")]),
            Some("z=1&a=2"),
            Some(json!({"outer": {"y": 1, "x": [ {"q": 1, "p": 2} ]}, "alpha": true})),
            &no_exclusions(),
        );
        let b = StoreContext::canonicalize(
            &params(&[("a", "1"), ("b", "x")]),
            Some("a=2&z=1"),
            Some(json!({"alpha": true, "outer": {"x": [ {"p": 2, "q": 1} ], "y": 1}})),
            &no_exclusions(),
        );

        assert_eq!(a.canonical_json(), b.canonical_json());
        assert_eq!(
            a.canonical_json(),
            r#"{"path":{"a":1,"b":"x"},"query":{"a":"2","z":"1"},"body":{"alpha":true,"outer":{"x":[{"p":2,"q":1}],"y":1}}}"#
        );
    }

    #[test]
    fn canonicalizing_canonical_output_is_a_no_op() {
        let ctx = StoreContext::canonicalize(
            &params(&[("storeNumber", "42")]),
            Some("sort=desc&page=2"),
            Some(json!({"name": "Main", "meta": {"z": null, "a": [3, 1]}})),
            &no_exclusions(),
        );

        let encoded: Value = serde_json::from_str(&ctx.canonical_json()).unwrap();

        for (name, section) in [("path", &ctx.path), ("query", &ctx.query), ("body", &ctx.body)] {
            let again = CanonicalValue::canonicalize(encoded[name].clone());
            assert_eq!(again, CanonicalValue::Object(section.clone()));
        }
    }

    #[test]
    fn only_canonical_integers_become_numbers() {
        let ctx = StoreContext::canonicalize(
            &params(&[
                ("id", "7"),
                ("zero", "0"),
                ("padded", "007"),
                ("slug", "main-st"),
                ("huge", "99999999999999999999"),
            ]),
            None,
            None,
            &no_exclusions(),
        );

        assert_eq!(ctx.path["id"], CanonicalValue::Number(7.into()));
        assert_eq!(ctx.path["zero"], CanonicalValue::Number(0.into()));
        assert_eq!(ctx.path["padded"], CanonicalValue::String("007".into()));
        assert_eq!(ctx.path["slug"], CanonicalValue::String("main-st".into()));
        assert_eq!(
            ctx.path["huge"],
            CanonicalValue::String("99999999999999999999".into())
        );
    }

    #[test]
    fn repeated_query_keys_collect_into_array() {
        let ctx = StoreContext::canonicalize(
            &[],
            Some("tag=b&tag=a&q=hello+world%21"),
            None,
            &no_exclusions(),
        );

        assert_eq!(
            serde_json::to_string(&ctx.query).unwrap(),
            r#"{"q":"hello world!","tag":["b","a"]}"#
        );
    }

    #[test]
    fn excluded_body_fields_are_dropped() {
        let excluded = vec!["file".to_string(), "image".to_string()];
        let ctx = StoreContext::canonicalize(
            &[],
            None,
            Some(json!({"name": "cam-1", "file": "<bytes>", "image": "<bytes>"})),
            &excluded,
        );

        assert_eq!(serde_json::to_string(&ctx.body).unwrap(), r#"{"name":"cam-1"}"#);
    }

    #[test]
    fn non_object_body_becomes_empty() {
        let ctx = StoreContext::canonicalize(&[], None, Some(json!([1, 2, 3])), &no_exclusions());
        assert!(ctx.body.is_empty());
    }

    #[test]
    fn body_participation_rules() {
        assert!(!body_participates("GET", None));
        assert!(!body_participates("GET", Some("text/plain")));
        assert!(body_participates("GET", Some("application/json; charset=utf-8")));
        assert!(body_participates("GET", Some("application/vnd.api+json")));
        assert!(body_participates("POST", None));
        assert!(body_participates("delete", Some("text/plain")));
        assert!(is_multipart_content(Some("multipart/form-data; boundary=x")));
        assert!(!is_multipart_content(Some("application/json")));
    }

    #[test]
    fn decode_body_handles_json_form_and_garbage() {
        assert_eq!(
            decode_body(Some("application/json"), br#"{"a":1}"#),
            Some(json!({"a": 1}))
        );
        assert_eq!(
            decode_body(Some("application/x-www-form-urlencoded"), b"name=cam+1&floor=2"),
            Some(json!({"name": "cam 1", "floor": "2"}))
        );
        assert_eq!(decode_body(Some("application/json"), b"{not json"), None);
        assert_eq!(decode_body(Some("multipart/form-data; boundary=x"), b"--x"), None);
        assert_eq!(decode_body(Some("application/json"), b""), None);
    }
}
