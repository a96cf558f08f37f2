//! Verification result returned by the auth server (and stored in the cache).
//!
//! Decoding is lenient: missing or `null` fields fall back to their
//! defaults, which always lean towards denial (`active: false`,
//! `authorized: false`, no subject).
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<VerifiedUser>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub roles: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<VerificationExt>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerifiedUser {
    // Kept raw: some auth servers send the id as a string.
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationExt {
    #[serde(default, deserialize_with = "null_as_default")]
    pub authorized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_permissions: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VerificationResult {
    /// The "unverified" sentinel: serializes to exactly `{"active":false}`.
    pub fn inactive() -> Self {
        Self::default()
    }

    pub fn is_authorized(&self) -> bool {
        self.ext.as_ref().is_some_and(|ext| ext.authorized)
    }

    /// The subject as a positive integer, if the server sent a usable one.
    pub fn subject_id(&self) -> Option<i64> {
        let id = match &self.user.as_ref()?.id {
            Value::Number(n) => n.as_i64()?,
            Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
                s.parse::<i64>().ok()?
            }
            _ => return None,
        };
        (id > 0).then_some(id)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sentinel_serializes_to_active_false_only() {
        assert_eq!(
            serde_json::to_string(&VerificationResult::inactive()).unwrap(),
            r#"{"active":false}"#
        );
    }

    #[test]
    fn decodes_full_response() {
        let result: VerificationResult = serde_json::from_value(json!({
            "active": true,
            "user": {"id": 7},
            "roles": ["manager"],
            "permissions": ["sensors.read"],
            "ext": {"authorized": true, "required_permissions": ["sensors.read"], "store": 42}
        }))
        .unwrap();

        assert!(result.active);
        assert!(result.is_authorized());
        assert_eq!(result.subject_id(), Some(7));
        assert_eq!(result.roles, vec!["manager"]);
        let ext = result.ext.unwrap();
        assert_eq!(ext.required_permissions, Some(vec!["sensors.read".to_string()]));
        assert_eq!(ext.extra.get("store"), Some(&json!(42)));
    }

    #[test]
    fn nulls_and_missing_fields_lean_to_denial() {
        let result: VerificationResult = serde_json::from_value(json!({
            "active": null,
            "roles": null,
            "permissions": null,
            "ext": {"authorized": null}
        }))
        .unwrap();

        assert!(!result.active);
        assert!(!result.is_authorized());
        assert_eq!(result.subject_id(), None);
        assert!(result.roles.is_empty());

        let empty: VerificationResult = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, VerificationResult::inactive());
    }

    #[test]
    fn subject_id_resolution() {
        let with_id = |id: Value| VerificationResult {
            user: Some(VerifiedUser { id }),
            ..Default::default()
        };

        assert_eq!(with_id(json!(7)).subject_id(), Some(7));
        assert_eq!(with_id(json!("12")).subject_id(), Some(12));
        assert_eq!(with_id(json!(0)).subject_id(), None);
        assert_eq!(with_id(json!(-3)).subject_id(), None);
        assert_eq!(with_id(json!(1.5)).subject_id(), None);
        assert_eq!(with_id(json!("abc")).subject_id(), None);
        assert_eq!(with_id(json!("+12")).subject_id(), None);
        assert_eq!(with_id(json!(" 12")).subject_id(), None);
        assert_eq!(with_id(json!("")).subject_id(), None);
        assert_eq!(with_id(Value::Null).subject_id(), None);
    }

    #[test]
    fn cached_round_trip_keeps_ext_extras() {
        let original: VerificationResult = serde_json::from_value(json!({
            "active": true,
            "user": {"id": 7},
            "ext": {"authorized": true, "tenant": "acme"}
        }))
        .unwrap();

        let stored = serde_json::to_string(&original).unwrap();
        let restored: VerificationResult = serde_json::from_str(&stored).unwrap();

        assert_eq!(restored, original);
    }
}
