//! Build events delivered by the CI system

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::error::{RelayError, Result};

/// Terminal build statuses that produce a notification.
/// Add or remove entries here to change which transitions reach the chat channel.
pub const NOTIFY_STATUSES: [&str; 5] = [
    "SUCCESS",
    "FAILURE",
    "INTERNAL_ERROR",
    "TIMEOUT",
    "CANCELLED",
];

/// A build-status record as emitted by the CI system
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildEvent {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub project_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub log_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub substitutions: Substitutions,
}

/// Build substitutions. Only the keys the relay reads are typed, the rest are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Substitutions {
    #[serde(rename = "COMMIT_SHA", default, deserialize_with = "null_as_empty")]
    pub commit_sha: String,
    #[serde(rename = "BRANCH_NAME", default, deserialize_with = "null_as_empty")]
    pub branch_name: String,
    #[serde(rename = "REPO_NAME", default, deserialize_with = "null_as_empty")]
    pub repo_name: String,
    #[serde(rename = "TRIGGER_NAME", default, deserialize_with = "null_as_empty")]
    pub trigger_name: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl BuildEvent {
    /// Returns true if the build status is one we notify about.
    pub fn should_notify(&self) -> bool {
        should_notify(&self.status)
    }

    /// Bare repository name, taken from the last `_`-delimited segment of `REPO_NAME`.
    /// Mirrored repositories are named `<owner>_<repo>`; a name without underscores is returned whole.
    pub fn repo_name(&self) -> &str {
        bare_repo_name(&self.substitutions.repo_name)
    }

    pub fn commit_sha(&self) -> &str {
        &self.substitutions.commit_sha
    }

    pub fn branch_name(&self) -> &str {
        &self.substitutions.branch_name
    }

    pub fn trigger_name(&self) -> &str {
        &self.substitutions.trigger_name
    }
}

/// Checks membership of `status` in [`NOTIFY_STATUSES`].
pub fn should_notify(status: &str) -> bool {
    NOTIFY_STATUSES.contains(&status)
}

pub fn bare_repo_name(full_name: &str) -> &str {
    full_name.rsplit('_').next().unwrap_or(full_name)
}

/// Decode a base64-encoded JSON payload into a [`BuildEvent`].
pub fn decode_build_event(data: &str) -> Result<BuildEvent> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| RelayError::Decode(format!("payload is not valid base64: {}", e)))?;

    let json = String::from_utf8(bytes)
        .map_err(|e| RelayError::Decode(format!("payload is not valid UTF-8: {}", e)))?;

    serde_json::from_str(&json)
        .map_err(|e| RelayError::Decode(format!("payload is not a valid build event: {}", e)))
}

/// Encode a [`BuildEvent`] the way the CI system publishes it.
pub fn encode_build_event(event: &BuildEvent) -> Result<String> {
    let json = serde_json::to_vec(event)
        .map_err(|e| RelayError::Decode(format!("failed to serialize build event: {}", e)))?;
    Ok(STANDARD.encode(json))
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_json(value: serde_json::Value) -> String {
        STANDARD.encode(value.to_string())
    }

    #[test]
    fn decodes_cloud_build_payload() {
        let data = encode_json(json!({
            "id": "b1",
            "projectId": "p1",
            "status": "SUCCESS",
            "logUrl": "http://logs",
            "createTime": "2024-01-01T00:00:00Z",
            "substitutions": {
                "COMMIT_SHA": "abc123",
                "BRANCH_NAME": "main",
                "REPO_NAME": "org_repo",
                "TRIGGER_NAME": "backend",
                "SHORT_SHA": "abc"
            }
        }));

        let event = decode_build_event(&data).unwrap();
        assert_eq!(event.id, "b1");
        assert_eq!(event.project_id, "p1");
        assert_eq!(event.status, "SUCCESS");
        assert_eq!(event.log_url, "http://logs");
        assert_eq!(event.commit_sha(), "abc123");
        assert_eq!(event.branch_name(), "main");
        assert_eq!(event.trigger_name(), "backend");
        assert_eq!(event.repo_name(), "repo");
        assert_eq!(event.substitutions.extra.get("SHORT_SHA"), Some(&json!("abc")));
    }

    #[test]
    fn missing_and_null_fields_default_to_empty() {
        let data = encode_json(json!({ "status": "QUEUED", "id": null, "substitutions": null }));

        let event = decode_build_event(&data).unwrap();
        assert_eq!(event.id, "");
        assert_eq!(event.project_id, "");
        assert_eq!(event.log_url, "");
        assert_eq!(event.commit_sha(), "");
        assert_eq!(event.repo_name(), "");
    }

    #[test]
    fn rejects_invalid_base64() {
        let err = decode_build_event("not base64 at all!").unwrap_err();
        assert!(matches!(err, RelayError::Decode(_)));
    }

    #[test]
    fn rejects_invalid_json() {
        let err = decode_build_event(&STANDARD.encode("{not json")).unwrap_err();
        assert!(matches!(err, RelayError::Decode(_)));
    }

    #[test]
    fn reencoding_yields_identical_event() {
        let data = encode_json(json!({
            "id": "b2",
            "status": "FAILURE",
            "substitutions": { "REPO_NAME": "infra_marketing-site", "_CUSTOM": "x" }
        }));

        let first = decode_build_event(&data).unwrap();
        let second = decode_build_event(&encode_build_event(&first).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn derives_bare_repository_name() {
        assert_eq!(bare_repo_name("infra_marketing-site"), "marketing-site");
        assert_eq!(bare_repo_name("simplename"), "simplename");
        assert_eq!(bare_repo_name("github_acme_api"), "api");
        assert_eq!(bare_repo_name(""), "");
    }

    #[test]
    fn only_terminal_statuses_notify() {
        for status in NOTIFY_STATUSES {
            assert!(should_notify(status), "{status} should notify");
        }
        for status in ["QUEUED", "WORKING", "PENDING", "STATUS_UNKNOWN", "success", ""] {
            assert!(!should_notify(status), "{status} should be dropped");
        }
    }
}
