use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Marker in `messageType` that skips the authorization check
pub const VALIDATION_ONLY_MARKER: &str = "VALIDATION_ONLY";

/// Wire envelope shared by requests and results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueueMessage<T> {
    pub message_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<DateTime<Utc>>,
    pub data: T,
}

/// Component version tags attached to every outbound result
pub type PackageInfo = BTreeMap<String, String>;

/// Payload of an upload notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_upload_path: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tdei_project_group_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub success: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageInfo>,
}

/// Inbound unit of work; becomes the outbound result once `apply` runs
pub type UploadRequest = QueueMessage<UploadData>;

impl UploadRequest {
    pub fn is_validation_only(&self) -> bool {
        self.message_type.contains(VALIDATION_ONLY_MARKER)
    }

    /// Overwrite the result fields of the payload with a validation outcome.
    pub fn apply(&mut self, result: &ValidationResult, package: PackageInfo) {
        self.data.success = result.is_valid;
        self.data.message = result.validation_message.clone();
        self.data.package = Some(package);
    }
}

/// Outcome of one validation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub validation_message: String,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            validation_message: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            validation_message: message.into(),
        }
    }
}

/// One structural problem reported by the validation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_index: Option<u64>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub error_message: Vec<String>,
}

/// Explicit `null` reads the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Engines report either a single message or a list of them.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(message)) => vec![message],
        Some(OneOrMany::Many(messages)) => messages,
        None => Vec::new(),
    })
}
