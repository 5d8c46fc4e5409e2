use serde::{Deserialize, Serialize};

/// Body returned by the remote services alongside a non-success status.
///
/// Services disagree on whether the text lives under `error` or `message`,
/// so both are accepted and `error` wins when both are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn into_message(self) -> Option<String> {
        self.error
            .or(self.message)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }
}
