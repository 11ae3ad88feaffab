use serde::{Deserialize, Serialize};

/// Error code carried by every envelope. Upstream status is kept separately in `status`.
pub const ENVELOPE_ERROR_CODE: u16 = 500;

/// Structured form of a remote failure other than "resource absent".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("remote error {status} {reason}: {message}")]
pub struct ErrorEnvelope {
    pub error_code: u16,
    pub status: u16,
    pub reason: String,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(status: u16, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self { error_code: ENVELOPE_ERROR_CODE, status, reason: reason.into(), message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_keys() {
        let env = ErrorEnvelope::new(422, "Invalid", "spec.schedule: Invalid value");
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"errorCode": 500, "status": 422, "reason": "Invalid", "message": "spec.schedule: Invalid value"})
        );
    }
}
