use thiserror::Error;

use super::key::CorrelationKey;

/// Why an exchange with the external runtime failed.
///
/// Every public bridge operation reports failures through this type so the
/// caller can branch on the cause.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The outbound parameters could not be encoded. Retrying with the same
    /// input fails again.
    #[error("Invalid request data for {key}: {reason}")]
    InvalidRequestData { key: CorrelationKey, reason: String },

    /// A reply addressed to us carried no payload.
    #[error("Received invalid data")]
    ReceivedInvalidData,

    /// A reply carried a payload that did not decode.
    #[error("Received invalid JSON data: {content}")]
    ReceivedInvalidJsonData { content: String },

    #[error("Calling request while client is destroyed")]
    CallingRequestWhileClientIsDestroyed,

    /// Another request with the same key is still waiting for its reply.
    #[error("Request already in flight: {0}")]
    DuplicateRequestId(CorrelationKey),

    #[error("Request timed out: {key} after {timeout_ms}ms")]
    RequestTimedOut { key: CorrelationKey, timeout_ms: u64 },

    #[error("Unknown error: {0}")]
    UnknownError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl BridgeError {
    pub fn unknown<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        BridgeError::UnknownError(Box::new(error))
    }

    pub(crate) fn invalid_request(key: &CorrelationKey, reason: impl ToString) -> Self {
        BridgeError::InvalidRequestData {
            key: key.clone(),
            reason: reason.to_string(),
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
