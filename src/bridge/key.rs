use std::fmt;

/// Identifies one logical exchange: the event name the reply comes back on
/// plus the correlation id the runtime echoes in the reply metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationKey {
    pub event_name: String,
    pub request_id: String,
}

impl CorrelationKey {
    pub fn new(event_name: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            request_id: request_id.into(),
        }
    }

    /// A key can only be matched if both parts carry something besides
    /// whitespace.
    pub fn is_addressable(&self) -> bool {
        !self.event_name.trim().is_empty() && !self.request_id.trim().is_empty()
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.event_name, self.request_id)
    }
}
