//! Decides which inbound events belong to which outstanding exchange.

use tracing::trace;

use super::{
    codec::{self, Payload},
    error::BridgeResult,
    key::CorrelationKey,
};
use crate::event::InboundEvent;

/// Outcome of looking at one inbound event.
#[derive(Debug)]
pub enum Match {
    /// Not addressed to the exchange; keep listening.
    Ignored,
    /// Addressed to the exchange; holds the payload or why it was unusable.
    Candidate(BridgeResult<Payload>),
}

impl Match {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Match::Ignored)
    }
}

/// Matching rules for a single-shot request.
///
/// An event qualifies only if it arrives on the request's event name and
/// carries exactly the request's id. Events without an id, or with one that
/// is blank, are not addressed to anybody and are skipped.
pub fn match_request(key: &CorrelationKey, event: &InboundEvent) -> Match {
    if event.event_name != key.event_name {
        return Match::Ignored;
    }

    match event.id() {
        Some(id) if !id.trim().is_empty() && id == key.request_id => {
            Match::Candidate(codec::payload(event.data()))
        }
        Some(id) => {
            trace!("Ignoring {} for {}: id {:?} does not match", event.event_name, key, id);
            Match::Ignored
        }
        None => {
            trace!("Ignoring {} for {}: no id", event.event_name, key);
            Match::Ignored
        }
    }
}

/// Matching rules for a subscription: every event on the name is a
/// candidate, whatever its id.
pub fn match_subscription(event_name: &str, event: &InboundEvent) -> Match {
    if event.event_name != event_name {
        return Match::Ignored;
    }
    Match::Candidate(codec::payload(event.data()))
}
