use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    error::{BridgeError, BridgeResult},
    key::CorrelationKey,
};

/// In-flight single-shot requests, keyed by (event name, id).
///
/// Each entry holds the cancellation token of the request awaiting that
/// key. Entries are inserted when the request is dispatched and removed by
/// [`PendingGuard`] however the request ends.
#[derive(Default)]
pub struct PendingRegistry {
    pending: DashMap<CorrelationKey, CancellationToken>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key` for one request.
    ///
    /// # Errors
    ///
    /// `DuplicateRequestId` if another request is still waiting on `key`.
    pub fn register(
        self: &Arc<Self>,
        key: &CorrelationKey,
        token: CancellationToken,
    ) -> BridgeResult<PendingGuard> {
        match self.pending.entry(key.clone()) {
            Entry::Occupied(_) => return Err(BridgeError::DuplicateRequestId(key.clone())),
            Entry::Vacant(entry) => {
                entry.insert(token);
            }
        }
        debug!("Registered pending request {}", key);
        Ok(PendingGuard {
            registry: self.clone(),
            key: key.clone(),
        })
    }

    /// Cancels the request waiting on `key`. Returns whether there was one.
    pub fn cancel(&self, key: &CorrelationKey) -> bool {
        match self.pending.get(key) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every waiting request and returns how many there were.
    pub fn cancel_all(&self) -> usize {
        let mut count = 0;
        for entry in self.pending.iter() {
            entry.value().cancel();
            count += 1;
        }
        count
    }

    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Removes its key from the registry when dropped.
pub struct PendingGuard {
    registry: Arc<PendingRegistry>,
    key: CorrelationKey,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.registry.pending.remove(&self.key);
        debug!("Released pending request {}", self.key);
    }
}
