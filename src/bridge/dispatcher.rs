//! # Outbound Dispatcher
//!
//! Encodes a target into an [`OutboundCall`] and hands it to the transport.
//!
//! The inbound bus keeps no history, so a reply that arrives before the
//! requester listens is lost. The dispatcher is only ever invoked after the
//! listener is armed, and in addition every send first passes a
//! [`DispatchGate`]. The default gate is a short fixed delay; a transport
//! that can acknowledge listener readiness can plug in a real handshake.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::{
    codec,
    error::{BridgeError, BridgeResult},
    key::CorrelationKey,
    target::BridgeTarget,
};
use crate::transport::{Transport, TransportResult};

/// One encoded call on its way to the external runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCall {
    key: CorrelationKey,
    encoded_parameters: String,
}

impl OutboundCall {
    pub fn new(key: CorrelationKey, encoded_parameters: String) -> Self {
        Self {
            key,
            encoded_parameters,
        }
    }

    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    pub fn event_name(&self) -> &str {
        &self.key.event_name
    }

    pub fn id(&self) -> &str {
        &self.key.request_id
    }

    pub fn encoded_parameters(&self) -> &str {
        &self.encoded_parameters
    }
}

/// Waits until it is safe to let a call leave.
#[async_trait]
pub trait DispatchGate: Send + Sync {
    async fn ready(&self, key: &CorrelationKey);
}

/// Holds every call back for a fixed duration.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

#[async_trait]
impl DispatchGate for FixedDelay {
    async fn ready(&self, _key: &CorrelationKey) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

/// Lets every call through at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

#[async_trait]
impl DispatchGate for Immediate {
    async fn ready(&self, _key: &CorrelationKey) {}
}

#[derive(Clone)]
pub struct OutboundDispatcher {
    transport: Arc<dyn Transport>,
    gate: Arc<dyn DispatchGate>,
}

impl OutboundDispatcher {
    pub fn new(transport: Arc<dyn Transport>, gate: Arc<dyn DispatchGate>) -> Self {
        Self { transport, gate }
    }

    /// Encodes `target`. Nothing is sent yet.
    pub fn prepare(&self, target: &dyn BridgeTarget) -> BridgeResult<OutboundCall> {
        let encoded = codec::encode_target(target)?;
        Ok(OutboundCall::new(target.key(), encoded))
    }

    /// Sends `call` in the background once the gate opens.
    ///
    /// A failed send is only logged: the requester finds out through the
    /// missing reply, exactly as if the runtime had dropped the call.
    pub fn dispatch(&self, call: OutboundCall) -> JoinHandle<()> {
        let transport = self.transport.clone();
        let gate = self.gate.clone();
        tokio::spawn(async move {
            gate.ready(call.key()).await;
            let key = call.key().clone();
            debug!("Dispatching {}", key);
            if let Err(e) = transport.send(call).await {
                warn!("Dispatch of {} failed: {}", key, e);
            }
        })
    }

    /// Sends `call` right away and reports the transport outcome.
    #[instrument(skip(self, call), fields(key = %call.key()))]
    pub async fn send_now(&self, call: OutboundCall) -> TransportResult<()> {
        self.transport.send(call).await
    }

    /// Like [`send_now`](Self::send_now), failures wrapped as `UnknownError`.
    pub async fn send_or_fail(&self, call: OutboundCall) -> BridgeResult<()> {
        self.send_now(call).await.map_err(BridgeError::unknown)
    }
}
