use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::{sync::oneshot, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{
    codec::{Envelope, Payload},
    dispatcher::{DispatchGate, FixedDelay, OutboundCall, OutboundDispatcher},
    error::{BridgeError, BridgeResult},
    key::CorrelationKey,
    matcher::{self, Match},
    registry::PendingRegistry,
    subscription::Subscription,
    target::BridgeTarget,
};
use crate::{
    config::BridgeConfig,
    event::{debug_event, EventBus, EventReceiver},
    transport::Transport,
};

/// What callers of the bridge can do, independent of how it is wired.
#[async_trait]
pub trait BridgeApi: Send + Sync {
    /// Sends `target` and waits for the first reply carrying its id.
    async fn request(&self, target: &dyn BridgeTarget) -> BridgeResult<Payload>;

    /// Sends `target` without listening for any reply.
    async fn request_without_waiting_response(&self, target: &dyn BridgeTarget)
        -> BridgeResult<()>;

    /// Listens on `event_name` until the returned subscription is cancelled.
    fn stream(&self, event_name: &str) -> Subscription;

    /// Forwards an already encoded call to the transport as-is.
    async fn perform_callback(
        &self,
        event_name: &str,
        id: &str,
        encoded_request_data: &str,
    ) -> BridgeResult<()>;
}

/// # BridgeClient
///
/// Turns the fire-and-forget transport plus the broadcast bus into
/// request/response, fire-and-forget and subscription calls.
///
/// A single-shot request goes through these steps:
///
/// 1. encode the target (`InvalidRequestData` on failure)
/// 2. claim its key in the pending registry (`DuplicateRequestId` if taken)
/// 3. subscribe to the bus for the event name and start matching
/// 4. dispatch the call, which leaves only after the dispatch gate opens
/// 5. resolve with the first event carrying the id, or fail on client
///    teardown / cancellation / timeout
///
/// Clones share the same state. [`shutdown`](Self::shutdown), or dropping
/// the last clone, fails every waiting request with
/// `CallingRequestWhileClientIsDestroyed` and closes every subscription.
#[derive(Clone)]
pub struct BridgeClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    event_bus: Arc<EventBus>,
    dispatcher: OutboundDispatcher,
    pending: Arc<PendingRegistry>,
    shutdown: CancellationToken,
    request_timeout: Option<Duration>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl BridgeClient {
    /// Creates a client that holds outbound calls back for
    /// `config.dispatch_delay`.
    pub fn new(
        config: &BridgeConfig,
        event_bus: Arc<EventBus>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_gate(
            config,
            event_bus,
            transport,
            Arc::new(FixedDelay(config.dispatch_delay)),
        )
    }

    /// Creates a client with a custom [`DispatchGate`].
    pub fn with_gate(
        config: &BridgeConfig,
        event_bus: Arc<EventBus>,
        transport: Arc<dyn Transport>,
        gate: Arc<dyn DispatchGate>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                event_bus,
                dispatcher: OutboundDispatcher::new(transport, gate),
                pending: Arc::new(PendingRegistry::new()),
                shutdown: CancellationToken::new(),
                request_timeout: config.request_timeout,
            }),
        }
    }

    /// Sends `target` and waits for the first reply on its event name whose
    /// metadata id equals the target's id.
    ///
    /// # Errors
    ///
    /// * `InvalidRequestData` - the target did not encode
    /// * `DuplicateRequestId` - a request with the same key is still waiting
    /// * `ReceivedInvalidData` - the reply had no payload
    /// * `ReceivedInvalidJsonData` - the reply payload was not JSON
    /// * `CallingRequestWhileClientIsDestroyed` - the client shut down or the
    ///   request was cancelled before a reply came
    /// * `RequestTimedOut` - a request timeout is configured and elapsed
    /// * `UnknownError` - the bus failed while listening
    #[instrument(skip(self, target), fields(key = %target.key()))]
    pub async fn request(&self, target: &dyn BridgeTarget) -> BridgeResult<Payload> {
        info!("Started calling request: {:?}", target);
        let result = self.exchange(target).await;
        match &result {
            Ok(_) => info!("Completed calling request: {}", target.key()),
            Err(e) => warn!("Request {} failed: {}", target.key(), e),
        }
        result
    }

    /// [`request`](Self::request), then decodes the reply into `T`.
    ///
    /// A reply that does not fit `envelope`/`T` is `ReceivedInvalidJsonData`.
    pub async fn request_decoded<T: DeserializeOwned>(
        &self,
        target: &dyn BridgeTarget,
        envelope: Envelope,
    ) -> BridgeResult<T> {
        self.request(target).await?.decode(envelope)
    }

    /// Sends `target` right away and returns once the transport accepted it.
    /// No reply is awaited.
    #[instrument(skip(self, target), fields(key = %target.key()))]
    pub async fn request_without_waiting_response(
        &self,
        target: &dyn BridgeTarget,
    ) -> BridgeResult<()> {
        info!("Started calling request: {:?}", target);
        self.ensure_alive()?;
        let call = self.inner.dispatcher.prepare(target)?;
        self.inner.dispatcher.send_or_fail(call).await?;
        info!("Completed calling request: {}", target.key());
        Ok(())
    }

    /// Opens a subscription on `event_name`.
    pub fn stream(&self, event_name: &str) -> Subscription {
        info!("Started streaming on: {}", event_name);
        Subscription::open(
            &self.inner.event_bus,
            event_name,
            self.inner.shutdown.child_token(),
        )
    }

    /// Hands an already encoded call to the transport without delay.
    pub async fn perform_callback(
        &self,
        event_name: &str,
        id: &str,
        encoded_request_data: &str,
    ) -> BridgeResult<()> {
        let call = OutboundCall::new(
            CorrelationKey::new(event_name, id),
            encoded_request_data.to_string(),
        );
        self.inner.dispatcher.send_or_fail(call).await
    }

    /// Fails the request waiting on `key` with
    /// `CallingRequestWhileClientIsDestroyed`. Returns whether one was waiting.
    pub fn cancel_request(&self, key: &CorrelationKey) -> bool {
        self.inner.pending.cancel(key)
    }

    /// Tears the client down: waiting requests fail, subscriptions close and
    /// later calls are rejected.
    pub fn shutdown(&self) {
        let cancelled = self.inner.pending.cancel_all();
        self.inner.shutdown.cancel();
        info!("Bridge client shut down, {} pending requests cancelled", cancelled);
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Number of requests currently waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.inner.event_bus
    }

    fn ensure_alive(&self) -> BridgeResult<()> {
        if self.is_shutdown() {
            return Err(BridgeError::CallingRequestWhileClientIsDestroyed);
        }
        Ok(())
    }

    async fn exchange(&self, target: &dyn BridgeTarget) -> BridgeResult<Payload> {
        self.ensure_alive()?;
        let call = self.inner.dispatcher.prepare(target)?;
        let key = call.key().clone();

        let token = self.inner.shutdown.child_token();
        let _pending = self.inner.pending.register(&key, token.clone())?;

        // arm the listener before anything leaves
        let receiver = self.inner.event_bus.subscribe(&key.event_name);
        let (resolution, resolved) = oneshot::channel();
        let listener = Listener::spawn(key.clone(), receiver, resolution);

        self.inner.dispatcher.dispatch(call);

        let result = self.await_resolution(&key, &token, resolved).await;
        listener.release().await;
        result
    }

    async fn await_resolution(
        &self,
        key: &CorrelationKey,
        token: &CancellationToken,
        resolved: oneshot::Receiver<BridgeResult<Payload>>,
    ) -> BridgeResult<Payload> {
        let limit = self.inner.request_timeout;
        let timeout = async move {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            result = resolved => result.unwrap_or_else(|e| Err(BridgeError::unknown(e))),
            _ = token.cancelled() => {
                debug!("Request {} cancelled while awaiting reply", key);
                Err(BridgeError::CallingRequestWhileClientIsDestroyed)
            }
            _ = timeout => Err(BridgeError::RequestTimedOut {
                key: key.clone(),
                timeout_ms: limit.map(|d| d.as_millis() as u64).unwrap_or_default(),
            }),
        }
    }
}

/// Background task matching inbound events against one key.
///
/// Owns the bus subscription and the sending half of the resolution slot.
/// The slot is consumed by the first qualifying event, so a request can
/// only ever resolve once.
struct Listener {
    handle: Option<JoinHandle<()>>,
}

impl Listener {
    fn spawn(
        key: CorrelationKey,
        receiver: EventReceiver,
        resolution: oneshot::Sender<BridgeResult<Payload>>,
    ) -> Self {
        let handle = tokio::spawn(listen(key, receiver, resolution));
        Self {
            handle: Some(handle),
        }
    }

    /// Stops the task and waits until its bus subscription is gone.
    async fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn listen(
    key: CorrelationKey,
    mut receiver: EventReceiver,
    mut resolution: oneshot::Sender<BridgeResult<Payload>>,
) {
    let result = loop {
        tokio::select! {
            _ = resolution.closed() => return,
            received = receiver.recv() => match received {
                Ok(event) => {
                    debug_event("Received", &event);
                    match matcher::match_request(&key, &event) {
                        Match::Ignored => continue,
                        Match::Candidate(result) => break result,
                    }
                }
                Err(e) => break Err(BridgeError::unknown(e)),
            },
        }
    };
    if resolution.send(result).is_err() {
        debug!("Reply for {} arrived after the request ended", key);
    }
}

#[async_trait]
impl BridgeApi for BridgeClient {
    async fn request(&self, target: &dyn BridgeTarget) -> BridgeResult<Payload> {
        BridgeClient::request(self, target).await
    }

    async fn request_without_waiting_response(
        &self,
        target: &dyn BridgeTarget,
    ) -> BridgeResult<()> {
        BridgeClient::request_without_waiting_response(self, target).await
    }

    fn stream(&self, event_name: &str) -> Subscription {
        BridgeClient::stream(self, event_name)
    }

    async fn perform_callback(
        &self,
        event_name: &str,
        id: &str,
        encoded_request_data: &str,
    ) -> BridgeResult<()> {
        BridgeClient::perform_callback(self, event_name, id, encoded_request_data).await
    }
}
