use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{future, stream::BoxStream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    codec::{Envelope, Payload},
    matcher::{self, Match},
};
use crate::event::{debug_event, EventBus};

/// A long-lived listener on one event name.
///
/// Yields one item per inbound event on that name, in delivery order. An
/// event whose payload is missing or is not JSON yields `None`; it never
/// ends the stream. The stream ends only when it is cancelled, dropped, or
/// the owning client shuts down, and each of those releases the bus
/// subscription.
pub struct Subscription {
    event_name: String,
    inner: Option<BoxStream<'static, Option<Payload>>>,
    token: CancellationToken,
}

impl Subscription {
    pub(crate) fn open(event_bus: &EventBus, event_name: &str, token: CancellationToken) -> Self {
        let receiver = event_bus.subscribe(event_name);
        let name = event_name.to_string();

        let items = BroadcastStream::new(receiver.receiver)
            .filter_map(move |received| {
                let item = match received {
                    Ok(event) => {
                        debug_event("Received", &event);
                        match matcher::match_subscription(&name, &event) {
                            Match::Ignored => None,
                            Match::Candidate(Ok(payload)) => Some(Some(payload)),
                            Match::Candidate(Err(e)) => {
                                warn!("Undecodable event on {}: {}", name, e);
                                Some(None)
                            }
                        }
                    }
                    Err(BroadcastStreamRecvError::Lagged(count)) => {
                        warn!("Subscription on {} lagged, skipped {} events", name, count);
                        None
                    }
                };
                future::ready(item)
            })
            .take_until(token.clone().cancelled_owned())
            .boxed();

        debug!("Opened subscription on {}", event_name);
        Self {
            event_name: event_name.to_string(),
            inner: Some(items),
            token,
        }
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Stops the subscription. Items not yet consumed are discarded and the
    /// bus subscription is released before this returns.
    pub fn cancel(&mut self) {
        self.token.cancel();
        if self.inner.take().is_some() {
            debug!("Cancelled subscription on {}", self.event_name);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none() || self.token.is_cancelled()
    }

    /// Decodes every item into `T`, unwrapping `envelope` first. Items that
    /// do not decode become `None`.
    pub fn decoded<T>(self, envelope: Envelope) -> impl Stream<Item = Option<T>> + Send + Unpin
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.map(move |item| item.and_then(|payload| payload.decode(envelope).ok()))
    }
}

impl Stream for Subscription {
    type Item = Option<Payload>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match inner.poll_next_unpin(cx) {
            Poll::Ready(None) => {
                // release the receiver as soon as the stream is exhausted
                self.inner = None;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event_name", &self.event_name)
            .field("closed", &self.is_closed())
            .finish()
    }
}
