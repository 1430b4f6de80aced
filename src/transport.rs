//! # Transport
//!
//! The one-way channel towards the external runtime. A transport gets an
//! [`OutboundCall`] and makes at most one attempt to deliver it; it never
//! reports whether anyone on the other side is ready to answer.

use std::{fmt, future::Future, pin::Pin, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::bridge::OutboundCall;

#[mockall::automock]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, call: OutboundCall) -> TransportResult<()>;
}

type CallbackFuture = Pin<Box<dyn Future<Output = TransportResult<()>> + Send>>;

/// Adapts an async closure into a [`Transport`].
///
/// ```rust,no_run
/// use bridgekit::transport::CallbackTransport;
/// let transport = CallbackTransport::new(|call| async move {
///     println!("-> {} {}", call.event_name(), call.encoded_parameters());
///     Ok(())
/// });
/// ```
#[derive(Clone)]
pub struct CallbackTransport {
    callback: Arc<dyn Fn(OutboundCall) -> CallbackFuture + Send + Sync>,
}

impl CallbackTransport {
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(OutboundCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TransportResult<()>> + Send + 'static,
    {
        Self {
            callback: Arc::new(move |call| Box::pin(callback(call))),
        }
    }
}

impl fmt::Debug for CallbackTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for CallbackTransport {
    async fn send(&self, call: OutboundCall) -> TransportResult<()> {
        (self.callback)(call).await
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport send failed: {message}")]
    SendFailed { message: String },
    #[error("Transport unavailable")]
    Unavailable,
}

pub type TransportResult<T> = Result<T, TransportError>;
