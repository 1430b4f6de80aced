//! # Event-Correlation Bridge
//!
//! The external runtime only understands named, fire-and-forget events. It
//! answers by posting another named event whose metadata carries the
//! correlation id of the call it answers. This module turns that into three
//! caller-facing shapes:
//!
//! - [`BridgeClient::request`]: one call, one reply, resolved exactly once
//! - [`BridgeClient::request_without_waiting_response`]: one call, no reply
//! - [`BridgeClient::stream`]: every event on a name until cancelled
//!
//! ## Data Flow
//!
//! ```text
//! caller ──▶ codec::encode ──▶ OutboundDispatcher ──(gate)──▶ Transport ──▶ runtime
//!                                                                         │
//! caller ◀── Payload ◀── matcher ◀── EventReceiver ◀── EventBus ◀─────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use bridgekit::bridge::{BridgeClient, Envelope, Target};
//! # use bridgekit::config::BridgeConfig;
//! # use bridgekit::event::{EventBus, InboundEvent};
//! # use bridgekit::transport::CallbackTransport;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let event_bus = Arc::new(EventBus::new(16));
//! let echo_bus = event_bus.clone();
//! let transport = CallbackTransport::new(move |call| {
//!     let echo_bus = echo_bus.clone();
//!     async move {
//!         echo_bus.publish(
//!             InboundEvent::new(call.event_name())
//!                 .with_id(call.id())
//!                 .with_data(r#"{"data": {"v": 1}}"#),
//!         );
//!         Ok(())
//!     }
//! });
//!
//! let client = BridgeClient::new(&BridgeConfig::default(), event_bus, Arc::new(transport));
//! let value: serde_json::Value = client
//!     .request_decoded(&Target::new("PING").with_id("A1"), Envelope::Data)
//!     .await?;
//! assert_eq!(value["v"], 1);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod key;
pub mod matcher;
pub mod registry;
pub mod subscription;
pub mod target;
pub mod value;

pub use client::{BridgeApi, BridgeClient};
pub use codec::{Envelope, Payload};
pub use dispatcher::{DispatchGate, FixedDelay, Immediate, OutboundCall, OutboundDispatcher};
pub use error::{BridgeError, BridgeResult};
pub use key::CorrelationKey;
pub use subscription::Subscription;
pub use target::{BridgeTarget, Target};
pub use value::{ParameterValue, Parameters};
