//! # bridgekit: Request/Response over a Fire-and-Forget Event Channel
//!
//! Some embedded runtimes (game engines, native plug-ins, web views) can only
//! be talked to through named one-way events. Replies come back the same
//! way, as named events broadcast to whoever listens, with a correlation id
//! tucked into their metadata. bridgekit turns that into typed calls.
//!
//! ## Building Blocks
//!
//! - Broadcast medium for inbound events ([`event`])
//! - Outbound delivery seam ([`transport`])
//! - Correlation, codec, request and subscription lifecycles ([`bridge`])
//! - Settings ([`config`]) and errors ([`error`])
//!
//! ## Exchange Shapes
//!
//! ```text
//! request                     caller ──call──▶ runtime ──reply(id)──▶ caller   (exactly once)
//! request_without_waiting     caller ──call──▶ runtime                         (no reply)
//! stream                      runtime ──event──▶ runtime ──event──▶ ... ──▶ caller (until cancelled)
//! ```
//!
//! Failures always come back as a [`bridge::BridgeError`], never as a panic
//! or an untyped error.

pub mod bridge;
pub mod config;
pub mod error;
pub mod event;
pub mod transport;

// Re-exports
pub use bridge::{
    BridgeApi, BridgeClient, BridgeError, BridgeResult, BridgeTarget, CorrelationKey, Envelope,
    ParameterValue, Parameters, Payload, Subscription, Target,
};
pub use error::*;
