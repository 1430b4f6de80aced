//! # Inbound Event Bus
//!
//! The external runtime never answers a call directly. It posts named events
//! that carry a correlation id in their metadata, and anything interested in
//! that name may observe them. This module models that medium.
//!
//! ## Architecture Overview
//!
//! - **EventBus**: Topic-keyed publish/subscribe hub backed by one tokio
//!   broadcast channel per event name
//! - **InboundEvent**: A named event with string metadata (`id`, `data`, ...)
//! - **EventReceiver**: A live subscription to one event name
//!
//! ## Event Flow
//!
//! ```text
//! ┌──────────────┐     ┌──────────┐     ┌──────────────┐
//! │ Ext. runtime │────▶│ EventBus │────▶│ EventReceiver│ (one per listener)
//! └──────────────┘     └──────────┘     └──────────────┘
//! ```
//!
//! The bus keeps no history: an event published while nobody listens on its
//! name is gone. Listeners have to be armed before the reply can arrive.
//!
//! ## Usage Examples
//!
//! ```rust,no_run
//! # use bridgekit::event::{EventBus, InboundEvent};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let event_bus = EventBus::new(16);
//! let mut receiver = event_bus.subscribe("PING");
//!
//! event_bus.publish(InboundEvent::new("PING").with_id("A1").with_data(r#"{"v":1}"#));
//!
//! let event = receiver.recv().await?;
//! assert_eq!(event.id(), Some("A1"));
//! # Ok(())
//! # }
//! ```

pub mod event_bus;

pub use event_bus::*;
