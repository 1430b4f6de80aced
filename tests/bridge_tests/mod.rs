mod fire_and_forget_test;
mod request_test;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use bridgekit::{
    bridge::OutboundCall,
    config::BridgeConfig,
    event::{EventBus, InboundEvent},
    transport::CallbackTransport,
    BridgeClient,
};

/// A client wired to a fake runtime that answers every call with whatever
/// `responder` returns.
pub struct Harness {
    pub bus: Arc<EventBus>,
    pub client: BridgeClient,
    pub sent: Arc<Mutex<Vec<OutboundCall>>>,
}

impl Harness {
    pub fn sent(&self) -> Vec<OutboundCall> {
        self.sent.lock().unwrap().clone()
    }
}

pub fn test_config() -> BridgeConfig {
    BridgeConfig {
        dispatch_delay: Duration::from_millis(10),
        ..Default::default()
    }
}

pub fn harness<F>(responder: F) -> Harness
where
    F: Fn(&OutboundCall) -> Vec<InboundEvent> + Send + Sync + 'static,
{
    harness_with_config(&test_config(), responder)
}

pub fn harness_with_config<F>(config: &BridgeConfig, responder: F) -> Harness
where
    F: Fn(&OutboundCall) -> Vec<InboundEvent> + Send + Sync + 'static,
{
    let bus = Arc::new(EventBus::new(config.event_buffer_size));
    let sent = Arc::new(Mutex::new(Vec::new()));
    let responder = Arc::new(responder);

    let transport = {
        let bus = bus.clone();
        let sent = sent.clone();
        CallbackTransport::new(move |call: OutboundCall| {
            let bus = bus.clone();
            let sent = sent.clone();
            let responder = responder.clone();
            async move {
                for event in responder(&call) {
                    bus.publish(event);
                }
                sent.lock().unwrap().push(call);
                Ok(())
            }
        })
    };

    let client = BridgeClient::new(config, bus.clone(), Arc::new(transport));
    Harness { bus, client, sent }
}

/// Answers a call with `data` under the call's own id.
pub fn reply(call: &OutboundCall, data: &str) -> InboundEvent {
    InboundEvent::new(call.event_name())
        .with_id(call.id())
        .with_data(data)
}
