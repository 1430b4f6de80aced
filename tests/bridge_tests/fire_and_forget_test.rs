use std::sync::Arc;

use bridgekit::{
    event::EventBus,
    transport::{MockTransport, TransportError},
    BridgeApi, BridgeClient, BridgeError, Target,
};

use super::{harness, test_config};

#[tokio::test]
async fn test_fire_and_forget_sends_without_listening() {
    let h = harness(|_| vec![]);

    h.client
        .request_without_waiting_response(&Target::new("LOG").with_id("L1").parameter("level", "info"))
        .await
        .unwrap();

    // sent immediately, no reply listener left behind
    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].encoded_parameters(),
        r#"{"eventName":"LOG","id":"L1","parameters":{"level":"info"}}"#
    );
    assert_eq!(h.bus.subscribers_size("LOG"), 0);
    assert_eq!(h.client.pending_requests(), 0);
}

#[tokio::test]
async fn test_fire_and_forget_transport_failure_is_unknown_error() {
    let mut transport = MockTransport::new();
    transport.expect_send().times(1).returning(|_| {
        Err(TransportError::SendFailed {
            message: "runtime not loaded".to_string(),
        })
    });
    let client = BridgeClient::new(&test_config(), Arc::new(EventBus::new(8)), Arc::new(transport));

    let result = client
        .request_without_waiting_response(&Target::new("LOG").with_id("L1"))
        .await;

    match result {
        Err(BridgeError::UnknownError(cause)) => {
            assert!(cause.to_string().contains("runtime not loaded"))
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_fire_and_forget_invalid_parameters() {
    let mut transport = MockTransport::new();
    transport.expect_send().times(0);
    let client = BridgeClient::new(&test_config(), Arc::new(EventBus::new(8)), Arc::new(transport));

    let result = client
        .request_without_waiting_response(
            &Target::new("LOG")
                .with_id("L1")
                .parameter("values", vec![1.0, f64::INFINITY]),
        )
        .await;
    assert!(matches!(result, Err(BridgeError::InvalidRequestData { .. })));
}

#[tokio::test]
async fn test_fire_and_forget_after_shutdown() {
    let h = harness(|_| vec![]);
    h.client.shutdown();

    let result = h
        .client
        .request_without_waiting_response(&Target::new("LOG").with_id("L1"))
        .await;
    assert!(matches!(
        result,
        Err(BridgeError::CallingRequestWhileClientIsDestroyed)
    ));
    assert!(h.sent().is_empty());
}

#[tokio::test]
async fn test_perform_callback_forwards_encoded_data() {
    let h = harness(|_| vec![]);
    let api: &dyn BridgeApi = &h.client;

    api.perform_callback("RAW", "R1", r#"{"already":"encoded"}"#)
        .await
        .unwrap();

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event_name(), "RAW");
    assert_eq!(sent[0].id(), "R1");
    assert_eq!(sent[0].encoded_parameters(), r#"{"already":"encoded"}"#);
}
