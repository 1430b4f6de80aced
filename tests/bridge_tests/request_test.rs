use std::{sync::Arc, time::Duration};

use bridgekit::{
    config::BridgeConfig,
    event::{EventBus, InboundEvent},
    transport::{CallbackTransport, MockTransport},
    BridgeClient, BridgeError, BridgeTarget, CorrelationKey, Envelope, ParameterValue, Parameters,
    Target,
};
use pretty_assertions::assert_eq;
use serde::Deserialize;
use tokio::time::{sleep, timeout};

use super::{harness, harness_with_config, reply, test_config};

#[derive(Debug, Deserialize, PartialEq)]
struct TestModel {
    title: String,
    value: i64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Versioned {
    v: i64,
}

#[tokio::test]
async fn test_request_resolves_with_matching_reply() {
    let h = harness(|call| vec![reply(call, r#"{"v":1}"#)]);

    let payload = h
        .client
        .request(&Target::new("PING").with_id("A1"))
        .await
        .unwrap();

    assert_eq!(payload.as_str(), r#"{"v":1}"#);
    assert_eq!(payload.decode::<Versioned>(Envelope::None).unwrap(), Versioned { v: 1 });
    assert_eq!(h.client.pending_requests(), 0);
    assert_eq!(h.bus.subscribers_size("PING"), 0);
}

#[tokio::test]
async fn test_request_decoded_with_data_envelope() {
    let h = harness(|call| {
        vec![reply(
            call,
            r#"
            {
                "data": {
                  "title": "tests_structure",
                  "value": 100
                }
            }
            "#,
        )]
    });
    let target = Target::new("TEST_REQUEST_DATA")
        .with_id("TEST_REQUEST_DATA")
        .parameter("parameter1", "value1")
        .parameter("parameter2", 2);

    let model: TestModel = h
        .client
        .request_decoded(&target, Envelope::Data)
        .await
        .unwrap();

    assert_eq!(
        model,
        TestModel {
            title: "tests_structure".to_string(),
            value: 100
        }
    );

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].event_name(), "TEST_REQUEST_DATA");
    assert_eq!(sent[0].id(), "TEST_REQUEST_DATA");
    assert_eq!(
        sent[0].encoded_parameters(),
        r#"{"eventName":"TEST_REQUEST_DATA","id":"TEST_REQUEST_DATA","parameters":{"parameter1":"value1","parameter2":2}}"#
    );
}

#[tokio::test]
async fn test_request_ignores_other_and_missing_ids() {
    let h = harness(|call| {
        vec![
            InboundEvent::new(call.event_name()).with_data(r#"{"v":0}"#),
            InboundEvent::new(call.event_name())
                .with_id("B2")
                .with_data(r#"{"v":2}"#),
            InboundEvent::new("OTHER")
                .with_id(call.id())
                .with_data(r#"{"v":3}"#),
            reply(call, r#"{"v":1}"#),
        ]
    });

    let value: Versioned = h
        .client
        .request_decoded(&Target::new("PING").with_id("A1"), Envelope::None)
        .await
        .unwrap();
    assert_eq!(value, Versioned { v: 1 });
}

#[tokio::test]
async fn test_wrong_id_leaves_request_pending_until_cancelled() {
    let h = harness(|call| {
        vec![InboundEvent::new(call.event_name())
            .with_id("B2")
            .with_data(r#"{"v":1}"#)]
    });
    let client = h.client.clone();

    let request =
        tokio::spawn(async move { client.request(&Target::new("PING").with_id("A1")).await });

    sleep(Duration::from_millis(100)).await;
    assert!(!request.is_finished());
    assert_eq!(h.client.pending_requests(), 1);
    assert_eq!(h.bus.subscribers_size("PING"), 1);

    assert!(h.client.cancel_request(&CorrelationKey::new("PING", "A1")));
    let result = timeout(Duration::from_secs(1), request)
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(
        result,
        Err(BridgeError::CallingRequestWhileClientIsDestroyed)
    ));
    assert_eq!(h.client.pending_requests(), 0);
    assert_eq!(h.bus.subscribers_size("PING"), 0);
    assert!(!h.client.cancel_request(&CorrelationKey::new("PING", "A1")));
}

#[tokio::test]
async fn test_concurrent_requests_do_not_cross_resolve() {
    // B's reply goes out first, then A's, both on the same event name
    let h = harness(|call| {
        let other = if call.id() == "A" { "B" } else { "A" };
        vec![
            InboundEvent::new(call.event_name())
                .with_id(other)
                .with_data(format!(r#"{{"for":"{}"}}"#, other)),
            reply(call, &format!(r#"{{"for":"{}"}}"#, call.id())),
        ]
    });

    let a = Target::new("PING").with_id("A");
    let b = Target::new("PING").with_id("B");
    let (ra, rb) = tokio::join!(h.client.request(&a), h.client.request(&b));

    assert_eq!(ra.unwrap().to_value().unwrap()["for"], "A");
    assert_eq!(rb.unwrap().to_value().unwrap()["for"], "B");
}

#[tokio::test]
async fn test_matching_reply_without_payload_is_invalid_data() {
    let h = harness(|call| vec![InboundEvent::new(call.event_name()).with_id(call.id())]);

    let result = h.client.request(&Target::new("PING").with_id("A1")).await;
    assert!(matches!(result, Err(BridgeError::ReceivedInvalidData)));

    let h = harness(|call| vec![reply(call, "")]);
    let result = h.client.request(&Target::new("PING").with_id("A1")).await;
    assert!(matches!(result, Err(BridgeError::ReceivedInvalidData)));
}

#[tokio::test]
async fn test_matching_reply_with_garbage_keeps_content() {
    let h = harness(|call| vec![reply(call, "<html>oops</html>")]);

    match h.client.request(&Target::new("PING").with_id("A1")).await {
        Err(BridgeError::ReceivedInvalidJsonData { content }) => {
            assert_eq!(content, "<html>oops</html>")
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_schema_mismatch_is_invalid_json() {
    let h = harness(|call| vec![reply(call, r#"{"data": {"title": 1}}"#)]);

    let result = h
        .client
        .request_decoded::<TestModel>(&Target::new("PING").with_id("A1"), Envelope::Data)
        .await;
    assert!(matches!(
        result,
        Err(BridgeError::ReceivedInvalidJsonData { content }) if content == r#"{"data": {"title": 1}}"#
    ));
}

#[tokio::test]
async fn test_invalid_parameters_never_reach_transport() {
    let mut transport = MockTransport::new();
    transport.expect_send().times(0);
    let bus = Arc::new(EventBus::new(8));
    let client = BridgeClient::new(&test_config(), bus.clone(), Arc::new(transport));

    let target = Target::new("PING")
        .with_id("A1")
        .parameter("ratio", f64::NAN);
    let result = client.request(&target).await;

    assert!(matches!(
        result,
        Err(BridgeError::InvalidRequestData { ref key, .. }) if *key == target.key()
    ));
    assert_eq!(client.pending_requests(), 0);
    assert_eq!(bus.subscribers_size("PING"), 0);
}

#[tokio::test]
async fn test_empty_id_is_invalid_request() {
    let h = harness(|_| vec![]);
    let result = h.client.request(&Target::new("PING").with_id("")).await;
    assert!(matches!(result, Err(BridgeError::InvalidRequestData { .. })));
    assert!(h.sent().is_empty());
}

#[tokio::test]
async fn test_duplicate_in_flight_id_is_rejected() {
    let h = harness(|_| vec![]);
    let client = h.client.clone();
    let first =
        tokio::spawn(async move { client.request(&Target::new("PING").with_id("A1")).await });
    sleep(Duration::from_millis(30)).await;

    let second = h.client.request(&Target::new("PING").with_id("A1")).await;
    assert!(matches!(
        second,
        Err(BridgeError::DuplicateRequestId(key)) if key == CorrelationKey::new("PING", "A1")
    ));

    // the first one is untouched and can still be answered
    h.bus
        .publish(InboundEvent::new("PING").with_id("A1").with_data("true"));
    let first = timeout(Duration::from_secs(1), first)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(first.as_str(), "true");

    // the id is free again once the first exchange resolved
    let client = h.client.clone();
    let again =
        tokio::spawn(async move { client.request(&Target::new("PING").with_id("A1")).await });
    sleep(Duration::from_millis(30)).await;
    h.bus
        .publish(InboundEvent::new("PING").with_id("A1").with_data("1"));
    assert!(timeout(Duration::from_secs(1), again)
        .await
        .unwrap()
        .unwrap()
        .is_ok());
}

#[tokio::test]
async fn test_shutdown_fails_waiting_and_later_requests() {
    let h = harness(|_| vec![]);
    let client = h.client.clone();
    let waiting =
        tokio::spawn(async move { client.request(&Target::new("PING").with_id("A1")).await });
    sleep(Duration::from_millis(30)).await;

    h.client.shutdown();
    assert!(h.client.is_shutdown());

    let result = timeout(Duration::from_secs(1), waiting)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        result,
        Err(BridgeError::CallingRequestWhileClientIsDestroyed)
    ));
    assert_eq!(h.bus.subscribers_size("PING"), 0);

    let later = h.client.request(&Target::new("PING").with_id("A2")).await;
    assert!(matches!(
        later,
        Err(BridgeError::CallingRequestWhileClientIsDestroyed)
    ));
}

#[tokio::test]
async fn test_request_timeout() {
    let config = BridgeConfig {
        request_timeout: Some(Duration::from_millis(50)),
        ..test_config()
    };
    let h = harness_with_config(&config, |_| vec![]);

    let result = h.client.request(&Target::new("PING").with_id("A1")).await;
    assert!(matches!(
        result,
        Err(BridgeError::RequestTimedOut { timeout_ms: 50, .. })
    ));
    assert_eq!(h.client.pending_requests(), 0);
}

#[tokio::test]
async fn test_abandoned_request_releases_listener() {
    let h = harness(|_| vec![]);

    let abandoned = timeout(
        Duration::from_millis(50),
        h.client.request(&Target::new("PING").with_id("A1")),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(h.client.pending_requests(), 0);

    sleep(Duration::from_millis(20)).await;
    assert_eq!(h.bus.subscribers_size("PING"), 0);
}

#[tokio::test]
async fn test_listener_is_armed_before_an_immediate_reply() {
    // the runtime answers synchronously inside send, with no dispatch delay
    let config = BridgeConfig {
        dispatch_delay: Duration::ZERO,
        ..BridgeConfig::default()
    };
    let h = harness_with_config(&config, |call| vec![reply(call, "42")]);

    let value: i64 = timeout(
        Duration::from_secs(1),
        h.client
            .request_decoded(&Target::new("PING").with_id("A1"), Envelope::None),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(value, 42);
}

#[tokio::test]
async fn test_send_is_delayed_after_listening_starts() {
    let config = BridgeConfig {
        dispatch_delay: Duration::from_millis(100),
        ..BridgeConfig::default()
    };
    let bus = Arc::new(EventBus::new(8));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let transport = CallbackTransport::new(move |call| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(call);
            Ok(())
        }
    });
    let client = BridgeClient::new(&config, bus.clone(), Arc::new(transport));

    let started = tokio::time::Instant::now();
    let waiting = {
        let client = client.clone();
        tokio::spawn(async move { client.request(&Target::new("PING").with_id("A1")).await })
    };

    let call = rx.recv().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(bus.subscribers_size("PING"), 1);

    bus.publish(
        InboundEvent::new("PING")
            .with_id(call.id())
            .with_data(r#"{"ok":true}"#),
    );
    let payload = waiting.await.unwrap().unwrap();
    assert_eq!(payload.to_value().unwrap()["ok"], true);
}

#[tokio::test]
async fn test_parameters_survive_the_transport() {
    // the runtime echoes the encoded call back as the reply
    let h = harness(|call| vec![reply(call, call.encoded_parameters())]);

    let mut nested = Parameters::new();
    nested.insert("depth".to_string(), 2.into());
    nested.insert(
        "list".to_string(),
        ParameterValue::List(vec![1.into(), 2.5.into(), "three".into(), true.into()]),
    );
    let target = Target::new("ECHO")
        .parameter("name", "bridge")
        .parameter("nested", ParameterValue::Map(nested));

    let echoed: Parameters = h
        .client
        .request_decoded(&target, Envelope::Parameters)
        .await
        .unwrap();
    assert_eq!(Some(&echoed), target.parameters());
}
