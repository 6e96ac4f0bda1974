use super::*;

use serde_json::Map;

use crate::error::BackendError;

#[tokio::test]
async fn push_returns_envelope_id_and_round_trips() {
    let queue = test_queue();

    let id = queue
        .push("EmailJob", json!({"to": "a@b.com"}), None)
        .await
        .unwrap();
    assert_eq!(id.len(), 32);

    let job = queue.pop(None).await.unwrap().expect("job should be due");
    assert_eq!(job.job_id(), id);
    assert_eq!(job.name(), "EmailJob");
    assert_eq!(job.attempts(), 0);
    assert_eq!(job.envelope().data, json!({"to": "a@b.com"}));
}

#[tokio::test]
async fn invalid_attribute_fails_before_any_backend_call() {
    let (backend, queue) = probe_queue();

    let payload = Envelope::new("X", json!(null)).to_json().unwrap();
    let options = PushOptions::default().with_attribute("retries", 5);
    let err = queue.push_raw(&payload, None, options).await.unwrap_err();

    assert!(matches!(
        err,
        QueueError::InvalidAttribute { ref key, kind: "number" } if key == "retries"
    ));
    assert!(backend.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn push_raw_without_id_is_rejected() {
    let (backend, queue) = probe_queue();

    let payload = serde_json::to_vec(&json!({"job": "X", "data": null})).unwrap();
    let err = queue
        .push_raw(&payload, None, PushOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, QueueError::MissingJobId));
    assert!(backend.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn bulk_publishes_one_envelope_per_job() {
    let queue = test_queue();

    let ids = queue
        .bulk(&["A", "B", "C"], json!({"shared": true}), None)
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);

    let mut seen = Vec::new();
    for _ in 0..3 {
        let job = queue.pop(None).await.unwrap().expect("all three are due");
        assert_eq!(job.envelope().data, json!({"shared": true}));
        seen.push((job.job_id().to_string(), job.name().to_string()));
    }
    for (id, name) in &seen {
        assert!(ids.contains(id));
        assert!(["A", "B", "C"].contains(&name.as_str()));
    }
    assert!(queue.pop(None).await.unwrap().is_none());
}

#[tokio::test]
async fn push_lazily_creates_topic_and_subscription_once() {
    let (backend, queue) = probe_queue();

    queue.push("X", json!(1), None).await.unwrap();
    assert_eq!(backend.count("create_topic"), 1);
    assert_eq!(backend.count("create_subscription"), 1);

    queue.push("X", json!(2), None).await.unwrap();
    assert_eq!(backend.count("create_topic"), 1);
    assert_eq!(backend.count("create_subscription"), 1);
}

#[tokio::test]
async fn push_propagates_not_found_when_creation_disabled() {
    let queue = test_queue_with(ConnectionConfig {
        create_topics: false,
        ..ConnectionConfig::default()
    });

    let err = queue.push("X", json!(null), None).await.unwrap_err();
    assert!(matches!(err, QueueError::Backend(BackendError::NotFound(_))));
}

#[test]
fn queue_name_applies_prefix_at_most_once() {
    let queue = test_queue_with(ConnectionConfig {
        prefix: Some("prod".to_string()),
        ..ConnectionConfig::default()
    });

    assert_eq!(queue.queue_name(Some("emails")), "prod-emails");
    assert_eq!(queue.queue_name(Some("prod-emails")), "prod-emails");
    assert_eq!(queue.queue_name(None), "prod-default");
}

#[test]
fn subscriber_table_wins_over_prefix() {
    let queue = test_queue_with(ConnectionConfig {
        prefix: Some("prod".to_string()),
        subscriber_topics: [("audit".to_string(), "audit-firehose".to_string())].into(),
        ..ConnectionConfig::default()
    });

    assert_eq!(queue.queue_name(Some("audit")), "audit-firehose");
    // A resolved table value maps to itself rather than getting prefixed.
    assert_eq!(queue.queue_name(Some("audit-firehose")), "audit-firehose");
    assert_eq!(queue.queue_name(Some("emails")), "prod-emails");
}

#[test]
fn attribute_validation_accepts_only_string_values() {
    let mut attributes = Map::new();
    attributes.insert("tenant".to_string(), json!("acme"));
    attributes.insert("region".to_string(), json!("eu"));
    let validated = validate_message_attributes(&attributes).unwrap();
    assert_eq!(validated.get("tenant").map(String::as_str), Some("acme"));
    assert_eq!(validated.len(), 2);

    for (value, kind) in [
        (json!(null), "null"),
        (json!(true), "bool"),
        (json!(3), "number"),
        (json!([1]), "array"),
        (json!({"a": 1}), "object"),
    ] {
        let mut attributes = Map::new();
        attributes.insert("bad".to_string(), value);
        let err = validate_message_attributes(&attributes).unwrap_err();
        assert!(matches!(
            err,
            QueueError::InvalidAttribute { ref key, kind: k } if key == "bad" && k == kind
        ));
    }
}
