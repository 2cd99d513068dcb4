// SPDX-License-Identifier: MIT OR Apache-2.0

#[path = "common/mod.rs"]
mod common;

use bson::doc;
use common::{messages, payloads, processor, result_json, FaultyStore};
use docflux::core::config::ProcessorConfig;
use docflux::core::error::{MappingError, ProcessError, StoreError};
use docflux::core::processor::{MappingSlot, MarshalMode, Message, OperationKind};
use docflux::core::store::MemoryStore;
use docflux::core::util::{CancelReason, CancellationSignal};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn config_for(kind: OperationKind) -> ProcessorConfig {
    let config = ProcessorConfig::new(kind, "c").with_filter_map("root.k = this.k");
    match kind {
        OperationKind::InsertOne => ProcessorConfig::new(kind, "c").with_document_map("root = this"),
        OperationKind::DeleteOne | OperationKind::DeleteMany | OperationKind::FindOne => config,
        OperationKind::ReplaceOne => config.with_document_map("root.k = this.k"),
        OperationKind::UpdateOne | OperationKind::FindAndUpdate => {
            config.with_document_map(r#"root."$set".seen = true"#)
        }
    }
}

#[tokio::test]
async fn batch_shape_is_preserved_for_every_operation() {
    for kind in OperationKind::ALL {
        for size in [0usize, 1, 2, 7, 100] {
            let store = Arc::new(MemoryStore::new());
            store
                .seed("c", (0..size as i32).step_by(2).map(|k| doc! {"k": k}))
                .await
                .unwrap();
            let processor = processor(config_for(kind).with_max_in_flight(4), store);

            let input: Vec<Message> = (0..size)
                .map(|k| Message::new(format!(r#"{{"k":{}}}"#, k)).with_metadata("index", k.to_string()))
                .collect();
            let out = processor.process_batch(input).await;

            assert_eq!(out.len(), size, "{} with {} messages", kind, size);
            for (k, message) in out.iter().enumerate() {
                assert_eq!(message.meta("index"), Some(k.to_string().as_str()));
                match message.error() {
                    Some(ProcessError::NoDocuments) => {
                        assert!(kind.returns_document());
                        assert_eq!(message.payload_str(), format!(r#"{{"k":{}}}"#, k));
                    }
                    Some(other) => panic!("{} message {} failed: {}", kind, k, other),
                    None if kind.returns_document() => {
                        assert_eq!(result_json(message)["k"], json!({"$numberInt": k.to_string()}));
                    }
                    None => assert_eq!(message.payload_str(), format!(r#"{{"k":{}}}"#, k)),
                }
            }
        }
    }
}

#[tokio::test]
async fn mapping_failures_are_isolated() {
    let store = Arc::new(MemoryStore::new());
    let config = ProcessorConfig::new(OperationKind::InsertOne, "c").with_document_map("root = this.doc");
    let processor = processor(config, store.clone());

    let out = processor
        .process_batch(messages(&[
            r#"{"doc":{"a":1}}"#,
            "not json",
            r#"{"doc":[1,2]}"#,
            r#"{"doc":{"a":2}}"#,
        ]))
        .await;

    assert!(!out[0].is_error());
    assert!(matches!(
        out[1].error(),
        Some(ProcessError::Mapping(MappingError::InvalidInput(_)))
    ));
    assert_eq!(
        out[2].error(),
        Some(&ProcessError::Mapping(MappingError::NotADocument {
            slot: MappingSlot::Document,
            found: "array".to_string(),
        }))
    );
    assert!(!out[3].is_error());
    assert_eq!(payloads(&out)[1], "not json");
    assert_eq!(store.documents("c").await.len(), 2);
}

#[tokio::test]
async fn store_failures_are_isolated() {
    let store = Arc::new(FaultyStore::new());
    let config = ProcessorConfig::new(OperationKind::InsertOne, "c").with_document_map("root = this");
    let processor = processor(config, store.clone());

    let out = processor
        .process_batch(messages(&[r#"{"a":1}"#, r#"{"a":2,"fail":true}"#, r#"{"a":3}"#]))
        .await;

    assert!(!out[0].is_error());
    match out[1].error() {
        Some(ProcessError::Database(err @ StoreError::Connection(_))) => assert!(err.is_retriable()),
        other => panic!("expected connection error, got {:?}", other),
    }
    assert!(!out[2].is_error());
    assert_eq!(store.inner.documents("c").await.len(), 2);
}

#[tokio::test]
async fn collection_interpolation_targets_each_message_collection() {
    let store = Arc::new(MemoryStore::new());
    let config = ProcessorConfig::new(OperationKind::InsertOne, "${! this.tenant }_events")
        .with_document_map("root.v = this.v");
    let processor = processor(config, store.clone());

    let out = processor
        .process_batch(messages(&[
            r#"{"tenant":"a","v":1}"#,
            r#"{"tenant":"b","v":2}"#,
            r#"{"tenant":"a","v":3}"#,
        ]))
        .await;
    assert!(out.iter().all(|m| !m.is_error()));
    assert_eq!(store.collection_names().await, ["a_events", "b_events"]);
    assert_eq!(store.documents("a_events").await.len(), 2);
    assert_eq!(store.documents("b_events").await.len(), 1);
}

#[tokio::test]
async fn metadata_drives_mappings() {
    let store = Arc::new(MemoryStore::new());
    let config = ProcessorConfig::new(OperationKind::InsertOne, r#"${! meta("topic") }"#)
        .with_document_map(r#"root.source = meta("source"); root.raw = content()"#);
    let processor = processor(config, store.clone());

    let out = processor
        .process_batch(vec![Message::new("plain text")
            .with_metadata("topic", "logs")
            .with_metadata("source", "edge-1")])
        .await;
    assert!(!out[0].is_error());
    let stored = store.documents("logs").await;
    assert_eq!(stored[0].get_str("source").unwrap(), "edge-1");
    assert_eq!(stored[0].get_str("raw").unwrap(), "plain text");

    let out = processor
        .process_batch(vec![Message::new("x").with_metadata("topic", "")])
        .await;
    assert!(matches!(
        out[0].error(),
        Some(ProcessError::Mapping(MappingError::EmptyCollection))
    ));
}

#[tokio::test(start_paused = true)]
async fn deadline_cancels_unfinished_messages_only() {
    let store = Arc::new(FaultyStore::new());
    let config = ProcessorConfig::new(OperationKind::FindOne, "c")
        .with_filter_map("root = this")
        .with_marshal_mode(MarshalMode::Relaxed);
    store
        .inner
        .seed("c", vec![doc! {"n": 1}, doc! {"n": 2}])
        .await
        .unwrap();
    let processor = processor(config, store);

    let signal = CancellationSignal::with_deadline(Instant::now() + Duration::from_secs(1));
    let input = [r#"{"n":1}"#, r#"{"n":2,"sleep_ms":10000}"#];
    let out = processor
        .process_batch_with_signal(messages(&input), &signal)
        .await;

    assert_eq!(out.len(), 2);
    assert_eq!(result_json(&out[0]), json!({"n": 1}));
    assert_eq!(
        out[1].error(),
        Some(&ProcessError::Cancelled(CancelReason::Deadline))
    );
    assert_eq!(out[1].payload_str(), input[1]);
}

#[tokio::test(start_paused = true)]
async fn explicit_cancel_stops_in_flight_messages() {
    let store = Arc::new(FaultyStore::new());
    let config = ProcessorConfig::new(OperationKind::InsertOne, "c").with_document_map("root = this");
    let processor = processor(config, store.clone());

    let signal = CancellationSignal::new();
    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let out = processor
        .process_batch_with_signal(
            messages(&[r#"{"a":1}"#, r#"{"a":2,"sleep_ms":5000}"#, r#"{"a":3}"#]),
            &signal,
        )
        .await;

    assert!(!out[0].is_error());
    assert_eq!(out[1].error(), Some(&ProcessError::Cancelled(CancelReason::Signal)));
    assert!(!out[2].is_error());
    assert_eq!(store.inner.documents("c").await.len(), 2);
}

#[tokio::test]
async fn already_cancelled_signal_skips_the_store() {
    let store = Arc::new(MemoryStore::new());
    let config = ProcessorConfig::new(OperationKind::InsertOne, "c").with_document_map("root = this");
    let processor = processor(config, store.clone());

    let signal = CancellationSignal::new();
    signal.cancel();
    let out = processor
        .process_batch_with_signal(messages(&[r#"{"a":1}"#, r#"{"a":2}"#]), &signal)
        .await;

    assert!(out
        .iter()
        .all(|m| m.error() == Some(&ProcessError::Cancelled(CancelReason::Signal))));
    assert!(store.documents("c").await.is_empty());
    assert!(store.command_log().await.is_empty());
}

#[tokio::test]
async fn max_in_flight_of_one_still_completes_in_order() {
    let store = Arc::new(MemoryStore::new());
    let config = ProcessorConfig::new(OperationKind::InsertOne, "c")
        .with_document_map("root = this")
        .with_max_in_flight(1);
    let processor = processor(config, store.clone());

    let input: Vec<String> = (0..20).map(|i| format!(r#"{{"i":{}}}"#, i)).collect();
    let refs: Vec<&str> = input.iter().map(String::as_str).collect();
    let out = processor.process_batch(messages(&refs)).await;

    assert_eq!(payloads(&out), input);
    let stored: Vec<i32> = store
        .documents("c")
        .await
        .iter()
        .map(|d| d.get_i32("i").unwrap())
        .collect();
    assert_eq!(stored, (0..20).collect::<Vec<_>>());
}
