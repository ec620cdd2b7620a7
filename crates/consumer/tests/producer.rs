use std::collections::HashMap;

use assert_matches::assert_matches;
use bytes::Bytes;
use serde_json::json;
use tessera_bus::Record;
use tessera_bus_memory::producer::Error as MemoryError;
use tessera_bus_memory::{MemoryBroker, MemoryProducer, MemoryProducerOptions};
use tessera_consumer::producer::Error;
use tessera_consumer::{MessageProducer, MessageProducerOptions};

fn producer(broker: &MemoryBroker, options: MemoryProducerOptions) -> MessageProducer<MemoryProducer> {
    MessageProducer::new(broker.producer(options), MessageProducerOptions::default())
}

#[tokio::test]
async fn test_produce_delivers_before_returning() {
    let broker = MemoryBroker::new();
    let producer = producer(&broker, MemoryProducerOptions::default());

    producer
        .produce(
            Record::to("orders")
                .key("customer-9")
                .value(r#"{"id": 1}"#)
                .timestamp(1_700_000_000_000)
                .header("trace", "abc"),
        )
        .await
        .unwrap();

    let messages = broker.messages("orders");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].key(), Some(&Bytes::from("customer-9")));
    assert_eq!(messages[0].timestamp(), Some(1_700_000_000_000));
    assert_eq!(messages[0].header("trace"), Some(&Bytes::from("abc")));
    assert_eq!(producer.transport().queued(), 0);
}

#[tokio::test]
async fn test_produce_json() {
    let broker = MemoryBroker::new();
    let producer = producer(&broker, MemoryProducerOptions::default());

    producer
        .produce_json("orders", &json!({ "id": 1, "items": ["a"] }))
        .await
        .unwrap();

    let value: serde_json::Value =
        serde_json::from_slice(broker.messages("orders")[0].value().unwrap()).unwrap();
    assert_eq!(value, json!({ "id": 1, "items": ["a"] }));
}

#[tokio::test]
async fn test_unencodable_value() {
    let broker = MemoryBroker::new();
    let producer = producer(&broker, MemoryProducerOptions::default());
    let value = HashMap::from([((1, 2), "tuple keys are not JSON")]);

    let result = producer.produce_json("orders", &value).await;

    assert_matches!(result, Err(Error::Encode(_)));
    assert!(broker.messages("orders").is_empty());
}

#[tokio::test]
async fn test_full_buffer_surfaces_unchanged() {
    let broker = MemoryBroker::new();
    let producer = producer(&broker, MemoryProducerOptions::default().with_queue_capacity(0));

    let result = producer.produce(Record::to("orders").value("x")).await;

    assert_matches!(result, Err(Error::Transport(MemoryError::QueueFull(0))));
}

#[tokio::test]
async fn test_broker_rejection_surfaces_unchanged() {
    let broker = MemoryBroker::new();
    broker.reject_topic("orders");
    let producer = producer(&broker, MemoryProducerOptions::default());

    let result = producer.produce(Record::to("orders").value("x")).await;

    assert_matches!(result, Err(Error::Transport(MemoryError::Rejected(topic))) if topic == "orders");
}

#[tokio::test]
async fn test_unknown_partition_surfaces_unchanged() {
    let broker = MemoryBroker::new();
    broker.create_topic("orders", 2);
    let producer = producer(&broker, MemoryProducerOptions::default());

    let result = producer
        .produce(Record::to("orders").partition(5).value("x"))
        .await;

    assert_matches!(
        result,
        Err(Error::Transport(MemoryError::UnknownPartition { partition: 5, .. }))
    );
}
