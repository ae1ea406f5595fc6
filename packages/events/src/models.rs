use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_nats::jetstream;
use async_nats::jetstream::consumer::{pull, AckPolicy, DeliverPolicy};
use async_nats::jetstream::stream::{RetentionPolicy, StorageType};
use async_nats::jetstream::AckKind;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::EventsConfig;
use crate::error::EventsError;

/// Durable publish to a named subject. The deadline is built in so callers
/// always fail fast, independent of any request deadline around them.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), EventsError>;
}

/// Subscription tuning. Ack handling is always manual and explicit.
#[derive(Debug, Clone, Copy)]
pub struct SubscribeOptions {
    /// Start from new messages instead of replaying the stream.
    pub deliver_new: bool,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self { deliver_new: true }
    }
}

/// Connect to the broker and make sure the configured stream exists.
pub async fn init_events(config: EventsConfig) -> Result<JetStreamBus, EventsError> {
    JetStreamBus::connect(config).await
}

/// Event bus backed by NATS JetStream. The stream is disk-backed with a
/// bounded retention window; consumers are durable pull consumers, which is
/// the queue-group primitive (each delivery goes to one member).
pub struct JetStreamBus {
    context: jetstream::Context,
    stream: jetstream::stream::Stream,
    config: EventsConfig,
}

impl JetStreamBus {
    pub async fn connect(config: EventsConfig) -> Result<Self, EventsError> {
        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| EventsError::Connect(e.to_string()))?;
        let context = jetstream::new(client);

        let stream = context
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream.clone(),
                subjects: config.subjects.clone(),
                storage: StorageType::File,
                retention: RetentionPolicy::Limits,
                max_age: Duration::from_secs(config.max_age_days * 24 * 60 * 60),
                ..Default::default()
            })
            .await
            .map_err(|e| EventsError::Stream(e.to_string()))?;

        info!(url = %config.url, stream = %config.stream, "JetStream event bus initialized");

        Ok(Self {
            context,
            stream,
            config,
        })
    }

    /// Queue-group subscription: a durable consumer named after the group,
    /// explicit acks, optionally starting from new messages only.
    pub async fn queue_subscribe(
        &self,
        subject: &str,
        queue_group: &str,
        opts: SubscribeOptions,
    ) -> Result<DeliveryStream, EventsError> {
        let consumer = self
            .stream
            .get_or_create_consumer(
                queue_group,
                pull::Config {
                    durable_name: Some(queue_group.to_string()),
                    filter_subject: subject.to_string(),
                    ack_policy: AckPolicy::Explicit,
                    deliver_policy: if opts.deliver_new {
                        DeliverPolicy::New
                    } else {
                        DeliverPolicy::All
                    },
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| EventsError::Subscribe(e.to_string()))?;

        let inner = consumer
            .messages()
            .await
            .map_err(|e| EventsError::Subscribe(e.to_string()))?;

        info!(subject, queue_group, "Subscribed");
        Ok(DeliveryStream { inner })
    }
}

#[async_trait]
impl EventPublisher for JetStreamBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), EventsError> {
        let deadline = Duration::from_millis(self.config.publish_timeout_ms);
        let publish = async {
            let ack = self
                .context
                .publish(subject.to_string(), Bytes::from(payload))
                .await
                .map_err(|e| EventsError::Publish {
                    subject: subject.to_string(),
                    reason: e.to_string(),
                })?;
            ack.await.map_err(|e| EventsError::Publish {
                subject: subject.to_string(),
                reason: e.to_string(),
            })
        };

        match timeout(deadline, publish).await {
            Ok(Ok(_)) => {
                debug!(subject, "Published");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(EventsError::PublishTimeout(subject.to_string())),
        }
    }
}

/// Stream of pending deliveries for one queue-group member.
pub struct DeliveryStream {
    inner: pull::Stream,
}

impl DeliveryStream {
    pub async fn next(&mut self) -> Option<Result<Delivery, EventsError>> {
        match self.inner.next().await {
            None => None,
            Some(Ok(msg)) => Some(Ok(Delivery { msg })),
            Some(Err(e)) => Some(Err(EventsError::Consume(e.to_string()))),
        }
    }
}

/// One at-least-once delivery. The broker redelivers unless `ack` is called;
/// `nak` requests immediate redelivery to the group.
pub struct Delivery {
    msg: jetstream::Message,
}

impl Delivery {
    pub fn payload(&self) -> &[u8] {
        &self.msg.payload
    }

    pub fn subject(&self) -> &str {
        self.msg.subject.as_str()
    }

    pub async fn ack(&self) -> Result<(), EventsError> {
        self.msg
            .ack()
            .await
            .map_err(|e| EventsError::Ack(e.to_string()))
    }

    pub async fn nak(&self) -> Result<(), EventsError> {
        self.msg
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|e| EventsError::Ack(e.to_string()))
    }
}

/// Recording publisher for tests and for running without a broker.
#[derive(Debug, Default)]
pub struct MockEventBus {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    fail_publish: AtomicBool,
}

impl MockEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail, to exercise the swallow-and-log
    /// policy at call sites.
    pub fn fail_next_publishes(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Everything published so far, in order.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }

    /// Payloads published on one subject.
    pub fn published_on(&self, subject: &str) -> Vec<Vec<u8>> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == subject)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for MockEventBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), EventsError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(EventsError::Publish {
                subject: subject.to_string(),
                reason: "mock failure".into(),
            });
        }
        debug!(subject, len = payload.len(), "Mock publish");
        self.published
            .lock()
            .unwrap()
            .push((subject.to_string(), payload));
        Ok(())
    }
}
