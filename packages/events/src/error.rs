use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventsError {
    #[error("failed to connect to event broker: {0}")]
    Connect(String),

    #[error("failed to create or update stream: {0}")]
    Stream(String),

    #[error("publish to '{subject}' failed: {reason}")]
    Publish { subject: String, reason: String },

    #[error("publish to '{0}' timed out")]
    PublishTimeout(String),

    #[error("failed to subscribe: {0}")]
    Subscribe(String),

    #[error("failed to pull delivery: {0}")]
    Consume(String),

    #[error("acknowledgement failed: {0}")]
    Ack(String),
}
