pub mod config;
pub mod error;
pub mod models;

pub use config::EventsConfig;
pub use error::EventsError;
pub use models::{
    init_events, Delivery, DeliveryStream, EventPublisher, JetStreamBus, MockEventBus,
    SubscribeOptions,
};
