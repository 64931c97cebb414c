pub mod config;
pub mod publisher;

pub use config::RabbitMqConfig;
pub use publisher::{PublisherError, RabbitMqPublisher, RankingEventMessage, RankingMessageKind};
