use crate::messaging::config::RabbitMqConfig;
use chrono::{DateTime, Utc};
use lapin::{
    options::{BasicPublishOptions, ExchangeDeclareOptions},
    types::{AMQPValue, FieldTable, LongString, ShortString},
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Failed to connect to RabbitMQ: {0}")]
    ConnectionError(#[from] lapin::Error),

    #[error("Failed to serialize message: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Publisher not initialized")]
    NotInitialized
}

/// What a ranking event notifies the competitor about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RankingMessageKind {
    StandingsUpdated,
    InactivityDecay
}

/// Message sent when standings change for a competitor or a tournament.
/// This format matches what the downstream notification consumer expects.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RankingEventMessage {
    pub kind: RankingMessageKind,
    pub competitor_id: Option<i32>,
    pub tournament_id: Option<i32>,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>
}

/// MassTransit message envelope structure
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MassTransitEnvelope<T> {
    message_id: String,
    conversation_id: String,
    correlation_id: Option<String>,
    source_address: String,
    destination_address: String,
    message_type: Vec<String>,
    message: T,
    sent_time: DateTime<Utc>
}

/// RabbitMQ publisher for ranking events. This is the engine's notification
/// sink boundary; delivery to competitors happens downstream.
pub struct RabbitMqPublisher {
    connection: Option<Arc<Connection>>,
    channel: Option<Channel>,
    exchange: String,
    routing_key: String
}

impl RabbitMqPublisher {
    pub fn new(exchange: String, routing_key: String) -> Self {
        Self {
            connection: None,
            channel: None,
            exchange,
            routing_key
        }
    }

    pub fn from_config(config: &RabbitMqConfig) -> Self {
        Self::new(config.exchange.clone(), config.routing_key.clone())
    }

    /// Creates and connects a publisher from configuration
    pub async fn connect_from_config(config: &RabbitMqConfig) -> Result<Self, PublisherError> {
        let mut publisher = Self::from_config(config);
        publisher.connect(&config.connection_url()).await?;
        Ok(publisher)
    }

    /// Connects to RabbitMQ and initializes the publisher
    pub async fn connect(&mut self, rabbitmq_url: &str) -> Result<(), PublisherError> {
        let connection = Connection::connect(rabbitmq_url, ConnectionProperties::default()).await?;
        let connection = Arc::new(connection);

        let channel = connection.create_channel().await?;

        // Declare the exchange (fanout type for broadcasting)
        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default()
            )
            .await?;

        self.connection = Some(connection);
        self.channel = Some(channel);

        tracing::info!("Connected to RabbitMQ at {}", rabbitmq_url);
        tracing::info!(
            "Exchange '{}' declared with routing key '{}'",
            self.exchange,
            self.routing_key
        );

        Ok(())
    }

    /// Notifies that a tournament's standings have been recalculated.
    pub async fn publish_standings_updated(&self, tournament_id: i32) -> Result<(), PublisherError> {
        self.publish(RankingEventMessage {
            kind: RankingMessageKind::StandingsUpdated,
            competitor_id: None,
            tournament_id: Some(tournament_id),
            occurred_at: Utc::now(),
            payload: None
        })
        .await
    }

    /// Notifies a competitor that their standings decayed for inactivity.
    pub async fn publish_inactivity_decay(&self, competitor_id: i32) -> Result<(), PublisherError> {
        self.publish(RankingEventMessage {
            kind: RankingMessageKind::InactivityDecay,
            competitor_id: Some(competitor_id),
            tournament_id: None,
            occurred_at: Utc::now(),
            payload: None
        })
        .await
    }

    async fn publish(&self, message: RankingEventMessage) -> Result<(), PublisherError> {
        let channel = self.channel.as_ref().ok_or(PublisherError::NotInitialized)?;

        let message_id = Uuid::new_v4().to_string();
        let conversation_id = Uuid::new_v4().to_string();

        // Wrap in MassTransit envelope
        let envelope = MassTransitEnvelope {
            message_id: message_id.clone(),
            conversation_id,
            correlation_id: None,
            source_address: format!("rabbitmq://localhost/{}", self.exchange),
            destination_address: format!("rabbitmq://localhost/{}", self.routing_key),
            message_type: vec!["urn:message:Rankings.Messages:RankingEventMessage".to_string()],
            message,
            sent_time: Utc::now()
        };

        let payload = serde_json::to_vec(&envelope)?;

        let mut headers = BTreeMap::new();
        headers.insert(
            ShortString::from("Content-Type"),
            AMQPValue::LongString(LongString::from("application/vnd.masstransit+json"))
        );

        channel
            .basic_publish(
                &self.exchange,
                &self.routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_content_type("application/vnd.masstransit+json".into())
                    .with_headers(FieldTable::from(headers))
                    .with_message_id(message_id.into())
                    .with_timestamp(Utc::now().timestamp() as u64)
            )
            .await?;

        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some() && self.channel.is_some()
    }

    /// Closes the connection to RabbitMQ
    pub async fn close(&mut self) -> Result<(), PublisherError> {
        if let Some(channel) = self.channel.take() {
            channel.close(200, "Normal shutdown").await?;
        }

        if let Some(connection) = self.connection.take() {
            if let Ok(conn) = Arc::try_unwrap(connection) {
                conn.close(200, "Normal shutdown").await?;
            }
        }

        tracing::info!("RabbitMQ connection closed");
        Ok(())
    }
}

impl Drop for RabbitMqPublisher {
    fn drop(&mut self) {
        if self.is_connected() {
            tracing::warn!("RabbitMQ publisher dropped without proper closure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_without_empty_payload() {
        let message = RankingEventMessage {
            kind: RankingMessageKind::InactivityDecay,
            competitor_id: Some(9),
            tournament_id: None,
            occurred_at: Utc::now(),
            payload: None
        };

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"CompetitorId\":9"));
        assert!(!json.contains("Payload"));
    }

    #[test]
    fn test_unconnected_publisher_reports_not_initialized() {
        let publisher = RabbitMqPublisher::new("x".to_string(), "y".to_string());
        assert!(!publisher.is_connected());
    }
}
