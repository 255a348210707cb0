use anyhow::Context;
use async_trait::async_trait;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
    options::{BasicPublishOptions, ExchangeDeclareOptions},
    types::FieldTable,
    uri::{AMQPAuthority, AMQPQueryString, AMQPUri, AMQPUserInfo},
};

use crate::{
    config::BrokerConfig,
    measurement::{CONTENT_TYPE, Measurement},
};

/// AMQP delivery mode 2: the broker persists the message.
pub const PERSISTENT: u8 = 2;

const REPLY_SUCCESS: u16 = 200;

/// Where measurements go. Owned by exactly one run loop.
#[async_trait]
pub trait Publisher: Send {
    async fn publish(&mut self, measurement: &Measurement) -> Result<(), anyhow::Error>;

    /// Called once, when the run loop exits.
    async fn close(&mut self) -> Result<(), anyhow::Error>;
}

pub struct AmqpPublisher {
    conn: Connection,
    channel: Channel,
    exchange: String,
    routing_key: String,
}

impl AmqpPublisher {
    /// Opens the connection and channel and declares the exchange.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, anyhow::Error> {
        let conn = Connection::connect_uri(amqp_uri(config), ConnectionProperties::default())
            .await
            .with_context(|| {
                format!("Failed to connect to broker at {}:{}", config.host, config.port)
            })?;

        let channel = conn
            .create_channel()
            .await
            .context("Failed to open channel")?;

        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .with_context(|| format!("Failed to declare exchange {}", config.exchange))?;
        log::debug!("Declared topic exchange {}", config.exchange);

        Ok(Self {
            conn,
            channel,
            exchange: config.exchange.clone(),
            routing_key: config.routing_key.clone(),
        })
    }
}

#[async_trait]
impl Publisher for AmqpPublisher {
    async fn publish(&mut self, measurement: &Measurement) -> Result<(), anyhow::Error> {
        let body = measurement.to_json()?;

        self.channel
            .basic_publish(
                &self.exchange,
                &self.routing_key,
                BasicPublishOptions::default(),
                body.as_bytes(),
                message_properties(),
            )
            .await
            .context("Failed to publish measurement")?
            .await
            .context("Failed to confirm measurement")?;

        Ok(())
    }

    async fn close(&mut self) -> Result<(), anyhow::Error> {
        self.conn
            .close(REPLY_SUCCESS, "OK")
            .await
            .context("Failed to close broker connection")?;
        Ok(())
    }
}

fn amqp_uri(config: &BrokerConfig) -> AMQPUri {
    AMQPUri {
        authority: AMQPAuthority {
            userinfo: AMQPUserInfo {
                username: config.username.clone(),
                password: config.password.clone(),
            },
            host: config.host.clone(),
            port: config.port,
        },
        query: AMQPQueryString {
            heartbeat: Some(config.heartbeat_secs),
            ..AMQPQueryString::default()
        },
        ..AMQPUri::default()
    }
}

fn message_properties() -> BasicProperties {
    BasicProperties::default()
        .with_delivery_mode(PERSISTENT)
        .with_content_type(CONTENT_TYPE.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amqp_uri_from_config() {
        let config = BrokerConfig {
            host: "rabbit".to_string(),
            port: 5673,
            username: "u".to_string(),
            password: "p@ss/word".to_string(),
            heartbeat_secs: 30,
            ..BrokerConfig::default()
        };
        let uri = amqp_uri(&config);

        assert_eq!(uri.authority.host, "rabbit");
        assert_eq!(uri.authority.port, 5673);
        assert_eq!(uri.authority.userinfo.username, "u");
        assert_eq!(uri.authority.userinfo.password, "p@ss/word");
        assert_eq!(uri.query.heartbeat, Some(30));
        assert_eq!(uri.vhost, "/");
    }

    #[test]
    fn test_message_properties_persistent_json() {
        let props = message_properties();
        assert_eq!(props.delivery_mode(), &Some(PERSISTENT));
        assert_eq!(
            props.content_type().as_ref().map(|ct| ct.as_str()),
            Some(CONTENT_TYPE)
        );
    }
}
