use std::fs;
use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::commentrelay::broker::DEFAULT_ENDPOINT_CAPACITY;
use crate::commentrelay::service::LogTopics;
use crate::error::{CommentRelayError, ErrorCode};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub id: String,
    pub addr: String,
    pub heartbeat_secs: u64,
    pub endpoint_capacity: usize,
    pub shutdown_grace_secs: u64,
    pub kafka: KafkaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub topic_comment_created: String,
    pub topic_comment_replied: String,
    pub client_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            id: "comment-service".to_string(),
            addr: "0.0.0.0:8080".to_string(),
            heartbeat_secs: 30,
            endpoint_capacity: DEFAULT_ENDPOINT_CAPACITY,
            shutdown_grace_secs: 15,
            kafka: KafkaConfig::default(),
        }
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["kafka:9092".to_string()],
            topic_comment_created: "comments.created".to_string(),
            topic_comment_replied: "comments.replied".to_string(),
            client_id: "comment-service".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CommentRelayError> {
        let content = fs::read_to_string(path)
            .map_err(|e| CommentRelayError::new(ErrorCode::ConfigInvalid, format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CommentRelayError> {
        toml::from_str(content)
            .map_err(|e| CommentRelayError::new(ErrorCode::ConfigInvalid, format!("Failed to parse TOML: {}", e)))
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CommentRelayError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CommentRelayError::new(ErrorCode::ConfigInvalid, format!("Failed to serialize to TOML: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| CommentRelayError::new(ErrorCode::ConfigInvalid, format!("Failed to write config file: {}", e)))
    }

    /// File (if present), then environment overrides, then validation
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CommentRelayError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            Self::from_toml_file(path)?
        } else {
            info!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies `SERVICE_PORT`, `KAFKA_BROKERS` and the topic variables
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(port) = get("SERVICE_PORT") {
            let host = self.addr.rsplit_once(':').map(|(host, _)| host).unwrap_or("0.0.0.0");
            self.addr = format!("{}:{}", host, port);
            debug!("SERVICE_PORT override, listening on {}", self.addr);
        }
        if let Some(brokers) = get("KAFKA_BROKERS") {
            self.kafka.brokers = parse_csv(&brokers);
        }
        if let Some(topic) = get("KAFKA_TOPIC_COMMENT_CREATED") {
            self.kafka.topic_comment_created = topic;
        }
        if let Some(topic) = get("KAFKA_TOPIC_COMMENT_REPLIED") {
            self.kafka.topic_comment_replied = topic;
        }
    }

    pub fn validate(&self) -> Result<(), CommentRelayError> {
        let problem = if self.kafka.brokers.is_empty() {
            Some("KAFKA_BROKERS is required")
        } else if self.kafka.topic_comment_created.trim().is_empty() {
            Some("KAFKA_TOPIC_COMMENT_CREATED is required")
        } else if self.kafka.topic_comment_replied.trim().is_empty() {
            Some("KAFKA_TOPIC_COMMENT_REPLIED is required")
        } else if self.heartbeat_secs == 0 {
            Some("heartbeat_secs must be greater than zero")
        } else if self.endpoint_capacity == 0 {
            Some("endpoint_capacity must be greater than zero")
        } else {
            None
        };

        match problem {
            Some(message) => Err(CommentRelayError::new(ErrorCode::ConfigInvalid, message)),
            None => Ok(()),
        }
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn log_topics(&self) -> LogTopics {
        LogTopics {
            comment_created: self.kafka.topic_comment_created.clone(),
            comment_replied: self.kafka.topic_comment_replied.clone(),
        }
    }
}

fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.heartbeat(), Duration::from_secs(30));
        assert_eq!(config.endpoint_capacity, 16);
        assert_eq!(config.log_topics().comment_created, "comments.created");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml_str(
            r#"
            addr = "127.0.0.1:9000"

            [kafka]
            brokers = ["a:9092", "b:9092"]
            "#,
        )
        .unwrap();

        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.kafka.brokers.len(), 2);
        assert_eq!(config.kafka.topic_comment_replied, "comments.replied");
        assert_eq!(config.heartbeat_secs, 30);
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = ServerConfig::default();
        config.apply_overrides(lookup(&[
            ("SERVICE_PORT", " 9090 "),
            ("KAFKA_BROKERS", "k1:9092, ,k2:9092"),
            ("KAFKA_TOPIC_COMMENT_CREATED", "created"),
            ("KAFKA_TOPIC_COMMENT_REPLIED", ""),
        ]));

        assert_eq!(config.addr, "0.0.0.0:9090");
        assert_eq!(config.kafka.brokers, vec!["k1:9092".to_string(), "k2:9092".to_string()]);
        assert_eq!(config.kafka.topic_comment_created, "created");
        assert_eq!(config.kafka.topic_comment_replied, "comments.replied");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = ServerConfig::default();
        config.apply_overrides(lookup(&[("KAFKA_BROKERS", " , ")]));
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ConfigInvalid));

        let mut config = ServerConfig::default();
        config.heartbeat_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_round_trip_and_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = ServerConfig::default();
        config.endpoint_capacity = 4;
        config.to_toml_file(&path).unwrap();
        assert_eq!(ServerConfig::from_toml_file(&path).unwrap().endpoint_capacity, 4);

        let missing = dir.path().join("absent.toml");
        assert!(ServerConfig::from_toml_file(&missing).is_err());
    }
}
