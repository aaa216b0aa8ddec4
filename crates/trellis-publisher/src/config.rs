use std::time::Duration;

use serde::{Deserialize, Serialize};
use trellis_events::{StreamConfig, PRIVATE_TRANSACTIONS_STREAM, PRIVATE_TRANSACTIONS_SUBJECT};

use crate::error::{PublishError, PublishResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Deadline for obtaining a bus connection during start.
    pub acquire_timeout_secs: u64,
    /// Stream that retains forwarded private transactions.
    pub private_tx_stream: String,
    /// Subject private transactions are published on.
    pub private_tx_subject: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_secs: 30,
            private_tx_stream: PRIVATE_TRANSACTIONS_STREAM.to_string(),
            private_tx_subject: PRIVATE_TRANSACTIONS_SUBJECT.to_string(),
        }
    }
}

impl PublisherConfig {
    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(s: &str) -> PublishResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| PublishError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PublishResult<()> {
        if self.acquire_timeout_secs == 0 {
            return Err(PublishError::Config(
                "acquire_timeout_secs must be positive".into(),
            ));
        }
        if self.private_tx_stream.is_empty() || self.private_tx_subject.is_empty() {
            return Err(PublishError::Config(
                "private transaction stream and subject must be set".into(),
            ));
        }
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// The stream declaration ensured on the bus at start.
    pub fn private_stream(&self) -> StreamConfig {
        StreamConfig::new(
            self.private_tx_stream.clone(),
            vec![self.private_tx_subject.clone()],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = PublisherConfig::default();
        assert_eq!(c.acquire_timeout(), Duration::from_secs(30));
        assert_eq!(c.private_tx_stream, "PRIVATE_TRANSACTIONS");
        assert_eq!(c.private_tx_subject, "trellis.private-transactions");
        c.validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = PublisherConfig::from_toml_str("acquire_timeout_secs = 5\n").unwrap();
        assert_eq!(c.acquire_timeout_secs, 5);
        assert_eq!(c.private_tx_stream, PRIVATE_TRANSACTIONS_STREAM);
    }

    #[test]
    fn full_toml() {
        let c = PublisherConfig::from_toml_str(
            r#"
            acquire_timeout_secs = 10
            private_tx_stream = "PTX"
            private_tx_subject = "node.ptx"
            "#,
        )
        .unwrap();
        assert_eq!(
            c.private_stream(),
            StreamConfig::new("PTX", vec!["node.ptx".to_string()])
        );
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = PublisherConfig::from_toml_str("acquire_timeout_secs = 0").unwrap_err();
        assert!(matches!(err, PublishError::Config(_)));
    }

    #[test]
    fn malformed_toml_rejected() {
        assert!(matches!(
            PublisherConfig::from_toml_str("acquire_timeout_secs = \"soon\""),
            Err(PublishError::Config(_))
        ));
    }
}
