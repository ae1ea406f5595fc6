/// Broker connection and stream settings.
#[derive(Debug, Clone)]
pub struct EventsConfig {
    /// NATS server URL.
    pub url: String,
    /// JetStream stream name. Default: "PHOTO".
    pub stream: String,
    /// Subjects bound to the stream. Default: ["photo.*"].
    pub subjects: Vec<String>,
    /// Disk retention window in days. Default: 7.
    pub max_age_days: u64,
    /// Deadline for a single publish, milliseconds. Default: 200.
    pub publish_timeout_ms: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            url: "nats://nats:4222".into(),
            stream: "PHOTO".into(),
            subjects: vec!["photo.*".into()],
            max_age_days: 7,
            publish_timeout_ms: 200,
        }
    }
}

impl EventsConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stream_contract() {
        let config = EventsConfig::default();
        assert_eq!(config.stream, "PHOTO");
        assert_eq!(config.subjects, vec!["photo.*".to_string()]);
        assert_eq!(config.max_age_days, 7);
        assert!(config.publish_timeout_ms < 1000);
    }
}
