use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::sequencer::SequencerSettings;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub queue_page_size: usize,

    // Resolución
    pub ytdlp_path: String,
    pub resolve_timeout_secs: u64,
    pub max_concurrent_resolves: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            queue_page_size: std::env::var("QUEUE_PAGE_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            // Resolución
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            resolve_timeout_secs: std::env::var("RESOLVE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            max_concurrent_resolves: std::env::var("MAX_CONCURRENT_RESOLVES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 1.0
    /// - Queue size, page size and resolver concurrency must be > 0
    /// - Resolve timeout must be at least one second
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!("Default volume must be between 0.0 and 1.0, got: {}", self.default_volume);
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.queue_page_size == 0 {
            anyhow::bail!("Queue page size must be greater than 0");
        }

        if self.resolve_timeout_secs == 0 {
            anyhow::bail!("Resolve timeout must be at least 1 second");
        }

        if self.max_concurrent_resolves == 0 {
            anyhow::bail!("Max concurrent resolves must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The Discord token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands {}\n  \
            Audio: {}% vol, {} max queue, {} per page\n  \
            Resolver: {} ({}s timeout, {} concurrent)",
            self.guild_id.map_or("global".to_string(), |id| format!("guild {}", id)),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.queue_page_size,
            self.ytdlp_path,
            self.resolve_timeout_secs,
            self.max_concurrent_resolves,
        )
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    /// Parámetros que recibe cada secuenciador de guild
    pub fn sequencer_settings(&self) -> SequencerSettings {
        SequencerSettings {
            default_volume: self.default_volume,
            max_queue_size: self.max_queue_size,
            resolve_timeout: self.resolve_timeout(),
        }
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            default_volume: 0.5,
            max_queue_size: 1000,
            queue_page_size: 10,

            ytdlp_path: "yt-dlp".to_string(),
            resolve_timeout_secs: 30,
            max_concurrent_resolves: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let settings = config.sequencer_settings();
        assert_eq!(settings.default_volume, 0.5);
        assert_eq!(settings.max_queue_size, 1000);
        assert_eq!(settings.resolve_timeout, Duration::from_secs(30));
    }

    #[test]
    fn rejects_volume_above_one() {
        let config = Config {
            default_volume: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_limits() {
        for config in [
            Config { max_queue_size: 0, ..Config::default() },
            Config { queue_page_size: 0, ..Config::default() },
            Config { resolve_timeout_secs: 0, ..Config::default() },
            Config { max_concurrent_resolves: 0, ..Config::default() },
        ] {
            assert!(config.validate().is_err(), "{:?}", config);
        }
    }

    #[test]
    fn summary_hides_the_token() {
        let config = Config {
            discord_token: "super-secret".into(),
            guild_id: Some(42),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("guild 42"));
        assert!(summary.contains("50% vol"));
    }
}
