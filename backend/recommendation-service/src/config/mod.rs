use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub bandit: BanditConfig,
    pub content_index: ContentIndexConfig,
    pub hybrid: HybridConfig,
    pub latent: LatentConfig,
    pub refresh: RefreshConfig,
    pub redis: RedisConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,
    /// Build the models on the first request that needs them
    #[serde(default = "default_true")]
    pub lazy_refresh: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BanditConfig {
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default = "default_ucb_c")]
    pub ucb_c: f64,
    /// Fixed RNG seed for reproducible exploration
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentIndexConfig {
    #[serde(default = "default_max_features")]
    pub max_features: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HybridConfig {
    #[serde(default = "default_liked_multiplier")]
    pub liked_multiplier: f64,
    #[serde(default = "default_disliked_multiplier")]
    pub disliked_multiplier: f64,
    #[serde(default = "default_true")]
    pub skip_early_dislikes: bool,
    /// Disliked items watched below this percentage are ignored
    #[serde(default = "default_early_dislike_threshold")]
    pub early_dislike_threshold: u8,
    #[serde(default = "default_multi_interaction_step")]
    pub multi_interaction_step: f64,
    #[serde(default = "default_multi_interaction_cap")]
    pub multi_interaction_cap: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatentConfig {
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    #[serde(default = "default_cold_start_noise")]
    pub cold_start_noise: f64,
    /// Fixed seed for the cold-start noise
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    /// When false no background refresh runs; models are only built lazily
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_refresh_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Arm statistics are only persisted when a URL is configured
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_true() -> bool {
    true
}
fn default_max_recommendations() -> usize {
    100
}
fn default_epsilon() -> f64 {
    0.1
}
fn default_ucb_c() -> f64 {
    1.5
}
fn default_max_features() -> usize {
    200
}
fn default_liked_multiplier() -> f64 {
    1.5
}
fn default_disliked_multiplier() -> f64 {
    0.2
}
fn default_early_dislike_threshold() -> u8 {
    20
}
fn default_multi_interaction_step() -> f64 {
    0.1
}
fn default_multi_interaction_cap() -> f64 {
    0.3
}
fn default_embedding_dim() -> usize {
    64
}
fn default_cold_start_noise() -> f64 {
    0.1
}
fn default_refresh_interval_secs() -> u64 {
    30
}
fn default_key_prefix() -> String {
    "bandit:arms".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_recommendations: default_max_recommendations(),
            lazy_refresh: true,
        }
    }
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            ucb_c: default_ucb_c(),
            seed: None,
        }
    }
}

impl Default for ContentIndexConfig {
    fn default() -> Self {
        Self {
            max_features: default_max_features(),
        }
    }
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            liked_multiplier: default_liked_multiplier(),
            disliked_multiplier: default_disliked_multiplier(),
            skip_early_dislikes: true,
            early_dislike_threshold: default_early_dislike_threshold(),
            multi_interaction_step: default_multi_interaction_step(),
            multi_interaction_cap: default_multi_interaction_cap(),
        }
    }
}

impl Default for LatentConfig {
    fn default() -> Self {
        Self {
            embedding_dim: default_embedding_dim(),
            max_features: default_max_features(),
            cold_start_noise: default_cold_start_noise(),
            seed: None,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Config {
    /// Load every section from the environment (and `.env` when present).
    ///
    /// Each section reads its own prefix, e.g. `BANDIT_EPSILON`,
    /// `HYBRID_LIKED_MULTIPLIER`, `REFRESH_INTERVAL_SECS`, `REDIS_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Config {
            engine: envy::prefixed("ENGINE_").from_env()?,
            bandit: envy::prefixed("BANDIT_").from_env()?,
            content_index: envy::prefixed("CONTENT_INDEX_").from_env()?,
            hybrid: envy::prefixed("HYBRID_").from_env()?,
            latent: envy::prefixed("LATENT_").from_env()?,
            refresh: envy::prefixed("REFRESH_").from_env()?,
            redis: envy::prefixed("REDIS_").from_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_recommendations == 0 {
            return Err(invalid("ENGINE_MAX_RECOMMENDATIONS must be positive"));
        }
        if !(0.0..=1.0).contains(&self.bandit.epsilon) {
            return Err(invalid("BANDIT_EPSILON must be within [0, 1]"));
        }
        if !self.bandit.ucb_c.is_finite() || self.bandit.ucb_c < 0.0 {
            return Err(invalid("BANDIT_UCB_C must be a non-negative number"));
        }
        if self.content_index.max_features == 0 || self.latent.max_features == 0 {
            return Err(invalid("max_features must be positive"));
        }
        if !(0.2..=0.3).contains(&self.hybrid.disliked_multiplier) {
            return Err(invalid("HYBRID_DISLIKED_MULTIPLIER must be within [0.2, 0.3]"));
        }
        if self.hybrid.liked_multiplier <= 0.0 {
            return Err(invalid("HYBRID_LIKED_MULTIPLIER must be positive"));
        }
        if self.hybrid.early_dislike_threshold > 100 {
            return Err(invalid("HYBRID_EARLY_DISLIKE_THRESHOLD must be a percentage"));
        }
        if self.hybrid.multi_interaction_step < 0.0 || self.hybrid.multi_interaction_cap < 0.0 {
            return Err(invalid("multi-interaction boost must be non-negative"));
        }
        if self.latent.embedding_dim == 0 {
            return Err(invalid("LATENT_EMBEDDING_DIM must be positive"));
        }
        if !(0.0..=0.5).contains(&self.latent.cold_start_noise) {
            return Err(invalid("LATENT_COLD_START_NOISE must be within [0, 0.5]"));
        }
        if self.refresh.interval_secs == 0 {
            return Err(invalid("REFRESH_INTERVAL_SECS must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bandit.epsilon, 0.1);
        assert_eq!(config.bandit.ucb_c, 1.5);
        assert_eq!(config.latent.embedding_dim, 64);
        assert_eq!(config.refresh.interval(), Duration::from_secs(30));
        assert!(config.redis.url.is_none());
    }

    #[test]
    fn test_section_from_prefixed_vars() {
        let vars = vec![
            ("BANDIT_EPSILON".to_string(), "0.25".to_string()),
            ("BANDIT_SEED".to_string(), "7".to_string()),
        ];
        let bandit: BanditConfig = envy::prefixed("BANDIT_").from_iter(vars).unwrap();
        assert_eq!(bandit.epsilon, 0.25);
        assert_eq!(bandit.ucb_c, 1.5);
        assert_eq!(bandit.seed, Some(7));

        let vars = vec![("LATENT_SEED".to_string(), "11".to_string())];
        let latent: LatentConfig = envy::prefixed("LATENT_").from_iter(vars).unwrap();
        assert_eq!(latent.seed, Some(11));
        assert_eq!(latent.embedding_dim, 64);

        let vars = vec![("REFRESH_ENABLED".to_string(), "false".to_string())];
        let refresh: RefreshConfig = envy::prefixed("REFRESH_").from_iter(vars).unwrap();
        assert!(!refresh.enabled);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = Config::default();
        config.bandit.epsilon = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.hybrid.disliked_multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.refresh.interval_secs = 0;
        assert!(config.validate().is_err());
    }
}
