use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub tasks: TaskConfig,
    #[serde(default)]
    pub checkin: CheckinConfig,
    #[serde(default)]
    pub welcome: WelcomeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Apply pending migrations on startup
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Hex SHA-256 of the service API key expected in `x-api-key`
    pub api_key_sha256: String,
}

/// Credit cost of a media task
#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    pub subtitle_extraction: i32,
    pub video_download: i32,
    pub translation_surcharge: i32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            subtitle_extraction: 10,
            video_download: 15,
            translation_surcharge: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Max pending/extracting/translating tasks per user
    pub concurrent_limit: u64,
    /// Free tasks a user without credits may run
    pub free_trial_count: u64,
    pub history_limit: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            concurrent_limit: 1,
            free_trial_count: 0,
            history_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckinConfig {
    pub reward_credits: i32,
}

impl Default for CheckinConfig {
    fn default() -> Self {
        Self { reward_credits: 2 }
    }
}

/// One-time grant for a user who has never held credits
#[derive(Debug, Clone, Deserialize)]
pub struct WelcomeConfig {
    pub credits: i32,
    pub valid_days: i64,
}

impl Default for WelcomeConfig {
    fn default() -> Self {
        Self {
            credits: 50,
            valid_days: 7,
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_connections() -> u32 {
    10
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        // Build config from config.yml (required) with environment variable overrides
        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(true))
            .add_source(
                config::Environment::with_prefix("CREDITLINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
