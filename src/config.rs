//! Environment configuration.
//!
//! Loads the variables named in the external-interfaces contract. Resolution
//! order for every optional field is: explicit override passed to
//! [`Config::from_env`], then the environment variable, then the documented
//! default — the same order the teacher crate's `RuntimeConfig` uses for
//! `SQLITE_DB_NAME`.

use std::time::Duration;

/// Fully resolved runtime configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub llm_provider: String,
    pub llm_model_default: String,
    pub llm_max_retries: u32,
    pub llm_concurrency: usize,
    pub llm_timeout: Duration,
    pub lesson_parallelism: usize,
    pub stall_timeout: Duration,
    pub database_url: String,
    pub object_store_bucket: String,
    pub heartbeat_interval: Duration,
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    #[diagnostic(
        code(lessonforge::config::missing),
        help("Set this variable or pass it explicitly to Config::from_env.")
    )]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    #[diagnostic(code(lessonforge::config::invalid))]
    Invalid { name: &'static str, value: String },
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// `.env` (via `dotenvy`) and then documented defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let object_store_bucket = std::env::var("OBJECT_STORE_BUCKET")
            .map_err(|_| ConfigError::Missing("OBJECT_STORE_BUCKET"))?;

        Ok(Self {
            llm_provider: env_or("LLM_PROVIDER", "openai"),
            llm_model_default: env_or("LLM_MODEL_DEFAULT", "gpt-4o-mini"),
            llm_max_retries: env_parsed_or("LLM_MAX_RETRIES", 3)?,
            llm_concurrency: env_parsed_or("LLM_CONCURRENCY", 16)?,
            llm_timeout: Duration::from_secs(env_parsed_or("LLM_TIMEOUT_SECONDS", 60)?),
            lesson_parallelism: env_parsed_or("LESSON_PARALLELISM", 3)?,
            stall_timeout: Duration::from_secs(env_parsed_or("STALL_TIMEOUT_SECONDS", 180)?),
            database_url,
            object_store_bucket,
            heartbeat_interval: Duration::from_secs(5),
        })
    }

    /// A configuration suitable for tests: in-memory store, no external
    /// credentials required.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            llm_provider: "mock".to_string(),
            llm_model_default: "mock-model".to_string(),
            llm_max_retries: 2,
            llm_concurrency: 16,
            llm_timeout: Duration::from_secs(30),
            lesson_parallelism: 3,
            stall_timeout: Duration::from_secs(30),
            database_url: "sqlite::memory:".to_string(),
            object_store_bucket: "test-bucket".to_string(),
            heartbeat_interval: Duration::from_millis(50),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parsed_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name,
            value: value.clone(),
        }),
        Err(_) => Ok(default),
    }
}
