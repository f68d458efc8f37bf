// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;
use url::Url;

pub const MIN_CONTEXT_CHARS: usize = 3;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub llm_api_key: String,
    pub llm_base_url: Url,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub generation_timeout: Duration,
    /// Seconds between rate-limit token refills on the generation route. 0 disables limiting.
    pub generate_replenish_secs: u64,
    pub generate_burst: u32,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let llm_api_key = env::var("LLM_API_KEY").expect("LLM_API_KEY must be set");

        let llm_base_url = env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string());
        let llm_base_url = Url::parse(&llm_base_url).expect("LLM_BASE_URL must be a valid URL");

        let llm_model =
            env::var("LLM_MODEL").unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string());

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            database_url,
            llm_api_key,
            llm_base_url,
            llm_model,
            llm_temperature: parse_or("LLM_TEMPERATURE", 0.0),
            generation_timeout: Duration::from_secs(parse_or("GENERATION_TIMEOUT_SECS", 90)),
            generate_replenish_secs: parse_or("GENERATE_REPLENISH_SECS", 2),
            generate_burst: parse_or("GENERATE_BURST", 5),
            port: parse_or("PORT", 3000),
            rust_log,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
