use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header, request::Parts};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::{AppError, Result};
use crate::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, GeminiClient, GeminiConfig, GenerationConfig};
use crate::handlers::{chat_stream_handler, health_check};
use crate::prompts::CARBOT_SYSTEM_PROMPT;
use crate::AppState;

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,https://*.vercel.app";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<OriginPattern>,
    pub gemini: GeminiConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = var("GOOGLE_API_KEY")
            .or_else(|| var("GEMINI_API_KEY"))
            .ok_or_else(|| {
                AppError::configuration("GOOGLE_API_KEY or GEMINI_API_KEY environment variable is required")
            })?;

        let defaults = GenerationConfig::default();
        let generation = GenerationConfig {
            temperature: parse_or(var("GEMINI_TEMPERATURE"), "GEMINI_TEMPERATURE", defaults.temperature)?,
            top_p: parse_or(var("GEMINI_TOP_P"), "GEMINI_TOP_P", defaults.top_p)?,
            top_k: parse_or(var("GEMINI_TOP_K"), "GEMINI_TOP_K", defaults.top_k)?,
            max_output_tokens: parse_or(
                var("GEMINI_MAX_OUTPUT_TOKENS"),
                "GEMINI_MAX_OUTPUT_TOKENS",
                defaults.max_output_tokens,
            )?,
        };

        let cors_origins = var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(OriginPattern::new)
            .collect();

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(var("PORT"), "PORT", 8080)?,
            cors_origins,
            gemini: GeminiConfig {
                api_key,
                base_url: var("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                generation,
                system_instruction: CARBOT_SYSTEM_PROMPT.to_string(),
                google_search: parse_or(var("GEMINI_GOOGLE_SEARCH"), "GEMINI_GOOGLE_SEARCH", false)?,
            },
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::configuration(format!("{} has an invalid value: {:?}", key, raw))),
        None => Ok(default),
    }
}

// ============================================================================
// CORS
// ============================================================================

/// An allowed origin, optionally with one `*` wildcard (`https://*.vercel.app`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPattern {
    prefix: String,
    suffix: Option<String>,
}

impl OriginPattern {
    pub fn new(pattern: &str) -> Self {
        match pattern.split_once('*') {
            Some((prefix, suffix)) => Self {
                prefix: prefix.to_string(),
                suffix: Some(suffix.to_string()),
            },
            None => Self {
                prefix: pattern.to_string(),
                suffix: None,
            },
        }
    }

    pub fn matches(&self, origin: &str) -> bool {
        match &self.suffix {
            None => origin == self.prefix,
            Some(suffix) => {
                origin.len() > self.prefix.len() + suffix.len()
                    && origin.starts_with(&self.prefix)
                    && origin.ends_with(suffix.as_str())
                    && !origin[self.prefix.len()..origin.len() - suffix.len()].contains('/')
            }
        }
    }
}

pub fn cors_layer(origins: Vec<OriginPattern>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _: &Parts| {
            origin
                .to_str()
                .map(|origin| origins.iter().any(|pattern| pattern.matches(origin)))
                .unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

// ============================================================================
// Router
// ============================================================================

pub fn create_app_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/api/chat", axum::routing::post(chat_stream_handler))
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .with_state(state)
}

pub fn app_init() -> Result<(Config, Router)> {
    let config = Config::from_env()?;
    log::info!("✅ Configuration loaded");

    let client = GeminiClient::new(config.gemini.clone())?;
    log::info!("✅ Gemini client initialized (model: {})", config.gemini.model);

    let state = Arc::new(AppState::new(Arc::new(client)));
    let app = create_app_router(state, cors_layer(config.cors_origins.clone()));
    Ok((config, app))
}

// ============================================================================
// Tests
// ============================================================================
