//! Configuration management.
//!
//! Everything is environment-driven with sensible defaults; the binary
//! loads a `.env` file first via `dotenvy`. Secrets (the graph password,
//! provider API keys, the JWT secret) are only ever read from the
//! environment and never logged.

use std::fmt;

/// Main configuration for engram.
#[derive(Debug, Clone, Default)]
pub struct EngramConfig {
    /// Graph store connection settings.
    pub graph: GraphStoreConfig,
    /// Extraction pipeline and provider settings.
    pub extraction: ExtractionConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Bearer-token validation settings.
    pub auth: AuthConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl EngramConfig {
    /// Loads configuration from environment variables, applying defaults
    /// for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            graph: GraphStoreConfig::from_env(),
            extraction: ExtractionConfig::from_env(),
            server: ServerConfig::from_env(),
            auth: AuthConfig::from_env(),
            logging: LoggingSettings::from_env(),
        }
    }
}

/// Graph store connection settings.
#[derive(Debug, Clone)]
pub struct GraphStoreConfig {
    /// Bolt URI.
    pub uri: String,
    /// Database user.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            username: "neo4j".to_string(),
            password: String::new(),
            database: "neo4j".to_string(),
        }
    }
}

impl GraphStoreConfig {
    /// Loads graph settings from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            uri: env_string("ENGRAM_GRAPH_URI", defaults.uri),
            username: env_string("ENGRAM_GRAPH_USER", defaults.username),
            password: env_string("ENGRAM_GRAPH_PASSWORD", defaults.password),
            database: env_string("ENGRAM_GRAPH_DATABASE", defaults.database),
        }
    }
}

/// Which extraction provider is active.
///
/// Unknown names resolve to the local heuristic with a warning; the
/// registry owns that decision so configuration loading never fails on a
/// typo.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Provider key: `local`, `ollama`, `openai`, or `anthropic`.
    pub provider: String,
    /// Whether the pipeline may fall back to the local extractor when the
    /// primary provider fails.
    pub allow_fallback: bool,
    /// Token budget used to clip provider input (chars ≈ tokens × 4).
    pub context_window_tokens: usize,
    /// Request timeout for the cloud providers, in seconds.
    pub request_timeout_seconds: u64,
    /// Ollama settings.
    pub ollama: OllamaSettings,
    /// `OpenAI` settings.
    pub openai: OpenAiSettings,
    /// Anthropic settings.
    pub anthropic: AnthropicSettings,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            allow_fallback: false,
            context_window_tokens: 8192,
            request_timeout_seconds: 60,
            ollama: OllamaSettings::default(),
            openai: OpenAiSettings::default(),
            anthropic: AnthropicSettings::default(),
        }
    }
}

impl ExtractionConfig {
    /// Loads extraction settings from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            provider: env_string("ENGRAM_EXTRACTION_PROVIDER", defaults.provider),
            allow_fallback: env_bool(
                "ENGRAM_EXTRACTION_ALLOW_FALLBACK",
                defaults.allow_fallback,
            ),
            context_window_tokens: env_parse(
                "ENGRAM_EXTRACTION_CONTEXT_WINDOW_TOKENS",
                defaults.context_window_tokens,
            ),
            request_timeout_seconds: env_parse(
                "ENGRAM_LLM_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            ),
            ollama: OllamaSettings::from_env(),
            openai: OpenAiSettings::from_env(),
            anthropic: AnthropicSettings::from_env(),
        }
    }
}

/// Ollama provider settings.
#[derive(Debug, Clone)]
pub struct OllamaSettings {
    /// API endpoint.
    pub base_url: String,
    /// Model to use.
    pub model: String,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Retry attempts, applied on timeout only.
    pub max_retries: u32,
    /// Keep-alive hint passed to the server.
    pub keep_alive: String,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            timeout_seconds: 120,
            max_retries: 2,
            keep_alive: "5m".to_string(),
        }
    }
}

impl OllamaSettings {
    /// Loads Ollama settings from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_string("OLLAMA_HOST", defaults.base_url),
            model: env_string("OLLAMA_MODEL", defaults.model),
            timeout_seconds: env_parse("ENGRAM_OLLAMA_TIMEOUT_SECONDS", defaults.timeout_seconds),
            max_retries: env_parse("ENGRAM_OLLAMA_MAX_RETRIES", defaults.max_retries),
            keep_alive: env_string("ENGRAM_OLLAMA_KEEP_ALIVE", defaults.keep_alive),
        }
    }
}

/// `OpenAI` provider settings.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    /// API key; missing key means the provider degrades to the local
    /// extractor.
    pub api_key: Option<String>,
    /// Model to use.
    pub model: String,
    /// API base URL.
    pub base_url: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl OpenAiSettings {
    /// Loads `OpenAI` settings from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env_optional("OPENAI_API_KEY"),
            model: env_string("ENGRAM_OPENAI_MODEL", defaults.model),
            base_url: env_string("ENGRAM_OPENAI_BASE_URL", defaults.base_url),
        }
    }
}

/// Anthropic provider settings.
#[derive(Debug, Clone)]
pub struct AnthropicSettings {
    /// API key; missing key means the provider degrades to the local
    /// extractor.
    pub api_key: Option<String>,
    /// Model to use.
    pub model: String,
}

impl Default for AnthropicSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "claude-3-5-haiku-latest".to_string(),
        }
    }
}

impl AnthropicSettings {
    /// Loads Anthropic settings from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env_optional("ANTHROPIC_API_KEY"),
            model: env_string("ENGRAM_ANTHROPIC_MODEL", defaults.model),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address, e.g. `127.0.0.1:8080`.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ServerConfig {
    /// Loads server settings from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            bind: env_string("ENGRAM_BIND", Self::default().bind),
        }
    }
}

/// Bearer-token validation settings.
///
/// Token *issuance* belongs to the external auth service; engram only
/// validates.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// HS256 secret. Required to serve; optional here so non-serving tools
    /// can load configuration without it.
    pub jwt_secret: Option<String>,
    /// Expected issuer claim, when set.
    pub issuer: Option<String>,
    /// Expected audience claim, when set.
    pub audience: Option<String>,
}

impl AuthConfig {
    /// Loads auth settings from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            jwt_secret: env_optional("ENGRAM_JWT_SECRET"),
            issuer: env_optional("ENGRAM_JWT_ISSUER"),
            audience: env_optional("ENGRAM_JWT_AUDIENCE"),
        }
    }
}

impl fmt::Display for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The secret never appears in logs.
        write!(
            f,
            "AuthConfig {{ secret: {}, issuer: {:?}, audience: {:?} }}",
            if self.jwt_secret.is_some() { "set" } else { "unset" },
            self.issuer,
            self.audience
        )
    }
}

/// Logging configuration settings.
#[derive(Debug, Clone, Default)]
pub struct LoggingSettings {
    /// Log format ("json" or "pretty").
    pub format: Option<String>,
    /// Log level (e.g. "info").
    pub level: Option<String>,
    /// Full filter override (e.g. "engram=debug,hyper=info").
    pub filter: Option<String>,
}

impl LoggingSettings {
    /// Loads logging settings from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            format: env_optional("ENGRAM_LOG_FORMAT"),
            level: env_optional("ENGRAM_LOG_LEVEL"),
            filter: env_optional("ENGRAM_LOG_FILTER"),
        }
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or(default)
}

fn env_optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).map_or(default, |v| {
        matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
    })
}
