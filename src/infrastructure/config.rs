use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProviderKind {
    OpenAi,
    Ollama,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorStoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_idle: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            min_idle: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_secs: u64,
    pub batch_size: usize,
    pub strict_dimensions: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::OpenAi,
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8000,
            timeout_secs: 30,
            batch_size: 10,
            strict_dimensions: false,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct ChatModelConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for ChatModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub vector_store: VectorStoreKind,
    pub search_limit: usize,
    pub similarity_threshold: f32,
    pub hydration_concurrency: usize,
    pub fallback_chat_limit: i64,
    pub overview_chat_limit: i64,
    pub chunk_size_words: usize,
    pub chunk_overlap_words: usize,
    pub retention_days: Option<i64>,
    pub retention_interval_secs: u64,
    pub request_deadline_secs: Option<u64>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_store: VectorStoreKind::Postgres,
            search_limit: 10,
            similarity_threshold: 0.6,
            hydration_concurrency: 8,
            fallback_chat_limit: 5,
            overview_chat_limit: 3,
            chunk_size_words: 200,
            chunk_overlap_words: 40,
            retention_days: None,
            retention_interval_secs: 3600,
            request_deadline_secs: Some(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            body_limit_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub chat_model: ChatModelConfig,
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Reads the process environment (after loading `.env` when present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();

        let database = DatabaseConfig {
            url: lookup("DATABASE_URL"),
            max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database.max_connections,
            )?,
            min_idle: parse_or(&lookup, "DATABASE_MIN_IDLE", defaults.database.min_idle)?,
        };

        let provider = match lookup("EMBEDDING_PROVIDER").as_deref().map(str::trim) {
            None | Some("openai") => EmbeddingProviderKind::OpenAi,
            Some("ollama") => EmbeddingProviderKind::Ollama,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "EMBEDDING_PROVIDER",
                    value: other.to_string(),
                });
            }
        };

        let embedding = EmbeddingConfig {
            provider,
            endpoint: lookup("EMBEDDING_ENDPOINT").unwrap_or_else(|| match provider {
                EmbeddingProviderKind::OpenAi => defaults.embedding.endpoint.clone(),
                EmbeddingProviderKind::Ollama => "http://localhost:11434".to_string(),
            }),
            api_key: lookup("EMBEDDING_API_KEY").or_else(|| lookup("OPENAI_API_KEY")),
            model: lookup("EMBEDDING_MODEL").unwrap_or(defaults.embedding.model),
            dimension: parse_or(&lookup, "EMBEDDING_DIMENSION", defaults.embedding.dimension)?,
            max_retries: parse_or(
                &lookup,
                "EMBEDDING_MAX_RETRIES",
                defaults.embedding.max_retries,
            )?,
            initial_backoff_ms: parse_or(
                &lookup,
                "EMBEDDING_INITIAL_BACKOFF_MS",
                defaults.embedding.initial_backoff_ms,
            )?,
            max_backoff_ms: parse_or(
                &lookup,
                "EMBEDDING_MAX_BACKOFF_MS",
                defaults.embedding.max_backoff_ms,
            )?,
            timeout_secs: parse_or(
                &lookup,
                "EMBEDDING_TIMEOUT_SECS",
                defaults.embedding.timeout_secs,
            )?,
            batch_size: parse_or(&lookup, "EMBEDDING_BATCH_SIZE", defaults.embedding.batch_size)?
                .max(1),
            strict_dimensions: parse_or(
                &lookup,
                "EMBEDDING_STRICT_DIMENSIONS",
                defaults.embedding.strict_dimensions,
            )?,
        };

        let chat_model = ChatModelConfig {
            endpoint: lookup("CHAT_ENDPOINT").unwrap_or(defaults.chat_model.endpoint),
            api_key: lookup("CHAT_API_KEY").or_else(|| lookup("OPENAI_API_KEY")),
            model: lookup("CHAT_MODEL").unwrap_or(defaults.chat_model.model),
            temperature: parse_or(&lookup, "CHAT_TEMPERATURE", defaults.chat_model.temperature)?,
            max_tokens: parse_opt(&lookup, "CHAT_MAX_TOKENS")?,
            timeout_secs: parse_or(&lookup, "CHAT_TIMEOUT_SECS", defaults.chat_model.timeout_secs)?,
        };

        let vector_store = match lookup("VECTOR_STORE").as_deref().map(str::trim) {
            None | Some("postgres") => VectorStoreKind::Postgres,
            Some("memory") => VectorStoreKind::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "VECTOR_STORE",
                    value: other.to_string(),
                });
            }
        };

        let r = defaults.retrieval;
        let retrieval = RetrievalConfig {
            vector_store,
            search_limit: parse_or(&lookup, "RETRIEVAL_SEARCH_LIMIT", r.search_limit)?,
            similarity_threshold: parse_or(
                &lookup,
                "RETRIEVAL_SIMILARITY_THRESHOLD",
                r.similarity_threshold,
            )?,
            hydration_concurrency: parse_or(
                &lookup,
                "RETRIEVAL_HYDRATION_CONCURRENCY",
                r.hydration_concurrency,
            )?
            .max(1),
            fallback_chat_limit: parse_or(
                &lookup,
                "RETRIEVAL_FALLBACK_CHAT_LIMIT",
                r.fallback_chat_limit,
            )?,
            overview_chat_limit: parse_or(
                &lookup,
                "RETRIEVAL_OVERVIEW_CHAT_LIMIT",
                r.overview_chat_limit,
            )?,
            chunk_size_words: parse_or(&lookup, "CHUNK_SIZE_WORDS", r.chunk_size_words)?.max(1),
            chunk_overlap_words: parse_or(&lookup, "CHUNK_OVERLAP_WORDS", r.chunk_overlap_words)?,
            retention_days: parse_opt(&lookup, "CHUNK_RETENTION_DAYS")?,
            retention_interval_secs: parse_or(
                &lookup,
                "CHUNK_RETENTION_INTERVAL_SECS",
                r.retention_interval_secs,
            )?,
            request_deadline_secs: match lookup("CHAT_REQUEST_DEADLINE_SECS").as_deref() {
                Some("0") | Some("off") => None,
                Some(_) => parse_opt(&lookup, "CHAT_REQUEST_DEADLINE_SECS")?,
                None => r.request_deadline_secs,
            },
        };

        let server = ServerConfig {
            port: parse_or(&lookup, "PORT", defaults.server.port)?,
            body_limit_bytes: parse_or(
                &lookup,
                "SERVER_BODY_LIMIT_BYTES",
                defaults.server.body_limit_bytes,
            )?,
        };

        if vector_store == VectorStoreKind::Postgres && database.url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(Self {
            database,
            embedding,
            chat_model,
            retrieval,
            server,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

fn parse_opt<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_memory_store() {
        let config = config_from(&[("VECTOR_STORE", "memory")]).unwrap();

        assert_eq!(config.retrieval.vector_store, VectorStoreKind::Memory);
        assert_eq!(config.retrieval.search_limit, 10);
        assert_eq!(config.retrieval.similarity_threshold, 0.6);
        assert_eq!(config.embedding.batch_size, 10);
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::OpenAi);
        assert!(!config.embedding.strict_dimensions);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_postgres_store_requires_database_url() {
        assert_eq!(
            config_from(&[]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
        assert!(config_from(&[("DATABASE_URL", "postgres://localhost/nestling")]).is_ok());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = config_from(&[("VECTOR_STORE", "memory"), ("EMBEDDING_DIMENSION", "big")])
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "EMBEDDING_DIMENSION",
                value: "big".to_string()
            }
        );

        assert!(config_from(&[("VECTOR_STORE", "sqlite")]).is_err());
        assert!(config_from(&[("VECTOR_STORE", "memory"), ("EMBEDDING_PROVIDER", "cohere")]).is_err());
    }

    #[test]
    fn test_overrides_and_deadline_toggle() {
        let config = config_from(&[
            ("VECTOR_STORE", "memory"),
            ("EMBEDDING_PROVIDER", "ollama"),
            ("EMBEDDING_DIMENSION", "768"),
            ("CHAT_REQUEST_DEADLINE_SECS", "off"),
            ("CHUNK_RETENTION_DAYS", "90"),
        ])
        .unwrap();

        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Ollama);
        assert_eq!(config.embedding.endpoint, "http://localhost:11434");
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.retrieval.request_deadline_secs, None);
        assert_eq!(config.retrieval.retention_days, Some(90));
    }
}
