// src/config.rs

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use dotenvy::dotenv;
use url::Url;

pub const DEFAULT_CLASS_SETS: &str = "11Y/Ph1,11X/Ph2,10A/Ph1,Teacher Test";

/// Error raised when an environment variable is missing or malformed.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Where question scans and student drawings are kept.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    Memory,
    Local { root: PathBuf },
    Supabase { url: Url, service_key: String, bucket: String },
}

/// Settings for the OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// `None` disables generation and marking.
    pub api_key: Option<String>,
    pub base_url: Url,
    pub model: String,
    pub reasoning_effort: Option<String>,
    pub timeout_secs: u64,
    pub max_completion_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub teacher_username: Option<String>,
    pub teacher_password: Option<String>,
    pub class_sets: Vec<String>,
    pub storage: StorageConfig,
    pub ai: AiConfig,
    pub max_upload_bytes: usize,
    pub seed_sample_questions: bool,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = optional("DATABASE_URL");

        let jwt_secret =
            optional("JWT_SECRET").ok_or_else(|| ConfigError("JWT_SECRET must be set".into()))?;

        let jwt_expiration = parsed("JWT_EXPIRATION", 8 * 60 * 60)?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = parsed("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?;

        let class_sets = split_list(
            &env::var("CLASS_SETS").unwrap_or_else(|_| DEFAULT_CLASS_SETS.to_string()),
        );
        if class_sets.is_empty() {
            return Err(ConfigError("CLASS_SETS must name at least one class set".into()));
        }

        let storage = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .as_str()
        {
            "memory" => StorageConfig::Memory,
            "local" => StorageConfig::Local {
                root: PathBuf::from(
                    env::var("STORAGE_DIR").unwrap_or_else(|_| "storage".to_string()),
                ),
            },
            "supabase" => {
                let url = optional("SUPABASE_URL").ok_or_else(|| {
                    ConfigError("SUPABASE_URL must be set for the supabase backend".into())
                })?;
                let service_key = optional("SUPABASE_SERVICE_KEY").ok_or_else(|| {
                    ConfigError("SUPABASE_SERVICE_KEY must be set for the supabase backend".into())
                })?;
                StorageConfig::Supabase {
                    url: parse_base_url("SUPABASE_URL", &url)?,
                    service_key,
                    bucket: env::var("STORAGE_BUCKET").unwrap_or_else(|_| "panphy".to_string()),
                }
            }
            other => {
                return Err(ConfigError(format!(
                    "STORAGE_BACKEND must be memory, local or supabase (got '{}')",
                    other
                )));
            }
        };

        let base_url = env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let ai = AiConfig {
            api_key: optional("OPENAI_API_KEY"),
            base_url: parse_base_url("OPENAI_BASE_URL", &base_url)?,
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-5-nano".to_string()),
            reasoning_effort: match env::var("OPENAI_REASONING_EFFORT") {
                Ok(v) if v.trim().is_empty() || v == "none" => None,
                Ok(v) => Some(v),
                Err(_) => Some("minimal".to_string()),
            },
            timeout_secs: parsed("AI_TIMEOUT_SECS", 60)?,
            max_completion_tokens: parsed("AI_MAX_COMPLETION_TOKENS", 1500)?,
        };

        let max_upload_bytes = parsed("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?;
        let seed_sample_questions = parsed("SEED_SAMPLE_QUESTIONS", true)?;

        let cors_origins = cors_origins(env::var("CORS_ORIGINS").ok().as_deref());

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            teacher_username: optional("TEACHER_USERNAME"),
            teacher_password: optional("TEACHER_PASSWORD"),
            class_sets,
            storage,
            ai,
            max_upload_bytes,
            seed_sample_questions,
            cors_origins,
        })
    }

    /// A self-contained configuration: memory store, memory blobs, AI disabled.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: None,
            jwt_secret: jwt_secret.to_string(),
            jwt_expiration: 600,
            rust_log: "error".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            teacher_username: None,
            teacher_password: None,
            class_sets: split_list(DEFAULT_CLASS_SETS),
            storage: StorageConfig::Memory,
            ai: AiConfig {
                api_key: None,
                base_url: Url::parse("https://api.openai.com/v1/").expect("static url parses"),
                model: "test-model".to_string(),
                reasoning_effort: None,
                timeout_secs: 5,
                max_completion_tokens: 500,
            },
            max_upload_bytes: 2 * 1024 * 1024,
            seed_sample_questions: false,
            cors_origins: Vec::new(),
        }
    }

    pub fn is_known_class_set(&self, class_set: &str) -> bool {
        self.class_sets.iter().any(|c| c == class_set)
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError(format!("{} has an invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

/// Allowed browser origins. Unset means the local dev origins; `*` means any
/// origin, represented by an empty list.
fn cors_origins(raw: Option<&str>) -> Vec<String> {
    match raw.map(str::trim) {
        Some("*") => Vec::new(),
        Some(list) if !list.is_empty() => split_list(list),
        _ => split_list(DEFAULT_CORS_ORIGINS),
    }
}

/// Parses a base URL and guarantees a trailing slash so `Url::join` appends
/// instead of replacing the last segment.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&normalized).map_err(|e| ConfigError(format!("{} is not a valid URL: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_drops_empty_entries() {
        assert_eq!(
            split_list(" 11Y/Ph1 , ,Teacher Test,"),
            vec!["11Y/Ph1".to_string(), "Teacher Test".to_string()]
        );
    }

    #[test]
    fn cors_defaults_to_local_origins_and_star_allows_any() {
        assert_eq!(
            cors_origins(None),
            vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string()
            ]
        );
        assert_eq!(cors_origins(Some(" ")), cors_origins(None));
        assert!(cors_origins(Some("*")).is_empty());
        assert_eq!(
            cors_origins(Some("https://panphy.example")),
            vec!["https://panphy.example".to_string()]
        );
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = parse_base_url("X", "https://example.com/v1").unwrap();
        assert_eq!(url.join("chat/completions").unwrap().as_str(), "https://example.com/v1/chat/completions");
    }

    #[test]
    fn test_config_knows_default_class_sets() {
        let config = Config::for_tests("secret");
        assert!(config.is_known_class_set("11Y/Ph1"));
        assert!(!config.is_known_class_set("12Z/Ph9"));
    }
}
