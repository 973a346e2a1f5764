use std::{
    env,
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

const DEFAULT_CORS_ORIGINS: &[&str] =
    &["http://localhost:5173", "http://localhost:3000", "http://localhost:8080"];

const DEFAULT_AI_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini"];

const MAX_AI_TEMPERATURE: f64 = 2.0;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    server: ServerSettings,
    runtime: RuntimeSettings,
    api: ApiSettings,
    security: SecuritySettings,
    cors: CorsSettings,
    database: DatabaseSettings,
    redis: RedisSettings,
    ai: AiSettings,
    webhook: WebhookSettings,
    mentor: MentorSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
struct ServerSettings {
    host: String,
    port: u16,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) project_name: String,
    pub(crate) version: String,
    pub(crate) api_v1_str: String,
}

#[derive(Debug, Clone)]
pub(crate) struct SecuritySettings {
    pub(crate) secret_key: String,
    pub(crate) access_token_expire_minutes: u64,
    pub(crate) algorithm: String,
}

#[derive(Debug, Clone)]
pub(crate) struct CorsSettings {
    pub(crate) origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DatabaseSettings {
    server: String,
    port: u16,
    user: String,
    password: String,
    name: String,
    url: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct RedisSettings {
    host: String,
    port: u16,
    db: u16,
    password: String,
}

#[derive(Debug, Clone)]
pub(crate) struct AiSettings {
    pub(crate) openai_api_key: String,
    pub(crate) openai_base_url: String,
    /// Tried in order; the next one is used when a call fails.
    pub(crate) models: Vec<String>,
    pub(crate) max_tokens: u32,
    pub(crate) temperature: f64,
    /// Seconds.
    pub(crate) request_timeout: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct WebhookSettings {
    /// Empty disables the purchase webhook.
    pub(crate) purchase_token: String,
}

#[derive(Debug, Clone)]
pub(crate) struct MentorSettings {
    pub(crate) history_limit: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Staging,
    Production,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }

    fn parse(value: Option<&str>) -> Self {
        match value.map(str::to_lowercase).as_deref() {
            Some("production" | "prod") => Environment::Production,
            Some("staging") => Environment::Staging,
            Some("test" | "testing") => Environment::Test,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid cors origins: {0}")]
    InvalidCors(String),
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let environment =
            Environment::parse(var("ENEM_ENV").or_else(|| var("ENVIRONMENT")).as_deref());
        let strict_config = var("ENEM_STRICT_CONFIG").is_some_and(|value| parse_bool(&value))
            || environment == Environment::Production;

        let settings = Self {
            server: ServerSettings::from_env()?,
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings {
                project_name: var_or("PROJECT_NAME", "Enem Mentor API"),
                version: var_or("VERSION", env!("CARGO_PKG_VERSION")),
                api_v1_str: var_or("API_V1_STR", "/api/v1"),
            },
            security: SecuritySettings {
                secret_key: var("SECRET_KEY").unwrap_or_else(load_or_create_secret_key),
                access_token_expire_minutes: parse_var("ACCESS_TOKEN_EXPIRE_MINUTES", 10_080)?,
                algorithm: var_or("ALGORITHM", "HS256"),
            },
            cors: CorsSettings { origins: parse_cors_origins(var("BACKEND_CORS_ORIGINS"))? },
            database: DatabaseSettings::from_env()?,
            redis: RedisSettings::from_env()?,
            ai: AiSettings::from_env()?,
            webhook: WebhookSettings { purchase_token: var_or("PURCHASE_WEBHOOK_TOKEN", "") },
            mentor: MentorSettings { history_limit: parse_var("MENTOR_HISTORY_LIMIT", 20)? },
            telemetry: TelemetrySettings {
                log_level: var_or("ENEM_LOG_LEVEL", "info"),
                json: var("ENEM_LOG_JSON").is_some_and(|value| parse_bool(&value)),
                prometheus_enabled: var("PROMETHEUS_ENABLED").is_some_and(|value| parse_bool(&value)),
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn webhook(&self) -> &WebhookSettings {
        &self.webhook
    }

    pub(crate) fn mentor(&self) -> &MentorSettings {
        &self.mentor
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    /// Range checks always apply; secrets are only required in strict mode.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ai.models.is_empty() {
            return Err(invalid("AI_MODELS", "<empty>"));
        }
        if !(0.0..=MAX_AI_TEMPERATURE).contains(&self.ai.temperature) {
            return Err(invalid("AI_TEMPERATURE", self.ai.temperature));
        }
        if self.mentor.history_limit < 0 {
            return Err(invalid("MENTOR_HISTORY_LIMIT", self.mentor.history_limit));
        }

        if !self.runtime.strict_config {
            return Ok(());
        }

        let required = [
            ("POSTGRES_PASSWORD", self.database.url.is_some() || !self.database.password.is_empty()),
            ("OPENAI_API_KEY", !self.ai.openai_api_key.is_empty()),
            ("PURCHASE_WEBHOOK_TOKEN", !self.webhook.purchase_token.is_empty()),
        ];
        match required.iter().find(|(_, present)| !present) {
            Some((name, _)) => Err(ConfigError::MissingSecret(*name)),
            None => Ok(()),
        }
    }
}

impl ServerSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let host = var_or("ENEM_HOST", "0.0.0.0");
        let port: u16 = parse_var("ENEM_PORT", 8000)?;
        if port == 0 {
            return Err(invalid("ENEM_PORT", port));
        }
        Ok(Self { host, port })
    }
}

impl DatabaseSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: var_or("POSTGRES_SERVER", "localhost"),
            port: parse_var("POSTGRES_PORT", 5432)?,
            user: var_or("POSTGRES_USER", "enem"),
            password: var_or("POSTGRES_PASSWORD", ""),
            name: var_or("POSTGRES_DB", "enem_mentor"),
            url: var("DATABASE_URL"),
        })
    }

    /// `DATABASE_URL` wins over the `POSTGRES_*` parts.
    pub(crate) fn database_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "postgresql://{}:{}@{}:{}/{}",
                self.user, self.password, self.server, self.port, self.name
            ),
        }
    }
}

impl RedisSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: var_or("REDIS_HOST", "localhost"),
            port: parse_var("REDIS_PORT", 6379)?,
            db: parse_var("REDIS_DB", 0)?,
            password: var_or("REDIS_PASSWORD", ""),
        })
    }

    pub(crate) fn redis_url(&self) -> String {
        let auth = if self.password.is_empty() { String::new() } else { format!(":{}@", self.password) };
        format!("redis://{auth}{}:{}/{}", self.host, self.port, self.db)
    }
}

impl AiSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let temperature: f64 = parse_var("AI_TEMPERATURE", 0.4)?;
        if !temperature.is_finite() {
            return Err(invalid("AI_TEMPERATURE", temperature));
        }

        Ok(Self {
            openai_api_key: var_or("OPENAI_API_KEY", ""),
            openai_base_url: var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            models: parse_model_list(var("AI_MODELS")),
            max_tokens: parse_var("AI_MAX_TOKENS", 4000)?,
            temperature,
            request_timeout: parse_var("AI_REQUEST_TIMEOUT", 90)?,
        })
    }
}

/// Trimmed value; blank counts as unset.
fn var(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn var_or(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|| default.to_string())
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match var(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue { field: key, value: raw }),
        None => Ok(default),
    }
}

fn invalid(field: &'static str, value: impl Display) -> ConfigError {
    ConfigError::InvalidValue { field, value: value.to_string() }
}

fn default_origins() -> Vec<String> {
    DEFAULT_CORS_ORIGINS.iter().map(|origin| origin.to_string()).collect()
}

/// Accepts a JSON list or a comma-separated string.
fn parse_cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = value else {
        return Ok(default_origins());
    };

    let origins: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str(&raw).map_err(|_| ConfigError::InvalidCors(raw.clone()))?
    } else {
        raw.split(',').map(str::trim).filter(|item| !item.is_empty()).map(String::from).collect()
    };

    Ok(if origins.is_empty() { default_origins() } else { origins })
}

fn parse_model_list(value: Option<String>) -> Vec<String> {
    let Some(raw) = value else {
        return DEFAULT_AI_MODELS.iter().map(|model| model.to_string()).collect();
    };

    let mut models: Vec<String> = Vec::new();
    for model in raw.split(',').map(str::trim).filter(|model| !model.is_empty()) {
        if !models.iter().any(|existing| existing == model) {
            models.push(model.to_string());
        }
    }
    models
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Reads the key persisted next to the manifest, creating it on first run so
/// tokens survive restarts in development.
fn load_or_create_secret_key() -> String {
    let path = secret_file_path();
    if let Some(existing) = read_secret(&path) {
        return existing;
    }

    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    let new_key = URL_SAFE_NO_PAD.encode(bytes);

    match write_secret(&path, &new_key) {
        Ok(()) => new_key,
        // Another process won the race.
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            read_secret(&path).unwrap_or(new_key)
        }
        Err(err) => {
            tracing::warn!(error = %err, path = %path.display(), "Failed to persist secret key");
            new_key
        }
    }
}

fn read_secret(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn write_secret(path: &Path, key: &str) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(key.as_bytes())
}

fn secret_file_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".secret_key")
}
