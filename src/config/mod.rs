use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default location of the scope description shipped with the service image
pub const DEFAULT_SCOPE_FILE: &str = "./res/scope.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no required scope configured (set SCOPE_VALUE or provide a scope file)")]
    MissingScope,

    #[error("unable to read scope file {path}: {source}")]
    ScopeFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scope file {path} is not a valid scope description: {source}")]
    ScopeFileFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub scope: ScopeConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Log filter used when RUST_LOG is not set
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            Environment::Development => "debug",
            Environment::Staging | Environment::Production => "info",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub listen_address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection string; takes precedence over the discrete fields below
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub statement_timeout_secs: u64,
}

/// The scope a caller must hold, as asserted by the API gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub value: String,
}

impl ScopeConfig {
    /// Scope config holding only a value, handy for tests and overrides
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    /// Read a scope description from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ScopeFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::ScopeFileFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the scope from SCOPE_FILE_PATH and SCOPE_VALUE.
    ///
    /// The file is optional only when SCOPE_VALUE is set; an explicitly
    /// configured file that cannot be read is always an error.
    fn from_env() -> Result<Self, ConfigError> {
        let explicit_file = env::var("SCOPE_FILE_PATH").ok();
        let value_override = env::var("SCOPE_VALUE").ok();

        let mut scope = match (&explicit_file, &value_override) {
            (Some(path), _) => Self::from_file(path)?,
            (None, Some(_)) => match Self::from_file(DEFAULT_SCOPE_FILE) {
                Ok(scope) => scope,
                Err(ConfigError::ScopeFile { .. }) => Self::default(),
                Err(other) => return Err(other),
            },
            (None, None) => Self::from_file(DEFAULT_SCOPE_FILE)?,
        };

        if let Some(value) = value_override {
            scope.value = value;
        }
        if scope.value.trim().is_empty() {
            return Err(ConfigError::MissingScope);
        }
        Ok(scope)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let scope = ScopeConfig::from_env()?;

        // Set defaults based on environment, then override with specific env vars
        let config = match environment {
            Environment::Production => Self::production(scope),
            Environment::Staging => Self::staging(scope),
            Environment::Development => Self::development(scope),
        };
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        // HTTP overrides
        if let Ok(v) = env::var("HTTP_LISTEN_ADDRESS") {
            self.http.listen_address = v;
        }
        if let Ok(v) = env::var("HTTP_LISTEN_PORT").or_else(|_| env::var("PORT")) {
            self.http.port = v.parse().unwrap_or(self.http.port);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("PG_HOST") {
            self.database.host = v;
        }
        if let Ok(v) = env::var("PG_PORT") {
            self.database.port = v.parse().unwrap_or(self.database.port);
        }
        if let Ok(v) = env::var("PG_USER") {
            self.database.user = v;
        }
        if let Ok(v) = env::var("PG_PASS") {
            self.database.password = v;
        }
        if let Ok(v) = env::var("PG_DB") {
            self.database.database = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_ACQUIRE_TIMEOUT") {
            self.database.acquire_timeout_secs = v.parse().unwrap_or(self.database.acquire_timeout_secs);
        }
        if let Ok(v) = env::var("DATABASE_STATEMENT_TIMEOUT") {
            self.database.statement_timeout_secs = v.parse().unwrap_or(self.database.statement_timeout_secs);
        }

        self
    }

    fn base_database() -> DatabaseConfig {
        DatabaseConfig {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            statement_timeout_secs: 30,
        }
    }

    fn development(scope: ScopeConfig) -> Self {
        Self {
            environment: Environment::Development,
            http: HttpConfig {
                listen_address: "0.0.0.0".to_string(),
                port: 8000,
            },
            database: Self::base_database(),
            scope,
        }
    }

    fn staging(scope: ScopeConfig) -> Self {
        Self {
            environment: Environment::Staging,
            http: HttpConfig {
                listen_address: "0.0.0.0".to_string(),
                port: 8000,
            },
            database: DatabaseConfig {
                max_connections: 20,
                acquire_timeout_secs: 10,
                statement_timeout_secs: 15,
                ..Self::base_database()
            },
            scope,
        }
    }

    fn production(scope: ScopeConfig) -> Self {
        Self {
            environment: Environment::Production,
            http: HttpConfig {
                listen_address: "0.0.0.0".to_string(),
                port: 8000,
            },
            database: DatabaseConfig {
                max_connections: 50,
                acquire_timeout_secs: 5,
                statement_timeout_secs: 10,
                ..Self::base_database()
            },
            scope,
        }
    }
}
