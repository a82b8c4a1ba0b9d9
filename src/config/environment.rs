// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, database URLs, and upstream credentials
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Environment-based configuration management for production deployment

use crate::constants::defaults;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Environment type for logging and behavioral defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Type-safe database location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// SQLite database with file path
    SQLite { path: PathBuf },
    /// In-memory SQLite (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string with validation
    ///
    /// # Errors
    ///
    /// Returns an error for non-SQLite URLs; the console is a local-first
    /// single-process application and only supports SQLite.
    pub fn parse_url(s: &str) -> Result<Self> {
        if let Some(path_str) = s.strip_prefix("sqlite:") {
            if path_str == ":memory:" {
                Ok(Self::Memory)
            } else {
                Ok(Self::SQLite {
                    path: PathBuf::from(path_str),
                })
            }
        } else if s.contains("://") {
            Err(anyhow!("Unsupported database URL scheme: {s}"))
        } else {
            // Bare paths are treated as SQLite files
            Ok(Self::SQLite {
                path: PathBuf::from(s),
            })
        }
    }

    /// Connection string understood by sqlx
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".into(),
        }
    }

    /// Filesystem path of the database, if it has one
    #[must_use]
    pub fn file_path(&self) -> Option<&PathBuf> {
        match self {
            Self::SQLite { path } => Some(path),
            Self::Memory => None,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database location
    pub url: DatabaseUrl,
}

/// OpenRouter upstream configuration
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    /// API base URL
    pub base_url: String,
    /// Bearer credential; absent means streaming and sync are unavailable
    pub api_key: Option<String>,
    /// `HTTP-Referer` header value sent upstream (OpenRouter attribution)
    pub http_referer: String,
    /// `X-Title` header value sent upstream (OpenRouter attribution)
    pub x_title: String,
    /// Connect timeout in seconds for non-streaming calls
    pub timeout_secs: u64,
}

impl OpenRouterConfig {
    fn from_env() -> Self {
        Self {
            base_url: env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| defaults::OPENROUTER_BASE_URL.into()),
            api_key: env::var("OPENROUTER_API_KEY").ok().filter(|k| !k.is_empty()),
            http_referer: env::var("OPENROUTER_HTTP_REFERER")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            x_title: env::var("OPENROUTER_X_TITLE")
                .unwrap_or_else(|_| "Self-Hosted LLM Console".into()),
            timeout_secs: env::var("OPENROUTER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

/// Filesystem locations owned by the server
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory for uploaded documents
    pub uploads_dir: PathBuf,
    /// Directory for database backups
    pub backup_dir: PathBuf,
}

impl StorageConfig {
    fn from_env() -> Self {
        Self {
            uploads_dir: PathBuf::from(
                env::var("UPLOADS_DIR").unwrap_or_else(|_| "./uploads".into()),
            ),
            backup_dir: PathBuf::from(
                env::var("BACKUP_DIR").unwrap_or_else(|_| "./backups".into()),
            ),
        }
    }
}

/// Complete server configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Database location
    pub database: DatabaseConfig,
    /// Upstream provider settings
    pub openrouter: OpenRouterConfig,
    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
    /// Upload and backup directories
    pub storage: StorageConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but unparseable
    pub fn from_env() -> Result<Self> {
        let http_port = env::var("HTTP_PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .context("HTTP_PORT must be a valid port number")?;

        let environment = Environment::from_str_or_default(
            &env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        );

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./console.db".into());
        let database = DatabaseConfig {
            url: DatabaseUrl::parse_url(&database_url)?,
        };

        let cors_origins = env::var("APP_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        Ok(Self {
            http_port,
            environment,
            database,
            openrouter: OpenRouterConfig::from_env(),
            cors_origins,
            storage: StorageConfig::from_env(),
        })
    }

    /// One-line configuration summary for startup logging
    ///
    /// Never includes the credential itself, only whether one is set.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "port={} env={} db={} upstream={} api_key={}",
            self.http_port,
            self.environment,
            self.database.url.to_connection_string(),
            self.openrouter.base_url,
            if self.openrouter.api_key.is_some() {
                "configured"
            } else {
                "missing"
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_parse() {
        assert!(matches!(
            DatabaseUrl::parse_url("sqlite::memory:").unwrap(),
            DatabaseUrl::Memory
        ));
        let file = DatabaseUrl::parse_url("sqlite:./console.db").unwrap();
        assert_eq!(file.to_connection_string(), "sqlite:./console.db");
        assert!(DatabaseUrl::parse_url("postgresql://localhost/x").is_err());
    }

    #[test]
    fn test_bare_path_is_sqlite() {
        let url = DatabaseUrl::parse_url("./data/console.db").unwrap();
        assert!(matches!(url, DatabaseUrl::SQLite { .. }));
    }

    #[test]
    fn test_environment_parse() {
        assert!(Environment::from_str_or_default("prod").is_production());
        assert_eq!(
            Environment::from_str_or_default("unknown"),
            Environment::Development
        );
    }
}
