//! Configuration module
//!
//! This module provides configuration structures for the API server and the
//! submission worker: database, session auth, resource storage, Zoho CRM and
//! outbox settings. Everything is read from environment variables (a `.env`
//! file is loaded first when present).

use std::env;
use std::str::FromStr;

// Common constants
const SERVER_PORT: u16 = 4000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const SESSION_TTL_HOURS: i64 = 24;
const MAX_UPLOAD_SIZE_MB: usize = 25;
const DEFAULT_RESOURCE_EXTENSIONS: &str = "pdf,doc,docx,ppt,pptx,xls,xlsx,txt,jpg,jpeg,png";
const ZOHO_API_BASE_URL: &str = "https://www.zohoapis.com/crm/v8";
const ZOHO_HTTP_TIMEOUT_SECS: u64 = 30;
const SUBMISSION_MAX_RETRIES: i32 = 3;
const SUBMISSION_POLL_INTERVAL_MS: u64 = 1000;
const SUBMISSION_RETRY_INTERVAL_SECS: u64 = 60;
const SUBMISSION_RETRY_BASE_SECS: i64 = 30;
const SUBMISSION_MAX_CONCURRENT: usize = 4;
const SUBMISSION_TIMEOUT_SECS: u64 = 60;

/// Base configuration shared by the server and the CLI
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub environment: String,
    /// "compact" or "json"
    pub log_format: String,
}

/// Local storage for uploaded resource files
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub local_storage_path: String,
    pub max_upload_size_bytes: usize,
    pub allowed_extensions: Vec<String>,
}

/// Zoho CRM connection and notification recipients
#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub api_base_url: String,
    pub access_token: Option<String>,
    pub http_timeout_seconds: u64,
    pub notify_cas_emails: Vec<String>,
    pub notify_cann_emails: Vec<String>,
    pub notify_general_emails: Vec<String>,
}

/// Submission outbox worker settings
#[derive(Clone, Debug)]
pub struct SubmissionConfig {
    pub worker_enabled: bool,
    pub max_retries: i32,
    pub poll_interval_ms: u64,
    pub retry_interval_seconds: u64,
    pub retry_base_seconds: i64,
    pub max_concurrent: usize,
    pub timeout_seconds: u64,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub base: BaseConfig,
    pub database_url: String,
    pub storage: StorageConfig,
    pub crm: CrmConfig,
    pub submissions: SubmissionConfig,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<AppConfig>);

impl Config {
    fn inner(&self) -> &AppConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.inner().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = AppConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn jwt_secret(&self) -> &str {
        &self.inner().base.jwt_secret
    }

    pub fn session_ttl_hours(&self) -> i64 {
        self.inner().base.session_ttl_hours
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn log_format(&self) -> &str {
        &self.inner().base.log_format
    }

    pub fn local_storage_path(&self) -> &str {
        &self.inner().storage.local_storage_path
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.inner().storage.max_upload_size_bytes
    }

    pub fn allowed_resource_extensions(&self) -> &[String] {
        &self.inner().storage.allowed_extensions
    }

    pub fn crm(&self) -> &CrmConfig {
        &self.inner().crm
    }

    pub fn submissions(&self) -> &SubmissionConfig {
        &self.inner().submissions
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production_env(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let base = BaseConfig {
            server_port: env::var("SERVER_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?,
            cors_origins: split_list(&cors_origins_str),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for member sessions"))?,
            session_ttl_hours: env_or("SESSION_TTL_HOURS", SESSION_TTL_HOURS),
            environment,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "compact".to_string())
                .to_lowercase(),
        };

        let storage = StorageConfig {
            local_storage_path: env::var("STORAGE_PATH")
                .unwrap_or_else(|_| "./data/resources".to_string()),
            max_upload_size_bytes: env_or("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB) * 1024 * 1024,
            allowed_extensions: split_list(
                &env::var("ALLOWED_RESOURCE_EXTENSIONS")
                    .unwrap_or_else(|_| DEFAULT_RESOURCE_EXTENSIONS.to_string()),
            )
            .into_iter()
            .map(|ext| ext.to_lowercase())
            .collect(),
        };

        let crm = CrmConfig {
            api_base_url: env::var("ZOHO_API_BASE_URL")
                .unwrap_or_else(|_| ZOHO_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            access_token: env::var("ZOHO_ACCESS_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            http_timeout_seconds: env_or("ZOHO_HTTP_TIMEOUT_SECONDS", ZOHO_HTTP_TIMEOUT_SECS),
            notify_cas_emails: split_list(&env::var("ZOHO_NOTIFY_CAS_EMAILS").unwrap_or_default()),
            notify_cann_emails: split_list(
                &env::var("ZOHO_NOTIFY_CANN_EMAILS").unwrap_or_default(),
            ),
            notify_general_emails: split_list(
                &env::var("ZOHO_NOTIFY_GENERAL_EMAILS").unwrap_or_default(),
            ),
        };

        let submissions = SubmissionConfig {
            worker_enabled: env_or("SUBMISSION_WORKER_ENABLED", true),
            max_retries: env_or("SUBMISSION_MAX_RETRIES", SUBMISSION_MAX_RETRIES),
            poll_interval_ms: env_or("SUBMISSION_POLL_INTERVAL_MS", SUBMISSION_POLL_INTERVAL_MS),
            retry_interval_seconds: env_or(
                "SUBMISSION_RETRY_INTERVAL_SECONDS",
                SUBMISSION_RETRY_INTERVAL_SECS,
            ),
            retry_base_seconds: env_or("SUBMISSION_RETRY_BASE_SECONDS", SUBMISSION_RETRY_BASE_SECS),
            max_concurrent: env_or("SUBMISSION_MAX_CONCURRENT", SUBMISSION_MAX_CONCURRENT),
            timeout_seconds: env_or("SUBMISSION_TIMEOUT_SECONDS", SUBMISSION_TIMEOUT_SECS),
        };

        let config = AppConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage,
            crm,
            submissions,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.base.session_ttl_hours <= 0 {
            return Err(anyhow::anyhow!("SESSION_TTL_HOURS must be positive"));
        }

        if self.base.log_format != "compact" && self.base.log_format != "json" {
            return Err(anyhow::anyhow!("LOG_FORMAT must be 'compact' or 'json'"));
        }

        if self.submissions.max_retries < 0 {
            return Err(anyhow::anyhow!("SUBMISSION_MAX_RETRIES cannot be negative"));
        }

        if self.submissions.max_concurrent == 0 {
            return Err(anyhow::anyhow!("SUBMISSION_MAX_CONCURRENT must be at least 1"));
        }

        if !self.crm.api_base_url.starts_with("http://")
            && !self.crm.api_base_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!("ZOHO_API_BASE_URL must be an http(s) URL"));
        }

        Ok(())
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

/// Read and parse an environment variable, falling back to `default` when it
/// is unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().to_lowercase().parse().ok())
        .unwrap_or(default)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
