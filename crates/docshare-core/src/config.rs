//! Configuration module
//!
//! Settings are read from the process environment (a `.env` file is loaded
//! first when present) and validated once at startup.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::constants::{
    ALLOWED_EXTENSIONS, DEFAULT_SHARE_MAX_USES, DEFAULT_SHARE_TTL_HOURS, DOWNLOAD_LINK_TTL_SECS,
    LISTING_LINK_TTL_SECS, MAX_FILE_SIZE_MB, MAX_SHARE_TTL_HOURS, MAX_SHARE_USES,
    RETAINED_SWEEP_INTERVAL_SECS,
};
use crate::models::Role;
use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 3000;
const DB_MAX_CONNECTIONS: u32 = 20;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
const MIN_SECRET_LEN: usize = 32;

/// Where file metadata and share tokens are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataBackend {
    #[default]
    Memory,
    Postgres,
}

impl FromStr for MetadataBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "in-memory" => Ok(MetadataBackend::Memory),
            "postgres" | "postgresql" => Ok(MetadataBackend::Postgres),
            _ => Err(format!("Invalid metadata backend: {}", s)),
        }
    }
}

impl Display for MetadataBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MetadataBackend::Memory => write!(f, "memory"),
            MetadataBackend::Postgres => write!(f, "postgres"),
        }
    }
}

/// How bearer credentials are turned into a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Verify HS256 JWTs locally
    #[default]
    Jwt,
    /// Ask the identity provider to introspect the credential
    Introspection,
    /// Every request is the configured principal. Development and tests only.
    Fixed,
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jwt" => Ok(AuthMode::Jwt),
            "introspection" | "remote" => Ok(AuthMode::Introspection),
            "fixed" => Ok(AuthMode::Fixed),
            _ => Err(format!("Invalid auth mode: {}", s)),
        }
    }
}

impl Display for AuthMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AuthMode::Jwt => write!(f, "jwt"),
            AuthMode::Introspection => write!(f, "introspection"),
            AuthMode::Fixed => write!(f, "fixed"),
        }
    }
}

/// Server-wide settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    /// Externally reachable base URL, used for share links and local signed URLs
    pub public_base_url: String,
    pub log_json: bool,
    pub metadata_backend: MetadataBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// In-flight request ceiling for the whole router
    pub http_concurrency_limit: usize,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            server_port: SERVER_PORT,
            cors_origins: vec!["*".to_string()],
            environment: "development".to_string(),
            public_base_url: format!("http://localhost:{}", SERVER_PORT),
            log_json: false,
            metadata_backend: MetadataBackend::Memory,
            database_url: None,
            db_max_connections: DB_MAX_CONNECTIONS,
            http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO and friends)
    pub s3_endpoint: Option<String>,
    pub local_storage_path: String,
    pub url_signing_secret: Option<String>,
    pub download_link_ttl_secs: u64,
    pub listing_link_ttl_secs: u64,
    /// How often blobs kept for deleted files are checked for release
    pub retained_sweep_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: "./data/blobs".to_string(),
            url_signing_secret: None,
            download_link_ttl_secs: DOWNLOAD_LINK_TTL_SECS,
            listing_link_ttl_secs: LISTING_LINK_TTL_SECS,
            retained_sweep_interval_secs: RETAINED_SWEEP_INTERVAL_SECS,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub jwt_secret: Option<String>,
    pub auth_service_url: Option<String>,
    pub fixed_principal_id: Option<String>,
    pub fixed_principal_role: Role,
}

/// Bounds applied when issuing share tokens
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShareConfig {
    pub default_ttl_hours: i64,
    pub default_max_uses: u32,
    pub max_ttl_hours: i64,
    pub max_uses: u32,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            default_ttl_hours: DEFAULT_SHARE_TTL_HOURS,
            default_max_uses: DEFAULT_SHARE_MAX_USES,
            max_ttl_hours: MAX_SHARE_TTL_HOURS,
            max_uses: MAX_SHARE_USES,
        }
    }
}

#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub max_file_size_bytes: usize,
    /// Lowercase extensions without the leading dot
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub base: BaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub share: ShareConfig,
    pub upload: UploadConfig,
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let server_port = env_parse("PORT", SERVER_PORT);

        let metadata_backend = match env_opt("METADATA_BACKEND") {
            Some(raw) => raw.parse::<MetadataBackend>().map_err(anyhow::Error::msg)?,
            None => MetadataBackend::Memory,
        };

        let base = BaseConfig {
            server_port,
            cors_origins,
            environment,
            public_base_url: env_opt("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{}", server_port))
                .trim_end_matches('/')
                .to_string(),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            metadata_backend,
            database_url: env_opt("DATABASE_URL"),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS),
            http_concurrency_limit: env_parse("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT)
                .max(1),
        };

        let backend = match env_opt("STORAGE_BACKEND") {
            Some(raw) => raw.parse::<StorageBackend>()?,
            None => StorageBackend::S3,
        };

        let storage = StorageConfig {
            backend,
            s3_bucket: env_opt("S3_BUCKET_NAME").or_else(|| env_opt("S3_BUCKET")),
            s3_region: env_opt("S3_REGION").or_else(|| env_opt("AWS_REGION")),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            local_storage_path: env_opt("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|| "./data/blobs".to_string()),
            url_signing_secret: env_opt("URL_SIGNING_SECRET"),
            download_link_ttl_secs: env_parse("DOWNLOAD_LINK_TTL_SECS", DOWNLOAD_LINK_TTL_SECS),
            listing_link_ttl_secs: env_parse("LISTING_LINK_TTL_SECS", LISTING_LINK_TTL_SECS),
            retained_sweep_interval_secs: env_parse(
                "RETAINED_BLOB_SWEEP_SECS",
                RETAINED_SWEEP_INTERVAL_SECS,
            )
            .max(1),
        };

        let mode = match env_opt("AUTH_MODE") {
            Some(raw) => raw.parse::<AuthMode>().map_err(anyhow::Error::msg)?,
            None => AuthMode::Jwt,
        };

        let auth = AuthConfig {
            mode,
            jwt_secret: env_opt("JWT_SECRET"),
            auth_service_url: env_opt("AUTH_SERVICE_URL"),
            fixed_principal_id: env_opt("FIXED_PRINCIPAL_ID"),
            fixed_principal_role: env_opt("FIXED_PRINCIPAL_ROLE")
                .map(|r| r.parse::<Role>())
                .transpose()?
                .unwrap_or_default(),
        };

        let share = ShareConfig {
            default_ttl_hours: env_parse("SHARE_DEFAULT_TTL_HOURS", DEFAULT_SHARE_TTL_HOURS),
            default_max_uses: env_parse("SHARE_DEFAULT_MAX_USES", DEFAULT_SHARE_MAX_USES),
            max_ttl_hours: env_parse("SHARE_MAX_TTL_HOURS", MAX_SHARE_TTL_HOURS),
            max_uses: env_parse("SHARE_MAX_USES", MAX_SHARE_USES),
        };

        let max_file_size_mb = env_parse("MAX_FILE_SIZE_MB", MAX_FILE_SIZE_MB);
        let upload = UploadConfig {
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            allowed_extensions: env_opt("ALLOWED_EXTENSIONS")
                .map(|raw| split_list(&raw))
                .unwrap_or_else(|| UploadConfig::default().allowed_extensions),
        };

        Ok(Config {
            base,
            storage,
            auth,
            share,
            upload,
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.is_production() && self.base.cors_origins.iter().any(|o| o.trim() == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.base.metadata_backend == MetadataBackend::Postgres {
            match self.base.database_url.as_deref() {
                Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {}
                _ => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string when METADATA_BACKEND=postgres"
                    ))
                }
            }
        }

        match self.storage.backend {
            StorageBackend::S3 => {
                if self.storage.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET_NAME must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => match self.storage.url_signing_secret.as_deref() {
                Some(secret) if secret.len() >= MIN_SECRET_LEN => {}
                _ => {
                    return Err(anyhow::anyhow!(
                        "URL_SIGNING_SECRET must be at least {} characters when using local storage backend",
                        MIN_SECRET_LEN
                    ))
                }
            },
        }

        if self.storage.download_link_ttl_secs == 0 || self.storage.listing_link_ttl_secs == 0 {
            return Err(anyhow::anyhow!("Download link TTLs must be greater than zero"));
        }

        match self.auth.mode {
            AuthMode::Jwt => match self.auth.jwt_secret.as_deref() {
                Some(secret) if secret.len() >= MIN_SECRET_LEN => {}
                _ => {
                    return Err(anyhow::anyhow!(
                        "JWT_SECRET must be at least {} characters long",
                        MIN_SECRET_LEN
                    ))
                }
            },
            AuthMode::Introspection => {
                if self.auth.auth_service_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "AUTH_SERVICE_URL must be set when AUTH_MODE=introspection"
                    ));
                }
            }
            AuthMode::Fixed => {
                if self.is_production() {
                    return Err(anyhow::anyhow!("AUTH_MODE=fixed is not allowed in production"));
                }
                if self.auth.fixed_principal_id.is_none() {
                    return Err(anyhow::anyhow!(
                        "FIXED_PRINCIPAL_ID must be set when AUTH_MODE=fixed"
                    ));
                }
            }
        }

        let share = &self.share;
        if share.max_ttl_hours <= 0 || share.max_uses == 0 {
            return Err(anyhow::anyhow!(
                "SHARE_MAX_TTL_HOURS and SHARE_MAX_USES must be positive"
            ));
        }
        if share.default_ttl_hours <= 0 || share.default_ttl_hours > share.max_ttl_hours {
            return Err(anyhow::anyhow!(
                "SHARE_DEFAULT_TTL_HOURS must be between 1 and SHARE_MAX_TTL_HOURS"
            ));
        }
        if share.default_max_uses == 0 || share.default_max_uses > share.max_uses {
            return Err(anyhow::anyhow!(
                "SHARE_DEFAULT_MAX_USES must be between 1 and SHARE_MAX_USES"
            ));
        }

        if self.upload.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than zero"));
        }
        if self.upload.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_EXTENSIONS cannot be empty"));
        }

        Ok(())
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.base.cors_origins
    }

    pub fn public_base_url(&self) -> &str {
        &self.base.public_base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_local() -> Config {
        let mut config = Config::default();
        config.storage.url_signing_secret = Some("s".repeat(32));
        config.auth.jwt_secret = Some("j".repeat(32));
        config
    }

    #[test]
    fn test_defaults_validate_once_secrets_set() {
        assert!(valid_local().validate().is_ok());
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_production_rejects_wildcard_cors() {
        let mut config = valid_local();
        config.base.environment = "production".to_string();
        assert!(config.validate().is_err());

        config.base.cors_origins = vec!["https://docs.example.com".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_s3_requires_bucket() {
        let mut config = valid_local();
        config.storage.backend = StorageBackend::S3;
        assert!(config.validate().is_err());
        config.storage.s3_bucket = Some("documents".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let mut config = valid_local();
        config.base.metadata_backend = MetadataBackend::Postgres;
        assert!(config.validate().is_err());
        config.base.database_url = Some("postgresql://localhost/docshare".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_share_defaults_must_fit_bounds() {
        let mut config = valid_local();
        config.share.default_max_uses = config.share.max_uses + 1;
        assert!(config.validate().is_err());

        let mut config = valid_local();
        config.share.default_ttl_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fixed_auth_is_rejected_in_production() {
        let mut config = valid_local();
        config.auth.mode = AuthMode::Fixed;
        config.auth.fixed_principal_id = Some("dev".to_string());
        assert!(config.validate().is_ok());

        config.base.environment = "prod".to_string();
        config.base.cors_origins = vec!["https://docs.example.com".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_split_list_normalizes_extensions() {
        assert_eq!(split_list(" .PDF, png,,docx "), vec!["pdf", "png", "docx"]);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("postgresql".parse::<MetadataBackend>(), Ok(MetadataBackend::Postgres));
        assert_eq!("Introspection".parse::<AuthMode>(), Ok(AuthMode::Introspection));
        assert!("ldap".parse::<AuthMode>().is_err());
    }
}
