use std::env;
use std::time::Duration;

use crate::features::accounts::VerificationPolicy;
use crate::features::catalog::CascadePolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    pub swagger: SwaggerConfig,
    pub search: SearchConfig,
    pub catalog: CatalogConfig,
    pub accounts: AccountsConfig,
    pub iabako: IabakoConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_request_body_size: usize,
}

/// Which record/blob store backs the service
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// PostgreSQL records + MinIO blobs
    Postgres {
        database: DatabaseConfig,
        minio: MinIOConfig,
    },
    /// Process-local stores, for development and demos
    Memory { public_base_url: String },
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub jwks_cache_ttl: Duration,
    pub jwt_leeway: Duration,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

/// MinIO/S3 storage configuration for catalog images
#[derive(Debug, Clone)]
pub struct MinIOConfig {
    /// MinIO/S3 endpoint URL
    pub endpoint: String,
    /// Public endpoint URL for publicly accessible files (optional, defaults to endpoint)
    pub public_endpoint: String,
    /// Access key for authentication
    pub access_key: String,
    /// Secret key for authentication
    pub secret_key: String,
    /// Bucket name for storing files
    pub bucket: String,
    /// AWS region (for S3 compatibility)
    pub region: String,
    /// Prefix for public files (e.g., "public")
    pub public_prefix: String,
}

/// Tuning for the incremental search engine
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Quiet interval the input must stay unchanged before a dispatch
    pub debounce: Duration,
    /// Queries shorter than this (in characters, after trimming) are never dispatched
    pub min_query_len: usize,
    /// Row cap applied to each collection query
    pub per_collection_limit: usize,
    /// Longer queries are cut to this many characters before dispatch
    pub max_query_len: usize,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub delete_policy: CascadePolicy,
}

#[derive(Debug, Clone)]
pub struct AccountsConfig {
    pub verification_policy: VerificationPolicy,
}

/// Outbound workflow-automation webhook notified on account validation
#[derive(Debug, Clone)]
pub struct IabakoConfig {
    /// Webhook URL; notifications are skipped when unset
    pub webhook_url: Option<String>,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            // Only error if it's not "file not found" - that's acceptable
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            backend: BackendConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
            search: SearchConfig::from_env()?,
            catalog: CatalogConfig::from_env()?,
            accounts: AccountsConfig::from_env()?,
            iabako: IabakoConfig::from_env()?,
        })
    }
}

impl AppConfig {
    const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_request_body_size = env::var("MAX_REQUEST_BODY_SIZE")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_REQUEST_BODY_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| "MAX_REQUEST_BODY_SIZE must be a valid number".to_string())?;

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            max_request_body_size,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl BackendConfig {
    pub fn from_env() -> Result<Self, String> {
        let kind = env::var("CATALOG_BACKEND").unwrap_or_else(|_| "postgres".to_string());

        match kind.to_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres {
                database: DatabaseConfig::from_env()?,
                minio: MinIOConfig::from_env()?,
            }),
            "memory" => {
                let public_base_url = env::var("MEMORY_BLOB_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:3000/blobs".to_string());
                Ok(Self::Memory { public_base_url })
            }
            other => Err(format!(
                "CATALOG_BACKEND must be 'postgres' or 'memory', got '{}'",
                other
            )),
        }
    }
}

impl DatabaseConfig {
    // Default values for database connection pool (conservative defaults for small-medium apps)
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MAX_CONNECTIONS must be a valid number".to_string())?;

        let min_connections = env::var("DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MIN_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MIN_CONNECTIONS must be a valid number".to_string())?;

        let acquire_timeout_secs = env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_ACQUIRE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_ACQUIRE_TIMEOUT_SECS must be a valid number".to_string())?;

        let idle_timeout_secs = env::var("DB_IDLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_IDLE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_IDLE_TIMEOUT_SECS must be a valid number".to_string())?;

        let max_lifetime_secs = env::var("DB_MAX_LIFETIME_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_LIFETIME_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_MAX_LIFETIME_SECS must be a valid number".to_string())?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
        })
    }
}

impl AuthConfig {
    // Default values for JWT authentication
    const DEFAULT_JWKS_CACHE_TTL_SECS: u64 = 3600; // 1 hour
    const DEFAULT_JWT_LEEWAY_SECS: u64 = 60; // 1 minute

    pub fn from_env() -> Result<Self, String> {
        let issuer = env::var("LOGTO_ISSUER")
            .map_err(|_| "LOGTO_ISSUER environment variable is required".to_string())?;

        let audience = env::var("LOGTO_AUDIENCE")
            .map_err(|_| "LOGTO_AUDIENCE environment variable is required".to_string())?;

        let jwks_cache_ttl_secs = env::var("JWKS_CACHE_TTL")
            .unwrap_or_else(|_| Self::DEFAULT_JWKS_CACHE_TTL_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "JWKS_CACHE_TTL must be a valid number".to_string())?;

        let jwt_leeway_secs = env::var("JWT_LEEWAY")
            .unwrap_or_else(|_| Self::DEFAULT_JWT_LEEWAY_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "JWT_LEEWAY must be a valid number".to_string())?;

        Ok(Self {
            issuer,
            audience,
            jwks_cache_ttl: Duration::from_secs(jwks_cache_ttl_secs),
            jwt_leeway: Duration::from_secs(jwt_leeway_secs),
        })
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Catalog API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "API documentation for the B2B catalog".to_string());

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

impl MinIOConfig {
    pub fn from_env() -> Result<Self, String> {
        let endpoint =
            env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".to_string());

        // Public endpoint defaults to the main endpoint if not specified
        let public_endpoint =
            env::var("MINIO_PUBLIC_ENDPOINT").unwrap_or_else(|_| endpoint.clone());

        let access_key = env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());

        let secret_key = env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string());

        let bucket = env::var("MINIO_BUCKET").unwrap_or_else(|_| "catalog-images".to_string());

        let region = env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        let public_prefix =
            env::var("MINIO_PUBLIC_PREFIX").unwrap_or_else(|_| "public".to_string());

        Ok(Self {
            endpoint,
            public_endpoint,
            access_key,
            secret_key,
            bucket,
            region,
            public_prefix,
        })
    }
}

impl SearchConfig {
    const DEFAULT_DEBOUNCE_MS: u64 = 300;
    const DEFAULT_MIN_QUERY_LEN: usize = 2;
    const DEFAULT_PER_COLLECTION_LIMIT: usize = 5;
    const DEFAULT_MAX_QUERY_LEN: usize = 100;

    pub fn from_env() -> Result<Self, String> {
        let debounce_ms = env::var("SEARCH_DEBOUNCE_MS")
            .unwrap_or_else(|_| Self::DEFAULT_DEBOUNCE_MS.to_string())
            .parse::<u64>()
            .map_err(|_| "SEARCH_DEBOUNCE_MS must be a valid number".to_string())?;

        let min_query_len = env::var("SEARCH_MIN_QUERY_LEN")
            .unwrap_or_else(|_| Self::DEFAULT_MIN_QUERY_LEN.to_string())
            .parse::<usize>()
            .map_err(|_| "SEARCH_MIN_QUERY_LEN must be a valid number".to_string())?;

        let per_collection_limit = env::var("SEARCH_PER_COLLECTION_LIMIT")
            .unwrap_or_else(|_| Self::DEFAULT_PER_COLLECTION_LIMIT.to_string())
            .parse::<usize>()
            .map_err(|_| "SEARCH_PER_COLLECTION_LIMIT must be a valid number".to_string())?;

        let max_query_len = env::var("SEARCH_MAX_QUERY_LEN")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_QUERY_LEN.to_string())
            .parse::<usize>()
            .map_err(|_| "SEARCH_MAX_QUERY_LEN must be a valid number".to_string())?;

        if per_collection_limit == 0 {
            return Err("SEARCH_PER_COLLECTION_LIMIT must be at least 1".to_string());
        }
        if max_query_len < min_query_len.max(1) {
            return Err("SEARCH_MAX_QUERY_LEN must be at least SEARCH_MIN_QUERY_LEN".to_string());
        }

        Ok(Self {
            debounce: Duration::from_millis(debounce_ms),
            min_query_len,
            per_collection_limit,
            max_query_len,
        })
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(Self::DEFAULT_DEBOUNCE_MS),
            min_query_len: Self::DEFAULT_MIN_QUERY_LEN,
            per_collection_limit: Self::DEFAULT_PER_COLLECTION_LIMIT,
            max_query_len: Self::DEFAULT_MAX_QUERY_LEN,
        }
    }
}

impl CatalogConfig {
    pub fn from_env() -> Result<Self, String> {
        let delete_policy = env::var("CATALOG_DELETE_POLICY")
            .unwrap_or_else(|_| "cascade".to_string())
            .parse::<CascadePolicy>()?;

        Ok(Self { delete_policy })
    }
}

impl AccountsConfig {
    pub fn from_env() -> Result<Self, String> {
        let verification_policy = env::var("ACCOUNT_VERIFICATION_POLICY")
            .unwrap_or_else(|_| "one_way".to_string())
            .parse::<VerificationPolicy>()?;

        Ok(Self {
            verification_policy,
        })
    }
}

impl IabakoConfig {
    const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub fn from_env() -> Result<Self, String> {
        let webhook_url = env::var("IABAKO_WEBHOOK_URL")
            .ok()
            .filter(|s| !s.is_empty());

        let timeout_secs = env::var("IABAKO_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "IABAKO_TIMEOUT_SECS must be a valid number".to_string())?;

        Ok(Self {
            webhook_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
