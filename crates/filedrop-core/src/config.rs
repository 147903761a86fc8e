//! Configuration module
//!
//! One explicit [`Config`] is built at startup and handed to every component
//! that needs it. Nothing reads the environment after `from_env` returns.

use std::env;

use crate::storage_types::StorageBackend;

// Common constants
const PORT: u16 = 8080;
const MAX_SIZE_BYTES: u64 = 4 * 1024 * 1024 * 1024;
const SITE_URL: &str = "http://localhost:8080/";
const SELIF_PATH: &str = "selif";
const MAX_CONCURRENT_UPLOADS: usize = 64;

/// Listener and URL settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub host: String,
    pub server_port: u16,
    /// Public base URL, always ending in `/`
    pub site_url: String,
    /// Path segment for raw file delivery, without slashes
    pub selif_path: String,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub log_format: String,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub base: BaseConfig,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub files_path: String,
    pub meta_path: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    // Upload policy
    pub max_size_bytes: u64,
    /// 0 = no maximum
    pub max_expiry_secs: u64,
    pub force_random_filename: bool,
    /// Uploads and deletes handled at once
    pub max_concurrent_uploads: usize,
    // Access control
    pub auth_file: Option<String>,
    pub unauth_methods: Vec<String>,
    pub trusted_deleters: Vec<String>,
    pub trusted_proxy_count: usize,
    /// 0 = session cookie
    pub access_key_cookie_expiry_secs: u64,
    // Expiry sweep
    /// 0 = disabled
    pub cleanup_every_minutes: u64,
    pub no_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base: BaseConfig {
                host: "0.0.0.0".to_string(),
                server_port: PORT,
                site_url: SITE_URL.to_string(),
                selif_path: SELIF_PATH.to_string(),
                cors_origins: vec!["*".to_string()],
                environment: "development".to_string(),
                log_format: "compact".to_string(),
            },
            storage_backend: StorageBackend::Local,
            files_path: "files".to_string(),
            meta_path: "meta".to_string(),
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            max_size_bytes: MAX_SIZE_BYTES,
            max_expiry_secs: 0,
            force_random_filename: false,
            max_concurrent_uploads: MAX_CONCURRENT_UPLOADS,
            auth_file: None,
            unauth_methods: Vec::new(),
            trusted_deleters: Vec::new(),
            trusted_proxy_count: 0,
            access_key_cookie_expiry_secs: 0,
            cleanup_every_minutes: 0,
            no_logs: false,
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let mut site_url = env::var("SITE_URL").unwrap_or_else(|_| SITE_URL.to_string());
        if !site_url.ends_with('/') {
            site_url.push('/');
        }

        let base = BaseConfig {
            host: env::var("HOST").unwrap_or(defaults.base.host),
            server_port: env::var("PORT")
                .unwrap_or_else(|_| PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            site_url,
            selif_path: env::var("SELIF_PATH")
                .unwrap_or_else(|_| SELIF_PATH.to_string())
                .trim_matches('/')
                .to_string(),
            cors_origins: split_list(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string())),
            environment: env::var("ENVIRONMENT")
                .or_else(|_| env::var("APP_ENV"))
                .unwrap_or(defaults.base.environment),
            log_format: env::var("LOG_FORMAT")
                .unwrap_or(defaults.base.log_format)
                .to_lowercase(),
        };

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => StorageBackend::Local,
        };

        let config = Config {
            base,
            storage_backend,
            files_path: env::var("FILES_PATH").unwrap_or(defaults.files_path),
            meta_path: env::var("META_PATH").unwrap_or(defaults.meta_path),
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            max_size_bytes: env::var("MAX_SIZE_BYTES")
                .unwrap_or_else(|_| MAX_SIZE_BYTES.to_string())
                .parse()
                .unwrap_or(MAX_SIZE_BYTES),
            max_expiry_secs: env::var("MAX_EXPIRY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            force_random_filename: env_bool("FORCE_RANDOM_FILENAME", false),
            max_concurrent_uploads: env::var("MAX_CONCURRENT_UPLOADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_CONCURRENT_UPLOADS),
            auth_file: env::var("AUTH_FILE").ok().filter(|s| !s.trim().is_empty()),
            unauth_methods: split_list(&env::var("UNAUTH_METHODS").unwrap_or_default())
                .into_iter()
                .map(|m| m.to_uppercase())
                .collect(),
            trusted_deleters: split_list(&env::var("TRUSTED_DELETERS").unwrap_or_default()),
            trusted_proxy_count: env::var("TRUSTED_PROXY_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            access_key_cookie_expiry_secs: env::var("ACCESS_KEY_COOKIE_EXPIRY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            cleanup_every_minutes: env::var("CLEANUP_EVERY_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            no_logs: env_bool("NO_LOGS", false),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let uri: http::Uri = self
            .base
            .site_url
            .parse()
            .map_err(|e| anyhow::anyhow!("SITE_URL is not a valid URL: {}", e))?;
        match uri.scheme_str() {
            Some("http") | Some("https") if uri.authority().is_some() => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "SITE_URL must be an absolute http(s) URL, got {}",
                    self.base.site_url
                ))
            }
        }

        if self.base.selif_path.is_empty() {
            return Err(anyhow::anyhow!("SELIF_PATH cannot be empty"));
        }

        if self.max_concurrent_uploads == 0 {
            return Err(anyhow::anyhow!("MAX_CONCURRENT_UPLOADS must be greater than 0"));
        }

        if self.max_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_SIZE_BYTES must be greater than 0"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.files_path.trim().is_empty() || self.meta_path.trim().is_empty() {
                    return Err(anyhow::anyhow!(
                        "FILES_PATH and META_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        matches!(
            self.base.environment.to_lowercase().as_str(),
            "production" | "prod"
        )
    }

    pub fn server_port(&self) -> u16 {
        self.base.server_port
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.base.host, self.base.server_port)
    }

    pub fn site_url(&self) -> &str {
        &self.base.site_url
    }

    /// Path component of the site URL, starting and ending with `/`.
    pub fn site_path(&self) -> String {
        let path = self
            .base
            .site_url
            .parse::<http::Uri>()
            .map(|uri| uri.path().to_string())
            .unwrap_or_else(|_| "/".to_string());
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", trimmed)
        }
    }

    pub fn selif_path(&self) -> &str {
        &self.base.selif_path
    }

    /// Public URL of an object's page.
    pub fn file_url(&self, filename: &str) -> String {
        format!("{}{}", self.base.site_url, filename)
    }

    /// Public URL of an object's raw bytes.
    pub fn direct_url(&self, filename: &str) -> String {
        format!("{}{}/{}", self.base.site_url, self.base.selif_path, filename)
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.base.cors_origins
    }

    pub fn is_trusted_deleter(&self, client_ip: &str) -> bool {
        self.trusted_deleters.iter().any(|ip| ip == client_ip)
    }
}
