//! API configuration.

/// Extensions accepted for upload.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mov"];

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second, per client IP
    pub rate_limit_rps: u32,
    /// Largest accepted video upload, in bytes
    pub max_upload_size: u64,
    /// Environment (development/production)
    pub environment: String,
    /// Shared secret expected in `X-API-Key`; auth is off when unset
    pub api_key: Option<String>,
    /// Serve Prometheus metrics at `/metrics`
    pub metrics_enabled: bool,
    /// Override for the OCR service base URL
    pub ocr_service_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_upload_size: 500 * 1024 * 1024, // 500MB
            environment: "development".to_string(),
            api_key: None,
            metrics_enabled: true,
            ocr_service_url: None,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_rps),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_upload_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            api_key: std::env::var("API_KEY").ok().filter(|k| !k.trim().is_empty()),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
            ocr_service_url: std::env::var("OCR_SERVICE_URL").ok(),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    /// Upload limit in whole megabytes, for error messages.
    pub fn max_upload_mb(&self) -> u64 {
        self.max_upload_size / (1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_upload_mb(), 500);
        assert!(config.api_key.is_none());
        assert!(!config.is_production());
    }
}
