//! Service configuration

use crate::BoxError;

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// Public base URL used to build activation links in invitation emails
    pub base_url: String,
    /// SES sender email address; invitation dispatch is disabled when unset
    pub mail_from: Option<String>,
    /// Optional SES region override (env: SES_REGION)
    pub ses_region: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let mail_from = std::env::var("MAIL_FROM").ok().filter(|s| !s.is_empty());
        if mail_from.is_none() && environment != "development" {
            tracing::warn!(
                "MAIL_FROM is not set in {environment}; invitation emails cannot be sent"
            );
        }

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment,
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            mail_from,
            ses_region: std::env::var("SES_REGION").ok().filter(|s| !s.is_empty()),
        })
    }
}
