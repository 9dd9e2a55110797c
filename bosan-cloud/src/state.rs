//! Application state for bosan-cloud

use std::sync::Arc;

use aws_sdk_sesv2::Client as SesClient;
use sqlx::PgPool;

use crate::BoxError;
use crate::config::Config;
use crate::db::PgMemberStore;
use crate::mail::{MailTransport, SesTransport};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,
    /// Member store backed by the pool
    pub store: PgMemberStore,
    /// Mail transport; `None` when no sender address is configured
    pub mailer: Option<Arc<dyn MailTransport>>,
    /// Public base URL for activation links
    pub base_url: String,
    /// Environment: development | staging | production
    pub environment: String,
}

impl AppState {
    /// Create a new AppState
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let mailer = match &config.mail_from {
            Some(from) => {
                let aws_config =
                    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
                let ses = if let Some(region) = &config.ses_region {
                    let ses_config = aws_config
                        .to_builder()
                        .region(aws_config::Region::new(region.clone()))
                        .build();
                    SesClient::new(&ses_config)
                } else {
                    SesClient::new(&aws_config)
                };
                tracing::info!("SES mail transport ready (from: {from})");
                Some(Arc::new(SesTransport::new(ses, from.clone())) as Arc<dyn MailTransport>)
            }
            None => {
                tracing::warn!("MAIL_FROM not set; invitation dispatch disabled");
                None
            }
        };

        Ok(Self {
            store: PgMemberStore::new(pool.clone()),
            pool,
            mailer,
            base_url: config.base_url.clone(),
            environment: config.environment.clone(),
        })
    }

    /// Whether unexpected errors may carry technical detail in responses.
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}
