//! `hypertext-audit` -- verify every page's stored revision chain.
//!
//! Exits with status 1 if any page's history is corrupt.
//!
//! # Environment variables
//!
//! | Variable             | Required | Default | Description                          |
//! |----------------------|----------|---------|--------------------------------------|
//! | `DATABASE_URL`       | yes      | --      | PostgreSQL connection string         |
//! | `SITE_URL`           | no       | `""`    | Prefix for generated page URLs       |
//! | `DB_MAX_CONNECTIONS` | no       | `5`     | Pool size                            |
//! | `AUDIT_OWNER`        | no       | --      | Only audit this account's pages      |
//! | `LOG_FORMAT`         | no       | `text`  | `text` or `json`                     |

use std::process::ExitCode;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hypertext_audit::config::{AuditConfig, LogFormat};
use hypertext_audit::scan;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let config = AuditConfig::from_env().context("Invalid configuration")?;
    init_tracing(config.log_format);

    tracing::info!(
        owner = ?config.owner_uid,
        max_connections = config.max_connections,
        "Starting hypertext-audit",
    );

    let pool = hypertext_db::create_pool(&config.database_url, config.max_connections)
        .await
        .context("Failed to connect to database")?;
    hypertext_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    let report = scan::run(&pool, &config.site, config.owner_uid.as_deref()).await?;

    if report.is_clean() {
        tracing::info!(pages_checked = report.pages_checked, "All revision chains are sound");
        Ok(ExitCode::SUCCESS)
    } else {
        for page in &report.corrupt {
            tracing::error!(
                page_id = page.page_id,
                owner = %page.owner_uid,
                title = %page.title,
                issue_count = page.issues.len(),
                "Corrupt page"
            );
        }
        Ok(ExitCode::FAILURE)
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hypertext_audit=info,hypertext_db=info".into());

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
