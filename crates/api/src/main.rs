use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use sabueso_api::app::{AppServices, build_app};
use sabueso_infra::{AppConfig, LogFormat, LogMailer, Mailer, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    sabueso_observability::init(match config.log_format {
        LogFormat::Json => sabueso_observability::LogFormat::Json,
        LogFormat::Pretty => sabueso_observability::LogFormat::Pretty,
    });

    if config.jwt_secret.is_none() {
        warn!("SABUESO_JWT_SECRET not set; using insecure dev default");
    }

    let pool = match config.database_url.as_deref() {
        Some(url) => Some(
            db::connect(url, config.db_max_connections)
                .await
                .context("failed to connect to postgres")?,
        ),
        None => {
            warn!("SABUESO_DATABASE_URL not set; using in-memory stores (data is lost on exit)");
            None
        }
    };

    // No SMTP integration: verification links only reach the log.
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);
    let services = match &pool {
        Some(pool) => AppServices::postgres(pool.clone(), &config, mailer),
        None => AppServices::in_memory(&config, mailer),
    };
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(pool) = pool {
        db::close(&pool).await;
    }
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
