use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use rustls::crypto::ring::default_provider;
use rustls::crypto::CryptoProvider;
use tracing::{info, warn};

use leaderboard_widget::auth::HttpTokenIssuer;
use leaderboard_widget::channel::WsConnector;
use leaderboard_widget::models::Award;
use leaderboard_widget::reconcile::ReconcileReport;
use leaderboard_widget::session::StatusChange;
use leaderboard_widget::surface::MemorySurface;
use leaderboard_widget::{Widget, WidgetConfig, WidgetObserver};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Logs what a rendering host would draw.
struct LogObserver;

impl WidgetObserver for LogObserver {
    fn leaderboard_painted(&self, report: &ReconcileReport) {
        info!(
            inserted = report.inserted,
            updated = report.updated,
            removed = report.removed,
            cleared = report.cleared,
            member = ?report.member,
            "leaderboard repainted"
        );
    }

    fn error_state(&self, active: bool) {
        if active {
            warn!("widget entered error state");
        } else {
            info!("widget error state cleared");
        }
    }

    fn award_celebration(&self, award: &Award) {
        info!(award_id = %award.id, "award ready to claim");
    }

    fn status_changed(&self, change: &StatusChange) {
        info!(entity = %change.entity_id, from = %change.previous, to = %change.current, "status changed");
    }

    fn disconnected(&self) {
        warn!("gateway connection lost");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leaderboard_widget=info".into()),
        )
        .init();

    CryptoProvider::install_default(default_provider())
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let (config, credentials) = WidgetConfig::from_env().context("invalid widget configuration")?;
    let issuer = HttpTokenIssuer::new(&config).context("failed to build token client")?;
    let connector = WsConnector::new(&config);
    info!(gateway = %config.gateway_url, "starting leaderboard widget");

    let widget = Widget::new(
        config,
        Arc::new(issuer),
        Arc::new(connector),
        MemorySurface::default(),
        Arc::new(LogObserver),
    );
    widget
        .start(credentials)
        .await
        .context("failed to start widget")?;

    shutdown_signal().await;
    widget.close().await;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let ctrl_c = tokio::signal::ctrl_c();
        let terminate = match signal(SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(err) => {
                warn!(?err, "failed to install SIGTERM handler");
                None
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = async {
                if let Some(mut signal) = terminate {
                    signal.recv().await;
                } else {
                    std::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown requested");
}
