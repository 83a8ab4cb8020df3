//! Appointment Service
//!
//! REST API for the appointment lifecycle, plus the notification worker and
//! the fallback reconciler.

use anyhow::{Context, Result};
use appointment_service::{
    assemble, create_router, email, Backend, Config, Reconciler, StorageBackend,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long queued notifications may take to go out on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "appointment_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Appointment Service");

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Storage backend: {:?}", config.storage_backend);
    info!("  API address: {}", config.api_address());
    info!("  Reconcile interval: {}s", config.reconcile_interval_secs);
    info!("  Email enabled: {}", config.email.enabled);

    let backend = match config.storage_backend {
        StorageBackend::Redis => {
            info!("  Redis URL: {}", config.redis_url);
            Backend::redis(&config.redis_url)
                .await
                .context("Failed to initialize storage")?
        }
        StorageBackend::Memory => Backend::memory(),
    };

    let email_sender = email::sender_from_config(&config.email)
        .context("Failed to initialize email delivery")?;

    let (state, worker, events) = assemble(backend, Arc::from(email_sender));
    let reconciler = Reconciler::new(
        Arc::clone(&state.store),
        Duration::from_secs(config.reconcile_interval_secs),
    );

    let app = create_router(state);

    let api_addr = config.api_address();
    let listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .context("Failed to bind to address")?;
    info!("Appointment Service running on http://{}", api_addr);

    let mut api_task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
        if let Err(e) = server.await {
            error!("API server error: {:#}", e);
        }
    });

    let mut worker_task = tokio::spawn(worker.run(events));
    let mut reconciler_task = tokio::spawn(reconciler.start());

    tokio::select! {
        _ = &mut api_task => {
            info!("API server stopped");
        }
        _ = &mut worker_task => {
            error!("Notification worker terminated unexpectedly");
        }
        _ = &mut reconciler_task => {
            error!("Reconciler terminated unexpectedly");
        }
    }

    info!("Shutting down Appointment Service");
    reconciler_task.abort();

    // The router owns the event sender: once it is dropped the worker sees a
    // closed channel, finishes queued deliveries and returns
    if !api_task.is_finished() {
        api_task.abort();
        let _ = api_task.await;
    }

    if !worker_task.is_finished() {
        match tokio::time::timeout(SHUTDOWN_GRACE, worker_task).await {
            Ok(_) => info!("Pending notifications delivered"),
            Err(_) => warn!(
                "Dropping undelivered notifications after {}s",
                SHUTDOWN_GRACE.as_secs()
            ),
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
