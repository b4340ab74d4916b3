//! Long-running analysis worker.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::scheduler::Scheduler;
use crate::server::{self, StatusState};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run the scheduler, and optionally the status server, until Ctrl+C.
pub async fn run_serve(
    interval: Option<u64>,
    status_server: bool,
    port: Option<u16>,
    settings: Settings,
) -> anyhow::Result<()> {
    preflight::check(Operation::Analyze, &settings)?;

    let orchestrator = Arc::new(Orchestrator::new(&settings)?);
    let interval = Duration::from_secs(interval.unwrap_or(settings.scheduler.interval_secs).max(1));
    let scheduler = Arc::new(Scheduler::new(orchestrator.clone(), interval));
    let shutdown = CancellationToken::new();

    Output::header("Sermon Analysis");
    println!();
    Output::kv("Provider", &format!("{:?}", settings.analysis.provider));
    Output::kv("Database", &settings.sqlite_path().display().to_string());
    Output::kv("Interval", &format!("{}s", interval.as_secs()));

    let server_handle = if status_server || settings.server.enabled {
        let addr = format!("{}:{}", settings.server.host, port.unwrap_or(settings.server.port));
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let app = server::router(StatusState {
            store: orchestrator.store(),
            reports: scheduler.subscribe(),
        });
        Output::kv("Status", &format!("http://{}/status", addr));

        let token = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                warn!(error = %e, "Status server stopped with error");
            }
        }))
    } else {
        None
    };

    println!();
    Output::info("Press Ctrl+C to stop.");

    let mut scheduler_handle = {
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received");
        }
        _ = &mut scheduler_handle => {
            warn!("Scheduler exited unexpectedly");
        }
    }
    shutdown.cancel();

    let grace = Duration::from_secs(settings.scheduler.shutdown_grace_secs);
    if !scheduler_handle.is_finished() {
        Output::info("Waiting for the current analysis to finish...");
        if tokio::time::timeout(grace, &mut scheduler_handle).await.is_err() {
            Output::warning("Analysis still running after the grace period; stopping anyway.");
            scheduler_handle.abort();
        }
    }

    if let Some(handle) = server_handle {
        join_logged(handle, "Status server").await;
    }

    Output::success("Stopped.");
    Ok(())
}

/// Wait for a background task, logging a panic or cancellation. Returns true on a clean exit.
async fn join_logged(handle: JoinHandle<()>, task: &str) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "{} task failed", task);
            false
        }
    }
}
