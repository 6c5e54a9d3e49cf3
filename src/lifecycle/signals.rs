//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGTERM, SIGINT and SIGHUP
//! - Translate signals to internal events (shutdown, reload)
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown
//! - A handler that cannot be installed is logged and never fires

/// What a received signal asks the server to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Shutdown,
    Reload,
}

/// Wait for the next shutdown or reload signal.
#[cfg(unix)]
pub async fn next_signal() -> SignalEvent {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())
        .map_err(|e| tracing::error!(error = %e, "Failed to install SIGTERM handler"))
        .ok();
    let mut hangup = signal(SignalKind::hangup())
        .map_err(|e| tracing::error!(error = %e, "Failed to install SIGHUP handler"))
        .ok();

    tokio::select! {
        _ = ctrl_c() => SignalEvent::Shutdown,
        _ = recv(terminate.as_mut()) => {
            tracing::info!("SIGTERM received");
            SignalEvent::Shutdown
        }
        _ = recv(hangup.as_mut()) => {
            tracing::info!("SIGHUP received");
            SignalEvent::Reload
        }
    }
}

#[cfg(unix)]
async fn recv(signal: Option<&mut tokio::signal::unix::Signal>) {
    match signal {
        Some(signal) => {
            signal.recv().await;
        }
        None => std::future::pending().await,
    }
}

/// Wait for the next shutdown signal. Reload is not available here.
#[cfg(not(unix))]
pub async fn next_signal() -> SignalEvent {
    ctrl_c().await;
    SignalEvent::Shutdown
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Interrupt received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
