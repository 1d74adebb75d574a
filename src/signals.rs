//! Process termination signals.
//!
//! On Unix, SIGINT, SIGTERM (sent by systemd and container runtimes) and
//! SIGQUIT are handled. Elsewhere only Ctrl-C is awaited.

use tokio_util::sync::CancellationToken;

#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Returns a token that is cancelled on the first termination signal.
///
/// If signal handlers cannot be installed the token is cancelled right
/// away, so the process shuts down instead of becoming unkillable.
pub fn cancel_on_shutdown_signal() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => tracing::info!("Shutdown signal received, stopping"),
            Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
        }
        token.cancel();
    });

    cancel
}
