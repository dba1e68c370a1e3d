/// Resolves once the process is asked to stop (Ctrl+C, or SIGTERM on unix).
///
/// Handed to `axum::serve(..).with_graceful_shutdown` so in-flight requests
/// finish before the listener closes.
///
/// # Panics
///
/// Panics if a signal handler cannot be installed.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        () = ctrl_c => "SIGINT",
        () = terminate => "SIGTERM",
    };
    tracing::info!(signal, "Shutdown requested, draining in-flight requests");
}
