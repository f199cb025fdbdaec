use tracing::info;

/// Resolve when the process receives SIGINT or SIGTERM.
///
/// Entry points await this, then signal the shared
/// [`ShutdownHandle`](njord_bus::shutdown::ShutdownHandle) so every service loop
/// stops consuming, drains in-flight handlers, flushes journals and returns.
pub async fn await_term_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(error) => {
                tracing::error!(%error, "installing SIGTERM handler failed - falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
            _ = term.recv() => info!("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("ctrl-c received");
    }
}
