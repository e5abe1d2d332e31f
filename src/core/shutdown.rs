use tokio::signal;

/// Resolves on Ctrl+C or, on unix, SIGTERM. The runner treats either as
/// "leave now"; attempt state is already on disk, so no draining is needed.
pub(crate) async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut term = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(stream) => Some(stream),
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                None
            }
        };

        tokio::select! {
            result = signal::ctrl_c() => {
                if let Err(err) = result {
                    tracing::error!(error = %err, "Failed to install Ctrl+C handler");
                    std::future::pending::<()>().await;
                }
            }
            _ = recv_or_pending(&mut term) => {}
        }
    }

    #[cfg(not(unix))]
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }

    tracing::info!("shutdown signal received");
}

#[cfg(unix)]
async fn recv_or_pending(stream: &mut Option<signal::unix::Signal>) {
    match stream {
        Some(stream) => {
            stream.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}
