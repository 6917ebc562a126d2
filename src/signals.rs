#[cfg(not(target_os = "windows"))]
use tokio::signal::unix::{SignalKind, signal};

/// Resolves `sender` on SIGTERM or Ctrl-C, whichever comes first.
#[cfg(not(target_os = "windows"))]
pub fn create_term_signal_handler(sender: tokio::sync::oneshot::Sender<()>) {
    tokio::spawn(async move {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                tracing::info!("register terminate signal handler");

                tokio::select! {
                    _ = stream.recv() => tracing::info!("got terminate signal"),
                    _ = tokio::signal::ctrl_c() => tracing::info!("got interrupt signal"),
                }
            }
            Err(e) => {
                tracing::error!("signal error: {e}");

                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("signal error: {e}");
                }
            }
        }

        let _: Result<(), _> = sender.send(());
    });
}

#[cfg(target_os = "windows")]
pub fn create_term_signal_handler(sender: tokio::sync::oneshot::Sender<()>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("got interrupt signal");
        }

        let _: Result<(), _> = sender.send(());
    });
}
