//! Graceful shutdown handling for the relay server.
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Shutdown signal broadcaster
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Create a new shutdown signal
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    /// Subscribe to shutdown notifications
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Trigger shutdown
    pub fn shutdown(&self) {
        let _ = self.sender.send(());
    }

    /// Trigger shutdown once SIGINT or SIGTERM arrives.
    pub fn trigger_on_signal(&self) -> tokio::task::JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            if let Err(e) = wait_for_signal().await {
                error!("Failed to install signal handlers: {}", e);
                return;
            }
            info!("Broadcasting shutdown signal");
            signal.shutdown();
        })
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
pub async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
            },
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown");
            },
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, initiating graceful shutdown");
    }

    Ok(())
}

/// Completes when shutdown is triggered
pub async fn shutdown_receiver(mut rx: broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}
