use std::io;

use tokio::sync::watch;

/// Process-level stop flag. The pipeline core has no cancellation; the binary
/// aborts a running report when this fires.
#[derive(Clone)]
pub struct Shutdown {
    flag: watch::Sender<bool>,
}

pub struct ShutdownListener {
    flag: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self { flag }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            flag: self.flag.subscribe(),
        }
    }

    /// Stores the flag even when nobody is subscribed yet.
    pub fn trigger(&self) {
        self.flag.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownListener {
    /// Resolves once the flag is set, immediately if it already was.
    pub async fn notified(&mut self) {
        let _ = self.flag.wait_for(|stopped| *stopped).await;
    }
}

/// Triggers `shutdown` on the first Ctrl-C (or SIGTERM on unix).
pub fn install_signal_handlers(shutdown: Shutdown) {
    tokio::spawn(async move {
        match stop_signal().await {
            Ok(signal) => {
                tracing::warn!(target: "shutdown", signal, "stop signal received");
                shutdown.trigger();
            }
            Err(err) => {
                tracing::error!(target: "shutdown", error = %err, "cannot listen for stop signals");
            }
        }
    });
}

#[cfg(unix)]
async fn stop_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|()| "SIGINT"),
        _ = term.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn stop_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "CTRL+C")
}
