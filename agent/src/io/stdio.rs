use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::host::{EventReceiver, Host};
use crate::io::transport::run_transport_loop;

/// Run the NDJSON loop on stdin/stdout until stdin closes or Ctrl-C.
///
/// Logs go to stderr so stdout carries nothing but events.
pub async fn run_stdio_loop(host: &mut Host, events: &mut EventReceiver) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let shutdown = CancellationToken::new();

    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            on_signal.cancel();
        }
    });

    info!("Stdio loop started");
    run_transport_loop(tokio::io::stdin(), &mut stdout, host, events, shutdown).await
}
