//! Runs the Portal control plane on its own.
//!
//! There is no player-facing listener here: transfers are only logged. It
//! is enough to point backend servers at and watch them authenticate,
//! register, and query the proxy.

use portal::prelude::*;

/// Logs every transfer and reports success.
struct LogTransferer;

impl Transferer for LogTransferer {
    async fn transfer(
        &self,
        session: &Session,
        server: &ServerEntry,
    ) -> Result<(), TransferError> {
        tracing::info!(
            player = %session.id(),
            name = session.name(),
            server = %server.name,
            address = %server.address,
            "transfer"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), PortalError> {
    let config = Config::load_or_create("config.json")?;
    init_logging(&config.logger.level);

    if config.communication.secret.is_empty() {
        tracing::warn!("communication.secret is empty, any backend can authenticate");
    }

    let server = SocketServerBuilder::from_config(&config)
        .build(LogTransferer)
        .await?;
    tracing::info!(
        addr = %config.communication.address,
        whitelist = config.whitelist.enabled,
        "control plane listening"
    );

    let _reporter = config
        .player_latency
        .report
        .then(|| server.report_player_latency(config.latency_interval()));

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
