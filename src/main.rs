use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt};

use wscrab::config::LogLevel;
use wscrab::server::Registry;
use wscrab::{Config, MessageHandler, Server, Session};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "🦀 wscrab";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = setup().await;
    run_until_ctrl_c(config).await
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

async fn setup() -> Config {
    let config = Config::load()
        .await
        .unwrap_or_else(|e| panic!("failed to load config: {e}"));

    init_tracing(config.log_level);
    config
}

fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_new(level.as_str()).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

// -----------------------------------------------------------------------------
// ----- Relay -----------------------------------------------------------------

/// Rebroadcasts every inbound message to all open sessions, sender included.
struct Relay {
    registry: Arc<Registry>,
}

#[async_trait]
impl MessageHandler for Relay {
    async fn on_message(&self, session: &Arc<Session>, data: Bytes) {
        let delivered = self.registry.broadcast(data).await;
        debug!(peer = %session.remote_address(), delivered, "relayed");
    }
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run_until_ctrl_c(config: Config) -> std::io::Result<()> {
    let registry = Arc::new(Registry::new());
    let server = Server::with_registry(config.server, Relay { registry: Arc::clone(&registry) }, registry);

    info!("{} starting on {}", APP_NAME, server.config().addr());

    let serve = {
        let server = server.clone();
        tokio::spawn(async move { server.listen().await })
    };

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("{} shutting down", APP_NAME);
            server.stop();
        }

        res = serve => {
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => { error!("listen error: {e}"); return Err(e); }
                Err(e) => error!("server task failed: {e}"),
            }
        }
    }

    Ok(())
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
