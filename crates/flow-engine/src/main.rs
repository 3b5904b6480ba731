use clap::Parser;

use flow_core::logging::init_logging;
use flow_engine::config::EngineConfig;
use flow_engine::server;

#[derive(Parser, Debug, Clone)]
#[command(name = "flow-engine")]
#[command(about = "Boomerang Flow engine: dispatch service and callback API")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Bind address
    #[arg(long, env = "ENGINE_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Server port
    #[arg(long, env = "ENGINE_PORT", default_value_t = EngineConfig::DEFAULT_PORT)]
    port: u16,

    /// Long-poll window in milliseconds
    #[arg(long, env = "DISPATCH_POLL_WINDOW_MS", default_value_t = EngineConfig::DEFAULT_POLL_WINDOW_MS)]
    poll_window_ms: u64,

    /// Sleep between claim re-queries in milliseconds
    #[arg(long, env = "DISPATCH_RETRY_INTERVAL_MS", default_value_t = EngineConfig::DEFAULT_POLL_RETRY_INTERVAL_MS)]
    poll_retry_interval_ms: u64,

    /// Agents polling within this many milliseconds are reported online
    #[arg(long, env = "AGENT_HEARTBEAT_INTERVAL_MS", default_value_t = EngineConfig::DEFAULT_HEARTBEAT_INTERVAL_MS)]
    agent_heartbeat_interval_ms: u64,

    /// Status-change bus capacity; events beyond it are dropped
    #[arg(long, env = "EVENT_BUS_CAPACITY", default_value_t = EngineConfig::DEFAULT_EVENT_BUS_CAPACITY)]
    event_bus_capacity: usize,

    /// Optional URL receiving every status change as JSON
    #[arg(long, env = "EVENT_WEBHOOK_URL")]
    event_webhook_url: Option<String>,

    /// HTTP worker count
    #[arg(long, env = "ENGINE_WORKERS", default_value_t = EngineConfig::DEFAULT_WORKERS)]
    workers: usize,
}

impl From<Cli> for EngineConfig {
    fn from(cli: Cli) -> Self {
        EngineConfig {
            host: cli.host,
            port: cli.port,
            poll_window_ms: cli.poll_window_ms,
            poll_retry_interval_ms: cli.poll_retry_interval_ms,
            agent_heartbeat_interval_ms: cli.agent_heartbeat_interval_ms,
            event_bus_capacity: cli.event_bus_capacity,
            event_webhook_url: cli.event_webhook_url,
            workers: cli.workers,
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging("flow-engine", cli.debug);

    log::info!("Starting Boomerang Flow engine on port {}", cli.port);
    if cli.debug {
        log::debug!("Engine configuration: {:?}", cli);
    }

    server::run(EngineConfig::from(cli)).await?;
    Ok(())
}
