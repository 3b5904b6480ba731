use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use flow_agent::config::{default_host, parse_task_types, AgentConfig};
use flow_agent::processor::ProcessorSettings;
use flow_agent::{LocalProcessExecutor, Poller, RunProcessor};
use flow_client::{EngineApi, EngineClient, EngineClientConfig};
use flow_core::logging::init_logging;
use flow_core::{AgentRegistration, DeletionPolicy};

#[derive(Parser, Debug, Clone)]
#[command(name = "flow-agent")]
#[command(about = "Boomerang Flow agent: claims and executes runs")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Engine base URL
    #[arg(long, env = "ENGINE_URL", default_value = AgentConfig::DEFAULT_ENGINE_URL)]
    engine_url: String,

    /// Agent name reported at registration
    #[arg(long, env = "AGENT_NAME", default_value = "flow-agent")]
    name: String,

    /// Host reported at registration, defaults to the machine host name
    #[arg(long, env = "AGENT_HOST")]
    host: Option<String>,

    /// Comma separated task types this Agent executes; empty accepts none
    #[arg(long, env = "AGENT_TASK_TYPES", default_value = AgentConfig::DEFAULT_TASK_TYPES)]
    task_types: String,

    /// Engine long-poll window in milliseconds, used to size request timeouts
    #[arg(long, env = "AGENT_POLL_WINDOW_MS", default_value_t = AgentConfig::DEFAULT_POLL_WINDOW_MS)]
    poll_window_ms: u64,

    /// Execution timeout for TaskRuns without one, in milliseconds
    #[arg(long, env = "AGENT_DEFAULT_TIMEOUT_MS", default_value_t = AgentConfig::DEFAULT_TIMEOUT_MS)]
    default_timeout_ms: u64,

    /// Never, OnSuccess or Always
    #[arg(long, env = "AGENT_DELETION_POLICY", default_value = "Never")]
    deletion_policy: DeletionPolicy,

    /// Pause after a failed poll, in milliseconds
    #[arg(long, env = "AGENT_TRANSPORT_RETRY_MS", default_value_t = AgentConfig::DEFAULT_TRANSPORT_RETRY_MS)]
    transport_retry_delay_ms: u64,

    /// Time allowed for execution resources to be created, in milliseconds
    #[arg(long, env = "AGENT_ADMISSION_TIMEOUT_MS", default_value_t = AgentConfig::DEFAULT_ADMISSION_TIMEOUT_MS)]
    admission_timeout_ms: u64,

    /// Delay before an execution resource is deleted, in milliseconds
    #[arg(long, env = "AGENT_CLEANUP_DELAY_MS", default_value_t = AgentConfig::DEFAULT_CLEANUP_DELAY_MS)]
    cleanup_delay_ms: u64,

    /// Directory holding run directories and workspaces
    #[arg(long, env = "AGENT_WORK_DIR")]
    work_dir: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<AgentConfig> {
        let defaults = AgentConfig::default();
        let task_types = parse_task_types(&self.task_types).map_err(anyhow::Error::msg)?;
        Ok(AgentConfig {
            engine_url: self.engine_url,
            name: self.name,
            host: self
                .host
                .filter(|host| !host.trim().is_empty())
                .unwrap_or_else(default_host),
            version: defaults.version,
            task_types,
            poll_window_ms: self.poll_window_ms,
            default_timeout_ms: self.default_timeout_ms,
            deletion_policy: self.deletion_policy,
            transport_retry_delay_ms: self.transport_retry_delay_ms,
            admission_timeout_ms: self.admission_timeout_ms,
            cleanup_delay_ms: self.cleanup_delay_ms,
            work_dir: self.work_dir.unwrap_or(defaults.work_dir),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging("flow-agent", cli.debug);
    let config = cli.into_config()?;
    log::debug!("Agent configuration: {:?}", config);

    let client = EngineClient::new(EngineClientConfig::new(
        config.engine_url.clone(),
        config.poll_window(),
    ))
    .context("failed to build engine client")?;
    log::info!("Using engine at {}", client.base_url());
    let engine: Arc<dyn EngineApi> = Arc::new(client);

    let registration = AgentRegistration {
        name: config.name.clone(),
        host: config.host.clone(),
        task_types: config.task_types.clone(),
        version: config.version.clone(),
    };
    let agent_id = engine
        .register_agent(&registration)
        .await
        .with_context(|| format!("failed to register with engine at {}", config.engine_url))?;
    log::info!(
        "Registered agent {} ({}) as {} for task types {:?}",
        config.name,
        config.host,
        agent_id,
        config.task_types
    );

    let executor = Arc::new(LocalProcessExecutor::new(config.work_dir.clone()));
    let processor = Arc::new(RunProcessor::new(
        engine.clone(),
        executor,
        ProcessorSettings::from(&config),
    ));

    let shutdown = CancellationToken::new();
    let handles = Poller::new(engine, processor, agent_id, config.transport_retry_delay())
        .spawn(shutdown.clone());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    log::info!("Shutting down agent");
    shutdown.cancel();
    for handle in handles {
        handle.await?;
    }
    Ok(())
}
