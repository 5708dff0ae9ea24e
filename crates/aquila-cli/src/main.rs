use aquila_agent::{AgentRegistry, FnAgent};
use aquila_core::EventBus;
use aquila_orchestrator::{Orchestrator, SchedulerConfig, TaskStatus};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aquila", about = "Aquila: priority task scheduler for agents")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "aquila.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo workload against a set of sleeping agents
    Run {
        /// Maximum running tasks (overrides config)
        #[arg(short = 'n', long)]
        max_concurrent: Option<usize>,
        /// Number of tasks to create (overrides config)
        #[arg(short, long)]
        tasks: Option<usize>,
        /// Per-task agent delay in milliseconds (overrides config)
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Per-execution timeout in milliseconds (overrides config)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Serialize, Deserialize, Default)]
struct AquilaConfig {
    #[serde(default)]
    scheduler: SchedulerConfig,
    #[serde(default)]
    bus: BusConfig,
    #[serde(default)]
    demo: DemoConfig,
}

#[derive(Serialize, Deserialize)]
struct BusConfig {
    /// Buffered events per subscriber.
    #[serde(default = "default_bus_capacity")]
    capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct DemoConfig {
    #[serde(default = "default_agents")]
    agents: Vec<String>,
    #[serde(default = "default_tasks")]
    tasks: usize,
    #[serde(default = "default_delay_ms")]
    delay_ms: u64,
    /// Unregister this agent partway through the run.
    #[serde(default)]
    remove_agent: Option<String>,
    #[serde(default = "default_remove_after_ms")]
    remove_after_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            agents: default_agents(),
            tasks: default_tasks(),
            delay_ms: default_delay_ms(),
            remove_agent: None,
            remove_after_ms: default_remove_after_ms(),
        }
    }
}

fn default_bus_capacity() -> usize {
    256
}
fn default_agents() -> Vec<String> {
    vec!["researcher".to_string(), "writer".to_string()]
}
fn default_tasks() -> usize {
    10
}
fn default_delay_ms() -> u64 {
    200
}
fn default_remove_after_ms() -> u64 {
    300
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn load_config(path: &Path) -> anyhow::Result<AquilaConfig> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(AquilaConfig::default());
    }
    let config_str = tokio::fs::read_to_string(path).await.map_err(|e| {
        anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
    })?;
    Ok(toml::from_str(&config_str)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = load_config(&cli.config).await?;

    match cli.command {
        Commands::Run {
            max_concurrent,
            tasks,
            delay_ms,
            timeout_ms,
        } => {
            if let Some(max) = max_concurrent {
                config.scheduler.max_concurrent_tasks = max;
            }
            if let Some(timeout) = timeout_ms {
                config.scheduler.execution_timeout_ms = Some(timeout);
            }
            if let Some(tasks) = tasks {
                config.demo.tasks = tasks;
            }
            if let Some(delay) = delay_ms {
                config.demo.delay_ms = delay;
            }
            run_demo(config).await?;
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn run_demo(config: AquilaConfig) -> anyhow::Result<()> {
    config.scheduler.validate()?;
    if config.bus.capacity == 0 {
        anyhow::bail!("[bus] capacity must be at least 1");
    }
    if config.demo.agents.is_empty() {
        anyhow::bail!("[demo] agents must name at least one agent");
    }

    let bus = EventBus::new(config.bus.capacity);
    let registry = Arc::new(AgentRegistry::new(bus.clone()));

    let delay = Duration::from_millis(config.demo.delay_ms);
    for agent_id in &config.demo.agents {
        let name = agent_id.clone();
        registry.register(Arc::new(FnAgent::new(agent_id, move |input| {
            let name = name.clone();
            async move {
                tokio::time::sleep(delay).await;
                Ok(json!({ "agent": name, "input": input }))
            }
        })))?;
    }
    registry.initialize_all().await?;

    let orchestrator = Orchestrator::new(&config.scheduler, registry.clone(), bus)?;
    info!(
        agents = registry.len(),
        tasks = config.demo.tasks,
        max_concurrent = config.scheduler.max_concurrent_tasks,
        "Starting demo workload"
    );

    // Queue everything before the first dispatch so priorities decide order.
    orchestrator.pause();
    let mut task_ids = Vec::with_capacity(config.demo.tasks);
    for seq in 0..config.demo.tasks {
        let agent_id = &config.demo.agents[seq % config.demo.agents.len()];
        let priority = (seq % 3) as i64;
        let id =
            orchestrator.create_task_with_priority(agent_id, json!({ "seq": seq }), priority)?;
        task_ids.push(id);
    }
    orchestrator.resume();

    if let Some(agent_id) = config.demo.remove_agent.clone() {
        let registry = registry.clone();
        let after = Duration::from_millis(config.demo.remove_after_ms);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if registry.unregister(&agent_id) {
                info!(agent_id = %agent_id, "Demo agent removed");
            }
        });
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    loop {
        ticker.tick().await;
        if orchestrator.stats().is_settled() {
            break;
        }
    }

    println!("Tasks:");
    for id in &task_ids {
        let Some(task) = orchestrator.task(id) else {
            continue;
        };
        match task.status {
            TaskStatus::Completed => println!("  {} [{}] completed", task.id, task.agent_id),
            _ => println!(
                "  {} [{}] {}: {}",
                task.id,
                task.agent_id,
                task.status,
                task.error.as_deref().unwrap_or("-")
            ),
        }
    }

    let stats = orchestrator.stats();
    println!(
        "\nTotal: {} task(s), {} completed, {} failed",
        stats.total, stats.completed, stats.failed
    );

    registry.shutdown_all().await;
    Ok(())
}
