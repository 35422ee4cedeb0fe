//! `dagctl` - run or resume a workflow from a YAML/JSON DAG file against
//! an in-process executor, printing each streamed event to stdout.
//!
//! Adapted from `langgraph-cli`'s `clap::Subcommand` shape, narrowed to
//! the two operations an in-process executor needs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dagctl_checkpoint::{CheckpointStore, InMemoryCheckpointStore, SqliteCheckpointStore};
use dagctl_core::{Dag, DefaultPermissionClassifier, ExecutorConfig, Scheduler};
use dagctl_server::executors::{DecliningPlanner, EchoToolExecutor, NoopCapabilityExecutor, NoopSandboxRunner};
use futures::StreamExt;

#[derive(Parser)]
#[command(name = "dagctl")]
#[command(about = "Run and resume dagctl workflows", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Sqlite database URL for checkpoint persistence. Omit to keep
    /// checkpoints in memory for the lifetime of this process.
    #[arg(long, global = true, env = "DAGCTL_CHECKPOINT_DB")]
    checkpoint_db: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a DAG defined in a YAML or JSON file
    Run {
        /// Path to the DAG definition
        file: PathBuf,

        /// Workflow id to assign; a UUID is generated if omitted
        #[arg(long)]
        workflow_id: Option<String>,
    },

    /// Resume a workflow from a previously stored checkpoint
    Resume {
        /// Path to the DAG definition (the replan/continuation target)
        file: PathBuf,

        /// Checkpoint id to resume from
        checkpoint_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let checkpoint_store: Arc<dyn CheckpointStore> = match &cli.checkpoint_db {
        Some(url) => {
            let pool = sqlx::sqlite::SqlitePoolOptions::new().max_connections(5).connect(url).await?;
            Arc::new(SqliteCheckpointStore::new(pool).await?)
        }
        None => Arc::new(InMemoryCheckpointStore::new()),
    };

    let scheduler = Arc::new(Scheduler::new(
        ExecutorConfig::default(),
        Arc::new(EchoToolExecutor),
        Arc::new(NoopSandboxRunner),
        Arc::new(NoopCapabilityExecutor),
        Arc::new(DecliningPlanner),
        Arc::new(DefaultPermissionClassifier),
        checkpoint_store,
    ));

    match cli.command {
        Commands::Run { file, workflow_id } => {
            let dag = load_dag(&file)?;
            let (stream, handle) = scheduler.execute_stream(dag, workflow_id);
            tokio::pin!(stream);
            print_events(stream).await?;
            print_final_state(&handle.get_state());
        }
        Commands::Resume { file, checkpoint_id } => {
            let dag = load_dag(&file)?;
            let (stream, handle) = scheduler.resume_from_checkpoint(dag, &checkpoint_id).await?;
            tokio::pin!(stream);
            print_events(stream).await?;
            print_final_state(&handle.get_state());
        }
    }

    Ok(())
}

/// Accepts both `.yaml`/`.yml` and `.json` by extension, falling back to
/// YAML (a superset of JSON) for anything else.
fn load_dag(path: &Path) -> anyhow::Result<Dag> {
    let content = std::fs::read_to_string(path)?;
    let dag = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };
    Ok(dag)
}

async fn print_events(
    mut stream: impl futures::Stream<Item = dagctl_core::Result<dagctl_core::ExecutionEvent>> + Unpin,
) -> anyhow::Result<()> {
    while let Some(event) = stream.next().await {
        match event {
            Ok(event) => println!("{}", serde_json::to_string(&event)?),
            Err(err) => {
                eprintln!("error: {err}");
                return Err(err.into());
            }
        }
    }
    Ok(())
}

fn print_final_state(state: &dagctl_core::WorkflowState) {
    println!("--- final state ---");
    match serde_json::to_string_pretty(state) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to serialize final state: {err}"),
    }
}
