mod doctor;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ramble_core::{AppConfig, Source};
use ramble_kernel::Kernel;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ramble", version, about = "Conversation intelligence core")]
struct Cli {
    #[arg(short, long, default_value = "ramble.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed one utterance through the pipeline
    Process {
        text: String,
        /// Run it through the Correction Service as if it came from STT
        #[arg(long)]
        speech: bool,
    },
    /// Session lifecycle
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// List claims
    Claims {
        /// Only claims in the `active` state
        #[arg(long)]
        active: bool,
    },
    /// List known entities
    Entities,
    /// List goals
    Goals,
    /// Salience-ranked working-memory snapshot
    TopOfMind,
    /// List queued/running tasks
    Tasks {
        /// Only failed tasks
        #[arg(long)]
        failed: bool,
    },
    /// Run the decay pass immediately instead of waiting for the schedule
    DecayNow,
    /// Export/import the full database as JSON
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Generic key/value debug surface
    Debug {
        #[command(subcommand)]
        action: DebugAction,
    },
    /// Configuration and environment health check
    Doctor,
}

#[derive(Subcommand)]
enum SessionAction {
    Start,
    End,
    Status,
}

#[derive(Subcommand)]
enum BackupAction {
    Export { path: PathBuf },
    Import { path: PathBuf },
}

#[derive(Subcommand)]
enum DebugAction {
    Get { key: String },
    Set { key: String, value_type: String, value: String },
    Delete { key: String },
    ResetDatabase,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        AppConfig::load(&cli.config)?
    } else {
        AppConfig::default()
    };

    let env_filter =
        EnvFilter::try_new(&config.log.filter).unwrap_or_else(|_| EnvFilter::new("ramble=info,warn"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false);
    if config.log.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    if let Commands::Doctor = cli.command {
        doctor::run_doctor(&config);
        return Ok(());
    }

    let kernel = Kernel::initialize(&config.data_dir(), "default", config).await?;

    let result = run_command(&kernel, cli.command).await;

    kernel.shutdown().await?;
    result
}

async fn run_command(kernel: &Kernel, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Process { text, speech } => {
            let source = if speech { Source::Speech } else { Source::Text };
            let result = kernel.process_text(&text, source)?;
            println!("unit {} ({:?})", result.unit_id, result.discourse_function);
            if result.captured_by_lens {
                println!("  captured by active lens");
            }
            if !result.corrections_applied.is_empty() {
                println!("  corrections applied: {}", result.corrections_applied.len());
            }
            if let Some(task_id) = result.task_id {
                println!("  queued extraction task {task_id}");
            }
            if result.backpressure {
                println!("  warning: queue backpressure, pending task count is high");
            }
        }
        Commands::Session { action } => match action {
            SessionAction::Start => {
                let store = kernel.store();
                if store.get_active_session()?.is_some() {
                    println!("a session is already active");
                } else {
                    let session = kernel.start_session()?;
                    println!("started session {}", session.id);
                }
            }
            SessionAction::End => {
                let store = kernel.store();
                match store.get_active_session()? {
                    Some(session) => {
                        kernel.end_session()?;
                        println!("ended session {}", session.id);
                    }
                    None => println!("no active session"),
                }
            }
            SessionAction::Status => match kernel.store().get_active_session()? {
                Some(session) => println!("active session {} ({} units)", session.id, session.unit_count),
                None => println!("no active session"),
            },
        },
        Commands::Claims { active } => {
            let store = kernel.store();
            let claims = if active { store.get_active_claims()? } else { store.get_all_claims()? };
            for claim in claims {
                println!(
                    "{}  [{:?}/{:?}]  {}  (salience {:.3})",
                    claim.id, claim.state, claim.memory_tier, claim.statement, claim.salience
                );
            }
        }
        Commands::Entities => {
            for entity in kernel.store().get_all_entities()? {
                println!("{}  {} ({})  mentions={}", entity.id, entity.canonical_name, entity.entity_type, entity.mention_count);
            }
        }
        Commands::Goals => {
            for goal in kernel.store().get_all_goals()? {
                println!("{}  [{:?}]  {}  progress={:.2}", goal.id, goal.status, goal.statement, goal.progress_value);
            }
        }
        Commands::TopOfMind => {
            let top = ramble_memory::top_of_mind(&kernel.store(), kernel.memory_config())?;
            print_named("topics", &top.topics);
            print_entities_named("entities", &top.entities);
            print_goals_named("goals", &top.goals);
            print_named("concerns", &top.concerns);
            print_named("open questions", &top.open_questions);
            print_named("recent high-intensity", &top.recent_high_intensity);
        }
        Commands::Tasks { failed } => {
            let store = kernel.store();
            let tasks = if failed {
                store.get_tasks_by_status(ramble_core::TaskStatus::Failed)?
            } else {
                store.get_all_tasks()?
            };
            for task in tasks {
                println!(
                    "{}  {:?}/{:?}  {} (attempts {}/{})",
                    task.id, task.status, task.priority, task.task_type, task.attempts, task.max_attempts
                );
            }
        }
        Commands::DecayNow => {
            let report = ramble_memory::decay_claims(&kernel.store(), kernel.memory_config())?;
            println!(
                "processed {}, decayed {}, stale {}, dormant {}, promoted {}",
                report.processed_count,
                report.decayed_count,
                report.stale_count,
                report.dormant_count,
                report.promoted_count,
            );
            for error in &report.errors {
                println!("  error: {error}");
            }
        }
        Commands::Backup { action } => match action {
            BackupAction::Export { path } => {
                let doc = kernel.export_backup()?;
                std::fs::write(&path, serde_json::to_vec_pretty(&doc)?)?;
                println!("wrote backup to {}", path.display());
            }
            BackupAction::Import { path } => {
                let raw = std::fs::read_to_string(&path)?;
                let doc: ramble_kernel::BackupDocument = serde_json::from_str(&raw)?;
                kernel.import_backup(&doc)?;
                println!("restored backup from {}", path.display());
            }
        },
        Commands::Debug { action } => match action {
            DebugAction::Get { key } => match kernel.debug.get_data(&key)? {
                Some((value_type, value)) => println!("{value_type}: {value}"),
                None => println!("(not set)"),
            },
            DebugAction::Set { key, value_type, value } => {
                kernel.debug.set_data(&key, &value_type, &value)?;
                println!("set {key}");
            }
            DebugAction::Delete { key } => {
                kernel.debug.delete_data(&key)?;
                println!("deleted {key}");
            }
            DebugAction::ResetDatabase => {
                kernel.debug.reset_database()?;
                println!("database reset");
            }
        },
        Commands::Doctor => unreachable!("handled before kernel initialization"),
    }
    Ok(())
}

fn print_named(label: &str, claims: &[ramble_core::Claim]) {
    println!("{label}:");
    for claim in claims {
        println!("  {}  (salience {:.3})  {}", claim.id, claim.salience, claim.statement);
    }
}

fn print_entities_named(label: &str, entities: &[ramble_core::Entity]) {
    println!("{label}:");
    for entity in entities {
        println!("  {}  {} ({})  mentions={}", entity.id, entity.canonical_name, entity.entity_type, entity.mention_count);
    }
}

fn print_goals_named(label: &str, goals: &[ramble_core::Goal]) {
    println!("{label}:");
    for goal in goals {
        println!("  {}  [{:?}]  {}  progress={:.2}", goal.id, goal.status, goal.statement, goal.progress_value);
    }
}
