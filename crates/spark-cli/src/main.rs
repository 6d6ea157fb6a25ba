mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    gates::GatesSubcommand, hook::HookSubcommand, lock::LockSubcommand, phase::PhaseSubcommand,
    queue::QueueSubcommand, task::TaskSubcommand, team::TeamSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "spark",
    about = "Quality-gate verification and multi-team file coordination for coding-assistant hooks",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .spark/ or .git/)
    #[arg(long, global = true, env = "SPARK_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize spark state in the current project
    Init,

    /// Show coordination state across teams
    State,

    /// Host-CLI lifecycle hooks (JSON over stdin/stdout)
    Hook {
        #[command(subcommand)]
        subcommand: HookSubcommand,
    },

    /// Manage advisory file locks
    Lock {
        #[command(subcommand)]
        subcommand: LockSubcommand,
    },

    /// Inspect and purge the file wait queue
    Queue {
        #[command(subcommand)]
        subcommand: QueueSubcommand,
    },

    /// Run quality gates and claim verification
    Gates {
        #[command(subcommand)]
        subcommand: GatesSubcommand,
    },

    /// Manage task documents
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Manage team assignment and communication
    Team {
        #[command(subcommand)]
        subcommand: TeamSubcommand,
    },

    /// Drive the phase workflow
    Phase {
        #[command(subcommand)]
        subcommand: PhaseSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    // Hooks share stdout with the host CLI's JSON channel, so keep logging
    // quiet there; diagnostics go to stderr either way.
    let default_level = match &cli.command {
        Commands::Hook { .. } => tracing::Level::ERROR,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root_path = cli.root.as_deref();
    let root = root::resolve_root(root_path);

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::State => cmd::team::run(&root, TeamSubcommand::Status, cli.json),
        Commands::Hook { subcommand } => cmd::hook::run(&root, subcommand),
        Commands::Lock { subcommand } => cmd::lock::run(&root, subcommand, cli.json),
        Commands::Queue { subcommand } => cmd::queue::run(&root, subcommand, cli.json),
        Commands::Gates { subcommand } => cmd::gates::run(&root, subcommand, cli.json),
        Commands::Task { subcommand } => cmd::task::run(&root, subcommand, cli.json),
        Commands::Team { subcommand } => cmd::team::run(&root, subcommand, cli.json),
        Commands::Phase { subcommand } => cmd::phase::run(&root, subcommand, cli.json),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Print the full error chain (anyhow's alternate Display)
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
