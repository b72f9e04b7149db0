use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cmd;

#[derive(Parser)]
#[command(name = "warden")]
#[command(version, about = "Workflow verification engine for story pipelines")]
pub struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the .warden/ structure in a project
    Init,
    /// Load the story graph, validate it, and activate the workflow
    Start,
    /// Tear the workflow down; refused while stories are incomplete
    Stop {
        /// Exit even with incomplete stories (logged as a degraded exit)
        #[arg(long)]
        force: bool,
    },
    /// Show workflow state and per-story progress
    Status,
    /// Claim a story: snapshot the tree and enter author-tests
    Begin {
        /// Story id
        story: String,
    },
    /// Advance the global phase marker
    Phase {
        /// One of: idle, author-tests, implement, validate, cleanup, finalize
        phase: String,
    },
    /// Check whether the current phase may mutate a path (exit 1 = DENY)
    Gate {
        /// Path of the attempted mutation
        path: PathBuf,
    },
    /// Record a checkpoint outcome for a story
    Checkpoint {
        /// Story id
        story: String,
        /// Checkpoint kind (e.g. tests-authored, tests-verified)
        kind: String,
        /// Claimed outcome: pass or fail
        outcome: String,
        /// Failure reason (with 'fail')
        #[arg(long)]
        reason: Option<String>,
        /// Evidence artifact path (required for verified kinds)
        #[arg(long)]
        evidence: Option<PathBuf>,
    },
    /// Record a failed validation attempt (exit 2 = rollback now mandatory)
    Fail {
        /// Story id
        story: String,
        /// What went wrong
        #[arg(long)]
        reason: String,
    },
    /// Revert a story to its snapshot and emit a conflict artifact
    Rollback {
        /// Story id
        story: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Run the completion audit for a story (exit 1 = blocked)
    Complete {
        /// Story id
        story: String,
    },
    /// Print the next ready story
    Next {
        /// Print every currently-ready story, one per line
        #[arg(long)]
        batch: bool,
    },
    /// List the story graph with completion flags
    Stories,
    /// Advisory bad-pattern sweep over files (never gates)
    Advise {
        /// Files to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("WARDEN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let project_dir = cli
        .project_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));

    let result = match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir),
        Commands::Start => cmd::cmd_start(&project_dir),
        Commands::Stop { force } => cmd::cmd_stop(&project_dir, *force),
        Commands::Status => cmd::cmd_status(&project_dir),
        Commands::Begin { story } => cmd::cmd_begin(&project_dir, story),
        Commands::Phase { phase } => cmd::cmd_phase(&project_dir, phase),
        Commands::Gate { path } => cmd::cmd_gate(&project_dir, path),
        Commands::Checkpoint {
            story,
            kind,
            outcome,
            reason,
            evidence,
        } => cmd::cmd_checkpoint(
            &project_dir,
            story,
            kind,
            outcome,
            reason.as_deref(),
            evidence.as_deref(),
        ),
        Commands::Fail { story, reason } => cmd::cmd_fail(&project_dir, story, reason),
        Commands::Rollback { story, yes } => cmd::cmd_rollback(&project_dir, story, *yes),
        Commands::Complete { story } => cmd::cmd_complete(&project_dir, story),
        Commands::Next { batch } => cmd::cmd_next(&project_dir, *batch),
        Commands::Stories => cmd::cmd_stories(&project_dir),
        Commands::Advise { paths } => cmd::cmd_advise(&project_dir, paths),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", console::style("error:").red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
