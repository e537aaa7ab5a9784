//! fragspace - level-by-level combinatorial exploration of a fragment space
//!
//! Main entry point for the fragspace command-line tool.

use clap::{Parser, Subcommand, ValueEnum};
use fragspace_checkpoint::CheckpointFormat;
use fragspace_cli::{commands, logging, ConfigLoader, RunOverrides};
use fragspace_core::{ExplorerError, ShutdownCoordinator};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "fragspace")]
#[command(about = "Exhaustive, resumable exploration of a building-block fragment space", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file applied on top of the user and project files
    #[arg(short, long, global = true, env = "FRAGSPACE_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "fragspace_core=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log one JSON object per event
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore the fragment space
    Run(RunArgs),

    /// Print a checkpoint file
    Checkpoint {
        /// Checkpoint file
        file: PathBuf,
        /// Encoding of the file
        #[arg(short, long, value_enum, default_value_t = FormatArg::Json)]
        format: FormatArg,
    },

    /// Count stored candidates per level
    Levels {
        /// Directory holding the FSE-Level_* directories
        db_root: PathBuf,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Building-block library (JSON)
    #[arg(short, long)]
    library: Option<PathBuf>,
    /// Run directory
    #[arg(short, long)]
    work_dir: Option<PathBuf>,
    /// Root of the level directories (defaults to the run directory)
    #[arg(long)]
    db_root: Option<PathBuf>,
    /// Number of concurrent expansion workers
    #[arg(short = 'j', long)]
    workers: Option<usize>,
    #[arg(long)]
    queue_capacity: Option<usize>,
    /// Deepest level to grow
    #[arg(short, long)]
    max_level: Option<i32>,
    /// Wall-clock budget per level, in seconds
    #[arg(long)]
    level_timeout: Option<u64>,
    /// Submissions between checkpoints
    #[arg(long)]
    checkpoint_interval: Option<usize>,
    /// Resume from this checkpoint file
    #[arg(short, long)]
    resume: Option<PathBuf>,
    /// Root graphs (JSON array) to grow instead of the library scaffolds
    #[arg(long)]
    roots: Option<PathBuf>,
    /// Score every finished candidate with this program
    #[arg(long)]
    scoring_program: Option<PathBuf>,
    /// Grow symmetric attachment points independently
    #[arg(long)]
    no_symmetry: bool,
}

impl From<RunArgs> for RunOverrides {
    fn from(args: RunArgs) -> Self {
        Self {
            library: args.library,
            work_dir: args.work_dir,
            db_root: args.db_root,
            workers: args.workers,
            queue_capacity: args.queue_capacity,
            max_level: args.max_level,
            level_timeout_secs: args.level_timeout,
            checkpoint_interval: args.checkpoint_interval,
            resume_from: args.resume,
            root_graphs: args.roots,
            scoring_program: args.scoring_program,
            no_symmetry: args.no_symmetry,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Bincode,
}

impl From<FormatArg> for CheckpointFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => CheckpointFormat::Json,
            FormatArg::Bincode => CheckpointFormat::Bincode,
        }
    }
}

/// Exit status for a run stopped by a signal
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_explicit(path);
    }
    let mut config = loader.load().await?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json_logs;
    logging::init(&config.logging)?;

    match cli.command {
        Commands::Run(args) => {
            RunOverrides::from(args).apply(&mut config);

            let shutdown = ShutdownCoordinator::new();
            let _signal_handler = shutdown.install_signal_handlers();

            match commands::run(config, shutdown).await {
                Ok(summary) => {
                    print!("{}", commands::render_summary(&summary));
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => match e.downcast_ref::<ExplorerError>() {
                    Some(ExplorerError::Interrupted { level }) => {
                        eprintln!("Interrupted during level {}; resume from the last checkpoint", level);
                        Ok(ExitCode::from(EXIT_INTERRUPTED))
                    }
                    _ => Err(e),
                },
            }
        }
        Commands::Checkpoint { file, format } => {
            let chk = commands::load_checkpoint(&file, format.into()).await?;
            println!("{}", chk);
            println!("{}", serde_json::to_string_pretty(&chk)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Levels { db_root } => {
            let counts = commands::level_counts(&db_root).await?;
            if counts.is_empty() {
                println!("No levels found under {}", db_root.display());
            } else {
                println!("{:<8} {}", "Level", "Candidates");
                for (level, count) in counts {
                    println!("{:<8} {}", level, count);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
