use anyhow::{Context, Result};
use beatwalk::analyzer::SymphoniaLoudness;
use beatwalk::analyzer::convert::FfmpegConverter;
use beatwalk::analyzer::tempo::TagTempoDetector;
use beatwalk::config::AppConfig;
use beatwalk::observer::LogObserver;
use beatwalk::planner::{TransitionPlan, TransitionPlanner};
use beatwalk::sequence::EntropyRandom;
use beatwalk::session::{SessionError, SessionOrchestrator};
use beatwalk::store::Store;
use beatwalk::track::display_name;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "beatwalk",
    version,
    about = "BPM-banded playlist builder with silence-aware crossfades"
)]
struct Cli {
    /// Directory holding catalog, history and playlist documents
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a new session playlist from a folder
    Build {
        /// Music folder (defaults to config file music_dir)
        folder: Option<PathBuf>,
    },

    /// Convert alternate containers and detect BPMs for new tracks, without building a playlist
    Catalog {
        /// Music folder (defaults to config file music_dir)
        folder: Option<PathBuf>,
    },

    /// Plan the transition between two tracks
    Plan {
        current: PathBuf,
        next: PathBuf,
    },

    /// Plan every transition of the stored playlist
    Transitions,

    /// Record a finished track so later sessions skip it
    Played {
        path: String,
    },

    /// Remember the track being played and the position within it
    Playing {
        path: String,

        /// Playback position in seconds
        #[arg(long, default_value = "0")]
        at: f64,
    },

    /// Show where an interrupted session picks up
    Resume,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();

    // Resolve state directory: CLI > config > XDG default
    let state_dir = cli
        .state_dir
        .or(config.state_dir.clone())
        .unwrap_or_else(beatwalk::config::default_state_dir);
    log::info!("State: {}", state_dir.display());

    let store = Store::open(&state_dir).context("Failed to open state directory")?;
    let observer = LogObserver;

    match cli.command {
        Commands::Build { folder } => {
            let folder = resolve_folder(folder, &config)?;
            let detector = TagTempoDetector;
            let converter = FfmpegConverter::default();
            let mut session = SessionOrchestrator::new(
                &store,
                &detector,
                &converter,
                &observer,
                Box::new(EntropyRandom::new()),
            )
            .with_config(config.session);

            let order = session
                .build_session(&folder)
                .context("Session build failed")?;

            println!("Session: {} tracks", order.len());
            println!();
            for (i, path) in order.iter().enumerate() {
                println!("{:>4}  {}", i + 1, path);
            }
        }

        Commands::Catalog { folder } => {
            let folder = resolve_folder(folder, &config)?;
            let detector = TagTempoDetector;
            let converter = FfmpegConverter::default();
            let mut session = SessionOrchestrator::new(
                &store,
                &detector,
                &converter,
                &observer,
                Box::new(EntropyRandom::new()),
            );
            let update = session
                .refresh_catalog(&folder)
                .context("Catalog refresh failed")?;
            let total = store.load_catalog().context("Failed to read catalog")?.len();
            println!(
                "Catalog complete: {} added, {} failed, {} total",
                update.added.len(),
                update.failures.len(),
                total
            );
        }

        Commands::Plan { current, next } => {
            let mut planner = transition_planner(&config);
            let plan = planner.plan(&current, &next, &observer);
            print_plan_header();
            print_plan_row(&current, &next, &plan);
        }

        Commands::Transitions => {
            let paths = store
                .load_playlist()
                .context("Failed to read playlist")?
                .paths();
            if paths.len() < 2 {
                println!("Playlist has no transitions. Run `beatwalk build` first.");
                return Ok(());
            }

            let mut planner = transition_planner(&config);
            let plans = planner.plan_sequence(&paths, &observer);
            print_plan_header();
            for (pair, plan) in paths.windows(2).zip(&plans) {
                print_plan_row(Path::new(&pair[0]), Path::new(&pair[1]), plan);
            }
        }

        Commands::Played { path } => {
            store.append_history(&path).context("Failed to update history")?;
            println!("Recorded {}", display_name(&path));
        }

        Commands::Playing { path, at } => {
            store
                .save_now_playing(&path, at)
                .context("Failed to store now-playing pointer")?;
        }

        Commands::Resume => {
            let detector = TagTempoDetector;
            let converter = FfmpegConverter::default();
            let session = SessionOrchestrator::new(
                &store,
                &detector,
                &converter,
                &observer,
                Box::new(EntropyRandom::new()),
            );
            let point = match session.resume() {
                Ok(point) => point,
                Err(SessionError::NothingToResume) => {
                    println!("Nothing to resume.");
                    return Ok(());
                }
                Err(e) => return Err(e).context("Resume failed"),
            };

            println!(
                "Resume at {:.1}s, {} tracks left",
                point.position_secs,
                point.tracks.len()
            );
            println!();
            for (i, path) in point.tracks.iter().enumerate() {
                println!("{:>4}  {}", i + 1, path);
            }
        }
    }

    Ok(())
}

/// Folder argument, falling back to the configured music directory.
fn resolve_folder(folder: Option<PathBuf>, config: &AppConfig) -> Result<PathBuf> {
    match folder.or_else(|| config.music_dir.clone()) {
        Some(f) => Ok(f),
        None => anyhow::bail!(
            "No folder given. Pass one as an argument or set music_dir in config."
        ),
    }
}

fn transition_planner(config: &AppConfig) -> TransitionPlanner<SymphoniaLoudness> {
    TransitionPlanner::new(
        SymphoniaLoudness::default(),
        config.silence_threshold_dbfs,
        config.transition,
    )
}

fn print_plan_header() {
    println!(
        "{:<32} {:<32} {:>8} {:>9}",
        "Current", "Next", "Fade", "Start at"
    );
    println!("{}", "-".repeat(84));
}

fn print_plan_row(current: &Path, next: &Path, plan: &TransitionPlan) {
    println!(
        "{:<32} {:<32} {:>7.2}s {:>8.2}s",
        truncate(display_name(&current.to_string_lossy()), 32),
        truncate(display_name(&next.to_string_lossy()), 32),
        plan.crossfade_secs,
        plan.next_start_offset_secs,
    );
}

/// Truncate long names for table display
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width - 3).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}
