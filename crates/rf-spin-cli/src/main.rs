//! rf-spin — run spin outcomes through the lifecycle from the command line
//!
//! Usage:
//!   rf-spin run --outcome spin.json             - Play an outcome, print the trace
//!   rf-spin run --outcome spin.json --json      - Same, trace as JSON
//!   rf-spin synth --seed 7 --respins 3          - Generate a demo outcome

mod synth;
mod title;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use rf_spin::{
    Runtime, SessionContext, SessionId, SpinConfig, SpinLifecycleController, SpinStatus,
    SpinSummary, TimingConfig, TimingProfile,
};
use rf_stage::StageTrace;

#[derive(Parser)]
#[command(name = "rf-spin", about = "Spin lifecycle runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play an outcome file and print what the lifecycle did
    Run {
        /// Outcome JSON (camelCase server payload)
        #[arg(short, long)]
        outcome: PathBuf,
        /// Title config (.json, .yaml or .yml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the config's timing profile
        #[arg(short, long, value_enum)]
        profile: Option<Profile>,
        /// Slam stop once the spin clock passes this time
        #[arg(long)]
        slam_at_ms: Option<f64>,
        /// Tick length
        #[arg(long, default_value_t = 16.0)]
        frame_ms: f64,
        /// Print the trace as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a seeded demo outcome
    Synth {
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 5)]
        reels: u8,
        #[arg(long, default_value_t = 3)]
        rows: u8,
        /// Number of mutations in the base spin
        #[arg(short, long, default_value_t = 1)]
        mutations: usize,
        /// Number of reevaluation respins
        #[arg(short, long, default_value_t = 0)]
        respins: usize,
        /// Award a bonus
        #[arg(long)]
        bonus: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Profile {
    Normal,
    Turbo,
    Studio,
    Instant,
}

impl From<Profile> for TimingProfile {
    fn from(profile: Profile) -> Self {
        match profile {
            Profile::Normal => TimingProfile::Normal,
            Profile::Turbo => TimingProfile::Turbo,
            Profile::Studio => TimingProfile::Studio,
            Profile::Instant => TimingProfile::Instant,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            outcome,
            config,
            profile,
            slam_at_ms,
            frame_ms,
            json,
        } => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => SpinConfig::default(),
            };
            if let Some(profile) = profile {
                config.timing = TimingConfig::from_profile(profile.into());
            }
            run(&outcome, config, slam_at_ms, frame_ms, json)
        }
        Commands::Synth {
            seed,
            reels,
            rows,
            mutations,
            respins,
            bonus,
        } => {
            if reels == 0 || rows == 0 {
                bail!("grid must have at least one reel and one row");
            }
            let outcome = synth::outcome(seed, reels as usize, rows as usize, mutations, respins, bonus);
            println!("{}", outcome.to_json().context("Failed to serialize outcome")?);
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<SpinConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    let config = if is_yaml {
        SpinConfig::from_yaml(&text)
    } else {
        SpinConfig::from_json(&text)
    };
    config.with_context(|| format!("Invalid config {}", path.display()))
}

fn run(
    outcome_path: &Path,
    config: SpinConfig,
    slam_at_ms: Option<f64>,
    frame_ms: f64,
    json: bool,
) -> Result<()> {
    if !(frame_ms > 0.0) {
        bail!("--frame-ms must be positive");
    }
    let text = fs::read_to_string(outcome_path)
        .with_context(|| format!("Failed to read outcome {}", outcome_path.display()))?;
    let outcome = rf_spin::Outcome::from_json(&text).context("Invalid outcome payload")?;

    let kinds: Vec<String> = config
        .mutation_styles
        .values()
        .flat_map(|style| [style.effect.clone(), style.relocation_effect.clone()])
        .flatten()
        .collect();
    let session = SessionContext::with_kinds(SessionId::BASE, kinds);
    let title = title::LoggingTitle::new(&config.game_id);
    let mut controller = SpinLifecycleController::new(config, Box::new(title), session)
        .context("Controller rejected config")?;
    let mut runtime = Runtime::silent();

    controller.request_spin(outcome)?;
    let summary = play(&mut controller, &mut runtime, slam_at_ms, frame_ms)?;

    if json {
        println!("{}", controller.trace().to_json()?);
    } else {
        print_trace(controller.trace());
        print_summary(&summary);
    }
    Ok(())
}

fn play(
    controller: &mut SpinLifecycleController,
    runtime: &mut Runtime,
    slam_at_ms: Option<f64>,
    frame_ms: f64,
) -> Result<SpinSummary> {
    let Some(slam_at) = slam_at_ms else {
        return Ok(controller.run_to_settle(runtime, frame_ms)?);
    };

    let mut clock = 0.0;
    loop {
        runtime.tick(frame_ms);
        clock += frame_ms;
        if clock >= slam_at {
            controller.slam_stop(runtime);
        }
        match controller.tick(runtime, frame_ms)? {
            SpinStatus::Settled(summary) => return Ok(summary),
            SpinStatus::Idle => bail!("controller went idle without settling"),
            SpinStatus::Running(_) => {}
        }
    }
}

fn print_trace(trace: &StageTrace) {
    println!("Trace {} ({})", trace.trace_id, trace.game_id);
    for event in &trace.events {
        println!(
            "  {:>9.1}ms  #{:<5} {:<18} {:?}",
            event.timestamp_ms,
            event.tick,
            event.type_name(),
            event.stage
        );
    }
}

fn print_summary(summary: &SpinSummary) {
    println!();
    println!("Spin {} settled", summary.spin_id);
    println!("  payout:        {:.2}", summary.payout);
    println!("  elapsed:       {:.0}ms over {} ticks", summary.elapsed_ms, summary.ticks);
    println!("  mutated cells: {}", summary.mutated_cells);
    println!("  respins:       {}", summary.reevaluation_spins);
    if summary.slam_stopped {
        println!("  slam stopped");
    }
}
