//! Cellar CLI
//!
//! Runs seeded episodes of the cellar simulator and describes configurations.

#[cfg(feature = "cli")]
use anyhow::Result;
#[cfg(feature = "cli")]
use cellar_cli::{BatchReport, Policy, RunOptions};
#[cfg(feature = "cli")]
use cellar_core::Cellar;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "cellar")]
#[command(about = "Simulate the cellar POMDP with rollout policies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Play seeded episodes and summarise the returns
    Run {
        /// Preset name (small, medium, large, huge); defaults to CELLAR_PROFILE
        #[arg(long)]
        preset: Option<String>,

        /// JSON or YAML params file, overrides --preset
        #[arg(long)]
        config: Option<PathBuf>,

        /// Rollout policy (random, preferred, pgs)
        #[arg(long, default_value = "preferred")]
        policy: Policy,

        /// Number of episodes
        #[arg(long, default_value = "100")]
        episodes: usize,

        /// Seed of the first episode
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Step limit per episode
        #[arg(long, default_value = "200")]
        max_steps: usize,

        /// Report PGS-shaped rewards
        #[arg(long, default_value = "false")]
        shaped: bool,

        /// Validate the state after every step
        #[arg(long, default_value = "false")]
        validate: bool,

        /// Write the full report as JSON
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print the layout and action space of a configuration as JSON
    Describe {
        /// Preset name (small, medium, large, huge); defaults to CELLAR_PROFILE
        #[arg(long)]
        preset: Option<String>,

        /// JSON or YAML params file, overrides --preset
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            preset,
            config,
            policy,
            episodes,
            seed,
            max_steps,
            shaped,
            validate,
            out,
        } => {
            let params = cellar_cli::resolve_params(config.as_deref(), preset.as_deref())?;
            let cellar = Cellar::new(params)?;
            let options = RunOptions {
                policy,
                episodes,
                seed,
                max_steps,
                shaped,
                validate,
            };

            println!("Running {} episodes...", episodes);
            println!("   Preset:    {:?}", cellar.layout().preset);
            println!("   Grid:      {0}x{0}", cellar.size());
            println!("   Policy:    {}", policy);
            println!("   Seeds:     {}..{}", seed, seed.wrapping_add(episodes as u64));

            let report = cellar_cli::run_batch(&cellar, &options)?;
            print_report(&report);

            if let Some(path) = out {
                save_report(&path, &report)?;
            }
        }

        Commands::Describe { preset, config } => {
            let params = cellar_cli::resolve_params(config.as_deref(), preset.as_deref())?;
            let cellar = Cellar::new(params)?;
            let description = cellar_cli::describe(&cellar);
            println!("{}", serde_json::to_string_pretty(&description)?);
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn print_report(report: &BatchReport) {
    println!("\nDone.");
    println!("   Mean reward:      {:.3}", report.mean_reward);
    println!("   Mean return:      {:.3} (discounted)", report.mean_discounted_return);
    println!("   Mean steps:       {:.1}", report.mean_steps);
    println!("   Exit rate:        {:.1}%", report.exit_rate * 100.0);
    if report.shaped {
        println!("   Rewards include PGS shaping");
    }
}

#[cfg(feature = "cli")]
fn save_report(path: &PathBuf, report: &BatchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    println!("\nReport saved to: {}", path.display());
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("cellar CLI is not available. Enable the 'cli' feature to use it.");
    std::process::exit(1);
}
