use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "piledup",
    author,
    version,
    about = "Plan and simulate Piled Up snapshot reveals"
)]
pub struct Cli {
    #[command(flatten)]
    pub overrides: Overrides,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Parser, Debug, Default)]
pub struct Overrides {
    /// Configuration file; defaults to `piledup.toml` in the config directory.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of objects revealed together.
    #[arg(long, global = true, value_name = "COUNT")]
    pub batch_size: Option<usize>,

    /// Objects of the previous batch still alive when the next batch appears.
    #[arg(long, global = true, value_name = "COUNT")]
    pub min_alive: Option<usize>,

    /// Prepare snapshot proxies on a worker thread.
    #[arg(long, global = true)]
    pub background: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the re-timed objects and snapshot windows as JSON.
    Plan(PlanArgs),
    /// Drive the scheduler frame by frame and print visibility changes.
    Simulate(SimulateArgs),
    /// Print the resolved configuration directory and file.
    Where,
}

#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// JSON array of timed objects.
    #[arg(value_name = "OBJECTS")]
    pub objects: PathBuf,

    /// Emit compact JSON instead of pretty-printed output.
    #[arg(long)]
    pub compact: bool,
}

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// JSON array of timed objects.
    #[arg(value_name = "OBJECTS")]
    pub objects: PathBuf,

    /// Frame step in milliseconds.
    #[arg(long, value_name = "MILLISECONDS", default_value_t = 16.0, value_parser = parse_step)]
    pub step: f64,

    /// Playback time to stop at; defaults to one second past the last object.
    #[arg(long, value_name = "MILLISECONDS", allow_hyphen_values = true)]
    pub until: Option<f64>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_step(value: &str) -> Result<f64, String> {
    let trimmed = value.trim();
    let step: f64 = trimmed
        .parse()
        .map_err(|_| format!("invalid frame step '{trimmed}'"))?;
    if !step.is_finite() || step <= 0.0 {
        return Err("frame step must be a positive number of milliseconds".to_string());
    }
    Ok(step)
}
