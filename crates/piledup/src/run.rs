use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use pileconfig::{PileConfig, PrepareMode};
use scheduler::{Scheduler, TimedObject};
use tracing_subscriber::EnvFilter;

use crate::canvas::TraceFactory;
use crate::cli::{Cli, Command, Overrides, PlanArgs, SimulateArgs};
use crate::paths::AppPaths;
use crate::plan::Plan;

pub fn run(args: Cli) -> Result<()> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    tracing::debug!(config = %paths.config_dir().display(), "resolved piledup paths");

    match &args.command {
        Command::Where => {
            println!("config dir:  {}", paths.config_dir().display());
            println!("config file: {}", paths.config_file().display());
            Ok(())
        }
        Command::Plan(plan) => {
            let config = load_config(&args.overrides, &paths)?;
            run_plan(plan, &config)
        }
        Command::Simulate(simulate) => {
            let config = load_config(&args.overrides, &paths)?;
            run_simulate(simulate, &config)
        }
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(overrides: &Overrides, paths: &AppPaths) -> Result<PileConfig> {
    let mut config = match overrides.config.as_ref() {
        Some(path) => read_config(path)?,
        None => {
            let path = paths.config_file();
            if path.exists() {
                read_config(&path)?
            } else {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                PileConfig::default()
            }
        }
    };

    if let Some(batch_size) = overrides.batch_size {
        config.batching.batch_size = batch_size;
    }
    if let Some(min_alive) = overrides.min_alive {
        config.batching.min_alive_count = min_alive;
    }
    if overrides.background {
        config.prepare.mode = PrepareMode::Background;
    }
    config
        .validate()
        .context("configuration rejected after applying command-line overrides")?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<PileConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config = PileConfig::from_toml_str(&contents)
        .with_context(|| format!("failed to load config file at {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded piledup config");
    Ok(config)
}

fn read_objects(path: &Path) -> Result<Vec<TimedObject>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read objects at {}", path.display()))?;
    let objects: Vec<TimedObject> = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse objects at {}", path.display()))?;
    if objects.is_empty() {
        bail!("{} contains no timed objects", path.display());
    }
    Ok(objects)
}

fn run_plan(args: &PlanArgs, config: &PileConfig) -> Result<()> {
    let objects = read_objects(&args.objects)?;
    let mut scheduler = Scheduler::with_default_visuals(objects, config, TraceFactory)
        .context("failed to schedule objects")?;
    scheduler.finish_prepares();

    let plan = Plan::from_scheduler(&scheduler);
    let output = if args.compact {
        serde_json::to_string(&plan)?
    } else {
        serde_json::to_string_pretty(&plan)?
    };
    println!("{output}");
    Ok(())
}

fn run_simulate(args: &SimulateArgs, config: &PileConfig) -> Result<()> {
    let objects = read_objects(&args.objects)?;
    let last_start = objects
        .iter()
        .map(|object| object.start_time)
        .fold(f64::NEG_INFINITY, f64::max);
    let mut scheduler = Scheduler::with_default_visuals(objects, config, TraceFactory)
        .context("failed to schedule objects")?;

    let until = args.until.unwrap_or(last_start + 1000.0);
    let mut now = scheduler.first_start_time() - args.step;
    let mut frames = 0u64;
    tracing::info!(from = now, until, step = args.step, "simulating playback");

    while now <= until {
        for event in scheduler.tick(now) {
            let alpha = scheduler
                .snapshot(event.handle)
                .map_or(0.0, |snapshot| snapshot.canvas().alpha());
            println!(
                "{:>10.1} batch {:>4} {:<11} alpha {:.2}",
                event.at,
                event.handle.0,
                format!("{:?}", event.state),
                alpha
            );
        }
        frames += 1;
        now += args.step;
    }

    scheduler.teardown();
    tracing::info!(frames, "simulation finished");
    Ok(())
}
