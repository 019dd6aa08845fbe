use anyhow::{Context, Result};
use clap::Parser;
use contagion_common::{AgentId, InfectionStage, SimulationConfig};
use contagion_engine::loader::{self, DatasetFilter};
use contagion_engine::{EngineBuilder, EpidemicEngine, TrajectoryOptions};
use env_logger::Builder;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn, LevelFilter};
use std::path::PathBuf;
use std::time::Instant;

/// Command-line arguments for the simulation runner
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the run configuration
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides the seed from the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Builder::new()
        .filter_level(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .parse_default_env()
        .init();

    info!("Starting contagion engine...");
    let mut config = SimulationConfig::load(&args.config)?;
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    debug!("Configuration: {:#?}", config);
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    let mut engine = build_engine(&config)?;
    attach_trajectories(&mut engine, &config)?;

    // --- Population ---
    if engine.trajectory_ids().is_empty() {
        let size = config.population.size as usize;
        let width = size.saturating_sub(1).to_string().len();
        let ids: Vec<AgentId> = (0..size).map(|i| format!("{:0width$}", i, width = width)).collect();
        engine.generate_population(ids)?;
    } else {
        engine.generate_population_from_trajectories()?;
    }
    engine.infect_patient_zeroes()?;
    log_stage_counts(&engine);

    run(&mut engine, &config)?;

    // --- Summary ---
    log_stage_counts(&engine);
    let hottest = engine.contamination().hottest(config.output.heatmap_top_n);
    if hottest.is_empty() {
        info!("No cells were contaminated.");
    }
    for (rank, cell) in hottest.iter().enumerate() {
        info!(
            "#{:<3} cell ({}, {}) at ({:.5}, {:.5}): level {} ({:.0}%)",
            rank + 1,
            cell.key.lat_idx,
            cell.key.lng_idx,
            cell.location.lat,
            cell.location.lng,
            cell.level,
            cell.intensity * 100.0
        );
    }
    Ok(())
}

fn build_engine(config: &SimulationConfig) -> Result<EpidemicEngine> {
    let params = config.param_table()?;
    let mut builder = EngineBuilder::new().params(params).seed(config.simulation.seed);
    if let Some(id) = &config.population.patient_zero {
        builder = builder.patient_zero(id.clone());
    }
    Ok(builder.build()?)
}

fn attach_trajectories(engine: &mut EpidemicEngine, config: &SimulationConfig) -> Result<()> {
    let Some(path) = &config.trajectories.path else {
        info!("No trajectory dataset configured; running without contamination.");
        return Ok(());
    };
    let options = TrajectoryOptions {
        looping: config.trajectories.looping,
        interpolate: config.trajectories.interpolate,
        start_time: config.simulation.start_time,
    };
    let filter = DatasetFilter {
        keep_first_n: config.population.keep_first_n,
        patient_zero: config.population.patient_zero.clone(),
    };

    info!("Loading trajectories from {}...", path.display());
    engine.begin_trajectory_load()?;
    let result = loader::load_store(path, &filter, options).map_err(|e| format!("{:#}", e));
    if !engine.complete_trajectory_load(result)? {
        let reason = engine.load_state();
        error!("Trajectory load failed: {:?}", reason);
        anyhow::bail!("Failed to load trajectories from '{}'.", path.display());
    }
    if let Some(store) = engine.trajectories() {
        let range = store.time_range();
        info!(
            "Dataset covers {:.0} .. {:.0} ({:.1} h); starting at {:.0}.",
            range.begin,
            range.end,
            range.span / 3600.0,
            store.start_time()
        );
    }
    Ok(())
}

fn run(engine: &mut EpidemicEngine, config: &SimulationConfig) -> Result<()> {
    let tick_seconds = config.simulation.tick_seconds;
    let total_ticks = config.total_ticks();
    let report_interval = config.output.report_interval_ticks;
    if total_ticks == 0 {
        warn!("total_seconds is 0; nothing to simulate.");
        return Ok(());
    }
    info!("Running {} ticks of {:.1} s.", total_ticks, tick_seconds);

    let progress_bar = ProgressBar::new(total_ticks);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ticks ({percent}%) [{eta}]")
            .context("Invalid progress bar template")?,
    );

    let start_time = Instant::now();
    for tick in 0..total_ticks {
        if let Err(e) = engine.advance(tick_seconds) {
            progress_bar.abandon();
            error!("Error during tick {}: {}", tick + 1, e);
            anyhow::bail!("Simulation tick failed.");
        }
        progress_bar.inc(1);

        if (tick + 1) % report_interval == 0 || tick + 1 == total_ticks {
            let counts = engine.stage_counts();
            progress_bar.println(format!(
                "t={:.0}s infected={} dead={} recovered={} cells={}",
                engine.total_seconds(),
                counts.iter().filter(|(s, _)| s.is_infected() && !s.is_outcome()).map(|(_, n)| n).sum::<usize>(),
                counts.get(InfectionStage::Dead),
                counts.get(InfectionStage::Recovered),
                engine.contamination().len()
            ));
        }
    }
    progress_bar.finish_and_clear();

    let elapsed = start_time.elapsed();
    info!(
        "Simulation finished in {:.3} seconds ({:.1} simulated hours).",
        elapsed.as_secs_f64(),
        engine.total_seconds() / 3600.0
    );
    Ok(())
}

fn log_stage_counts(engine: &EpidemicEngine) {
    let counts = engine.stage_counts();
    let summary: Vec<String> = counts.iter().map(|(stage, n)| format!("{}={}", stage.name(), n)).collect();
    info!("t={:.0}s | {}", engine.total_seconds(), summary.join(" "));
}
