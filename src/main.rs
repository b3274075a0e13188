use anyhow::{Context, Result};
use clap::Parser;
use std::{fs::File, io::BufWriter, path::PathBuf};
use tracing_subscriber::EnvFilter;
use ukf_fusion::{
    config::UkfConfig,
    data_parsing::{read_dataset, write_estimates},
    measurement::SensorKind,
    plotting,
    simulator::{run_ukf, simulate_ctrv, ScenarioConfig},
};

#[derive(Parser)]
#[command(name = "ukf-fusion", about = "Lidar and radar fusion with an unscented Kalman filter")]
struct Cli {
    /// Sensor log or JSON dataset. A synthetic CTRV scenario is run when omitted
    input: Option<PathBuf>,
    /// Filter tuning as JSON
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed of the synthetic scenario
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Number of measurements in the synthetic scenario
    #[arg(long, default_value_t = 500)]
    steps: usize,
    /// Write estimates as TSV
    #[arg(long)]
    output: Option<PathBuf>,
    /// Save a trajectory plot as PNG
    #[arg(long)]
    plot: Option<PathBuf>,
    /// Save a NIS plot as PNG
    #[arg(long)]
    nis_plot: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => UkfConfig::from_json_file(path)?,
        None => UkfConfig::default(),
    };

    let records = match &cli.input {
        Some(path) => read_dataset(path)?,
        None => simulate_ctrv(&ScenarioConfig {
            seed: cli.seed,
            steps: cli.steps,
            noise: config.clone(),
            ..ScenarioConfig::default()
        })?,
    };

    let summary = run_ukf(&records, &config);

    println!(
        "processed {} of {} measurements",
        summary.estimates.len(),
        records.len()
    );
    match summary.rmse {
        Some(rmse) => println!(
            "RMSE px {:.4}  py {:.4}  vx {:.4}  vy {:.4}",
            rmse[0], rmse[1], rmse[2], rmse[3]
        ),
        None => println!("RMSE unavailable, no ground truth"),
    }
    for &sensor in &[SensorKind::Lidar, SensorKind::Radar] {
        let s = summary.nis.summary(sensor);
        println!(
            "NIS {}: {} updates, mean {:.3}, {:.1}% above 95% bound",
            sensor,
            s.count,
            s.mean,
            100.0 * s.fraction_above_95
        );
    }

    if let Some(path) = &cli.output {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write_estimates(BufWriter::new(file), &summary.estimates)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &cli.plot {
        plotting::plot_trajectory(&summary.estimates, &records, path)?;
    }
    if let Some(path) = &cli.nis_plot {
        plotting::plot_nis(&summary.nis, path)?;
    }

    Ok(())
}
