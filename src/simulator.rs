use crate::config::UkfConfig;
use crate::consistency::{rmse, NisStats};
use crate::data_parsing::Record;
use crate::measurement::{GroundTruth, Measurement, SensorKind, US_PER_SECOND};
use crate::state_estimator::{
    models::{dynamic::CTRV, DynamicModel},
    ukf::UKF,
    AugStateVec, StateVec, N_X,
};
use nalgebra::Vector4;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::{info, warn};

/// Filter state after a processed measurement.
#[derive(Debug, Clone)]
pub struct Estimate {
    pub timestamp: u64,
    pub sensor: SensorKind,
    pub x: StateVec,
    /// None for the measurement that initialized the filter
    pub nis: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub estimates: Vec<Estimate>,
    pub nis: NisStats,
    /// RMSE of [px, py, vx, vy] over the estimates that have ground truth
    pub rmse: Option<Vector4<f64>>,
    pub rejected: usize,
}

/// Runs a UKF over a recorded dataset.
///
/// Measurements the filter rejects are logged and skipped, the filter keeps its state.
pub fn run_ukf(records: &[Record], config: &UkfConfig) -> RunSummary {
    let mut ukf = UKF::new(config);
    let mut summary = RunSummary::default();
    let mut states = Vec::new();
    let mut truths = Vec::new();

    for (k, record) in records.iter().enumerate() {
        let m = &record.measurement;
        let was_initialized = ukf.is_initialized();
        if let Err(err) = ukf.process_measurement(m) {
            warn!(index = k, timestamp = m.timestamp, sensor = %m.kind(), %err, "measurement rejected");
            summary.rejected += 1;
            continue;
        }

        let nis = if was_initialized {
            ukf.nis(m.kind())
        } else {
            None
        };
        if let Some(nis) = nis {
            summary.nis.record(m.kind(), nis);
        }
        summary.estimates.push(Estimate {
            timestamp: m.timestamp,
            sensor: m.kind(),
            x: *ukf.x(),
            nis,
        });
        if let Some(gt) = record.ground_truth {
            states.push(*ukf.x());
            truths.push(gt);
        }
    }

    summary.rmse = rmse(&states, &truths);
    info!(
        processed = summary.estimates.len(),
        rejected = summary.rejected,
        "run finished"
    );
    summary
}

/// Synthetic single object scenario under the CTRV model.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub seed: u64,
    pub steps: usize,
    /// Sample interval in microseconds
    pub dt_us: u64,
    pub start_us: u64,
    pub x0: StateVec,
    /// Process and sensor noise. The same values tuned into a filter make it consistent.
    pub noise: UkfConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig {
            seed: 42,
            steps: 300,
            dt_us: 50_000,
            start_us: 1_477_010_443_000_000,
            x0: StateVec::new(6.0, 3.0, 3.0, 0.5, 0.1),
            noise: UkfConfig::default(),
        }
    }
}

fn ground_truth(x: &StateVec) -> GroundTruth {
    GroundTruth {
        px: x[0],
        py: x[1],
        vx: x[2] * x[3].cos(),
        vy: x[2] * x[3].sin(),
    }
}

/// Simulates a CTRV trajectory driven by random acceleration and yaw
/// acceleration, observed alternately by lidar and radar.
pub fn simulate_ctrv(scenario: &ScenarioConfig) -> anyhow::Result<Vec<Record>> {
    let noise = &scenario.noise;
    let mut rng = StdRng::seed_from_u64(scenario.seed);
    let nu_a = Normal::new(0.0, noise.std_a)?;
    let nu_yawdd = Normal::new(0.0, noise.std_yawdd)?;
    let las_px = Normal::new(0.0, noise.std_laspx)?;
    let las_py = Normal::new(0.0, noise.std_laspy)?;
    let rad_r = Normal::new(0.0, noise.std_radr)?;
    let rad_phi = Normal::new(0.0, noise.std_radphi)?;
    let rad_rd = Normal::new(0.0, noise.std_radrd)?;

    let dynmod = CTRV::new(noise.std_a, noise.std_yawdd);
    let dt = scenario.dt_us as f64 / US_PER_SECOND;

    let mut x = scenario.x0;
    let mut records = Vec::with_capacity(scenario.steps);
    for k in 0..scenario.steps {
        if k > 0 {
            let mut x_aug = AugStateVec::zeros();
            x_aug.fixed_rows_mut::<N_X>(0).copy_from(&x);
            x_aug[5] = nu_a.sample(&mut rng);
            x_aug[6] = nu_yawdd.sample(&mut rng);
            x = dynmod.f(&x_aug, dt);
        }
        let timestamp = scenario.start_us + k as u64 * scenario.dt_us;
        let gt = ground_truth(&x);

        let measurement = if k % 2 == 0 {
            Measurement::lidar(
                timestamp,
                gt.px + las_px.sample(&mut rng),
                gt.py + las_py.sample(&mut rng),
            )
        } else {
            let rho = gt.px.hypot(gt.py);
            let rho_dot = if rho > 0.0 {
                (gt.px * gt.vx + gt.py * gt.vy) / rho
            } else {
                0.0
            };
            Measurement::radar(
                timestamp,
                rho + rad_r.sample(&mut rng),
                gt.py.atan2(gt.px) + rad_phi.sample(&mut rng),
                rho_dot + rad_rd.sample(&mut rng),
            )
        };
        records.push(Record {
            measurement,
            ground_truth: Some(gt),
        });
    }
    Ok(records)
}
