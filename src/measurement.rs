use nalgebra::{DVector, Vector4};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Microseconds per second, timestamps cross the boundary as integer microseconds.
pub const US_PER_SECOND: f64 = 1_000_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    Lidar,
    Radar,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Lidar => write!(f, "lidar"),
            SensorKind::Radar => write!(f, "radar"),
        }
    }
}

/// Raw sensor values, tagged by the sensor that produced them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sensor", rename_all = "lowercase")]
pub enum SensorReading {
    /// Cartesian position in metres.
    Lidar { px: f64, py: f64 },
    /// Range (m), bearing (rad) and range rate (m/s).
    Radar { rho: f64, theta: f64, rho_dot: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Integer microseconds.
    pub timestamp: u64,
    #[serde(flatten)]
    pub reading: SensorReading,
}

impl Measurement {
    pub fn lidar(timestamp: u64, px: f64, py: f64) -> Self {
        Measurement {
            timestamp,
            reading: SensorReading::Lidar { px, py },
        }
    }

    pub fn radar(timestamp: u64, rho: f64, theta: f64, rho_dot: f64) -> Self {
        Measurement {
            timestamp,
            reading: SensorReading::Radar {
                rho,
                theta,
                rho_dot,
            },
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.reading.kind()
    }

    /// Raw values as a vector in the sensor's measurement space.
    pub fn z(&self) -> DVector<f64> {
        self.reading.z()
    }
}

impl SensorReading {
    pub fn kind(&self) -> SensorKind {
        match self {
            SensorReading::Lidar { .. } => SensorKind::Lidar,
            SensorReading::Radar { .. } => SensorKind::Radar,
        }
    }

    pub fn z(&self) -> DVector<f64> {
        match *self {
            SensorReading::Lidar { px, py } => DVector::from_row_slice(&[px, py]),
            SensorReading::Radar {
                rho,
                theta,
                rho_dot,
            } => DVector::from_row_slice(&[rho, theta, rho_dot]),
        }
    }
}

/// Reference state recorded alongside a measurement in a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub px: f64,
    pub py: f64,
    pub vx: f64,
    pub vy: f64,
}

impl GroundTruth {
    pub fn as_vector(&self) -> Vector4<f64> {
        Vector4::new(self.px, self.py, self.vx, self.vy)
    }
}

/// Elapsed seconds between two microsecond timestamps.
pub fn elapsed_seconds(previous: u64, current: u64) -> Option<f64> {
    current
        .checked_sub(previous)
        .map(|us| us as f64 / US_PER_SECOND)
}
