use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

/// Tuning parameters of the filter, fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UkfConfig {
    /// Process noise standard deviation, longitudinal acceleration (m/s^2)
    pub std_a: f64,
    /// Process noise standard deviation, yaw acceleration (rad/s^2)
    pub std_yawdd: f64,
    /// Lidar noise standard deviation, x position (m)
    pub std_laspx: f64,
    /// Lidar noise standard deviation, y position (m)
    pub std_laspy: f64,
    /// Radar noise standard deviation, range (m)
    pub std_radr: f64,
    /// Radar noise standard deviation, bearing (rad)
    pub std_radphi: f64,
    /// Radar noise standard deviation, range rate (m/s)
    pub std_radrd: f64,
    /// If false, lidar measurements are rejected except for initialization
    pub use_lidar: bool,
    /// If false, radar measurements are rejected except for initialization
    pub use_radar: bool,
    /// Sigma points closer to the sensor than this make the range rate undefined
    pub min_radar_range: f64,
}

impl Default for UkfConfig {
    fn default() -> Self {
        UkfConfig {
            std_a: 0.30,
            std_yawdd: 0.30,
            std_laspx: 0.15,
            std_laspy: 0.15,
            std_radr: 0.3,
            std_radphi: 0.03,
            std_radrd: 0.3,
            use_lidar: true,
            use_radar: true,
            min_radar_range: 1e-3,
        }
    }
}

impl UkfConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let stds = [
            ("std_a", self.std_a),
            ("std_yawdd", self.std_yawdd),
            ("std_laspx", self.std_laspx),
            ("std_laspy", self.std_laspy),
            ("std_radr", self.std_radr),
            ("std_radphi", self.std_radphi),
            ("std_radrd", self.std_radrd),
        ];
        for (name, value) in stds.iter().copied() {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidStd { name, value });
            }
        }
        if !self.min_radar_range.is_finite() || self.min_radar_range <= 0.0 {
            return Err(ConfigError::InvalidRangeFloor {
                name: "min_radar_range",
                value: self.min_radar_range,
            });
        }
        Ok(())
    }

    /// Reads a JSON config. Missing fields fall back to their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: UkfConfig =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(UkfConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: UkfConfig = serde_json::from_str(r#"{ "std_a": 1.5, "use_radar": false }"#).unwrap();
        assert_eq!(config.std_a, 1.5);
        assert!(!config.use_radar);
        assert_eq!(config.std_radphi, UkfConfig::default().std_radphi);
    }

    #[test]
    fn negative_std_rejected() {
        let config = UkfConfig {
            std_radr: -0.1,
            ..UkfConfig::default()
        };
        match config.validate() {
            Err(ConfigError::InvalidStd { name, .. }) => assert_eq!(name, "std_radr"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn nan_std_rejected() {
        let config = UkfConfig {
            std_yawdd: f64::NAN,
            ..UkfConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_range_floor_rejected() {
        let config = UkfConfig {
            min_radar_range: 0.0,
            ..UkfConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRangeFloor { .. })
        ));
    }
}
