use crate::error::ParseError;
use crate::measurement::{GroundTruth, Measurement};
use crate::simulator::Estimate;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::Path,
};

/// One line of a sensor log: a measurement and, if recorded, the true state at that time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub measurement: Measurement,
    #[serde(default)]
    pub ground_truth: Option<GroundTruth>,
}

struct Fields<'a> {
    line: usize,
    iter: std::str::SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    fn next_str(&mut self, field: &'static str) -> Result<&'a str, ParseError> {
        self.iter.next().ok_or(ParseError::MissingField {
            line: self.line,
            field,
        })
    }

    fn next_f64(&mut self, field: &'static str) -> Result<f64, ParseError> {
        let s = self.next_str(field)?;
        s.parse().map_err(|_| ParseError::InvalidNumber {
            line: self.line,
            field,
            value: s.to_string(),
        })
    }

    fn next_u64(&mut self, field: &'static str) -> Result<u64, ParseError> {
        let s = self.next_str(field)?;
        s.parse().map_err(|_| ParseError::InvalidNumber {
            line: self.line,
            field,
            value: s.to_string(),
        })
    }

    fn ground_truth(&mut self) -> Result<Option<GroundTruth>, ParseError> {
        let px = match self.iter.next() {
            Some(s) => s,
            None => return Ok(None),
        };
        let px = px.parse().map_err(|_| ParseError::InvalidNumber {
            line: self.line,
            field: "gt_px",
            value: px.to_string(),
        })?;
        // trailing yaw and yaw rate columns are ignored
        Ok(Some(GroundTruth {
            px,
            py: self.next_f64("gt_py")?,
            vx: self.next_f64("gt_vx")?,
            vy: self.next_f64("gt_vy")?,
        }))
    }
}

/// Parses one line of a sensor log.
///
/// ```text
/// L  px   py     timestamp          [gt_px gt_py gt_vx gt_vy ...]
/// R  rho  theta  rho_dot  timestamp [gt_px gt_py gt_vx gt_vy ...]
/// ```
///
/// Blank lines and lines starting with `#` yield `None`. `line` is 1-based.
pub fn parse_line(line: usize, text: &str) -> Result<Option<Record>, ParseError> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }
    let mut fields = Fields {
        line,
        iter: text.split_whitespace(),
    };
    let measurement = match fields.next_str("sensor")? {
        "L" => {
            let px = fields.next_f64("px")?;
            let py = fields.next_f64("py")?;
            let timestamp = fields.next_u64("timestamp")?;
            Measurement::lidar(timestamp, px, py)
        }
        "R" => {
            let rho = fields.next_f64("rho")?;
            let theta = fields.next_f64("theta")?;
            let rho_dot = fields.next_f64("rho_dot")?;
            let timestamp = fields.next_u64("timestamp")?;
            Measurement::radar(timestamp, rho, theta, rho_dot)
        }
        tag => {
            return Err(ParseError::UnsupportedSensor {
                line,
                tag: tag.to_string(),
            })
        }
    };
    let ground_truth = fields.ground_truth()?;
    Ok(Some(Record {
        measurement,
        ground_truth,
    }))
}

pub fn read_sensor_log(reader: impl BufRead) -> Result<Vec<Record>, ParseError> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        if let Some(record) = parse_line(i + 1, &line?)? {
            records.push(record);
        }
    }
    Ok(records)
}

pub fn read_dataset_from_json(data_path: impl AsRef<Path>) -> anyhow::Result<Vec<Record>> {
    let file = File::open(data_path)?;
    let records = serde_json::from_reader(BufReader::new(file))?;

    Ok(records)
}

/// Reads a dataset, JSON if the extension is `.json`, a sensor log otherwise.
pub fn read_dataset(data_path: impl AsRef<Path>) -> anyhow::Result<Vec<Record>> {
    let data_path = data_path.as_ref();
    let is_json = data_path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        return read_dataset_from_json(data_path)
            .with_context(|| format!("reading JSON dataset {}", data_path.display()));
    }
    let file = File::open(data_path)
        .with_context(|| format!("opening sensor log {}", data_path.display()))?;
    let records = read_sensor_log(BufReader::new(file))
        .with_context(|| format!("parsing sensor log {}", data_path.display()))?;
    Ok(records)
}

/// Writes estimates as tab separated values with a header row.
pub fn write_estimates(mut writer: impl Write, estimates: &[Estimate]) -> std::io::Result<()> {
    writeln!(writer, "time_us\tsensor\tpx\tpy\tv\tyaw\tyawd\tnis")?;
    for e in estimates {
        let nis = e.nis.map_or_else(|| "-".to_string(), |nis| format!("{:.6}", nis));
        writeln!(
            writer,
            "{}\t{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{}",
            e.timestamp, e.sensor, e.x[0], e.x[1], e.x[2], e.x[3], e.x[4], nis
        )?;
    }
    Ok(())
}
