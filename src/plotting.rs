use crate::consistency::{chi2_95, measurement_dim, NisStats};
use crate::data_parsing::Record;
use crate::measurement::{SensorKind, SensorReading};
use crate::simulator::Estimate;
use anyhow::anyhow;
use gnuplot::*;
use std::path::Path;

const WIDTH_PX: u32 = 1024;
const HEIGHT_PX: u32 = 768;

/// Estimated trajectory against ground truth and the lidar positions.
pub fn plot_trajectory(
    estimates: &[Estimate],
    records: &[Record],
    path: impl AsRef<Path>,
) -> anyhow::Result<()> {
    let lidar: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| match r.measurement.reading {
            SensorReading::Lidar { px, py } => Some((px, py)),
            SensorReading::Radar { .. } => None,
        })
        .collect();
    let gt: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| r.ground_truth.map(|gt| (gt.px, gt.py)))
        .collect();

    let mut fg = Figure::new();
    {
        let ax = fg.axes2d();
        ax.set_title("Trajectory", &[])
            .set_x_label("px [m]", &[])
            .set_y_label("py [m]", &[])
            .set_x_grid(true)
            .set_y_grid(true);
        ax.points(
            lidar.iter().map(|p| p.0),
            lidar.iter().map(|p| p.1),
            &[Caption("Lidar"), PointSymbol('+')],
        );
        if !gt.is_empty() {
            ax.lines(
                gt.iter().map(|p| p.0),
                gt.iter().map(|p| p.1),
                &[Caption("Ground truth")],
            );
        }
        ax.lines(
            estimates.iter().map(|e| e.x[0]),
            estimates.iter().map(|e| e.x[1]),
            &[Caption("Estimate")],
        );
    }
    fg.save_to_png(path.as_ref(), WIDTH_PX, HEIGHT_PX)
        .map_err(|e| anyhow!("{}", e))
}

/// NIS sequence per sensor with its 95% chi-square bound.
pub fn plot_nis(stats: &NisStats, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let mut fg = Figure::new();
    for (i, &sensor) in [SensorKind::Lidar, SensorKind::Radar].iter().enumerate() {
        let values = stats.values(sensor);
        let bound = chi2_95(measurement_dim(sensor)).unwrap_or(f64::NAN);
        let ax = fg.axes2d().set_pos_grid(2, 1, i as u32);
        ax.set_title(&format!("NIS {}", sensor), &[])
            .set_x_label("update", &[])
            .set_y_grid(true);
        ax.lines(0..values.len(), values.iter(), &[Caption("NIS")]);
        ax.lines(
            [0, values.len().saturating_sub(1)].iter(),
            [bound, bound].iter(),
            &[Caption("95%"), LineStyle(Dash)],
        );
    }
    fg.save_to_png(path.as_ref(), WIDTH_PX, HEIGHT_PX)
        .map_err(|e| anyhow!("{}", e))
}
