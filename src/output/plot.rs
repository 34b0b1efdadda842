//! Loss curve rendering

use std::path::Path;

use plotters::prelude::*;

use crate::error::{GanError, Result};
use crate::training::TrainingHistory;

/// Plot size in pixels
pub const PLOT_SIZE: (u32, u32) = (800, 500);

/// Draw D loss (red) and G loss (blue) per epoch to a PNG at `path`, with
/// axis labels and a legend in the lower right corner.
///
/// Non-finite losses are left out of the curves.
pub fn plot_losses(history: &TrainingHistory, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if history.num_epochs() == 0 {
        return Err(GanError::artifact(path, "no epochs to plot"));
    }
    let fail = |e: &dyn std::fmt::Display| GanError::artifact(path, e);

    let points = |losses: &[f64]| -> Vec<(f64, f64)> {
        losses
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_finite())
            .map(|(i, &l)| (i as f64, l))
            .collect()
    };
    let d_points = points(&history.d_losses);
    let g_points = points(&history.g_losses);

    let y_max = d_points
        .iter()
        .chain(g_points.iter())
        .map(|&(_, l)| l)
        .fold(0.0_f64, f64::max)
        .max(1e-3)
        * 1.05;
    let x_max = (history.num_epochs() as f64 - 1.0).max(1.0);

    let root = BitMapBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| fail(&e))?;

    {
        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 50)
            .build_cartesian_2d(0.0..x_max, 0.0..y_max)
            .map_err(|e| fail(&e))?;

        chart
            .configure_mesh()
            .x_desc("Epoch")
            .y_desc("Loss")
            .draw()
            .map_err(|e| fail(&e))?;

        chart
            .draw_series(LineSeries::new(d_points, RED.stroke_width(2)))
            .map_err(|e| fail(&e))?
            .label("D_loss")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));
        chart
            .draw_series(LineSeries::new(g_points, BLUE.stroke_width(2)))
            .map_err(|e| fail(&e))?
            .label("G_loss")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(2)));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| fail(&e))?;
    }

    root.present().map_err(|e| fail(&e))?;
    Ok(())
}
