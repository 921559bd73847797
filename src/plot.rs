//! Multi-panel chart of a sweep: one line per configuration, relay
//! forwarding probability on the x axis.

use crate::sweep::{Quantity, SweepResult, SweepRun};
use anyhow::{Result, bail};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartFormat {
    #[default]
    Svg,
    Png,
}

impl ChartFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ChartFormat::Svg => "svg",
            ChartFormat::Png => "png",
        }
    }
}

impl FromStr for ChartFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "svg" => Ok(ChartFormat::Svg),
            "png" => Ok(ChartFormat::Png),
            other => bail!("Unknown chart format: {}. Use: svg or png", other),
        }
    }
}

impl fmt::Display for ChartFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

pub struct Panel {
    pub title: &'static str,
    pub y_desc: &'static str,
    pub quantities: &'static [Quantity],
}

pub const PANELS: [Panel; 9] = [
    Panel {
        title: "Rank at destination",
        y_desc: "packets",
        quantities: &[Quantity::Increased, Quantity::NotIncreased, Quantity::Difference],
    },
    Panel {
        title: "Sent by source and relay",
        y_desc: "packets",
        quantities: &[Quantity::TotalSent],
    },
    Panel {
        title: "Throughput",
        y_desc: "useful / sent",
        quantities: &[Quantity::Throughput],
    },
    Panel {
        title: "Source sending activity",
        y_desc: "packets",
        quantities: &[Quantity::SourceSent],
    },
    Panel {
        title: "Relay sending activity",
        y_desc: "packets",
        quantities: &[Quantity::RelaySent],
    },
    Panel {
        title: "Lost from source to destination",
        y_desc: "fraction",
        quantities: &[Quantity::SourceDestinationLoss],
    },
    Panel {
        title: "Lost from source to relay",
        y_desc: "fraction",
        quantities: &[Quantity::SourceRelayLoss],
    },
    Panel {
        title: "Lost from relay to destination",
        y_desc: "fraction",
        quantities: &[Quantity::RelayDestinationLoss],
    },
    Panel {
        title: "Delay",
        y_desc: "seconds",
        quantities: &[Quantity::Delay],
    },
];

/// y range covering every series of a panel, padded by 5%. Falls back to
/// `0..1` when there is nothing to draw.
pub fn y_bounds<'a>(series: impl IntoIterator<Item = &'a [(f64, f64)]>) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for points in series {
        for &(_, y) in points {
            if y.is_finite() {
                lo = lo.min(y);
                hi = hi.max(y);
            }
        }
    }

    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if (hi - lo).abs() < 1e-9 {
        let pad = if lo == 0.0 { 1.0 } else { lo.abs() * 0.1 };
        return (lo - pad, hi + pad);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

/// Render the run to `<output>.<ext>` and return the written path.
pub fn render_run(run: &SweepRun, output: impl AsRef<Path>, format: ChartFormat, size: (u32, u32)) -> Result<PathBuf> {
    let path = output.as_ref().with_extension(format.extension());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let title = format!("{} (recode {})", run.name, if run.config.enable_recode { "on" } else { "off" });
    match format {
        ChartFormat::Svg => {
            let root = SVGBackend::new(&path, size).into_drawing_area();
            draw_panels(&root, &title, &run.results)?;
        }
        ChartFormat::Png => {
            let root = BitMapBackend::new(&path, size).into_drawing_area();
            draw_panels(&root, &title, &run.results)?;
        }
    }
    Ok(path)
}

fn draw_panels<DB>(root: &DrawingArea<DB, Shift>, title: &str, results: &[SweepResult]) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let body = root.titled(title, ("sans-serif", 24))?;
    let areas = body.split_evenly((3, 3));

    for (area, panel) in areas.iter().zip(PANELS.iter()) {
        draw_panel(area, panel, results)?;
    }

    root.present()?;
    Ok(())
}

fn draw_panel<DB>(area: &DrawingArea<DB, Shift>, panel: &Panel, results: &[SweepResult]) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let mut lines = Vec::new();
    for (ri, result) in results.iter().enumerate() {
        for (qi, quantity) in panel.quantities.iter().enumerate() {
            let color = Palette99::pick(ri * panel.quantities.len() + qi).to_rgba();
            let label = if panel.quantities.len() > 1 {
                format!("d={} {}", result.distance, quantity.label())
            } else {
                format!("d={}", result.distance)
            };
            lines.push((label, color, result.series(*quantity)));
        }
    }

    let (y_min, y_max) = y_bounds(lines.iter().map(|(_, _, s)| s.as_slice()));

    let mut chart = ChartBuilder::on(area)
        .caption(panel.title, ("sans-serif", 16))
        .margin(8)
        .x_label_area_size(35)
        .y_label_area_size(55)
        .build_cartesian_2d(0f64..1f64, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("relay forwarding probability")
        .y_desc(panel.y_desc)
        .label_style(("sans-serif", 11))
        .draw()?;

    for (label, color, series) in lines {
        chart
            .draw_series(LineSeries::new(series, color.stroke_width(2)))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color.stroke_width(2)));
    }

    if !results.is_empty() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(("sans-serif", 10))
            .draw()?;
    }
    Ok(())
}
