use crate::{pipeline::PipelineSnapshot, signal::PeakRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Markers(LineSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(s) | Series::Markers(s) => &s.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x_label: None,
            y_label: None,
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over all series, `None` when empty.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.series.iter().flat_map(|s| s.points().iter());
        let first = points.next()?;
        let init = (first[0], first[0], first[1], first[1]);
        Some(points.fold(init, |(x0, x1, y0, y1), p| {
            (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1]))
        }))
    }
}

/// Keep every n-th point so at most `max_points` remain. The last point is
/// always kept so the time axis ends where the buffer does.
pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if max_points == 0 {
        return Vec::new();
    }
    if points.len() <= max_points {
        return points.to_vec();
    }
    let stride = points.len().div_ceil(max_points);
    let mut kept: Vec<[f64; 2]> = points.iter().copied().step_by(stride).collect();
    if let Some(&last) = points.last() {
        if kept.last() != Some(&last) {
            if kept.len() == max_points {
                kept.pop();
            }
            kept.push(last);
        }
    }
    kept
}

/// Waveform of the buffered window (seconds relative to its first sample)
/// with normal and irregular peaks as separate marker series.
pub fn figure_from_snapshot(snapshot: &PipelineSnapshot, max_points: usize) -> Figure {
    let origin = snapshot.samples.first().map_or(0, |s| s.time);
    let secs = |t: i64| t.saturating_sub(origin) as f64 / 1000.0;

    let waveform: Vec<[f64; 2]> = snapshot
        .samples
        .iter()
        .map(|s| [secs(s.time), s.value])
        .collect();
    let (irregular, regular): (Vec<&PeakRecord>, Vec<&PeakRecord>) =
        snapshot.peaks.iter().partition(|p| p.is_irregular);

    let mut fig = Figure::new(Some(match snapshot.bpm {
        Some(bpm) => format!("PPG ({:.0} bpm, {})", bpm, snapshot.irregularity),
        None => format!("PPG (no rate yet, {})", snapshot.irregularity),
    }));
    fig.x_label = Some("time (s)".into());
    fig.y_label = Some("amplitude".into());
    fig.add_series(Series::Line(LineSeries {
        name: "signal".into(),
        points: decimate_points(&waveform, max_points),
        style: Style {
            width: 1.4,
            color: Color(0x1F77B4),
        },
    }));
    fig.add_series(Series::Markers(LineSeries {
        name: "peaks".into(),
        points: regular.iter().map(|p| [secs(p.time), p.value]).collect(),
        style: Style {
            width: 4.0,
            color: Color(0x2CA02C),
        },
    }));
    if !irregular.is_empty() {
        fig.add_series(Series::Markers(LineSeries {
            name: "irregular".into(),
            points: irregular.iter().map(|p| [secs(p.time), p.value]).collect(),
            style: Style {
                width: 5.0,
                color: Color(0xD62728),
            },
        }));
    }
    fig
}
