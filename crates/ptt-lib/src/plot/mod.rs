//! Backend-independent figure model for waveform and event plots.

use serde::{Deserialize, Serialize};

use crate::channels::ChannelRecord;
use crate::signal::{Events, RRSeries, Signal};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

/// 0xRRGGBB
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(self) -> (u8, u8, u8) {
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

/// Individual points drawn as dots, e.g. detected peaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Markers(MarkerSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(s) => &s.points,
            Series::Markers(s) => &s.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis::default(),
            y: Axis::default(),
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over every series, `None` when empty.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.series.iter().flat_map(|s| s.points().iter());
        let first = points.next()?;
        let init = (first[0], first[0], first[1], first[1]);
        Some(points.fold(init, |(x0, x1, y0, y1), p| {
            (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1]))
        }))
    }
}

pub trait PlotBackend {
    fn draw(&mut self, fig: &Figure) -> anyhow::Result<()>;
}

/// Keep the first point of each of `max_points` equal buckets.
pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

fn signal_points(signal: &Signal) -> Vec<[f64; 2]> {
    let dt = 1.0 / signal.fs.max(1) as f64;
    signal
        .data
        .iter()
        .enumerate()
        .map(|(i, value)| [i as f64 * dt, *value])
        .collect()
}

/// Event positions on the signal, never decimated.
fn event_points(signal: &Signal, events: &Events) -> Vec<[f64; 2]> {
    let dt = 1.0 / signal.fs.max(1) as f64;
    events
        .indices
        .iter()
        .filter_map(|&i| signal.data.get(i).map(|v| [i as f64 * dt, *v]))
        .collect()
}

pub fn figure_from_signal(signal: &Signal, max_points: usize, color: u32) -> Figure {
    let mut fig = Figure::new(Some(signal.name.clone()));
    fig.x.label = Some("time (s)".into());
    fig.add_series(Series::Line(LineSeries {
        name: signal.name.clone(),
        points: decimate_points(&signal_points(signal), max_points),
        style: Style {
            width: 1.4,
            color: Color(color),
        },
    }));
    fig
}

/// Filtered waveform of a processed channel with its landmarks overlaid.
pub fn figure_for_channel(record: &dyn ChannelRecord, max_points: usize) -> Figure {
    let filtered = record.filtered();
    let mut fig = figure_from_signal(filtered, max_points, 0x1F77B4);
    fig.title = Some(format!("{} ({} events)", filtered.name, record.events().len()));
    fig.add_series(Series::Markers(MarkerSeries {
        name: format!("{} events", record.kind()),
        points: event_points(filtered, record.events()),
        style: Style {
            width: 3.0,
            color: Color(0xD62728),
        },
    }));
    fig
}

/// Instantaneous heart rate per beat.
pub fn figure_from_rr(rr: &RRSeries, max_points: usize) -> Figure {
    let mut fig = Figure::new(Some("Heart rate".into()));
    fig.x.label = Some("beat".into());
    fig.y.label = Some("bpm".into());
    let points: Vec<[f64; 2]> = rr
        .instantaneous_bpm()
        .into_iter()
        .enumerate()
        .map(|(i, bpm)| [i as f64, bpm])
        .collect();
    fig.add_series(Series::Line(LineSeries {
        name: "HR".into(),
        points: decimate_points(&points, max_points),
        style: Style {
            width: 2.0,
            color: Color(0xFF0077),
        },
    }));
    fig
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ecg::tests::synthetic_ecg;
    use crate::channels::EcgRecord;
    use crate::config::EcgConfig;

    #[test]
    fn decimation_caps_point_count() {
        let points: Vec<[f64; 2]> = (0..10_000).map(|i| [i as f64, 0.0]).collect();
        let out = decimate_points(&points, 500);
        assert_eq!(out.len(), 500);
        assert_eq!(out[0], [0.0, 0.0]);
        assert_eq!(decimate_points(&points[..10], 500).len(), 10);
    }

    #[test]
    fn channel_figure_overlays_every_event() {
        let beats: Vec<usize> = (0..6).map(|k| 1000 + 1600 * k).collect();
        let ecg = synthetic_ecg(2000, &beats, 10_000);
        let record = EcgRecord::process(&ecg, &EcgConfig::default()).expect("ecg");
        let fig = figure_for_channel(&record, 1000);
        assert_eq!(fig.series.len(), 2);
        assert_eq!(fig.series[0].points().len(), 1000);
        assert_eq!(fig.series[1].points().len(), beats.len());
        let (x0, x1, _, _) = fig.bounds().expect("bounds");
        assert_eq!(x0, 0.0);
        assert!(x1 < 5.0);
    }

    #[test]
    fn heart_rate_figure_has_one_point_per_interval() {
        let beats: Vec<usize> = (0..6).map(|k| 1000 + 1600 * k).collect();
        let ecg = synthetic_ecg(2000, &beats, 12_000);
        let record = EcgRecord::process(&ecg, &EcgConfig::default()).expect("ecg");
        let fig = figure_from_rr(&record.rr(), 1000);
        assert_eq!(fig.y.label.as_deref(), Some("bpm"));
        let points = fig.series[0].points();
        assert_eq!(points.len(), beats.len() - 1);
        for p in points {
            assert!((p[1] - 75.0).abs() < 1.0, "{} bpm", p[1]);
        }
    }

    #[test]
    fn color_components() {
        assert_eq!(Color(0x1F77B4).rgb(), (0x1F, 0x77, 0xB4));
    }
}
