//! Axes and legends derived from finalized scales.
//!
//! Guides are a pure function of a finished scale, so every panel sharing a
//! scale gets identical ticks and the legend matches every panel.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::color::Rgba;

use super::aes::Channel;
use super::data::{datetime_to_days, days_to_datetime, format_number};
use super::geom::PointShape;
use super::scales::{AestheticScale, PositionScale, ScaleInput, ScaleKind};
use crate::scale::Transform;

const DAYS_PER_TWO_YEARS: f32 = 730.0;

/// One axis tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Panel-local visual position along the axis.
    pub position: f32,
    /// Label text.
    pub label: String,
}

/// A panel axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Axis title.
    pub title: String,
    /// Ticks in increasing data order.
    pub ticks: Vec<Tick>,
}

impl Axis {
    /// Tick labels in order.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.ticks.iter().map(|t| t.label.as_str()).collect()
    }
}

/// Whether a legend lists levels or samples a continuous range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegendKind {
    /// One entry per level.
    Discrete,
    /// Entries at breaks of a continuous range.
    Continuous,
}

/// One legend key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    /// Label text.
    pub label: String,
    /// Colour for colour and fill legends.
    pub colour: Option<Rgba>,
    /// Shape for shape legends.
    pub shape: Option<PointShape>,
    /// Size or alpha value.
    pub value: Option<f32>,
}

/// Legend of one non-positional channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legend {
    /// Channel the legend explains.
    pub channel: Channel,
    /// Title.
    pub title: String,
    /// Discrete or continuous.
    pub kind: LegendKind,
    /// Keys in order.
    pub entries: Vec<LegendEntry>,
}

impl Legend {
    /// Entry labels in order.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }
}

/// A step of 1, 2 or 5 times a power of ten giving about `target` intervals over `span`.
#[must_use]
pub fn nice_step(span: f64, target: usize) -> f64 {
    if !(span.is_finite() && span > 0.0) {
        return 1.0;
    }
    let raw = span / target.max(1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let fraction = raw / magnitude;
    let nice = if fraction < 1.5 {
        1.0
    } else if fraction < 3.0 {
        2.0
    } else if fraction < 7.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Multiples of a nice step inside `[lo, hi]`.
#[must_use]
pub fn nice_breaks(lo: f32, hi: f32, target: usize) -> Vec<f32> {
    let (lo, hi) = (f64::from(lo.min(hi)), f64::from(lo.max(hi)));
    let step = nice_step(hi - lo, target);
    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    (first..=last).map(|k| (k as f64 * step) as f32).collect()
}

fn temporal_breaks(lo: f32, hi: f32, target: usize) -> Vec<(f32, String)> {
    let (Some(start), Some(end)) = (days_to_datetime(lo), days_to_datetime(hi)) else {
        return Vec::new();
    };
    if hi - lo > DAYS_PER_TWO_YEARS {
        let first = start.year() + 1;
        let span = (end.year() - first).max(0) as f64;
        let stride = nice_step(span, target).max(1.0) as i32;
        let first = first + (stride - first.rem_euclid(stride)) % stride;
        (first..=end.year())
            .step_by(stride as usize)
            .filter_map(|year| NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0))
            .map(|dt| (datetime_to_days(&dt), dt.format("%Y").to_string()))
            .filter(|(days, _)| *days >= lo && *days <= hi)
            .collect()
    } else {
        let step = nice_step(f64::from(hi - lo), target).max(1.0).round();
        nice_breaks_with_step(lo, hi, step)
            .into_iter()
            .filter_map(|days| days_to_datetime(days).map(|dt| (days, dt.format("%Y-%m-%d").to_string())))
            .collect()
    }
}

fn nice_breaks_with_step(lo: f32, hi: f32, step: f64) -> Vec<f32> {
    let first = (f64::from(lo) / step).ceil() as i64;
    let last = (f64::from(hi) / step).floor() as i64;
    (first..=last).map(|k| (k as f64 * step) as f32).collect()
}

/// Breaks of a scale over `range` (in position units) as `(position, label)`.
#[must_use]
pub fn breaks(kind: &ScaleKind, range: (f32, f32), target: usize) -> Vec<(f32, String)> {
    let (lo, hi) = range;
    match kind {
        ScaleKind::Discrete { levels } => {
            levels.iter().enumerate().map(|(i, level)| ((i + 1) as f32, level.clone())).collect()
        }
        ScaleKind::Continuous { temporal: true, .. } => temporal_breaks(lo, hi, target),
        ScaleKind::Continuous { transform: Transform::Log10, .. } => {
            let powers: Vec<f32> = (lo.ceil() as i32..=hi.floor() as i32).map(|p| p as f32).collect();
            let positions = if powers.len() >= 2 { powers } else { nice_breaks(lo, hi, target) };
            positions.into_iter().map(|p| (p, format_number(10f64.powf(f64::from(p)) as f32))).collect()
        }
        ScaleKind::Continuous { transform: Transform::Sqrt, .. } => {
            let (data_lo, data_hi) = (lo.max(0.0).powi(2), hi.max(0.0).powi(2));
            nice_breaks(data_lo, data_hi, target)
                .into_iter()
                .filter(|b| *b >= 0.0)
                .map(|b| (b.sqrt(), format_number(b)))
                .filter(|(p, _)| *p >= lo && *p <= hi)
                .collect()
        }
        ScaleKind::Continuous { transform: Transform::Identity, .. } => {
            nice_breaks(lo, hi, target).into_iter().map(|b| (b, format_number(b))).collect()
        }
    }
}

/// Axis of a positional scale drawn over `length` visual units.
#[must_use]
pub fn axis(scale: &PositionScale, length: f32, target: usize) -> Axis {
    let ticks = breaks(&scale.kind, scale.range(), target)
        .into_iter()
        .map(|(position, label)| Tick { position: scale.to_visual(position, length), label })
        .collect();
    Axis { title: scale.title.clone(), ticks }
}

/// Legend of a non-positional scale.
#[must_use]
pub fn legend(scale: &AestheticScale, target: usize) -> Legend {
    let (kind, keys): (LegendKind, Vec<(ScaleInput<'_>, String)>) = match &scale.kind {
        ScaleKind::Discrete { levels } => {
            (LegendKind::Discrete, levels.iter().map(|l| (ScaleInput::Level(l.as_str()), l.clone())).collect())
        }
        ScaleKind::Continuous { transform, domain, .. } => {
            let keys = breaks(&scale.kind, *domain, target)
                .into_iter()
                .map(|(position, label)| (ScaleInput::Value(transform.invert(position)), label))
                .collect();
            (LegendKind::Continuous, keys)
        }
    };

    let entries = keys
        .into_iter()
        .map(|(input, label)| match scale.channel {
            Channel::Colour | Channel::Fill => {
                LegendEntry { label, colour: scale.colour(input), shape: None, value: None }
            }
            Channel::Shape => LegendEntry { label, colour: None, shape: scale.shape(input), value: None },
            _ => LegendEntry { label, colour: None, shape: None, value: scale.number(input) },
        })
        .collect();
    Legend { channel: scale.channel, title: scale.title.clone(), kind, entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_nice_step() {
        assert_relative_eq!(nice_step(10.0, 5), 2.0);
        assert_relative_eq!(nice_step(100.0, 5), 20.0);
        assert_relative_eq!(nice_step(7.0, 5), 1.0);
        assert_relative_eq!(nice_step(0.3, 5), 0.05, epsilon = 1e-12);
        assert_relative_eq!(nice_step(0.0, 5), 1.0);
    }

    #[test]
    fn test_nice_breaks() {
        assert_eq!(nice_breaks(-0.5, 10.5, 5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        let labels: Vec<String> = nice_breaks(1.25, 1.95, 5).into_iter().map(format_number).collect();
        assert_eq!(labels, vec!["1.3", "1.4", "1.5", "1.6", "1.7", "1.8", "1.9"]);
    }

    #[test]
    fn test_discrete_breaks_keep_level_order() {
        let kind = ScaleKind::Discrete { levels: vec!["suv".into(), "compact".into()] };
        let b = breaks(&kind, (0.4, 2.6), 5);
        assert_eq!(b, vec![(1.0, "suv".to_string()), (2.0, "compact".to_string())]);
    }

    #[test]
    fn test_log_breaks_are_powers() {
        let kind = ScaleKind::Continuous { transform: Transform::Log10, temporal: false, domain: (0.0, 3.0), limits: None };
        let labels: Vec<String> = breaks(&kind, (-0.15, 3.15), 5).into_iter().map(|(_, l)| l).collect();
        assert_eq!(labels, vec!["1", "10", "100", "1000"]);
    }

    #[test]
    fn test_sqrt_breaks_in_data_units() {
        let kind = ScaleKind::Continuous { transform: Transform::Sqrt, temporal: false, domain: (0.0, 10.0), limits: None };
        let b = breaks(&kind, (0.0, 10.0), 5);
        assert_eq!(b[1].1, "20");
        assert_relative_eq!(b[1].0, 20f32.sqrt());
    }

    #[test]
    fn test_temporal_breaks() {
        let day = |y, m, d| datetime_to_days(&NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap());
        let kind = ScaleKind::Continuous { transform: Transform::Identity, temporal: true, domain: (0.0, 1.0), limits: None };

        let years: Vec<String> = breaks(&kind, (day(1999, 6, 1), day(2008, 6, 1)), 5).into_iter().map(|(_, l)| l).collect();
        assert_eq!(years, vec!["2000", "2002", "2004", "2006", "2008"]);

        let days: Vec<String> = breaks(&kind, (day(2024, 3, 1), day(2024, 3, 11)), 5).into_iter().map(|(_, l)| l).collect();
        assert!(days.iter().all(|l| l.starts_with("2024-03-")), "{days:?}");
        assert!(days.len() >= 4);
    }
}
