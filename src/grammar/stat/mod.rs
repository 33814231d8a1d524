//! Statistical transformations for Grammar of Graphics.
//!
//! A stat turns the rows of one (panel, layer) pair into computed groups.
//! Each stat is a pure function of the resolved aesthetics, the row subset
//! and the render configuration, so stats for different panels can run
//! concurrently.

mod bin;
mod boxplot;
mod density;
mod smooth;

use std::collections::BTreeMap;

use crate::config::StatConfig;
use crate::error::{Error, Result};
use crate::fit::{CurveFitter, FitMethod};

use super::aes::{Channel, ResolvedAes};
use super::layer::Params;
use super::series::Series;

pub use bin::{bin_edges, bin_index, BinParams};
pub use boxplot::{BoxStats, BoxplotParams};
pub use density::{nrd0_bandwidth, DensityParams};
pub use smooth::SmoothParams;

/// A position value: continuous, or the code of a discrete level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pos {
    /// Continuous data value.
    Continuous(f32),
    /// Index into the layer's level list.
    Discrete(u32),
}

impl Pos {
    /// Continuous value, if any.
    #[must_use]
    pub fn continuous(self) -> Option<f32> {
        match self {
            Pos::Continuous(v) => Some(v),
            Pos::Discrete(_) => None,
        }
    }

    /// Position of row `i` of a series.
    #[must_use]
    pub fn of(series: &Series, i: usize) -> Option<Pos> {
        match series {
            Series::Continuous { values, .. } => values.get(i).map(|&v| Pos::Continuous(v)),
            Series::Discrete { codes, .. } => codes.get(i).map(|&c| Pos::Discrete(c)),
        }
    }
}

/// One computed row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputedRow {
    /// Horizontal position.
    pub x: Pos,
    /// Vertical value (`NaN` when not applicable).
    pub y: f32,
    /// Left extent in data units.
    pub xmin: Option<f32>,
    /// Right extent in data units.
    pub xmax: Option<f32>,
    /// Lower extent.
    pub ymin: Option<f32>,
    /// Upper extent.
    pub ymax: Option<f32>,
    /// Estimated density.
    pub density: Option<f32>,
    /// Density scaled to a maximum of 1 within the group.
    pub scaled: Option<f32>,
    /// Source data row for identity-like stats.
    pub source: Option<usize>,
    /// Horizontal offset: data units for continuous x, level units for
    /// discrete x.
    pub dx: f32,
    /// Vertical offset, in the same units as `dx`.
    pub dy: f32,
}

impl ComputedRow {
    /// Row at `(x, y)` with no extents.
    #[must_use]
    pub fn at(x: Pos, y: f32) -> Self {
        Self {
            x,
            y,
            xmin: None,
            xmax: None,
            ymin: None,
            ymax: None,
            density: None,
            scaled: None,
            source: None,
            dx: 0.0,
            dy: 0.0,
        }
    }
}

/// Codes of the discrete channels that define a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(pub Vec<(Channel, u32)>);

impl GroupKey {
    /// Level code of `channel` in this group.
    #[must_use]
    pub fn code(&self, channel: Channel) -> Option<u32> {
        self.0.iter().find(|(c, _)| *c == channel).map(|&(_, code)| code)
    }

    /// Human-readable key such as `class=suv, drv=4`.
    #[must_use]
    pub fn describe(&self, aes: &ResolvedAes) -> String {
        if self.0.is_empty() {
            return "all".to_string();
        }
        self.0
            .iter()
            .map(|&(channel, code)| {
                let level = aes
                    .series(channel)
                    .and_then(Series::levels)
                    .and_then(|l| l.get(code as usize))
                    .map_or_else(|| code.to_string(), Clone::clone);
                let name = aes.get(channel).map_or(channel.name(), |r| r.source.as_str());
                format!("{name}={level}")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Group-level result that is not a plain row list.
#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    /// Five-number summary and outliers.
    Box(BoxStats),
    /// Method actually used for a fitted curve.
    Fit(FitMethod),
}

/// Output of a stat for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedGroup {
    /// Group identity.
    pub key: GroupKey,
    /// Computed rows.
    pub rows: Vec<ComputedRow>,
    /// Optional summary.
    pub summary: Option<Summary>,
}

/// Output of a stat for one (panel, layer) pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatOutput {
    /// Computed groups in key order.
    pub groups: Vec<ComputedGroup>,
    /// Groups skipped because they were too small.
    pub skipped: Vec<Error>,
    /// Non-fatal notes (removed rows, dropped values).
    pub notes: Vec<String>,
}

/// Shared inputs of every stat.
#[derive(Clone, Copy)]
pub struct StatContext<'a> {
    /// Stat defaults.
    pub config: &'a StatConfig,
    /// Curve fitter for smoothing.
    pub fitter: &'a dyn CurveFitter,
}

/// Statistical transformation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Stat {
    /// Rows pass through unchanged.
    #[default]
    Identity,
    /// Count rows per x value.
    Count,
    /// Histogram bins over continuous x.
    Bin(BinParams),
    /// Box-and-whisker summary of y per group.
    Boxplot(BoxplotParams),
    /// Gaussian kernel density estimate.
    Density(DensityParams),
    /// Fitted curve with confidence ribbon.
    Smooth(SmoothParams),
}

impl Stat {
    /// Stat name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Stat::Identity => "identity",
            Stat::Count => "count",
            Stat::Bin(_) => "bin",
            Stat::Boxplot(_) => "boxplot",
            Stat::Density(_) => "density",
            Stat::Smooth(_) => "smooth",
        }
    }

    /// Parameter names the stat understands.
    #[must_use]
    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            Stat::Identity | Stat::Count => &[],
            Stat::Bin(_) => &["bins", "binwidth", "breaks"],
            Stat::Boxplot(_) => &["coef"],
            Stat::Density(_) => &["adjust", "bw", "n"],
            Stat::Smooth(_) => &["method", "span", "se", "level", "n"],
        }
    }

    /// Build a stat from its name and parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownName`] for unknown stats and
    /// [`Error::InvalidParameter`] for bad parameter values.
    pub fn from_name(name: &str, params: &Params) -> Result<Self> {
        let stat = match name {
            "identity" => Stat::Identity,
            "count" => Stat::Count,
            "bin" => Stat::Bin(BinParams::from_params(params)?),
            "boxplot" => Stat::Boxplot(BoxplotParams::from_params(params)?),
            "density" | "ydensity" => Stat::Density(DensityParams::from_params(params)?),
            "smooth" => Stat::Smooth(SmoothParams::from_params(params)?),
            other => return Err(Error::UnknownName { kind: "stat", name: other.to_string() }),
        };
        Ok(stat)
    }

    /// Channels that must be mapped.
    #[must_use]
    pub fn required_channels(&self, aes: &ResolvedAes) -> Vec<Channel> {
        match self {
            Stat::Identity | Stat::Smooth(_) => vec![Channel::X, Channel::Y],
            Stat::Count | Stat::Bin(_) => vec![Channel::X],
            Stat::Boxplot(_) => vec![Channel::Y],
            Stat::Density(_) if aes.has(Channel::Y) => vec![Channel::Y],
            Stat::Density(_) => vec![Channel::X],
        }
    }

    /// Compute the stat over `rows` of the layer.
    ///
    /// # Errors
    ///
    /// Returns an error when a required channel is unmapped or has the wrong
    /// kind. Too-small groups are reported in [`StatOutput::skipped`].
    pub fn compute(&self, aes: &ResolvedAes, rows: &[usize], ctx: &StatContext<'_>) -> Result<StatOutput> {
        let required = self.required_channels(aes);
        for channel in &required {
            if !aes.has(*channel) {
                return Err(Error::InvalidParameter {
                    name: channel.name().to_string(),
                    reason: format!("aesthetic is required by stat '{}'", self.name()),
                });
            }
        }

        let (rows, removed) = complete_rows(aes, rows, &required);
        let mut output = match self {
            Stat::Identity => identity(aes, &rows),
            Stat::Count => count(aes, &rows),
            Stat::Bin(params) => bin::compute(params, aes, &rows, ctx)?,
            Stat::Boxplot(params) => boxplot::compute(params, aes, &rows),
            Stat::Density(params) => density::compute(params, aes, &rows, ctx)?,
            Stat::Smooth(params) => smooth::compute(params, aes, &rows, ctx)?,
        };
        if removed > 0 {
            output.notes.insert(0, format!("removed {removed} rows containing missing values"));
        }
        Ok(output)
    }
}

/// Rows with a usable value in every required continuous channel.
fn complete_rows(aes: &ResolvedAes, rows: &[usize], required: &[Channel]) -> (Vec<usize>, usize) {
    let kept: Vec<usize> = rows
        .iter()
        .copied()
        .filter(|&r| required.iter().all(|c| aes.series(*c).is_some_and(|s| !s.is_missing(r))))
        .collect();
    let removed = rows.len() - kept.len();
    (kept, removed)
}

/// Split rows by the codes of every discrete grouping channel. X takes part
/// only when `by_x` is set.
pub(crate) fn group_rows(aes: &ResolvedAes, rows: &[usize], by_x: bool) -> Vec<(GroupKey, Vec<usize>)> {
    let channels: Vec<(Channel, &Series)> = aes
        .channels()
        .filter(|(c, r)| r.series.is_discrete() && (*c != Channel::Y) && (by_x || *c != Channel::X))
        .map(|(c, r)| (c, &r.series))
        .collect();

    let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
    for &row in rows {
        let key = GroupKey(channels.iter().filter_map(|(c, s)| s.code(row).map(|code| (*c, code))).collect());
        groups.entry(key).or_default().push(row);
    }
    groups.into_iter().collect()
}

/// Position of a group along x: its discrete level, the mean continuous x,
/// or zero when x is unmapped.
pub(crate) fn group_x(aes: &ResolvedAes, key: &GroupKey, rows: &[usize]) -> Pos {
    if let Some(code) = key.code(Channel::X) {
        return Pos::Discrete(code);
    }
    match aes.series(Channel::X) {
        Some(Series::Continuous { values, .. }) => {
            let xs: Vec<f32> = rows.iter().filter_map(|&r| values.get(r).copied()).collect();
            Pos::Continuous(crate::numeric::mean(&xs).unwrap_or(0.0))
        }
        Some(Series::Discrete { codes, .. }) => {
            Pos::Discrete(rows.first().and_then(|&r| codes.get(r).copied()).unwrap_or(0))
        }
        None => Pos::Continuous(0.0),
    }
}

/// Continuous values of `channel` for `rows`.
pub(crate) fn continuous_values(aes: &ResolvedAes, channel: Channel, rows: &[usize]) -> Result<Vec<f32>> {
    match aes.series(channel) {
        Some(Series::Continuous { values, .. }) => Ok(rows.iter().filter_map(|&r| values.get(r).copied()).collect()),
        Some(Series::Discrete { .. }) => Err(Error::IncompatibleScale {
            channel: channel.name().to_string(),
            detail: format!(
                "this stat needs a continuous '{}', got discrete '{}'",
                channel.name(),
                aes.get(channel).map_or("", |r| r.source.as_str())
            ),
        }),
        None => Ok(Vec::new()),
    }
}

fn identity(aes: &ResolvedAes, rows: &[usize]) -> StatOutput {
    let (Some(xs), Some(ys)) = (aes.series(Channel::X), aes.series(Channel::Y)) else {
        return StatOutput::default();
    };
    let groups = group_rows(aes, rows, false)
        .into_iter()
        .map(|(key, members)| {
            let rows = members
                .iter()
                .filter_map(|&r| {
                    let x = Pos::of(xs, r)?;
                    let y = match Pos::of(ys, r)? {
                        Pos::Continuous(v) => v,
                        Pos::Discrete(code) => code as f32,
                    };
                    Some(ComputedRow { source: Some(r), ..ComputedRow::at(x, y) })
                })
                .collect();
            ComputedGroup { key, rows, summary: None }
        })
        .collect();
    StatOutput { groups, ..StatOutput::default() }
}

pub(crate) fn count(aes: &ResolvedAes, rows: &[usize]) -> StatOutput {
    let Some(xs) = aes.series(Channel::X) else {
        return StatOutput::default();
    };
    let groups = group_rows(aes, rows, false)
        .into_iter()
        .map(|(key, members)| {
            let mut positions: Vec<Pos> = members
                .iter()
                .filter_map(|&r| Pos::of(xs, r))
                .filter(|p| p.continuous().map_or(true, f32::is_finite))
                .collect();
            positions.sort_unstable_by(pos_order);
            let mut tally: Vec<(Pos, usize)> = Vec::new();
            for x in positions {
                match tally.last_mut() {
                    Some((p, n)) if pos_order(p, &x).is_eq() => *n += 1,
                    _ => tally.push((x, 1)),
                }
            }
            let rows = tally
                .into_iter()
                .map(|(x, n)| ComputedRow { ymin: Some(0.0), ymax: Some(n as f32), ..ComputedRow::at(x, n as f32) })
                .collect();
            ComputedGroup { key, rows, summary: None }
        })
        .collect();
    StatOutput { groups, ..StatOutput::default() }
}

fn pos_order(a: &Pos, b: &Pos) -> std::cmp::Ordering {
    match (a, b) {
        (Pos::Continuous(p), Pos::Continuous(q)) => p.total_cmp(q),
        (Pos::Discrete(p), Pos::Discrete(q)) => p.cmp(q),
        (Pos::Continuous(_), Pos::Discrete(_)) => std::cmp::Ordering::Less,
        (Pos::Discrete(_), Pos::Continuous(_)) => std::cmp::Ordering::Greater,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fit::DefaultFitter;
    use crate::grammar::aes::{Aes, FixedAes};
    use crate::grammar::data::DataFrame;

    pub(crate) fn resolve(df: &DataFrame, aes: Aes) -> ResolvedAes {
        ResolvedAes::resolve(&aes, &FixedAes::new(), df).unwrap()
    }

    pub(crate) fn run(stat: &Stat, aes: &ResolvedAes) -> Result<StatOutput> {
        let config = StatConfig::default();
        let ctx = StatContext { config: &config, fitter: &DefaultFitter };
        let rows: Vec<usize> = (0..aes.nrow()).collect();
        stat.compute(aes, &rows, &ctx)
    }

    fn mpg() -> DataFrame {
        let mut df = DataFrame::new();
        df.add_column_f32("displ", &[1.8, 2.0, 5.7, f32::NAN]).unwrap();
        df.add_column_f32("hwy", &[29.0, 31.0, 17.0, 20.0]).unwrap();
        df.add_column_str("drv", &["f", "f", "4", "r"]).unwrap();
        df
    }

    #[test]
    fn test_identity_groups_and_missing() {
        let aes = resolve(&mpg(), Aes::xy("displ", "hwy").colour("drv"));
        let out = run(&Stat::Identity, &aes).unwrap();
        assert_eq!(out.groups.len(), 2);
        assert_eq!(out.notes, vec!["removed 1 rows containing missing values"]);
        let total: usize = out.groups.iter().map(|g| g.rows.len()).sum();
        assert_eq!(total, 3);
        assert!(out.groups.iter().flat_map(|g| &g.rows).all(|r| r.source.is_some()));
    }

    #[test]
    fn test_count_discrete_x() {
        let aes = resolve(&mpg(), Aes::new().x("drv"));
        let out = run(&Stat::Count, &aes).unwrap();
        let rows = &out.groups[0].rows;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].x, Pos::Discrete(0));
        assert_eq!(rows[0].y, 2.0);
        assert_eq!(rows[1].ymax, Some(1.0));
    }

    #[test]
    fn test_count_continuous_x_sorted_runs() {
        let mut xs: Vec<f32> = (0..50_000).rev().map(|i| i as f32 / 10.0).collect();
        xs.extend([2.5, 2.5, f32::NAN]);
        let mut df = DataFrame::new();
        df.add_column_f32("x", &xs).unwrap();
        let out = run(&Stat::Count, &resolve(&df, Aes::new().x("x"))).unwrap();
        let rows = &out.groups[0].rows;
        assert_eq!(rows.len(), 50_000);
        assert_eq!(rows[0].x, Pos::Continuous(0.0));
        assert!(rows.windows(2).all(|w| w[0].x.continuous() < w[1].x.continuous()));
        let at = rows.iter().find(|r| r.x == Pos::Continuous(2.5)).unwrap();
        assert_eq!(at.y, 3.0);
        let total: f32 = rows.iter().map(|r| r.y).sum();
        assert_eq!(total, 50_002.0);
    }

    #[test]
    fn test_required_channel() {
        let aes = resolve(&mpg(), Aes::new().x("displ"));
        let err = run(&Stat::Identity, &aes).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { ref name, .. } if name == "y"));
    }

    #[test]
    fn test_group_key_describe() {
        let aes = resolve(&mpg(), Aes::xy("displ", "hwy").colour("drv"));
        let groups = group_rows(&aes, &[0, 1, 2], false);
        assert_eq!(groups[0].0.describe(&aes), "drv=f");
        assert_eq!(GroupKey::default().describe(&aes), "all");
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Stat::from_name("identity", &Params::new()).unwrap(), Stat::Identity);
        assert_eq!(Stat::from_name("ydensity", &Params::new()).unwrap().name(), "density");
        assert!(matches!(Stat::from_name("summary", &Params::new()), Err(Error::UnknownName { kind: "stat", .. })));
    }
}
