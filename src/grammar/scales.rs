//! Scale discovery and finalization.
//!
//! Scales are trained in two passes. During discovery every (panel, layer)
//! work item registers what it saw into its own [`DomainSet`]; the sets are
//! merged with [`DomainSet::merge`], which is associative and commutative.
//! [`ScaleManager::finalize`] then turns the merged domains into read-only
//! scales used by the render pass.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::color::{hue_palette, Rgba};
use crate::config::ScaleConfig;
use crate::error::{Error, Result};
use crate::scale::{ColorScale, LinearScale, Scale, Transform};

use super::aes::Channel;
use super::facet::ScalesPolicy;
use super::geom::PointShape;
use super::stat::Pos;

/// Visual range of the size channel.
pub const SIZE_RANGE: (f32, f32) = (1.0, 6.0);

/// Visual range of the alpha channel.
pub const ALPHA_RANGE: (f32, f32) = (0.1, 1.0);

/// Sort key deciding where a discrete level lands.
///
/// Declared levels (rank 0) come first, by (layer, declaration index);
/// observed levels (rank 1) follow in order of first appearance by
/// (layer, source row).
/// Merging keeps the smallest key per level, so the final order does not
/// depend on the order in which work items are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LevelKey {
    /// 0 for declared levels, 1 for observed ones.
    pub rank: u8,
    /// Layer index.
    pub layer: usize,
    /// Declaration index or first source row.
    pub position: usize,
}

impl LevelKey {
    /// Key of the level declared at `position` by `layer`.
    #[must_use]
    pub fn declared(layer: usize, position: usize) -> Self {
        Self { rank: 0, layer, position }
    }

    /// Key of a level first seen at `row` of `layer`.
    #[must_use]
    pub fn observed(layer: usize, row: usize) -> Self {
        Self { rank: 1, layer, position: row }
    }
}

/// What one channel has seen so far.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// Continuous extent.
    Continuous {
        /// Smallest value.
        min: f32,
        /// Largest value.
        max: f32,
        /// Values are days since the epoch.
        temporal: bool,
    },
    /// Discrete levels with their sort keys.
    Discrete {
        /// Level label to smallest key.
        levels: BTreeMap<String, LevelKey>,
    },
}

impl Domain {
    /// Continuous domain covering the finite `values`.
    #[must_use]
    pub fn continuous(values: &[f32], temporal: bool) -> Option<Self> {
        crate::numeric::extent(values).map(|(min, max)| Domain::Continuous { min, max, temporal })
    }

    /// Discrete domain with a single level.
    #[must_use]
    pub fn level(label: &str, key: LevelKey) -> Self {
        Domain::Discrete { levels: BTreeMap::from([(label.to_string(), key)]) }
    }

    /// Union of two domains.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleScale`] when one side is continuous and
    /// the other discrete.
    pub fn merge(self, other: Domain, channel: Channel) -> Result<Domain> {
        match (self, other) {
            (
                Domain::Continuous { min: a_min, max: a_max, temporal: a_t },
                Domain::Continuous { min: b_min, max: b_max, temporal: b_t },
            ) => Ok(Domain::Continuous { min: a_min.min(b_min), max: a_max.max(b_max), temporal: a_t || b_t }),
            (Domain::Discrete { mut levels }, Domain::Discrete { levels: other }) => {
                for (label, key) in other {
                    levels.entry(label).and_modify(|k| *k = (*k).min(key)).or_insert(key);
                }
                Ok(Domain::Discrete { levels })
            }
            (a, _) => Err(Error::IncompatibleScale {
                channel: channel.name().to_string(),
                detail: if a.is_discrete() {
                    "continuous values mapped onto a discrete scale".into()
                } else {
                    "discrete values mapped onto a continuous scale".into()
                },
            }),
        }
    }

    /// `true` for discrete domains.
    #[must_use]
    pub fn is_discrete(&self) -> bool {
        matches!(self, Domain::Discrete { .. })
    }

    /// Levels in final order.
    #[must_use]
    pub fn ordered_levels(&self) -> Vec<String> {
        match self {
            Domain::Discrete { levels } => {
                let mut entries: Vec<(&String, &LevelKey)> = levels.iter().collect();
                entries.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
                entries.into_iter().map(|(label, _)| label.clone()).collect()
            }
            Domain::Continuous { .. } => Vec::new(),
        }
    }
}

/// Domains registered by one or more work items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainSet {
    domains: BTreeMap<Channel, Domain>,
}

impl DomainSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Widen `channel` by `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleScale`] on a continuous/discrete clash.
    pub fn register(&mut self, channel: Channel, domain: Domain) -> Result<()> {
        let merged = match self.domains.remove(&channel) {
            Some(existing) => existing.merge(domain, channel)?,
            None => domain,
        };
        self.domains.insert(channel, merged);
        Ok(())
    }

    /// Widen `channel` by continuous values; non-finite values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleScale`] if the channel is already discrete.
    pub fn register_domain(&mut self, channel: Channel, values: &[f32], temporal: bool) -> Result<()> {
        match Domain::continuous(values, temporal) {
            Some(domain) => self.register(channel, domain),
            None => Ok(()),
        }
    }

    /// Add one discrete level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleScale`] if the channel is already continuous.
    pub fn register_level(&mut self, channel: Channel, label: &str, key: LevelKey) -> Result<()> {
        self.register(channel, Domain::level(label, key))
    }

    /// Union of two sets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleScale`] on a continuous/discrete clash.
    pub fn merge(mut self, other: DomainSet) -> Result<DomainSet> {
        for (channel, domain) in other.domains {
            self.register(channel, domain)?;
        }
        Ok(self)
    }

    /// Domain of a channel.
    #[must_use]
    pub fn get(&self, channel: Channel) -> Option<&Domain> {
        self.domains.get(&channel)
    }

    /// Channels with a domain.
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.domains.keys().copied()
    }

    /// Check for an empty set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// User overrides for one channel's scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScaleSpec {
    /// Continuous transform.
    #[serde(default)]
    pub transform: Transform,
    /// Explicit continuous limits; values outside are not drawn.
    #[serde(default)]
    pub limits: Option<(f32, f32)>,
    /// Explicit discrete level order.
    #[serde(default)]
    pub levels: Option<Vec<String>>,
    /// Axis or legend title.
    #[serde(default)]
    pub title: Option<String>,
}

impl ScaleSpec {
    /// Create an empty spec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Base-10 log transform.
    #[must_use]
    pub fn log10() -> Self {
        Self::new().transform(Transform::Log10)
    }

    /// Square-root transform.
    #[must_use]
    pub fn sqrt() -> Self {
        Self::new().transform(Transform::Sqrt)
    }

    /// Set the transform.
    #[must_use]
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Set continuous limits.
    #[must_use]
    pub fn limits(mut self, min: f32, max: f32) -> Self {
        self.limits = Some((min.min(max), min.max(max)));
        self
    }

    /// Set discrete level order.
    #[must_use]
    pub fn levels(mut self, levels: &[&str]) -> Self {
        self.levels = Some(levels.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Set the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Input to a finalized scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleInput<'a> {
    /// Continuous data value.
    Value(f32),
    /// Discrete level label.
    Level(&'a str),
}

/// Continuous or discrete scale body shared by positional and aesthetic scales.
#[derive(Debug, Clone, PartialEq)]
pub enum ScaleKind {
    /// Continuous scale over a transformed domain.
    Continuous {
        /// Transform applied before interpolation.
        transform: Transform,
        /// Values are days since the epoch.
        temporal: bool,
        /// Transformed, unexpanded domain.
        domain: (f32, f32),
        /// Explicit limits in data units.
        limits: Option<(f32, f32)>,
    },
    /// Discrete scale over ordered levels.
    Discrete {
        /// Levels in display order.
        levels: Vec<String>,
    },
}

impl ScaleKind {
    fn from_domain(domain: Option<&Domain>, spec: &ScaleSpec, channel: Channel) -> Result<Self> {
        if domain.map_or(spec.levels.is_some(), Domain::is_discrete) {
            let mut levels: Vec<String> = spec.levels.clone().unwrap_or_default();
            for level in domain.map(Domain::ordered_levels).unwrap_or_default() {
                if !levels.contains(&level) {
                    levels.push(level);
                }
            }
            return Ok(ScaleKind::Discrete { levels });
        }

        let (min, max, temporal) = match (spec.limits, domain) {
            (Some((lo, hi)), Some(Domain::Continuous { temporal, .. })) => (lo, hi, *temporal),
            (Some((lo, hi)), _) => (lo, hi, false),
            (None, Some(Domain::Continuous { min, max, temporal })) => (*min, *max, *temporal),
            (None, _) => (0.0, 1.0, false),
        };
        let transform = spec.transform;
        let lo = transform.apply(min).map_err(|e| scale_error(channel, e))?;
        let hi = transform.apply(max).map_err(|e| scale_error(channel, e))?;
        Ok(ScaleKind::Continuous { transform, temporal, domain: (lo, hi), limits: spec.limits })
    }

    /// `true` for discrete scales.
    #[must_use]
    pub fn is_discrete(&self) -> bool {
        matches!(self, ScaleKind::Discrete { .. })
    }

    /// Levels of a discrete scale.
    #[must_use]
    pub fn levels(&self) -> &[String] {
        match self {
            ScaleKind::Discrete { levels } => levels,
            ScaleKind::Continuous { .. } => &[],
        }
    }

    /// Transformed value or 1-based level position.
    fn position(&self, input: ScaleInput<'_>) -> Option<f32> {
        match (self, input) {
            (ScaleKind::Continuous { transform, limits, .. }, ScaleInput::Value(v)) => {
                if !v.is_finite() || limits.is_some_and(|(lo, hi)| v < lo || v > hi) {
                    return None;
                }
                transform.apply(v).ok()
            }
            (ScaleKind::Discrete { levels }, ScaleInput::Level(label)) => {
                levels.iter().position(|l| l == label).map(|i| (i + 1) as f32)
            }
            _ => None,
        }
    }
}

fn scale_error(channel: Channel, err: Error) -> Error {
    match err {
        Error::ScaleDomain(message) => Error::ScaleDomain(format!("{} scale: {message}", channel.name())),
        other => other,
    }
}

/// A finalized x or y scale.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionScale {
    /// Channel (x or y).
    pub channel: Channel,
    /// Scale body.
    pub kind: ScaleKind,
    /// Axis title.
    pub title: String,
    /// Expanded range in position units.
    range: (f32, f32),
}

impl PositionScale {
    fn new(channel: Channel, kind: ScaleKind, title: String, config: &ScaleConfig) -> Self {
        let range = match &kind {
            ScaleKind::Continuous { domain: (lo, hi), .. } => {
                let (lo, hi) = if (hi - lo).abs() < f32::EPSILON * lo.abs().max(1.0) {
                    (lo - 0.5, hi + 0.5)
                } else {
                    (*lo, *hi)
                };
                let pad = (hi - lo) * config.expand_mult;
                (lo - pad, hi + pad)
            }
            ScaleKind::Discrete { levels } => {
                (1.0 - config.discrete_expand, levels.len().max(1) as f32 + config.discrete_expand)
            }
        };
        Self { channel, kind, title, range }
    }

    /// Expanded range in position units.
    #[must_use]
    pub fn range(&self) -> (f32, f32) {
        self.range
    }

    /// Position of a data value or level, before the visual transform.
    #[must_use]
    pub fn map_value(&self, input: ScaleInput<'_>) -> Option<f32> {
        self.kind.position(input)
    }

    /// Position of a computed value; `levels` are the layer's level labels.
    #[must_use]
    pub fn position_of(&self, pos: Pos, levels: Option<&[String]>) -> Option<f32> {
        match pos {
            Pos::Continuous(v) => self.map_value(ScaleInput::Value(v)),
            Pos::Discrete(code) => {
                let label = levels?.get(code as usize)?;
                self.map_value(ScaleInput::Level(label))
            }
        }
    }

    /// Continuous data value to position units, without censoring.
    #[must_use]
    pub fn data_position(&self, value: f32) -> Option<f32> {
        match &self.kind {
            ScaleKind::Continuous { transform, .. } => transform.apply(value).ok(),
            ScaleKind::Discrete { .. } => value.is_finite().then_some(value),
        }
    }

    /// Position units to panel-local visual units over `length`. The y axis
    /// is inverted so that larger values sit higher.
    #[must_use]
    pub fn to_visual(&self, position: f32, length: f32) -> f32 {
        let (lo, hi) = self.range;
        let visual = if self.channel == Channel::Y { (length, 0.0) } else { (0.0, length) };
        LinearScale::new((lo, hi), visual).map_or(length / 2.0, |s| s.scale(position))
    }

    /// `true` for discrete scales.
    #[must_use]
    pub fn is_discrete(&self) -> bool {
        self.kind.is_discrete()
    }
}

/// A finalized non-positional scale.
#[derive(Debug, Clone, PartialEq)]
pub struct AestheticScale {
    /// Channel.
    pub channel: Channel,
    /// Scale body.
    pub kind: ScaleKind,
    /// Legend title.
    pub title: String,
}

impl AestheticScale {
    fn unit(&self, input: ScaleInput<'_>) -> Option<f32> {
        let position = self.kind.position(input)?;
        match &self.kind {
            ScaleKind::Continuous { domain: (lo, hi), .. } => {
                Some(if hi > lo { ((position - lo) / (hi - lo)).clamp(0.0, 1.0) } else { 0.5 })
            }
            ScaleKind::Discrete { levels } => {
                Some(if levels.len() > 1 { (position - 1.0) / (levels.len() - 1) as f32 } else { 1.0 })
            }
        }
    }

    /// Colour for colour and fill scales.
    #[must_use]
    pub fn colour(&self, input: ScaleInput<'_>) -> Option<Rgba> {
        match &self.kind {
            ScaleKind::Discrete { levels } => {
                let index = self.kind.position(input)? as usize - 1;
                Some(hue_palette(index, levels.len()))
            }
            ScaleKind::Continuous { .. } => {
                let t = self.unit(input)?;
                ColorScale::gradient((0.0, 1.0)).ok().map(|g| g.scale(t))
            }
        }
    }

    /// Numeric visual value for size and alpha scales.
    #[must_use]
    pub fn number(&self, input: ScaleInput<'_>) -> Option<f32> {
        let (lo, hi) = if self.channel == Channel::Alpha { ALPHA_RANGE } else { SIZE_RANGE };
        self.unit(input).map(|t| lo + t * (hi - lo))
    }

    /// Marker shape for shape scales.
    #[must_use]
    pub fn shape(&self, input: ScaleInput<'_>) -> Option<PointShape> {
        let index = self.kind.position(input)? as usize - 1;
        Some(PointShape::ALL[index % PointShape::ALL.len()])
    }
}

/// The x and y scales of one panel.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelScales {
    /// Horizontal scale.
    pub x: PositionScale,
    /// Vertical scale.
    pub y: PositionScale,
}

/// Every finalized scale of a plot.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedScales {
    /// Positional scales per panel.
    pub panels: Vec<PanelScales>,
    /// Non-positional scales, shared by all panels.
    pub aesthetics: BTreeMap<Channel, AestheticScale>,
}

impl TrainedScales {
    /// Non-positional scale of a channel.
    #[must_use]
    pub fn aesthetic(&self, channel: Channel) -> Option<&AestheticScale> {
        self.aesthetics.get(&channel)
    }
}

/// Turns discovered domains into finalized scales.
#[derive(Debug, Clone, Default)]
pub struct ScaleManager {
    specs: HashMap<Channel, ScaleSpec>,
    titles: HashMap<Channel, String>,
}

impl ScaleManager {
    /// Create a manager with per-channel overrides and default titles.
    #[must_use]
    pub fn new(specs: HashMap<Channel, ScaleSpec>, titles: HashMap<Channel, String>) -> Self {
        Self { specs, titles }
    }

    fn title(&self, channel: Channel) -> String {
        self.specs
            .get(&channel)
            .and_then(|s| s.title.clone())
            .or_else(|| self.titles.get(&channel).cloned())
            .unwrap_or_else(|| channel.name().to_string())
    }

    /// Finalize scales from per-panel domains.
    ///
    /// Positional domains are unioned across all panels unless `policy`
    /// frees the axis, in which case each panel keeps its own domain (and
    /// falls back to the global one when it saw nothing). Non-positional
    /// domains are always unioned across all panels.
    ///
    /// # Errors
    ///
    /// Returns every scale error found, as [`Error::Discovery`] when more than one.
    pub fn finalize(&self, panel_domains: &[DomainSet], policy: ScalesPolicy, config: &ScaleConfig) -> Result<TrainedScales> {
        let mut errors = Vec::new();
        let mut global = DomainSet::new();
        for domains in panel_domains {
            match global.clone().merge(domains.clone()) {
                Ok(merged) => global = merged,
                Err(err) => errors.push(err),
            }
        }

        let mut panels = Vec::with_capacity(panel_domains.len());
        for domains in panel_domains {
            let mut build = |channel: Channel, free: bool| {
                let spec = self.specs.get(&channel).cloned().unwrap_or_default();
                let domain = if free { domains.get(channel).or_else(|| global.get(channel)) } else { global.get(channel) };
                ScaleKind::from_domain(domain, &spec, channel)
                    .map(|kind| PositionScale::new(channel, kind, self.title(channel), config))
                    .map_err(|e| errors.push(e))
                    .ok()
            };
            let x = build(Channel::X, policy.free_x());
            let y = build(Channel::Y, policy.free_y());
            if let (Some(x), Some(y)) = (x, y) {
                panels.push(PanelScales { x, y });
            }
        }

        let mut aesthetics = BTreeMap::new();
        for channel in global.channels().filter(|c| !c.is_positional() && c.is_scaled()) {
            let spec = self.specs.get(&channel).cloned().unwrap_or_default();
            match ScaleKind::from_domain(global.get(channel), &spec, channel) {
                Ok(kind) => {
                    aesthetics.insert(channel, AestheticScale { channel, kind, title: self.title(channel) });
                }
                Err(err) => errors.push(err),
            }
        }

        let mut unique: Vec<Error> = Vec::with_capacity(errors.len());
        for err in errors {
            if !unique.contains(&err) {
                unique.push(err);
            }
        }
        match unique.len() {
            0 => Ok(TrainedScales { panels, aesthetics }),
            1 => Err(unique.remove(0)),
            _ => Err(Error::Discovery(unique)),
        }
    }
}
