//! Plot layers and their string-keyed parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::aes::{Aes, FixedAes};
use super::data::DataFrame;
use super::geom::Geom;
use super::stat::Stat;

/// A stat or geom parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag.
    Bool(bool),
    /// Number.
    Number(f32),
    /// List of numbers.
    Numbers(Vec<f32>),
    /// Text.
    Text(String),
}

impl ParamValue {
    fn describe(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "a flag",
            ParamValue::Number(_) => "a number",
            ParamValue::Numbers(_) => "a list of numbers",
            ParamValue::Text(_) => "text",
        }
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Number(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v as f32)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Number(v as f32)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<Vec<f32>> for ParamValue {
    fn from(v: Vec<f32>) -> Self {
        ParamValue::Numbers(v)
    }
}

/// Named parameters of a stat or geom.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    /// Create an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    fn wrong_type(name: &str, expected: &str, got: &ParamValue) -> Error {
        Error::InvalidParameter { name: name.to_string(), reason: format!("expected {expected}, got {}", got.describe()) }
    }

    /// Numeric parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the value is not a number.
    pub fn number(&self, name: &str) -> Result<Option<f32>> {
        match self.0.get(name) {
            None => Ok(None),
            Some(ParamValue::Number(v)) => Ok(Some(*v)),
            Some(other) => Err(Self::wrong_type(name, "a number", other)),
        }
    }

    /// Non-negative integer parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the value is not a whole,
    /// non-negative number.
    pub fn count(&self, name: &str) -> Result<Option<usize>> {
        match self.number(name)? {
            None => Ok(None),
            Some(v) if v >= 0.0 && v.fract() == 0.0 && v.is_finite() => Ok(Some(v as usize)),
            Some(v) => Err(Error::InvalidParameter {
                name: name.to_string(),
                reason: format!("expected a whole non-negative number, got {v}"),
            }),
        }
    }

    /// Boolean parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the value is not a flag.
    pub fn flag(&self, name: &str) -> Result<Option<bool>> {
        match self.0.get(name) {
            None => Ok(None),
            Some(ParamValue::Bool(v)) => Ok(Some(*v)),
            Some(other) => Err(Self::wrong_type(name, "a flag", other)),
        }
    }

    /// Text parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the value is not text.
    pub fn text(&self, name: &str) -> Result<Option<&str>> {
        match self.0.get(name) {
            None => Ok(None),
            Some(ParamValue::Text(v)) => Ok(Some(v.as_str())),
            Some(other) => Err(Self::wrong_type(name, "text", other)),
        }
    }

    /// Numeric list parameter. A single number is a one-element list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the value is not numeric.
    pub fn numbers(&self, name: &str) -> Result<Option<Vec<f32>>> {
        match self.0.get(name) {
            None => Ok(None),
            Some(ParamValue::Numbers(v)) => Ok(Some(v.clone())),
            Some(ParamValue::Number(v)) => Ok(Some(vec![*v])),
            Some(other) => Err(Self::wrong_type(name, "a list of numbers", other)),
        }
    }

    /// Parameter names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Check that every parameter is understood by the stat or the geom.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] naming the first unknown parameter.
    pub fn check_known(&self, allowed: &[&str]) -> Result<()> {
        match self.keys().find(|k| !allowed.contains(k)) {
            Some(unknown) => Err(Error::InvalidParameter {
                name: unknown.to_string(),
                reason: format!("not understood; expected one of [{}]", allowed.join(", ")),
            }),
            None => Ok(()),
        }
    }
}

/// One geom drawn over one stat.
#[derive(Debug, Clone)]
pub struct Layer {
    /// The geometry.
    pub geom: Geom,
    /// The statistical transformation.
    pub stat: Stat,
    /// Layer-specific mappings, merged over the plot mapping.
    pub mapping: Option<Aes>,
    /// Layer-specific data (if different from plot data).
    pub data: Option<DataFrame>,
    /// Constant aesthetics.
    pub fixed: FixedAes,
}

impl Layer {
    /// Create a new layer using the geom's default stat.
    #[must_use]
    pub fn new(geom: Geom) -> Self {
        Self { stat: geom.default_stat(), geom, mapping: None, data: None, fixed: FixedAes::new() }
    }

    /// Set the stat.
    #[must_use]
    pub fn stat(mut self, stat: Stat) -> Self {
        self.stat = stat;
        self
    }

    /// Set layer aesthetics.
    #[must_use]
    pub fn aes(mut self, aes: Aes) -> Self {
        self.mapping = Some(aes);
        self
    }

    /// Set layer-specific data.
    #[must_use]
    pub fn data(mut self, data: DataFrame) -> Self {
        self.data = Some(data);
        self
    }

    /// Set constant aesthetics.
    #[must_use]
    pub fn fixed(mut self, fixed: FixedAes) -> Self {
        self.fixed = fixed;
        self
    }

    /// Build a layer from names and string-keyed parameters.
    ///
    /// Parameters are routed to the stat and the geom by name; a parameter
    /// neither understands is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownName`] for unknown geom, stat or channel names
    /// and [`Error::InvalidParameter`] for bad parameters or fixed values.
    pub fn from_config(config: LayerConfig) -> Result<Self> {
        let geom = Geom::from_name(&config.geom, &config.params)?;
        let stat = match config.stat.as_deref() {
            Some(name) => Stat::from_name(name, &config.params)?,
            None if config.geom == "col" => Stat::Identity,
            None => match geom.default_stat() {
                Stat::Identity | Stat::Count => geom.default_stat(),
                default => Stat::from_name(default.name(), &config.params)?,
            },
        };

        let allowed: Vec<&str> = stat.param_names().iter().chain(geom.param_names()).copied().collect();
        config.params.check_known(&allowed)?;

        let mut fixed = FixedAes::new();
        for (channel, value) in &config.fixed_aes {
            fixed = fixed.set(channel, value)?;
        }

        Ok(Self { geom, stat, mapping: config.mapping, data: config.data, fixed })
    }
}

/// Declarative layer description with names resolved at build time.
#[derive(Debug, Clone, Default)]
pub struct LayerConfig {
    /// Stat name; the geom's default when absent.
    pub stat: Option<String>,
    /// Geom name such as `"point"` or `"histogram"`.
    pub geom: String,
    /// Layer mapping.
    pub mapping: Option<Aes>,
    /// Layer data.
    pub data: Option<DataFrame>,
    /// Constant aesthetics as `(channel, value)` text pairs.
    pub fixed_aes: Vec<(String, String)>,
    /// Stat and geom parameters.
    pub params: Params,
}

impl LayerConfig {
    /// Config for a geom with everything else defaulted.
    #[must_use]
    pub fn new(geom: &str) -> Self {
        Self { geom: geom.to_string(), ..Self::default() }
    }
}
