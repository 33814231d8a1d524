//! Resolved per-row values of a single mapping.
//!
//! A [`Series`] is what a mapping evaluates to: either continuous numbers or
//! discrete level codes with their labels. Everything downstream of
//! aesthetic resolution (stats, scales, geoms) reads `Series`, never raw
//! [`DataValue`]s.

use std::collections::HashMap;

use crate::error::Result;

use super::data::{format_number, days_to_datetime, Column, ColumnKind, DataValue};

/// Evaluated values of a column or expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Series {
    /// Numeric values; `NaN` marks a missing row.
    Continuous {
        /// Per-row values.
        values: Vec<f32>,
        /// Values are days since the epoch.
        temporal: bool,
    },
    /// Categorical values as codes into `levels`.
    Discrete {
        /// Per-row level index.
        codes: Vec<u32>,
        /// Level labels in order.
        levels: Vec<String>,
        /// Level order was declared explicitly rather than observed.
        declared: bool,
    },
}

impl Series {
    /// Continuous series.
    #[must_use]
    pub fn continuous(values: Vec<f32>) -> Self {
        Series::Continuous { values, temporal: false }
    }

    /// Discrete series from labels, with levels in first-seen order.
    #[must_use]
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut levels: Vec<String> = Vec::new();
        let mut index: HashMap<String, u32> = HashMap::new();
        let codes = labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                *index.entry(label.to_string()).or_insert_with(|| {
                    levels.push(label.to_string());
                    (levels.len() - 1) as u32
                })
            })
            .collect();
        Series::Discrete { codes, levels, declared: false }
    }

    /// Discrete series with an explicit level order.
    ///
    /// Labels missing from `levels` are appended after the declared ones.
    #[must_use]
    pub fn with_declared_levels<S: AsRef<str>>(labels: &[S], levels: Vec<String>) -> Self {
        let mut levels = levels;
        let mut index: HashMap<String, u32> =
            levels.iter().enumerate().map(|(i, l)| (l.clone(), i as u32)).collect();
        let codes = labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                *index.entry(label.to_string()).or_insert_with(|| {
                    levels.push(label.to_string());
                    (levels.len() - 1) as u32
                })
            })
            .collect();
        Series::Discrete { codes, levels, declared: true }
    }

    /// Resolve a data column.
    #[must_use]
    pub fn from_column(column: &Column) -> Self {
        match column.kind() {
            ColumnKind::Continuous | ColumnKind::DateTime => Series::Continuous {
                values: column.values().iter().map(|v| v.as_f32().unwrap_or(f32::NAN)).collect(),
                temporal: column.kind() == ColumnKind::DateTime,
            },
            ColumnKind::Discrete => {
                let levels: Vec<String> = column.levels().iter().map(DataValue::label).collect();
                let labels: Vec<String> = column.values().iter().map(DataValue::label).collect();
                match Self::with_declared_levels(&labels, levels) {
                    Series::Discrete { codes, levels, .. } => Series::Discrete {
                        codes,
                        levels,
                        declared: column.declared_levels().is_some(),
                    },
                    continuous => continuous,
                }
            }
        }
    }

    /// Same value repeated `n` times.
    #[must_use]
    pub fn constant(value: f32, n: usize) -> Self {
        Series::continuous(vec![value; n])
    }

    /// Convert to a discrete series. Continuous values become levels sorted
    /// ascending; missing values become the last level, `NA`.
    #[must_use]
    pub fn into_discrete(self) -> Self {
        match self {
            discrete @ Series::Discrete { .. } => discrete,
            Series::Continuous { values, temporal } => {
                let mut distinct: Vec<f32> = values.iter().copied().filter(|v| !v.is_nan()).collect();
                distinct.sort_by(f32::total_cmp);
                distinct.dedup();
                let mut levels: Vec<String> =
                    distinct.iter().map(|&v| continuous_label(v, temporal)).collect();
                if values.iter().any(|v| v.is_nan()) {
                    levels.push("NA".to_string());
                }
                let labels: Vec<String> = values
                    .iter()
                    .map(|&v| if v.is_nan() { "NA".to_string() } else { continuous_label(v, temporal) })
                    .collect();
                match Self::with_declared_levels(&labels, levels) {
                    Series::Discrete { codes, levels, .. } => {
                        Series::Discrete { codes, levels, declared: false }
                    }
                    continuous => continuous,
                }
            }
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Series::Continuous { values, .. } => values.len(),
            Series::Discrete { codes, .. } => codes.len(),
        }
    }

    /// Check for an empty series.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the series is discrete.
    #[must_use]
    pub fn is_discrete(&self) -> bool {
        matches!(self, Series::Discrete { .. })
    }

    /// Check if values are temporal.
    #[must_use]
    pub fn is_temporal(&self) -> bool {
        matches!(self, Series::Continuous { temporal: true, .. })
    }

    /// Continuous values, if continuous.
    #[must_use]
    pub fn values(&self) -> Option<&[f32]> {
        match self {
            Series::Continuous { values, .. } => Some(values),
            Series::Discrete { .. } => None,
        }
    }

    /// Level labels, if discrete.
    #[must_use]
    pub fn levels(&self) -> Option<&[String]> {
        match self {
            Series::Discrete { levels, .. } => Some(levels),
            Series::Continuous { .. } => None,
        }
    }

    /// Level code of row `i`, if discrete.
    #[must_use]
    pub fn code(&self, i: usize) -> Option<u32> {
        match self {
            Series::Discrete { codes, .. } => codes.get(i).copied(),
            Series::Continuous { .. } => None,
        }
    }

    /// Numeric value of row `i`, if continuous.
    #[must_use]
    pub fn value(&self, i: usize) -> Option<f32> {
        match self {
            Series::Continuous { values, .. } => values.get(i).copied(),
            Series::Discrete { .. } => None,
        }
    }

    /// Display label of row `i`.
    #[must_use]
    pub fn label(&self, i: usize) -> String {
        match self {
            Series::Continuous { values, temporal } => {
                values.get(i).map_or_else(|| "NA".to_string(), |&v| continuous_label(v, *temporal))
            }
            Series::Discrete { codes, levels, .. } => codes
                .get(i)
                .and_then(|&c| levels.get(c as usize))
                .cloned()
                .unwrap_or_else(|| "NA".to_string()),
        }
    }

    /// Rows missing a usable value.
    #[must_use]
    pub fn is_missing(&self, i: usize) -> bool {
        match self {
            Series::Continuous { values, .. } => values.get(i).map_or(true, |v| !v.is_finite()),
            Series::Discrete { codes, .. } => i >= codes.len(),
        }
    }

    /// Convert back into a stored column.
    ///
    /// # Errors
    ///
    /// Returns an error if declared levels fail to cover the values.
    pub fn into_column(self) -> Result<Column> {
        match self {
            Series::Continuous { values, temporal: false } => Ok(Column::continuous(&values)),
            Series::Continuous { values, temporal: true } => {
                let values = values
                    .iter()
                    .map(|&d| days_to_datetime(d).map_or(DataValue::Null, DataValue::DateTime))
                    .collect();
                Ok(Column::from_values(ColumnKind::DateTime, values))
            }
            Series::Discrete { codes, levels, declared } => {
                let values = codes
                    .iter()
                    .map(|&c| levels.get(c as usize).map_or(DataValue::Null, |l| DataValue::Text(l.clone())))
                    .collect();
                let column = Column::from_values(ColumnKind::Discrete, values);
                if declared {
                    let refs: Vec<&str> = levels.iter().map(String::as_str).collect();
                    column.with_levels(&refs)
                } else {
                    Ok(column)
                }
            }
        }
    }
}

fn continuous_label(value: f32, temporal: bool) -> String {
    if temporal {
        days_to_datetime(value).map_or_else(|| format_number(value), |dt| DataValue::DateTime(dt).label())
    } else {
        format_number(value)
    }
}
