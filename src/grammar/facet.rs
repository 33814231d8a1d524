//! Faceting for Grammar of Graphics.
//!
//! Creates small multiples by splitting data on one or more variables.
//! Panels are the cartesian product of the observed levels of every facet
//! variable; combinations without rows still produce a panel.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::data::{DataFrame, DataValue};

/// Which positional axes are shared between panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalesPolicy {
    /// Both axes shared.
    #[default]
    Fixed,
    /// X free per panel.
    FreeX,
    /// Y free per panel.
    FreeY,
    /// Both axes free per panel.
    Free,
}

impl ScalesPolicy {
    /// X is panel-local.
    #[must_use]
    pub fn free_x(self) -> bool {
        matches!(self, ScalesPolicy::FreeX | ScalesPolicy::Free)
    }

    /// Y is panel-local.
    #[must_use]
    pub fn free_y(self) -> bool {
        matches!(self, ScalesPolicy::FreeY | ScalesPolicy::Free)
    }
}

impl FromStr for ScalesPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fixed" => Ok(ScalesPolicy::Fixed),
            "free_x" => Ok(ScalesPolicy::FreeX),
            "free_y" => Ok(ScalesPolicy::FreeY),
            "free" => Ok(ScalesPolicy::Free),
            other => Err(Error::UnknownName { kind: "scales policy", name: other.to_string() }),
        }
    }
}

/// Faceting specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FacetSpec {
    /// One sequence of panels wrapped into a grid.
    Wrap {
        /// Variables to facet by.
        vars: Vec<String>,
        /// Explicit row count.
        nrow: Option<usize>,
        /// Explicit column count.
        ncol: Option<usize>,
        /// Axis sharing.
        scales: ScalesPolicy,
    },
    /// Row variables by column variables.
    Grid {
        /// Variables spread down the rows.
        rows: Vec<String>,
        /// Variables spread across the columns.
        cols: Vec<String>,
        /// Axis sharing.
        scales: ScalesPolicy,
    },
}

impl FacetSpec {
    /// Facet with wrapping on one variable.
    #[must_use]
    pub fn wrap(var: &str) -> Self {
        Self::wrap_vars(&[var])
    }

    /// Facet with wrapping on several variables.
    #[must_use]
    pub fn wrap_vars(vars: &[&str]) -> Self {
        FacetSpec::Wrap { vars: to_strings(vars), nrow: None, ncol: None, scales: ScalesPolicy::Fixed }
    }

    /// Facet into a grid; either side may be absent.
    #[must_use]
    pub fn grid(row: Option<&str>, col: Option<&str>) -> Self {
        FacetSpec::Grid {
            rows: row.map(|r| vec![r.to_string()]).unwrap_or_default(),
            cols: col.map(|c| vec![c.to_string()]).unwrap_or_default(),
            scales: ScalesPolicy::Fixed,
        }
    }

    /// Parse a facet formula.
    ///
    /// `"~class"` and `"a + b"` wrap; `"cyl ~ drv"` is a grid, with `.`
    /// standing for an empty side (`". ~ drv"`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExpression`] for an empty or malformed formula.
    pub fn parse(formula: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidExpression { expr: formula.to_string(), reason: reason.to_string() };
        let side = |text: &str| -> Result<Vec<String>> {
            let text = text.trim();
            if text.is_empty() || text == "." {
                return Ok(Vec::new());
            }
            text.split('+')
                .map(|v| {
                    let v = v.trim();
                    if v.is_empty() || v.contains(char::is_whitespace) {
                        Err(invalid("expected variable names joined by '+'"))
                    } else {
                        Ok(v.to_string())
                    }
                })
                .collect()
        };

        let spec = match formula.split_once('~') {
            None => FacetSpec::Wrap { vars: side(formula)?, nrow: None, ncol: None, scales: ScalesPolicy::Fixed },
            Some((lhs, rhs)) if lhs.trim().is_empty() => {
                FacetSpec::Wrap { vars: side(rhs)?, nrow: None, ncol: None, scales: ScalesPolicy::Fixed }
            }
            Some((lhs, rhs)) => {
                if rhs.contains('~') {
                    return Err(invalid("more than one '~'"));
                }
                FacetSpec::Grid { rows: side(lhs)?, cols: side(rhs)?, scales: ScalesPolicy::Fixed }
            }
        };
        if spec.vars().is_empty() {
            return Err(invalid("no facet variables"));
        }
        Ok(spec)
    }

    /// Set the row count of a wrap.
    #[must_use]
    pub fn nrow(mut self, n: usize) -> Self {
        if let FacetSpec::Wrap { nrow, .. } = &mut self {
            *nrow = Some(n.max(1));
        }
        self
    }

    /// Set the column count of a wrap.
    #[must_use]
    pub fn ncol(mut self, n: usize) -> Self {
        if let FacetSpec::Wrap { ncol, .. } = &mut self {
            *ncol = Some(n.max(1));
        }
        self
    }

    /// Set the axis sharing policy.
    #[must_use]
    pub fn scales(mut self, policy: ScalesPolicy) -> Self {
        match &mut self {
            FacetSpec::Wrap { scales, .. } | FacetSpec::Grid { scales, .. } => *scales = policy,
        }
        self
    }

    /// Axis sharing policy.
    #[must_use]
    pub fn policy(&self) -> ScalesPolicy {
        match self {
            FacetSpec::Wrap { scales, .. } | FacetSpec::Grid { scales, .. } => *scales,
        }
    }

    /// Every facet variable, rows before columns.
    #[must_use]
    pub fn vars(&self) -> Vec<&str> {
        match self {
            FacetSpec::Wrap { vars, .. } => vars.iter().map(String::as_str).collect(),
            FacetSpec::Grid { rows, cols, .. } => rows.iter().chain(cols).map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for FacetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |vars: &[String]| if vars.is_empty() { ".".to_string() } else { vars.join(" + ") };
        match self {
            FacetSpec::Wrap { vars, .. } => write!(f, "~{}", side(vars)),
            FacetSpec::Grid { rows, cols, .. } => write!(f, "{} ~ {}", side(rows), side(cols)),
        }
    }
}

fn to_strings(vars: &[&str]) -> Vec<String> {
    vars.iter().map(|v| v.to_string()).collect()
}

/// One facet cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    /// Position in panel order.
    pub index: usize,
    /// Grid row.
    pub row: usize,
    /// Grid column.
    pub col: usize,
    /// Facet variable and level label for this cell.
    pub keys: Vec<(String, String)>,
    /// Rows of the partitioned dataset that fall in this cell.
    pub rows: Vec<usize>,
}

impl Panel {
    /// Strip labels, one per facet variable.
    #[must_use]
    pub fn strip(&self) -> Vec<String> {
        self.keys.iter().map(|(_, level)| level.clone()).collect()
    }

    /// Rows of `data` in this cell. Facet variables missing from `data` do
    /// not constrain, so such data repeats in every panel.
    #[must_use]
    pub fn select(&self, data: &DataFrame) -> Vec<usize> {
        let filters: Vec<(&[DataValue], &str)> = self
            .keys
            .iter()
            .filter_map(|(var, level)| data.get(var).map(|values| (values, level.as_str())))
            .collect();
        (0..data.nrow()).filter(|&r| filters.iter().all(|(values, level)| values[r].label() == *level)).collect()
    }
}

/// `(nrow, ncol)` for `n` wrapped panels, following R's `n2mfrow` with
/// rows and columns swapped so that wide layouts come first.
#[must_use]
pub fn wrap_dims(n: usize, nrow: Option<usize>, ncol: Option<usize>) -> (usize, usize) {
    let n = n.max(1);
    match (nrow, ncol) {
        (Some(r), Some(c)) => (r, c),
        (Some(r), None) => (r, n.div_ceil(r)),
        (None, Some(c)) => (n.div_ceil(c), c),
        (None, None) => {
            let (rows, cols) = if n <= 3 {
                (n, 1)
            } else if n <= 6 {
                (n.div_ceil(2), 2)
            } else if n <= 12 {
                (n.div_ceil(3), 3)
            } else {
                let rows = (n as f64).sqrt().ceil() as usize;
                (rows, n.div_ceil(rows))
            };
            (cols, rows)
        }
    }
}

/// Levels of `var` across every dataset that has it, in column level order,
/// first dataset first.
fn levels_of(var: &str, datasets: &[&DataFrame]) -> Result<Vec<String>> {
    let mut levels: Vec<String> = Vec::new();
    let mut found = false;
    for data in datasets {
        if let Ok(column) = data.column(var) {
            found = true;
            for level in column.levels() {
                let label = level.label();
                if !levels.contains(&label) {
                    levels.push(label);
                }
            }
        }
    }
    if !found {
        let first = datasets.first().map(|d| d.columns().collect::<Vec<_>>()).unwrap_or_default();
        return Err(Error::unknown_column(var, first));
    }
    Ok(levels)
}

fn product(vars: &[String], datasets: &[&DataFrame]) -> Result<Vec<Vec<(String, String)>>> {
    let mut combos: Vec<Vec<(String, String)>> = vec![Vec::new()];
    for var in vars {
        let levels = levels_of(var, datasets)?;
        combos = combos
            .into_iter()
            .flat_map(|prefix| {
                levels.iter().map(move |level| {
                    let mut next = prefix.clone();
                    next.push((var.clone(), level.clone()));
                    next
                })
            })
            .collect();
    }
    Ok(combos)
}

/// Panels for `spec` over several datasets (plot data and layer overrides).
/// Rows are taken from the first dataset.
///
/// # Errors
///
/// Returns [`Error::UnknownColumn`] for a facet variable no dataset has.
pub fn partition_all(datasets: &[&DataFrame], spec: Option<&FacetSpec>) -> Result<Vec<Panel>> {
    let base = datasets.first().copied();
    let Some(spec) = spec else {
        let rows = base.map(|d| (0..d.nrow()).collect()).unwrap_or_default();
        return Ok(vec![Panel { index: 0, row: 0, col: 0, keys: Vec::new(), rows }]);
    };

    let mut panels = Vec::new();
    match spec {
        FacetSpec::Wrap { vars, nrow, ncol, .. } => {
            let combos = product(vars, datasets)?;
            let (_, cols) = wrap_dims(combos.len(), *nrow, *ncol);
            for (index, keys) in combos.into_iter().enumerate() {
                panels.push(Panel { index, row: index / cols, col: index % cols, keys, rows: Vec::new() });
            }
        }
        FacetSpec::Grid { rows, cols, .. } => {
            let row_combos = product(rows, datasets)?;
            let col_combos = product(cols, datasets)?;
            for (r, row_keys) in row_combos.iter().enumerate() {
                for (c, col_keys) in col_combos.iter().enumerate() {
                    let keys = row_keys.iter().chain(col_keys).cloned().collect();
                    panels.push(Panel { index: panels.len(), row: r, col: c, keys, rows: Vec::new() });
                }
            }
        }
    }
    if let Some(base) = base {
        for panel in &mut panels {
            panel.rows = panel.select(base);
        }
    }
    Ok(panels)
}

/// Split `data` into panels.
///
/// # Errors
///
/// Returns [`Error::UnknownColumn`] for a facet variable missing from `data`.
pub fn partition(data: &DataFrame, spec: &FacetSpec) -> Result<Vec<Panel>> {
    partition_all(&[data], Some(spec))
}

/// `(nrow, ncol)` of the panel grid.
#[must_use]
pub fn grid_shape(panels: &[Panel]) -> (usize, usize) {
    let rows = panels.iter().map(|p| p.row + 1).max().unwrap_or(1);
    let cols = panels.iter().map(|p| p.col + 1).max().unwrap_or(1);
    (rows, cols)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mpg() -> DataFrame {
        let mut df = DataFrame::new();
        df.add_column_str("drv", &["f", "4", "f", "r", "4"]).unwrap();
        df.add_column_f32("cyl", &[4.0, 6.0, 8.0, 8.0, 4.0]).unwrap();
        df.add_column_f32("hwy", &[29.0, 20.0, 26.0, 17.0, 22.0]).unwrap();
        df
    }

    #[test]
    fn test_parse_formulas() {
        assert_eq!(FacetSpec::parse("~class").unwrap(), FacetSpec::wrap("class"));
        assert_eq!(FacetSpec::parse("a + b").unwrap(), FacetSpec::wrap_vars(&["a", "b"]));
        assert_eq!(FacetSpec::parse("cyl ~ drv").unwrap(), FacetSpec::grid(Some("cyl"), Some("drv")));
        assert_eq!(FacetSpec::parse(". ~ drv").unwrap(), FacetSpec::grid(None, Some("drv")));
        assert_eq!(FacetSpec::parse("drv ~ .").unwrap(), FacetSpec::grid(Some("drv"), None));
        assert!(FacetSpec::parse("~").is_err());
        assert!(FacetSpec::parse(". ~ .").is_err());
        assert!(FacetSpec::parse("a ~ b ~ c").is_err());
        assert_eq!(FacetSpec::parse("cyl ~ drv").unwrap().to_string(), "cyl ~ drv");
    }

    #[test]
    fn test_wrap_dims() {
        assert_eq!(wrap_dims(1, None, None), (1, 1));
        assert_eq!(wrap_dims(3, None, None), (1, 3));
        assert_eq!(wrap_dims(4, None, None), (2, 2));
        assert_eq!(wrap_dims(7, None, None), (3, 3));
        assert_eq!(wrap_dims(13, None, None), (4, 4));
        assert_eq!(wrap_dims(7, None, Some(2)), (4, 2));
        assert_eq!(wrap_dims(7, Some(2), None), (2, 4));
    }

    #[test]
    fn test_wrap_partition() {
        let panels = partition(&mpg(), &FacetSpec::wrap("drv")).unwrap();
        assert_eq!(panels.len(), 3);
        assert_eq!(panels[0].strip(), vec!["f"]);
        assert_eq!(panels[0].rows, vec![0, 2]);
        assert_eq!((panels[2].row, panels[2].col), (0, 2));
        let total: usize = panels.iter().map(|p| p.rows.len()).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn test_grid_includes_empty_cells() {
        let panels = partition(&mpg(), &FacetSpec::grid(Some("cyl"), Some("drv"))).unwrap();
        assert_eq!(panels.len(), 9);
        assert_eq!(grid_shape(&panels), (3, 3));
        let empty = panels.iter().filter(|p| p.rows.is_empty()).count();
        assert_eq!(empty, 4);
        assert_eq!(panels[0].strip(), vec!["4", "f"]);
    }

    #[test]
    fn test_data_without_facet_var_repeats() {
        let panels = partition(&mpg(), &FacetSpec::wrap("drv")).unwrap();
        let reference = DataFrame::from_xy(&[1.0, 2.0], &[3.0, 4.0]);
        assert!(panels.iter().all(|p| p.select(&reference) == vec![0, 1]));
    }

    #[test]
    fn test_unknown_facet_var() {
        let err = partition(&mpg(), &FacetSpec::wrap("class")).unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { ref column, .. } if column == "class"));
    }

    #[test]
    fn test_policy() {
        let spec = FacetSpec::wrap("drv").scales("free_y".parse().unwrap());
        assert!(spec.policy().free_y());
        assert!(!spec.policy().free_x());
        assert!("loose".parse::<ScalesPolicy>().is_err());
    }
}
