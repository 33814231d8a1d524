//! Tabular data view for Grammar of Graphics.
//!
//! A [`DataFrame`] is an ordered set of named, immutable columns. Columns are
//! shared through `Arc`, so cloning a frame is cheap and deriving a new
//! column never disturbs other holders of the original frame.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::expr::Expr;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Declared kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Continuous numeric values.
    Continuous,
    /// Categorical values with an ordered set of levels.
    Discrete,
    /// Timestamps, treated as continuous days since the Unix epoch.
    DateTime,
}

/// A value in a data frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// A numeric value.
    Number(f32),
    /// A text value.
    Text(String),
    /// A timestamp.
    DateTime(NaiveDateTime),
    /// A missing value.
    Null,
}

impl DataValue {
    /// Numeric view: numbers as-is, timestamps as days since the epoch.
    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            DataValue::Number(n) => Some(*n),
            DataValue::DateTime(dt) => Some(datetime_to_days(dt)),
            _ => None,
        }
    }

    /// Get as string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Check for a missing value.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Display label used for discrete levels and facet strips.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            DataValue::Number(n) => format_number(*n),
            DataValue::Text(s) => s.clone(),
            DataValue::DateTime(dt) => dt.format("%Y-%m-%d").to_string(),
            DataValue::Null => "NA".to_string(),
        }
    }
}

impl From<f32> for DataValue {
    fn from(v: f32) -> Self {
        DataValue::Number(v)
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::Text(s.to_string())
    }
}

impl From<String> for DataValue {
    fn from(s: String) -> Self {
        DataValue::Text(s)
    }
}

impl From<NaiveDateTime> for DataValue {
    fn from(dt: NaiveDateTime) -> Self {
        DataValue::DateTime(dt)
    }
}

/// Format a number without a trailing `.0` for integral values.
#[must_use]
pub fn format_number(n: f32) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e9 {
        format!("{}", n as i64)
    } else {
        let text = format!("{n:.4}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Days since the Unix epoch for a timestamp.
#[must_use]
pub fn datetime_to_days(dt: &NaiveDateTime) -> f32 {
    (dt.and_utc().timestamp() as f64 / SECONDS_PER_DAY) as f32
}

/// Timestamp for a day offset produced by [`datetime_to_days`].
#[must_use]
pub fn days_to_datetime(days: f32) -> Option<NaiveDateTime> {
    let seconds = (f64::from(days) * SECONDS_PER_DAY).round() as i64;
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.naive_utc())
}

/// Calendar year of a day offset.
#[must_use]
pub fn days_to_year(days: f32) -> Option<f32> {
    days_to_datetime(days).map(|dt| dt.year() as f32)
}

/// A single immutable column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    kind: ColumnKind,
    values: Vec<DataValue>,
    levels: Option<Vec<String>>,
}

impl Column {
    /// Continuous column from numbers.
    #[must_use]
    pub fn continuous(values: &[f32]) -> Self {
        Self {
            kind: ColumnKind::Continuous,
            values: values.iter().map(|&v| DataValue::Number(v)).collect(),
            levels: None,
        }
    }

    /// Discrete column from text labels; levels are taken in first-seen order.
    #[must_use]
    pub fn discrete(values: &[&str]) -> Self {
        Self {
            kind: ColumnKind::Discrete,
            values: values.iter().map(|&s| DataValue::Text(s.to_string())).collect(),
            levels: None,
        }
    }

    /// Date-time column.
    #[must_use]
    pub fn datetime(values: &[NaiveDateTime]) -> Self {
        Self {
            kind: ColumnKind::DateTime,
            values: values.iter().map(|&dt| DataValue::DateTime(dt)).collect(),
            levels: None,
        }
    }

    /// Column from raw values with a declared kind.
    #[must_use]
    pub fn from_values(kind: ColumnKind, values: Vec<DataValue>) -> Self {
        Self { kind, values, levels: None }
    }

    /// Declare an explicit level order, turning the column discrete.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if a value is missing from `levels`
    /// or `levels` repeats an entry.
    pub fn with_levels(mut self, levels: &[&str]) -> Result<Self> {
        let declared: Vec<String> = levels.iter().map(|s| s.to_string()).collect();
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = declared.iter().find(|l| !seen.insert(l.as_str())) {
            return Err(Error::InvalidParameter {
                name: "levels".into(),
                reason: format!("level '{dup}' declared twice"),
            });
        }
        if let Some(missing) = self
            .values
            .iter()
            .filter(|v| !v.is_null())
            .map(DataValue::label)
            .find(|label| !seen.contains(label.as_str()))
        {
            return Err(Error::InvalidParameter {
                name: "levels".into(),
                reason: format!("value '{missing}' is not a declared level"),
            });
        }
        self.kind = ColumnKind::Discrete;
        self.levels = Some(declared);
        Ok(self)
    }

    /// Column kind.
    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Raw values.
    #[must_use]
    pub fn values(&self) -> &[DataValue] {
        &self.values
    }

    /// Explicitly declared levels, if any.
    #[must_use]
    pub fn declared_levels(&self) -> Option<&[String]> {
        self.levels.as_deref()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check for an empty column.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Observed levels in display order.
    ///
    /// Declared levels win; otherwise discrete text keeps first-seen order,
    /// and numeric or temporal values are sorted ascending.
    #[must_use]
    pub fn levels(&self) -> Vec<DataValue> {
        if let Some(declared) = &self.levels {
            return declared.iter().map(|l| DataValue::Text(l.clone())).collect();
        }

        let mut seen: Vec<DataValue> = Vec::new();
        let mut labels = std::collections::HashSet::new();
        for value in &self.values {
            if labels.insert(value.label()) {
                seen.push(value.clone());
            }
        }
        let has_text = seen.iter().any(|v| v.as_str().is_some());
        if self.kind != ColumnKind::Discrete || !has_text {
            seen.sort_by(|a, b| match (a.as_f32(), b.as_f32()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
        }
        seen
    }

    fn take(&self, rows: &[usize]) -> Self {
        Self {
            kind: self.kind,
            values: rows.iter().filter_map(|&r| self.values.get(r).cloned()).collect(),
            levels: self.levels.clone(),
        }
    }
}

/// Typed column-access contract for external tabular sources.
pub trait ColumnSource {
    /// Column names in order.
    fn column_names(&self) -> Vec<String>;

    /// Declared kind of a column.
    fn column_kind(&self, name: &str) -> Option<ColumnKind>;

    /// All values of a column.
    fn values_of(&self, name: &str) -> Option<Vec<DataValue>>;
}

/// An ordered, columnar data frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    /// Column data keyed by column name, in insertion order.
    columns: IndexMap<String, Arc<Column>>,
    /// Number of rows.
    n_rows: usize,
}

impl DataFrame {
    /// Create a new empty data frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from x and y arrays, truncating to the shorter one.
    #[must_use]
    pub fn from_xy(x: &[f32], y: &[f32]) -> Self {
        let n = x.len().min(y.len());
        let mut columns = IndexMap::new();
        columns.insert("x".to_string(), Arc::new(Column::continuous(&x[..n])));
        columns.insert("y".to_string(), Arc::new(Column::continuous(&y[..n])));
        Self { columns, n_rows: n }
    }

    /// Build from named columns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataLengthMismatch`] if columns differ in length.
    pub fn from_columns<S: Into<String>>(columns: impl IntoIterator<Item = (S, Column)>) -> Result<Self> {
        let mut df = Self::new();
        for (name, column) in columns {
            df.insert(name.into(), column)?;
        }
        Ok(df)
    }

    /// Ingest any [`ColumnSource`].
    ///
    /// # Errors
    ///
    /// Returns an error if a listed column cannot be read or lengths differ.
    pub fn from_source(source: &impl ColumnSource) -> Result<Self> {
        let names = source.column_names();
        let mut df = Self::new();
        for name in &names {
            let kind = source
                .column_kind(name)
                .ok_or_else(|| Error::unknown_column(name, names.iter().map(String::as_str)))?;
            let values = source
                .values_of(name)
                .ok_or_else(|| Error::unknown_column(name, names.iter().map(String::as_str)))?;
            df.insert(name.clone(), Column::from_values(kind, values))?;
        }
        Ok(df)
    }

    /// Add a numeric column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataLengthMismatch`] if the length differs from existing columns.
    pub fn add_column_f32(&mut self, name: &str, data: &[f32]) -> Result<()> {
        self.insert(name.to_string(), Column::continuous(data))
    }

    /// Add a text column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataLengthMismatch`] if the length differs from existing columns.
    pub fn add_column_str(&mut self, name: &str, data: &[&str]) -> Result<()> {
        self.insert(name.to_string(), Column::discrete(data))
    }

    /// Add a date-time column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataLengthMismatch`] if the length differs from existing columns.
    pub fn add_column_datetime(&mut self, name: &str, data: &[NaiveDateTime]) -> Result<()> {
        self.insert(name.to_string(), Column::datetime(data))
    }

    fn insert(&mut self, name: String, column: Column) -> Result<()> {
        let others = self.columns.len() - usize::from(self.columns.contains_key(&name));
        if others > 0 && column.len() != self.n_rows {
            return Err(Error::DataLengthMismatch { column: name, len: column.len(), expected: self.n_rows });
        }
        self.n_rows = column.len();
        self.columns.insert(name, Arc::new(column));
        Ok(())
    }

    /// New frame with `column` added or replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataLengthMismatch`] if the length differs from existing columns.
    pub fn with_column(&self, name: &str, column: Column) -> Result<Self> {
        let mut next = self.clone();
        next.insert(name.to_string(), column)?;
        Ok(next)
    }

    /// New frame with a column computed from an expression over existing
    /// columns, e.g. `with_derived("year", "year(date)")`.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression is invalid or references unknown columns.
    pub fn with_derived(&self, name: &str, expr: &str) -> Result<Self> {
        let series = Expr::parse(expr)?.evaluate(self)?;
        self.with_column(name, series.into_column()?)
    }

    /// New frame with `name` re-declared as discrete.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`] if the column does not exist.
    pub fn as_discrete(&self, name: &str) -> Result<Self> {
        let column = self.column(name)?;
        let mut next = (**column).clone();
        next.kind = ColumnKind::Discrete;
        self.with_column(name, next)
    }

    /// New frame with an explicit level order for `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is unknown or the levels do not cover its values.
    pub fn with_levels(&self, name: &str, levels: &[&str]) -> Result<Self> {
        let column = (**self.column(name)?).clone().with_levels(levels)?;
        self.with_column(name, column)
    }

    /// Subset of rows, in the order given.
    #[must_use]
    pub fn take(&self, rows: &[usize]) -> Self {
        let columns: IndexMap<String, Arc<Column>> =
            self.columns.iter().map(|(k, c)| (k.clone(), Arc::new(c.take(rows)))).collect();
        let n_rows = rows.iter().filter(|&&r| r < self.n_rows).count();
        Self { columns, n_rows }
    }

    /// Get a column, or an [`Error::UnknownColumn`] listing the available ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`] if the column does not exist.
    pub fn column(&self, name: &str) -> Result<&Arc<Column>> {
        self.columns.get(name).ok_or_else(|| Error::unknown_column(name, self.columns()))
    }

    /// Get a column's values.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[DataValue]> {
        self.columns.get(name).map(|c| c.values())
    }

    /// Get a column as f32 values, with `NaN` for missing or text cells.
    #[must_use]
    pub fn get_f32(&self, name: &str) -> Option<Vec<f32>> {
        self.columns
            .get(name)
            .map(|c| c.values().iter().map(|v| v.as_f32().unwrap_or(f32::NAN)).collect())
    }

    /// Get number of rows.
    #[must_use]
    pub fn nrow(&self) -> usize {
        self.n_rows
    }

    /// Get number of columns.
    #[must_use]
    pub fn ncol(&self) -> usize {
        self.columns.len()
    }

    /// Check if a column exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Get column names in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Row indices grouped by the label of `name`, keyed by label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`] if the column does not exist.
    pub fn row_index(&self, name: &str) -> Result<HashMap<String, Vec<usize>>> {
        let column = self.column(name)?;
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (row, value) in column.values().iter().enumerate() {
            index.entry(value.label()).or_default().push(row);
        }
        Ok(index)
    }
}

impl ColumnSource for DataFrame {
    fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        self.columns.get(name).map(|c| c.kind())
    }

    fn values_of(&self, name: &str) -> Option<Vec<DataValue>> {
        self.get(name).map(<[DataValue]>::to_vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_dataframe_from_xy() {
        let df = DataFrame::from_xy(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert_eq!(df.nrow(), 3);
        assert_eq!(df.ncol(), 2);
        assert_eq!(df.columns().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn test_dataframe_from_xy_unequal() {
        let df = DataFrame::from_xy(&[1.0, 2.0, 3.0], &[4.0, 5.0]);
        assert_eq!(df.get_f32("x").unwrap().len(), 2);
    }

    #[test]
    fn test_add_column_length_mismatch() {
        let mut df = DataFrame::new();
        df.add_column_f32("a", &[1.0, 2.0]).unwrap();
        let err = df.add_column_str("b", &["x"]).unwrap_err();
        assert!(matches!(err, Error::DataLengthMismatch { len: 1, expected: 2, .. }));
    }

    #[test]
    fn test_with_column_leaves_original_untouched() {
        let df = DataFrame::from_xy(&[1.0, 2.0], &[3.0, 4.0]);
        let derived = df.with_column("z", Column::continuous(&[5.0, 6.0])).unwrap();
        assert!(!df.has_column("z"));
        assert!(derived.has_column("z"));
        assert!(Arc::ptr_eq(df.column("x").unwrap(), derived.column("x").unwrap()));
    }

    #[test]
    fn test_column_kinds_and_source_contract() {
        let mut df = DataFrame::new();
        df.add_column_f32("n", &[1.0]).unwrap();
        df.add_column_str("s", &["a"]).unwrap();
        df.add_column_datetime("d", &[date(2020, 1, 1)]).unwrap();
        assert_eq!(df.column_kind("n"), Some(ColumnKind::Continuous));
        assert_eq!(df.column_kind("s"), Some(ColumnKind::Discrete));
        assert_eq!(df.column_kind("d"), Some(ColumnKind::DateTime));
        assert_eq!(df.column_names(), vec!["n", "s", "d"]);
        assert_eq!(df.values_of("s"), Some(vec![DataValue::from("a")]));

        let copy = DataFrame::from_source(&df).unwrap();
        assert_eq!(copy, df);
    }

    #[test]
    fn test_levels_first_seen_for_text() {
        let col = Column::discrete(&["f", "4", "r", "4", "f"]);
        let labels: Vec<String> = col.levels().iter().map(DataValue::label).collect();
        assert_eq!(labels, vec!["f", "4", "r"]);
    }

    #[test]
    fn test_levels_sorted_for_numbers() {
        let col = Column::continuous(&[8.0, 4.0, 6.0, 4.0]);
        let labels: Vec<String> = col.levels().iter().map(DataValue::label).collect();
        assert_eq!(labels, vec!["4", "6", "8"]);
    }

    #[test]
    fn test_declared_levels() {
        let col = Column::discrete(&["b", "a", "c"]).with_levels(&["c", "b", "a"]).unwrap();
        let labels: Vec<String> = col.levels().iter().map(DataValue::label).collect();
        assert_eq!(labels, vec!["c", "b", "a"]);
        assert!(Column::discrete(&["z"]).with_levels(&["a"]).is_err());
        assert!(Column::discrete(&["a"]).with_levels(&["a", "a"]).is_err());
    }

    #[test]
    fn test_datetime_round_trip() {
        let dt = date(1999, 7, 1);
        let days = datetime_to_days(&dt);
        assert_eq!(days_to_datetime(days), Some(dt));
        assert_eq!(days_to_year(days), Some(1999.0));
    }

    #[test]
    fn test_unknown_column_error() {
        let df = DataFrame::from_xy(&[1.0], &[2.0]);
        let err = df.column("hwy").unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { ref column, .. } if column == "hwy"));
    }

    #[test]
    fn test_take_rows() {
        let df = DataFrame::from_xy(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        let sub = df.take(&[2, 0]);
        assert_eq!(sub.nrow(), 2);
        assert_eq!(sub.get_f32("x").unwrap(), vec![3.0, 1.0]);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(-0.25), "-0.25");
    }

    #[test]
    fn test_row_index() {
        let mut df = DataFrame::new();
        df.add_column_str("drv", &["f", "4", "f"]).unwrap();
        let index = df.row_index("drv").unwrap();
        assert_eq!(index["f"], vec![0, 2]);
        assert_eq!(index["4"], vec![1]);
    }
}
