//! Columnar in-memory table with numeric and categorical columns
//!
//! Cells are optional so that missing values survive loading and can be
//! removed by the cleaning step.

use thiserror::Error;

/// Errors raised by frame operations
#[derive(Error, Debug, PartialEq)]
pub enum FrameError {
    #[error("Column '{column}' has {got} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Column '{0}' is not categorical")]
    NotCategorical(String),

    #[error("Column '{0}' is not numeric")]
    NotNumeric(String),
}

/// Cell storage of a column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Continuous values
    Numeric(Vec<Option<f64>>),
    /// Level codes into `levels`
    Categorical {
        levels: Vec<String>,
        codes: Vec<Option<usize>>,
    },
}

/// A named column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    /// Create a numeric column
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    /// Create a categorical column from level codes
    pub fn categorical(
        name: impl Into<String>,
        levels: Vec<String>,
        codes: Vec<Option<usize>>,
    ) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Categorical { levels, codes },
        }
    }

    /// Create a categorical column from labels, levels in order of first appearance
    pub fn from_labels<S: AsRef<str>>(name: impl Into<String>, labels: &[Option<S>]) -> Self {
        let mut levels: Vec<String> = Vec::new();
        let codes = labels
            .iter()
            .map(|label| {
                label.as_ref().map(|l| {
                    let l = l.as_ref();
                    match levels.iter().position(|x| x == l) {
                        Some(code) => code,
                        None => {
                            levels.push(l.to_string());
                            levels.len() - 1
                        }
                    }
                })
            })
            .collect();
        Self::categorical(name, levels, codes)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical { codes, .. } => codes.len(),
        }
    }

    /// Whether the column has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric(_))
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self.data, ColumnData::Categorical { .. })
    }

    /// Whether the cell at `row` is missing
    pub fn is_missing(&self, row: usize) -> bool {
        match &self.data {
            ColumnData::Numeric(v) => v[row].is_none(),
            ColumnData::Categorical { codes, .. } => codes[row].is_none(),
        }
    }

    /// Count of missing cells
    pub fn n_missing(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_missing(i)).count()
    }

    /// Numeric cells, if the column is numeric
    pub fn values(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v),
            ColumnData::Categorical { .. } => None,
        }
    }

    /// Declared levels, if the column is categorical
    pub fn levels(&self) -> Option<&[String]> {
        match &self.data {
            ColumnData::Categorical { levels, .. } => Some(levels),
            ColumnData::Numeric(_) => None,
        }
    }

    /// Level codes, if the column is categorical
    pub fn codes(&self) -> Option<&[Option<usize>]> {
        match &self.data {
            ColumnData::Categorical { codes, .. } => Some(codes),
            ColumnData::Numeric(_) => None,
        }
    }

    /// Level label at `row`
    pub fn label(&self, row: usize) -> Option<&str> {
        match &self.data {
            ColumnData::Categorical { levels, codes } => {
                codes[row].map(|c| levels[c].as_str())
            }
            ColumnData::Numeric(_) => None,
        }
    }

    /// Row count per level, in level order
    pub fn level_counts(&self) -> Vec<(String, usize)> {
        match &self.data {
            ColumnData::Categorical { levels, codes } => {
                let mut counts = vec![0usize; levels.len()];
                for code in codes.iter().flatten() {
                    counts[*code] += 1;
                }
                levels.iter().cloned().zip(counts).collect()
            }
            ColumnData::Numeric(_) => Vec::new(),
        }
    }

    /// Column restricted to the given rows
    fn select(&self, indices: &[usize]) -> Column {
        let data = match &self.data {
            ColumnData::Numeric(v) => ColumnData::Numeric(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Categorical { levels, codes } => ColumnData::Categorical {
                levels: levels.clone(),
                codes: indices.iter().map(|&i| codes[i]).collect(),
            },
        };
        Column {
            name: self.name.clone(),
            data,
        }
    }

    fn retain(&mut self, keep: &[bool]) {
        let mut it = keep.iter();
        match &mut self.data {
            ColumnData::Numeric(v) => v.retain(|_| *it.next().unwrap_or(&false)),
            ColumnData::Categorical { codes, .. } => codes.retain(|_| *it.next().unwrap_or(&false)),
        }
    }

    /// Remove levels with no rows, re-coding the remaining ones
    pub fn drop_unused_levels(&mut self) -> Vec<String> {
        let ColumnData::Categorical { levels, codes } = &mut self.data else {
            return Vec::new();
        };

        let mut used = vec![false; levels.len()];
        for code in codes.iter().flatten() {
            used[*code] = true;
        }
        if used.iter().all(|&u| u) {
            return Vec::new();
        }

        let mut remap = vec![None; levels.len()];
        let mut kept = Vec::new();
        let mut dropped = Vec::new();
        for (i, level) in levels.iter().enumerate() {
            if used[i] {
                remap[i] = Some(kept.len());
                kept.push(level.clone());
            } else {
                dropped.push(level.clone());
            }
        }

        for code in codes.iter_mut() {
            *code = code.and_then(|c| remap[c]);
        }
        *levels = kept;
        dropped
    }
}

/// Table of equally long named columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    columns: Vec<Column>,
}

impl Frame {
    /// Create a frame, checking lengths and name uniqueness
    pub fn new(columns: Vec<Column>) -> Result<Self, FrameError> {
        if let Some(first) = columns.first() {
            let expected = first.len();
            for (i, col) in columns.iter().enumerate() {
                if col.len() != expected {
                    return Err(FrameError::LengthMismatch {
                        column: col.name.clone(),
                        expected,
                        got: col.len(),
                    });
                }
                if columns[..i].iter().any(|c| c.name == col.name) {
                    return Err(FrameError::DuplicateColumn(col.name.clone()));
                }
            }
        }
        Ok(Self { columns })
    }

    /// Number of rows
    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Number of columns
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Result<&Column, FrameError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_string()))
    }

    pub fn column_mut(&mut self, name: &str) -> Result<&mut Column, FrameError> {
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_string()))
    }

    /// Remove a column and return it
    pub fn drop_column(&mut self, name: &str) -> Result<Column, FrameError> {
        let pos = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_string()))?;
        Ok(self.columns.remove(pos))
    }

    /// Rename a column; the new name must not be taken
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<(), FrameError> {
        if from != to && self.contains(to) {
            return Err(FrameError::DuplicateColumn(to.to_string()));
        }
        self.column_mut(from)?.name = to.to_string();
        Ok(())
    }

    /// Keep rows where `keep` is true, in place
    pub fn retain_rows(&mut self, keep: &[bool]) {
        for col in &mut self.columns {
            col.retain(keep);
        }
    }

    /// New frame with the given rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Frame {
        Frame {
            columns: self.columns.iter().map(|c| c.select(indices)).collect(),
        }
    }

    /// Mask of rows with no missing cell
    pub fn complete_rows(&self) -> Vec<bool> {
        (0..self.n_rows())
            .map(|i| self.columns.iter().all(|c| !c.is_missing(i)))
            .collect()
    }

    /// Missing cell count per column
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.n_missing()))
            .collect()
    }

    /// Drop unused levels in every categorical column
    pub fn drop_unused_levels(&mut self) -> Vec<(String, Vec<String>)> {
        self.columns
            .iter_mut()
            .filter_map(|c| {
                let dropped = c.drop_unused_levels();
                (!dropped.is_empty()).then(|| (c.name.clone(), dropped))
            })
            .collect()
    }
}
