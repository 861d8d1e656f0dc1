//! Design matrices built from a formula and a frame
//!
//! A `DesignSpec` freezes the expanded terms, the categorical level sets and
//! the resulting column names, so that training, fold and test frames are
//! all encoded the same way.

use super::formula::{Factor, Formula};
use crate::data::frame::{Column, ColumnData, Frame, FrameError};
use ndarray::{Array1, Array2};
use thiserror::Error;

/// Errors raised while building or applying a design
#[derive(Error, Debug, PartialEq)]
pub enum DesignError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Response '{column}' must be categorical with two levels, found {levels}")]
    InvalidResponse { column: String, levels: usize },

    #[error("Positive class '{class}' is not a level of '{column}'")]
    UnknownPositiveClass { column: String, class: String },

    #[error("Response '{0}' appears on the right-hand side")]
    ResponseInPredictors(String),

    #[error("Power term on categorical column '{0}'")]
    CategoricalPower(String),

    #[error("Column '{column}' has unseen level '{level}'")]
    UnknownLevel { column: String, level: String },

    #[error("Column '{column}' is missing a value at row {row}")]
    MissingValue { column: String, row: usize },

    #[error("Design has no columns")]
    Empty,
}

/// A factor bound to its column type
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedFactor {
    Numeric { column: String },
    Power { column: String, degree: u32 },
    /// Treatment coding against `levels[0]`
    Categorical { column: String, levels: Vec<String> },
}

impl EncodedFactor {
    fn bind(factor: &Factor, frame: &Frame) -> Result<Self, DesignError> {
        let column = frame.column(factor.column())?;
        Ok(match (factor, &column.data) {
            (Factor::Variable(name), ColumnData::Numeric(_)) => {
                EncodedFactor::Numeric {
                    column: name.clone(),
                }
            }
            (Factor::Variable(name), ColumnData::Categorical { levels, .. }) => {
                EncodedFactor::Categorical {
                    column: name.clone(),
                    levels: levels.clone(),
                }
            }
            (Factor::Power { name, degree }, ColumnData::Numeric(_)) => EncodedFactor::Power {
                column: name.clone(),
                degree: *degree,
            },
            (Factor::Power { name, .. }, ColumnData::Categorical { .. }) => {
                return Err(DesignError::CategoricalPower(name.clone()))
            }
        })
    }

    /// Names of the sub-columns this factor contributes
    fn names(&self) -> Vec<String> {
        match self {
            EncodedFactor::Numeric { column } => vec![column.clone()],
            EncodedFactor::Power { column, degree } => vec![format!("I({}^{})", column, degree)],
            EncodedFactor::Categorical { column, levels } => levels
                .iter()
                .skip(1)
                .map(|level| format!("{}{}", column, level))
                .collect(),
        }
    }

    /// Sub-column values for every row of `frame`
    fn values(&self, frame: &Frame) -> Result<Vec<Vec<f64>>, DesignError> {
        match self {
            EncodedFactor::Numeric { column } => Ok(vec![numeric_values(frame.column(column)?)?]),
            EncodedFactor::Power { column, degree } => {
                let values = numeric_values(frame.column(column)?)?;
                Ok(vec![values.iter().map(|v| v.powi(*degree as i32)).collect()])
            }
            EncodedFactor::Categorical { column, levels } => {
                let col = frame.column(column)?;
                let n = frame.n_rows();
                let mut dummies = vec![vec![0.0; n]; levels.len().saturating_sub(1)];
                for row in 0..n {
                    let label = match &col.data {
                        ColumnData::Categorical { .. } => col.label(row),
                        ColumnData::Numeric(_) => {
                            return Err(FrameError::NotCategorical(column.clone()).into())
                        }
                    }
                    .ok_or_else(|| DesignError::MissingValue {
                        column: column.clone(),
                        row,
                    })?;
                    let idx = levels.iter().position(|l| l == label).ok_or_else(|| {
                        DesignError::UnknownLevel {
                            column: column.clone(),
                            level: label.to_string(),
                        }
                    })?;
                    if idx > 0 {
                        dummies[idx - 1][row] = 1.0;
                    }
                }
                Ok(dummies)
            }
        }
    }
}

fn numeric_values(column: &Column) -> Result<Vec<f64>, DesignError> {
    let values = column
        .values()
        .ok_or_else(|| FrameError::NotNumeric(column.name.clone()))?;
    values
        .iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| DesignError::MissingValue {
                column: column.name.clone(),
                row,
            })
        })
        .collect()
}

/// One expanded model term
#[derive(Debug, Clone, PartialEq)]
pub struct DesignTerm {
    pub label: String,
    pub factors: Vec<EncodedFactor>,
}

impl DesignTerm {
    /// Column names, first factor varying fastest
    fn names(&self) -> Vec<String> {
        let mut names = vec![String::new()];
        for factor in &self.factors {
            let sub = factor.names();
            let mut next = Vec::with_capacity(names.len() * sub.len());
            for b in &sub {
                for a in &names {
                    next.push(if a.is_empty() {
                        b.clone()
                    } else {
                        format!("{}:{}", a, b)
                    });
                }
            }
            names = next;
        }
        names
    }

    fn values(&self, frame: &Frame) -> Result<Vec<Vec<f64>>, DesignError> {
        let mut columns = vec![vec![1.0; frame.n_rows()]];
        for factor in &self.factors {
            let sub = factor.values(frame)?;
            let mut next = Vec::with_capacity(columns.len() * sub.len());
            for b in &sub {
                for a in &columns {
                    next.push(a.iter().zip(b).map(|(x, y)| x * y).collect());
                }
            }
            columns = next;
        }
        Ok(columns)
    }
}

/// Frozen encoding of a formula
#[derive(Debug, Clone, PartialEq)]
pub struct DesignSpec {
    pub response: String,
    pub positive_class: String,
    pub intercept: bool,
    pub terms: Vec<DesignTerm>,
    column_names: Vec<String>,
}

impl DesignSpec {
    /// Bind `formula` to the columns and levels of `frame`
    pub fn new(formula: &Formula, frame: &Frame, positive_class: &str) -> Result<Self, DesignError> {
        let response = frame.column(&formula.response)?;
        let levels = response.levels().ok_or(DesignError::InvalidResponse {
            column: formula.response.clone(),
            levels: 0,
        })?;
        if levels.len() != 2 {
            return Err(DesignError::InvalidResponse {
                column: formula.response.clone(),
                levels: levels.len(),
            });
        }
        if !levels.iter().any(|l| l == positive_class) {
            return Err(DesignError::UnknownPositiveClass {
                column: formula.response.clone(),
                class: positive_class.to_string(),
            });
        }

        // Main effects before interactions, stable within an order
        let mut expanded = formula.expand(&frame.column_names());
        expanded.sort_by_key(|t| t.order());

        let mut terms = Vec::new();
        for term in expanded {
            if term.factors.iter().any(|f| f.column() == formula.response) {
                return Err(DesignError::ResponseInPredictors(formula.response.clone()));
            }
            let factors = term
                .factors
                .iter()
                .map(|f| EncodedFactor::bind(f, frame))
                .collect::<Result<Vec<_>, _>>()?;
            terms.push(DesignTerm {
                label: term.label(),
                factors,
            });
        }

        let mut column_names = Vec::new();
        if formula.intercept {
            column_names.push("(Intercept)".to_string());
        }
        for term in &terms {
            column_names.extend(term.names());
        }
        if column_names.is_empty() {
            return Err(DesignError::Empty);
        }

        Ok(Self {
            response: formula.response.clone(),
            positive_class: positive_class.to_string(),
            intercept: formula.intercept,
            terms,
            column_names,
        })
    }

    /// Names of the design columns, intercept first
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// Encode the predictors of `frame`
    pub fn matrix(&self, frame: &Frame) -> Result<Array2<f64>, DesignError> {
        let n = frame.n_rows();
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(self.n_columns());
        if self.intercept {
            columns.push(vec![1.0; n]);
        }
        for term in &self.terms {
            columns.extend(term.values(frame)?);
        }

        Ok(Array2::from_shape_fn((n, columns.len()), |(i, j)| {
            columns[j][i]
        }))
    }

    /// Encode the response: 1.0 for the positive class, 0.0 otherwise
    pub fn response(&self, frame: &Frame) -> Result<Array1<f64>, DesignError> {
        let column = frame.column(&self.response)?;
        if !column.is_categorical() {
            return Err(FrameError::NotCategorical(self.response.clone()).into());
        }
        (0..frame.n_rows())
            .map(|row| {
                column
                    .label(row)
                    .map(|label| if label == self.positive_class { 1.0 } else { 0.0 })
                    .ok_or_else(|| DesignError::MissingValue {
                        column: self.response.clone(),
                        row,
                    })
            })
            .collect::<Result<Vec<f64>, _>>()
            .map(Array1::from_vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::new(vec![
            Column::numeric("age", vec![Some(20.0), Some(30.0), Some(40.0)]),
            Column::numeric("hours", vec![Some(35.0), Some(40.0), Some(50.0)]),
            Column::from_labels("sex", &[Some("Female"), Some("Male"), Some("Male")]),
            Column::from_labels(
                "work",
                &[Some("Private"), Some("Gov"), Some("Self")],
            ),
            Column::from_labels("income", &[Some("low"), Some("high"), Some("low")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_column_names() {
        let f = Formula::parse("income ~ age + I(age^2) + sex*hours + work").unwrap();
        let spec = DesignSpec::new(&f, &frame(), "high").unwrap();
        assert_eq!(
            spec.column_names(),
            &[
                "(Intercept)",
                "age",
                "I(age^2)",
                "sexMale",
                "hours",
                "workGov",
                "workSelf",
                "sexMale:hours",
            ]
        );
    }

    #[test]
    fn test_matrix_values() {
        let f = Formula::parse("income ~ I(age^2) + sex*hours + work").unwrap();
        let spec = DesignSpec::new(&f, &frame(), "high").unwrap();
        let x = spec.matrix(&frame()).unwrap();

        assert_eq!(x.shape(), &[3, 7]);
        assert_eq!(x.row(0).to_vec(), vec![1.0, 400.0, 0.0, 35.0, 0.0, 0.0, 0.0]);
        assert_eq!(x.row(1).to_vec(), vec![1.0, 900.0, 1.0, 40.0, 1.0, 0.0, 40.0]);
        assert_eq!(x.row(2).to_vec(), vec![1.0, 1600.0, 1.0, 50.0, 0.0, 1.0, 50.0]);

        let y = spec.response(&frame()).unwrap();
        assert_eq!(y.to_vec(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_categorical_interaction_names() {
        let f = Formula::parse("income ~ sex:work - 1").unwrap();
        let spec = DesignSpec::new(&f, &frame(), "high").unwrap();
        assert_eq!(
            spec.column_names(),
            &["sexMale:workGov", "sexMale:workSelf"]
        );
    }

    #[test]
    fn test_dot_excludes_response() {
        let f = Formula::parse("income ~ .").unwrap();
        let spec = DesignSpec::new(&f, &frame(), "high").unwrap();
        assert_eq!(spec.n_columns(), 1 + 1 + 1 + 1 + 2);
    }

    #[test]
    fn test_unseen_level() {
        let f = Formula::parse("income ~ work").unwrap();
        let spec = DesignSpec::new(&f, &frame(), "high").unwrap();

        let other = Frame::new(vec![
            Column::from_labels("work", &[Some("Retired")]),
            Column::from_labels("income", &[Some("low")]),
        ])
        .unwrap();
        assert!(matches!(
            spec.matrix(&other).unwrap_err(),
            DesignError::UnknownLevel { .. }
        ));
    }

    #[test]
    fn test_invalid_specs() {
        let frame = frame();
        let power = Formula::parse("income ~ I(sex^2)").unwrap();
        assert_eq!(
            DesignSpec::new(&power, &frame, "high").unwrap_err(),
            DesignError::CategoricalPower("sex".to_string())
        );

        let unknown = Formula::parse("income ~ height").unwrap();
        assert!(matches!(
            DesignSpec::new(&unknown, &frame, "high").unwrap_err(),
            DesignError::Frame(FrameError::UnknownColumn(_))
        ));

        let response = Formula::parse("income ~ age + income").unwrap();
        assert!(matches!(
            DesignSpec::new(&response, &frame, "high").unwrap_err(),
            DesignError::ResponseInPredictors(_)
        ));

        let positive = Formula::parse("income ~ age").unwrap();
        assert!(matches!(
            DesignSpec::new(&positive, &frame, "rich").unwrap_err(),
            DesignError::UnknownPositiveClass { .. }
        ));
    }
}
