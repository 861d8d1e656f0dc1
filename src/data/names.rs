//! Parser for the `adult.names` metadata file
//!
//! The file declares the outcome levels on its first meaningful line and then
//! one attribute per line, in column order:
//!
//! ```text
//! | comment
//! >50K, <=50K.
//!
//! age: continuous.
//! workclass: Private, Self-emp-not-inc, ... .
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while parsing a metadata file
#[derive(Error, Debug, PartialEq)]
pub enum NamesError {
    #[error("Metadata declares no attributes")]
    NoAttributes,

    #[error("Metadata does not declare the outcome levels")]
    MissingOutcome,

    #[error("Line {line}: attribute '{name}' has no levels")]
    EmptyLevels { line: usize, name: String },

    #[error("Line {line}: duplicate attribute '{name}'")]
    DuplicateAttribute { line: usize, name: String },
}

/// Kind of a declared attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    /// Numeric column
    Continuous,
    /// Categorical column with its declared levels
    Categorical(Vec<String>),
}

/// One declared attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
}

/// Parsed metadata: column layout of the data file
#[derive(Debug, Clone, PartialEq)]
pub struct NamesFile {
    /// Attributes in column order
    pub attributes: Vec<Attribute>,
    /// Outcome levels in declaration order
    pub outcome_levels: Vec<String>,
}

impl NamesFile {
    /// Read and parse a metadata file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to open metadata file: {:?}", path.as_ref()))?;
        let names = Self::parse(&content)
            .with_context(|| format!("Failed to parse metadata file: {:?}", path.as_ref()))?;
        Ok(names)
    }

    /// Parse metadata text
    pub fn parse(content: &str) -> Result<Self, NamesError> {
        let mut attributes: Vec<Attribute> = Vec::new();
        let mut outcome_levels: Option<Vec<String>> = None;

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = match raw.find('|') {
                Some(pos) => &raw[..pos],
                None => raw,
            }
            .trim();

            if line.is_empty() {
                continue;
            }

            match line.split_once(':') {
                Some((name, spec)) => {
                    let name = name.trim().to_string();
                    let spec = spec.trim().trim_end_matches('.').trim();

                    if attributes.iter().any(|a| a.name == name) {
                        return Err(NamesError::DuplicateAttribute {
                            line: line_no,
                            name,
                        });
                    }

                    let kind = if spec.eq_ignore_ascii_case("continuous") {
                        AttributeKind::Continuous
                    } else {
                        let levels = split_list(spec);
                        if levels.is_empty() {
                            return Err(NamesError::EmptyLevels {
                                line: line_no,
                                name,
                            });
                        }
                        AttributeKind::Categorical(levels)
                    };

                    attributes.push(Attribute { name, kind });
                }
                None if outcome_levels.is_none() && attributes.is_empty() => {
                    let levels = split_list(line.trim_end_matches('.'));
                    if !levels.is_empty() {
                        outcome_levels = Some(levels);
                    }
                }
                None => {}
            }
        }

        if attributes.is_empty() {
            return Err(NamesError::NoAttributes);
        }
        let outcome_levels = outcome_levels.ok_or(NamesError::MissingOutcome)?;

        Ok(Self {
            attributes,
            outcome_levels,
        })
    }

    /// Column names, attributes first and the outcome last
    pub fn column_names(&self, outcome_name: &str) -> Vec<String> {
        self.attributes
            .iter()
            .map(|a| a.name.clone())
            .chain(std::iter::once(outcome_name.to_string()))
            .collect()
    }

    /// Number of columns expected in each data record
    pub fn n_columns(&self) -> usize {
        self.attributes.len() + 1
    }
}

fn split_list(spec: &str) -> Vec<String> {
    spec.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
| This data was extracted from the census bureau database
| (c) comments may contain: colons
>50K, <=50K.

age: continuous.
workclass: Private, Self-emp-not-inc, State-gov.
sex: Female, Male.
hours-per-week: continuous.
";

    #[test]
    fn test_parse_attributes_and_outcome() {
        let names = NamesFile::parse(SAMPLE).unwrap();

        assert_eq!(names.outcome_levels, vec![">50K", "<=50K"]);
        assert_eq!(names.attributes.len(), 4);
        assert_eq!(names.attributes[0].kind, AttributeKind::Continuous);
        assert_eq!(
            names.attributes[1].kind,
            AttributeKind::Categorical(vec![
                "Private".to_string(),
                "Self-emp-not-inc".to_string(),
                "State-gov".to_string()
            ])
        );
        assert_eq!(
            names.column_names("income"),
            vec!["age", "workclass", "sex", "hours-per-week", "income"]
        );
        assert_eq!(names.n_columns(), 5);
    }

    #[test]
    fn test_missing_outcome() {
        let err = NamesFile::parse("age: continuous.\n").unwrap_err();
        assert_eq!(err, NamesError::MissingOutcome);
    }

    #[test]
    fn test_no_attributes() {
        let err = NamesFile::parse(">50K, <=50K.\n").unwrap_err();
        assert_eq!(err, NamesError::NoAttributes);
    }

    #[test]
    fn test_duplicate_attribute() {
        let err = NamesFile::parse(">50K, <=50K.\nage: continuous.\nage: continuous.\n")
            .unwrap_err();
        assert!(matches!(err, NamesError::DuplicateAttribute { line: 3, .. }));
    }
}
