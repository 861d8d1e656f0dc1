//! Loading the census data file into a `Frame`
//!
//! Column names and types come from the companion metadata file.

use super::frame::{Column, Frame};
use super::names::{AttributeKind, NamesFile};
use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Reads comma-delimited census records
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Token marking a missing cell
    missing_token: String,
    /// Name given to the outcome column
    outcome_name: String,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new("?", "income")
    }
}

/// Per-column accumulator while reading records
enum Builder {
    Numeric(Vec<Option<f64>>),
    Categorical {
        levels: Vec<String>,
        codes: Vec<Option<usize>>,
    },
}

impl Builder {
    fn push(&mut self, raw: &str, missing: &str, column: &str, line: u64) -> Result<()> {
        let raw = raw.trim();
        match self {
            Builder::Numeric(values) => {
                if raw == missing || raw.is_empty() {
                    values.push(None);
                } else {
                    let invalid =
                        || format!("Line {}: invalid number '{}' in column '{}'", line, raw, column);
                    let v: f64 = raw.parse().with_context(invalid)?;
                    // `nan` and `inf` parse as f64 but are not census values
                    if !v.is_finite() {
                        bail!(invalid());
                    }
                    values.push(Some(v));
                }
            }
            Builder::Categorical { levels, codes } => {
                if raw == missing || raw.is_empty() {
                    codes.push(None);
                } else {
                    let code = match levels.iter().position(|l| l == raw) {
                        Some(code) => code,
                        None => {
                            debug!("Column '{}': undeclared level '{}'", column, raw);
                            levels.push(raw.to_string());
                            levels.len() - 1
                        }
                    };
                    codes.push(Some(code));
                }
            }
        }
        Ok(())
    }

    fn finish(self, name: String) -> Column {
        match self {
            Builder::Numeric(values) => Column::numeric(name, values),
            Builder::Categorical { levels, codes } => Column::categorical(name, levels, codes),
        }
    }
}

impl DataLoader {
    /// Create a loader
    pub fn new(missing_token: &str, outcome_name: &str) -> Self {
        Self {
            missing_token: missing_token.to_string(),
            outcome_name: outcome_name.to_string(),
        }
    }

    /// Load the data file described by `names`
    pub fn load<P: AsRef<Path>>(&self, path: P, names: &NamesFile) -> Result<Frame> {
        let file = File::open(&path)
            .with_context(|| format!("Failed to open data file: {:?}", path.as_ref()))?;
        let frame = self
            .read(file, names)
            .with_context(|| format!("Failed to read data file: {:?}", path.as_ref()))?;

        info!(
            "Loaded {} rows x {} columns from {:?}",
            frame.n_rows(),
            frame.n_cols(),
            path.as_ref()
        );
        Ok(frame)
    }

    /// Read records from any reader
    pub fn read<R: Read>(&self, reader: R, names: &NamesFile) -> Result<Frame> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .comment(Some(b'|'))
            .from_reader(reader);

        let mut builders: Vec<Builder> = names
            .attributes
            .iter()
            .map(|a| match &a.kind {
                AttributeKind::Continuous => Builder::Numeric(Vec::new()),
                AttributeKind::Categorical(levels) => Builder::Categorical {
                    levels: levels.clone(),
                    codes: Vec::new(),
                },
            })
            .collect();
        builders.push(Builder::Categorical {
            levels: names.outcome_levels.clone(),
            codes: Vec::new(),
        });

        let column_names = names.column_names(&self.outcome_name);
        let n_columns = names.n_columns();
        let outcome_idx = n_columns - 1;

        for result in reader.records() {
            let record = result.context("Failed to parse record")?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            if record.len() != n_columns {
                bail!(
                    "Line {}: expected {} fields, found {}",
                    line,
                    n_columns,
                    record.len()
                );
            }

            for (idx, (builder, field)) in builders.iter_mut().zip(record.iter()).enumerate() {
                let field = if idx == outcome_idx {
                    field.trim_end_matches('.')
                } else {
                    field
                };
                builder.push(field, &self.missing_token, &column_names[idx], line)?;
            }
        }

        let columns = builders
            .into_iter()
            .zip(column_names)
            .map(|(b, name)| b.finish(name))
            .collect();

        Ok(Frame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    const NAMES: &str = ">50K, <=50K.\n\nage: continuous.\nworkclass: Private, State-gov.\nsex: Female, Male.\n";

    #[test]
    fn test_read_records() {
        let names = NamesFile::parse(NAMES).unwrap();
        let data = "\
39, State-gov, Male, <=50K
50, ?, Female, >50K

28, Private, Female, <=50K.
";
        let frame = DataLoader::default().read(data.as_bytes(), &names).unwrap();

        assert_eq!(frame.n_rows(), 3);
        assert_eq!(frame.column_names(), vec!["age", "workclass", "sex", "income"]);

        let workclass = frame.column("workclass").unwrap();
        assert_eq!(workclass.label(0), Some("State-gov"));
        assert!(workclass.is_missing(1));

        let income = frame.column("income").unwrap();
        assert_eq!(income.levels().unwrap().len(), 2);
        assert_eq!(income.label(2), Some("<=50K"));
    }

    #[test]
    fn test_comment_line_skipped() {
        let names = NamesFile::parse(NAMES).unwrap();
        let data = "|1x3 Cross validator\n25, Private, Male, >50K.\n";
        let frame = DataLoader::default().read(data.as_bytes(), &names).unwrap();
        assert_eq!(frame.n_rows(), 1);
    }

    #[test]
    fn test_undeclared_level_appended() {
        let names = NamesFile::parse(NAMES).unwrap();
        let data = "25, Never-worked, Male, <=50K\n";
        let frame = DataLoader::default().read(data.as_bytes(), &names).unwrap();
        let workclass = frame.column("workclass").unwrap();
        assert_eq!(workclass.levels().unwrap().len(), 3);
        assert_eq!(workclass.label(0), Some("Never-worked"));
    }

    #[test]
    fn test_wrong_field_count() {
        let names = NamesFile::parse(NAMES).unwrap();
        let data = "25, Private, Male\n";
        assert!(DataLoader::default().read(data.as_bytes(), &names).is_err());
    }

    #[test]
    fn test_invalid_number() {
        let names = NamesFile::parse(NAMES).unwrap();
        let data = "old, Private, Male, <=50K\n";
        let err = DataLoader::default().read(data.as_bytes(), &names).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid number"));
    }

    #[test]
    fn test_non_finite_number_rejected() {
        let names = NamesFile::parse(NAMES).unwrap();
        for token in ["nan", "NaN", "inf", "-infinity"] {
            let data = format!("25, Private, Male, <=50K\n{}, Private, Female, >50K\n", token);
            let err = DataLoader::default().read(data.as_bytes(), &names).unwrap_err();
            let message = format!("{:#}", err);
            assert!(message.contains("invalid number"), "{}", message);
            assert!(message.contains("Line 2"), "{}", message);
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("adult.data");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "39, State-gov, Male, <=50K").unwrap();

        let names = NamesFile::parse(NAMES).unwrap();
        let frame = DataLoader::default().load(&path, &names).unwrap();
        assert_eq!(frame.n_rows(), 1);
    }
}
