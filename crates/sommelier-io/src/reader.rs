//! Delimited-text dataset reader with full input validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use sommelier_rf::Dataset;
use tracing::{debug, info, instrument};

use crate::IoError;

/// Reads a labelled regression dataset from a delimited text file.
///
/// Expected format:
/// - Header row required; names may be quoted and are trimmed
/// - Every column not listed as a target is a numeric feature
/// - One row per example, all rows must have the same number of columns
///
/// Defaults match the UCI wine-quality files: `;` delimiter and a single
/// `quality` target.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::DuplicateColumn`] | Header repeats a name |
/// | [`IoError::MissingTargetColumn`] | A target is absent from the header |
/// | [`IoError::NoFeatureColumns`] | Every column is a target |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::NonFiniteValue`] | Cell is NaN, Inf, or unparseable float |
/// | [`IoError::InvalidDataset`] | Columns rejected by [`Dataset::from_columns`] |
#[derive(Debug, Clone)]
pub struct DatasetReader {
    path: PathBuf,
    delimiter: u8,
    targets: Vec<String>,
}

impl DatasetReader {
    /// Create a new reader for the given file path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            delimiter: b';',
            targets: vec!["quality".to_string()],
        }
    }

    /// Set the field delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the target column names, in output-dimension order.
    #[must_use]
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }

    /// Read and validate the file, returning a [`Dataset`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Dataset, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) lets our InconsistentRowLength check fire instead of
        // a low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(file);

        let names: Vec<String> = rdr
            .headers()
            .map_err(|e| self.csv_error(e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let expected_cols = names.len();
        debug!(expected_cols, "read CSV header");

        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(IoError::DuplicateColumn {
                    path: self.path.clone(),
                    column: name.clone(),
                });
            }
        }

        let target_cols: Vec<usize> = self
            .targets
            .iter()
            .map(|target| {
                names
                    .iter()
                    .position(|n| n == target)
                    .ok_or_else(|| IoError::MissingTargetColumn {
                        path: self.path.clone(),
                        column: target.clone(),
                    })
            })
            .collect::<Result<_, _>>()?;
        let feature_cols: Vec<usize> = (0..expected_cols)
            .filter(|c| !target_cols.contains(c))
            .collect();
        if feature_cols.is_empty() {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }

        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); expected_cols];
        let mut n_rows = 0usize;

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;

            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            for ((raw, column), name) in record.iter().zip(columns.iter_mut()).zip(&names) {
                let raw = raw.trim();
                let value = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| IoError::NonFiniteValue {
                        path: self.path.clone(),
                        row_index,
                        column: name.clone(),
                        raw: raw.to_string(),
                    })?;
                column.push(value);
            }
            n_rows += 1;
        }

        if n_rows == 0 {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        let mut take = |c: usize| (names[c].clone(), std::mem::take(&mut columns[c]));
        let features: Vec<(String, Vec<f64>)> = feature_cols.iter().map(|&c| take(c)).collect();
        let targets: Vec<(String, Vec<f64>)> = target_cols.iter().map(|&c| take(c)).collect();

        let dataset =
            Dataset::from_columns(features, targets).map_err(|e| IoError::InvalidDataset {
                path: self.path.clone(),
                source: e,
            })?;

        info!(
            n_examples = dataset.n_examples(),
            n_features = dataset.n_features(),
            n_targets = dataset.n_targets(),
            "dataset loaded"
        );

        Ok(dataset)
    }
}
