use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Serialize, Deserialize};

use crate::data::feature::{Feature, FeatureId};
use crate::data::row::Row;
use crate::error::{AlignError, Result};

/// Plain (mass, rt, intensity) record as handed over by the peak picker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub mass: f64,
    pub rt: f64,
    #[serde(default)]
    pub intensity: f64,
}

/// Ordered collection of rows with unique row ids.
#[derive(Clone, Debug, Serialize)]
pub struct Table {
    label: String,
    file: Option<u32>,
    rows: Vec<Row>,
}

impl Table {
    /// Builds a table from rows, rejecting duplicate row ids.
    pub fn new(label: impl Into<String>, rows: Vec<Row>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(rows.len());
        for r in &rows {
            if !seen.insert(r.id()) {
                return Err(AlignError::DuplicateRowId(r.id()));
            }
        }
        Ok(Table { label: label.into(), file: None, rows })
    }

    /// Empty master table.
    pub fn empty(label: impl Into<String>) -> Self {
        Table { label: label.into(), file: None, rows: Vec::new() }
    }

    /// Singleton table for one file: feature `k` becomes row `k` with peak index `k`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use msalign::data::table::{FeatureRecord, Table};
    ///
    /// let records = vec![
    ///     FeatureRecord { mass: 100.0, rt: 10.0, intensity: 1.0 },
    ///     FeatureRecord { mass: 200.0, rt: 20.0, intensity: 1.0 },
    /// ];
    /// let table = Table::from_records(0, "A", &records);
    /// assert_eq!(table.len(), 2);
    /// assert_eq!(table.file(), Some(0));
    /// ```
    pub fn from_records(file: u32, label: impl Into<String>, records: &[FeatureRecord]) -> Self {
        let rows = records
            .iter()
            .enumerate()
            .map(|(k, r)| Row::singleton(k, Feature::new(file, k as u32, r.mass, r.rt, r.intensity)))
            .collect();
        Table { label: label.into(), file: Some(file), rows }
    }

    /// Internal constructor for tables whose ids are known to be unique.
    pub(crate) fn from_unique_rows(label: impl Into<String>, rows: Vec<Row>) -> Self {
        Table { label: label.into(), file: None, rows }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Originating file, for tables ingested straight from one file.
    #[inline]
    pub fn file(&self) -> Option<u32> {
        self.file
    }

    #[inline]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total number of features over all rows.
    pub fn n_features(&self) -> usize {
        self.rows.iter().map(Row::len).sum()
    }

    /// Feature id → index of the row holding it.
    pub fn feature_index(&self) -> HashMap<FeatureId, usize> {
        let mut map = HashMap::with_capacity(self.n_features());
        for (i, row) in self.rows.iter().enumerate() {
            for f in row.features() {
                map.insert(f.id, i);
            }
        }
        map
    }

    /// Files contributing at least one feature, sorted.
    pub fn files(&self) -> Vec<u32> {
        let mut files: Vec<u32> = self
            .rows
            .iter()
            .flat_map(|r| r.features().iter().map(|f| f.id.file))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        files.sort_unstable();
        files
    }

    /// Summary of how many rows carry how many features.
    pub fn summary(&self) -> TableSummary {
        let files = self.files();
        let mut size_histogram: Vec<usize> = Vec::new();
        let mut per_file_rows: HashMap<u32, usize> = HashMap::new();
        let mut complete_rows = 0;

        for row in &self.rows {
            let n = row.len();
            if size_histogram.len() <= n {
                size_histogram.resize(n + 1, 0);
            }
            size_histogram[n] += 1;

            let row_files: HashSet<u32> = row.features().iter().map(|f| f.id.file).collect();
            for &file in &row_files {
                *per_file_rows.entry(file).or_default() += 1;
            }
            if !files.is_empty() && row_files.len() == files.len() {
                complete_rows += 1;
            }
        }

        let mut rows_per_file: Vec<(u32, usize)> = per_file_rows.into_iter().collect();
        rows_per_file.sort_unstable();

        TableSummary {
            n_rows: self.rows.len(),
            n_features: self.n_features(),
            n_files: files.len(),
            complete_rows,
            size_histogram,
            rows_per_file,
        }
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Table({}, rows: {}, features: {})", self.label, self.rows.len(), self.n_features())
    }
}

/// Coverage statistics of a consensus table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TableSummary {
    pub n_rows: usize,
    pub n_features: usize,
    pub n_files: usize,
    /// Rows holding a feature from every contributing file.
    pub complete_rows: usize,
    /// `size_histogram[k]` = number of rows with `k` features.
    pub size_histogram: Vec<usize>,
    /// (file, number of rows with a feature from that file)
    pub rows_per_file: Vec<(u32, usize)>,
}
