pub mod loader;

use ndarray::{Array2, ArrayView1};

/// Number of rows in the degenerate fallback series (~5 years of daily bars)
pub const DUMMY_ROWS: usize = 252 * 5;
const DUMMY_FEATURES: usize = 3;

/// Where the dataset came from. Dummy means the loader failed and the
/// simulator is running on a constant single-asset series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSource {
    Real,
    Dummy,
}

impl std::fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real => write!(f, "real"),
            Self::Dummy => write!(f, "dummy"),
        }
    }
}

/// Feature table for one asset. Rows are time steps, column 0 is the
/// reference price.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetSeries {
    values: Array2<f64>,
}

impl AssetSeries {
    pub fn new(values: Array2<f64>) -> Self {
        Self { values }
    }

    /// Build from row vectors. All rows must share the same width.
    #[cfg(test)]
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        let values = Array2::from_shape_vec((rows.len(), width), flat)
            .unwrap_or_else(|_| Array2::zeros((0, width)));
        Self { values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.values.ncols()
    }

    #[inline]
    pub fn row(&self, index: usize) -> Option<ArrayView1<'_, f64>> {
        (index < self.len()).then(|| self.values.row(index))
    }

    #[inline]
    pub fn price(&self, index: usize) -> Option<f64> {
        self.values.get((index, 0)).copied()
    }

    pub fn truncated(&self, len: usize) -> Self {
        let len = len.min(self.len());
        Self {
            values: self.values.slice(ndarray::s![..len, ..]).to_owned(),
        }
    }
}

/// Aligned per-asset feature tables. Assets are kept in a fixed canonical
/// order; every series has the same length and width.
#[derive(Debug, Clone)]
pub struct AssetDataset {
    assets: Vec<String>,
    series: Vec<AssetSeries>,
    source: DatasetSource,
}

impl AssetDataset {
    /// Pairs are truncated to the shortest series. Callers are responsible
    /// for width agreement (the loader checks it).
    pub fn new(pairs: Vec<(String, AssetSeries)>, source: DatasetSource) -> Self {
        let min_len = pairs.iter().map(|(_, s)| s.len()).min().unwrap_or(0);
        let (assets, series) = pairs
            .into_iter()
            .map(|(id, s)| (id, s.truncated(min_len)))
            .unzip();
        Self { assets, series, source }
    }

    /// Single constant-price asset so the engine stays constructible
    /// without any data on disk.
    pub fn dummy() -> Self {
        let mut values: Array2<f64> = Array2::zeros((DUMMY_ROWS, DUMMY_FEATURES));
        values.column_mut(0).fill(1.0);
        Self {
            assets: vec!["CASH".to_string()],
            series: vec![AssetSeries::new(values)],
            source: DatasetSource::Dummy,
        }
    }

    #[inline]
    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    #[inline]
    pub fn series(&self) -> &[AssetSeries] {
        &self.series
    }

    #[inline]
    pub fn source(&self) -> DatasetSource {
        self.source
    }

    #[inline]
    pub fn n_assets(&self) -> usize {
        self.series.len()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.series.first().map_or(0, AssetSeries::width)
    }

    /// Common series length (reference asset)
    #[inline]
    pub fn len(&self) -> usize {
        self.series.first().map_or(0, AssetSeries::len)
    }
}
