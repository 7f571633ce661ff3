use super::{AssetDataset, AssetSeries, DatasetSource};
use crate::errors::{EngineError, EngineResult};
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Load every `*.csv` table in `dir` as one asset, keyed by file stem.
///
/// Only numeric columns are kept. Gaps are forward-filled, then back-filled,
/// then zero-filled. Series are truncated to the shortest table.
pub fn load_dataset(dir: &Path) -> EngineResult<AssetDataset> {
    if !dir.is_dir() {
        return Err(EngineError::DataUnavailable(format!(
            "directory {} not found",
            dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .collect();
    files.sort();

    let mut pairs = Vec::with_capacity(files.len());
    for path in &files {
        let asset = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        match read_table(path) {
            Ok(series) if !series.is_empty() && series.width() > 0 => {
                tracing::debug!(
                    asset = %asset,
                    rows = series.len(),
                    features = series.width(),
                    "loaded asset table"
                );
                pairs.push((asset, series));
            }
            Ok(_) => {
                tracing::warn!(file = %path.display(), "skipping table with no numeric data");
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping unreadable table");
            }
        }
    }

    if pairs.is_empty() {
        return Err(EngineError::DataUnavailable(format!(
            "no usable csv tables in {}",
            dir.display()
        )));
    }

    let width = pairs[0].1.width();
    if let Some((asset, series)) = pairs.iter().find(|(_, s)| s.width() != width) {
        return Err(EngineError::InconsistentDataset(format!(
            "asset {asset} has {} features, expected {width}",
            series.width()
        )));
    }

    let dataset = AssetDataset::new(pairs, DatasetSource::Real);
    tracing::info!(
        dir = %dir.display(),
        assets = dataset.n_assets(),
        rows = dataset.len(),
        features = dataset.n_features(),
        "dataset loaded"
    );
    Ok(dataset)
}

/// Load the dataset, substituting the single-asset dummy series on any
/// failure. The returned dataset's `source()` tells the two apart.
pub fn load_or_fallback(dir: &Path) -> AssetDataset {
    match load_dataset(dir) {
        Ok(ds) => ds,
        Err(e) => {
            tracing::warn!(error = %e, "falling back to dummy dataset");
            AssetDataset::dummy()
        }
    }
}

fn read_table(path: &Path) -> EngineResult<AssetSeries> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let n_cols = reader.headers()?.len();
    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); n_cols];
    let mut numeric = vec![true; n_cols];

    for record in reader.records() {
        let record = record?;
        for (col, cells) in columns.iter_mut().enumerate() {
            let cell = record.get(col).unwrap_or("");
            let value = parse_cell(cell);
            if value.is_none() && !is_missing(cell) {
                numeric[col] = false;
            }
            cells.push(value);
        }
    }

    let kept: Vec<Vec<f64>> = columns
        .into_iter()
        .zip(numeric)
        .filter(|(_, is_numeric)| *is_numeric)
        .map(|(cells, _)| fill_gaps(&cells))
        .collect();

    let rows = kept.first().map_or(0, Vec::len);
    let width = kept.len();
    let values = Array2::from_shape_fn((rows, width), |(r, c)| kept[c][r]);
    Ok(AssetSeries::new(values))
}

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell.eq_ignore_ascii_case("na")
}

/// NaN counts as missing; infinities are kept for the simulator to sanitize.
fn parse_cell(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| !v.is_nan())
}

fn fill_gaps(cells: &[Option<f64>]) -> Vec<f64> {
    let mut out: Vec<Option<f64>> = Vec::with_capacity(cells.len());

    // forward fill
    let mut last = None;
    for cell in cells {
        if cell.is_some() {
            last = *cell;
        }
        out.push(last);
    }

    // back fill the leading gap
    if let Some(first) = out.iter().copied().flatten().next() {
        for slot in out.iter_mut().take_while(|v| v.is_none()) {
            *slot = Some(first);
        }
    }

    out.into_iter().map(|v| v.unwrap_or(0.0)).collect()
}
