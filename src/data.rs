// Benchmark dataset loading.
//
// Reads the precomputed forward operator (COO triplet CSV) and the
// observation/phantom vectors (single-column CSV). The operator file stores
// the unscaled ray-intersection matrix; the pixel-width scaling from the
// configured domain is applied here, once, at load time.

use crate::config::{Config, GridConfig};
use crate::linalg::CsrMatrix;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Everything the benchmark models need, loaded and validated.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub grid: GridConfig,
    /// Forward operator, already scaled by the pixel width.
    pub operator: CsrMatrix,
    /// Observed noisy sinogram, length `grid.sino_len()`.
    pub sinogram: Vec<f64>,
    /// Exact phantom the data was generated from, length `grid.dim()`.
    pub exact: Vec<f64>,
    /// Standard deviation of the Gaussian measurement noise.
    pub noise_std: f64,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("shape error in {path}: {message}")]
    Shape { path: String, message: String },

    #[error("value error in {path}: {message}")]
    Value { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Raw CSV serde structs (private)
// ---------------------------------------------------------------------------

/// One COO entry of the operator file (`row,col,value` header).
#[derive(Debug, Deserialize)]
struct RawTriplet {
    row: usize,
    col: usize,
    value: f64,
}

/// One entry of a vector file (`value` header).
#[derive(Debug, Deserialize)]
struct RawValue {
    value: f64,
}

// ---------------------------------------------------------------------------
// Reader-based loaders (private, enable testing without temp files)
// ---------------------------------------------------------------------------

fn load_triplets_from_reader<R: Read>(
    rdr: R,
    nrows: usize,
    ncols: usize,
    path: &str,
) -> Result<Vec<(usize, usize, f64)>, DataError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut triplets = Vec::new();
    for result in reader.deserialize::<RawTriplet>() {
        let raw = result.map_err(|e| DataError::Csv {
            path: path.to_string(),
            source: e,
        })?;
        if raw.row >= nrows || raw.col >= ncols {
            return Err(DataError::Shape {
                path: path.to_string(),
                message: format!(
                    "entry ({},{}) outside operator shape {}x{}",
                    raw.row, raw.col, nrows, ncols
                ),
            });
        }
        if !raw.value.is_finite() {
            return Err(DataError::Value {
                path: path.to_string(),
                message: format!("non-finite entry at ({},{})", raw.row, raw.col),
            });
        }
        triplets.push((raw.row, raw.col, raw.value));
    }
    if triplets.is_empty() {
        return Err(DataError::Shape {
            path: path.to_string(),
            message: "operator file contains no entries".into(),
        });
    }
    Ok(triplets)
}

fn load_vector_from_reader<R: Read>(
    rdr: R,
    expected_len: usize,
    path: &str,
) -> Result<Vec<f64>, DataError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut values = Vec::with_capacity(expected_len);
    for result in reader.deserialize::<RawValue>() {
        let raw = result.map_err(|e| DataError::Csv {
            path: path.to_string(),
            source: e,
        })?;
        if !raw.value.is_finite() {
            return Err(DataError::Value {
                path: path.to_string(),
                message: format!("non-finite entry at index {}", values.len()),
            });
        }
        values.push(raw.value);
    }
    if values.len() != expected_len {
        return Err(DataError::Shape {
            path: path.to_string(),
            message: format!("expected {} entries, found {}", expected_len, values.len()),
        });
    }
    Ok(values)
}

// ---------------------------------------------------------------------------
// File-based loaders
// ---------------------------------------------------------------------------

fn open(path: &str) -> Result<std::fs::File, DataError> {
    std::fs::File::open(path).map_err(|e| DataError::Io {
        path: path.to_string(),
        source: e,
    })
}

/// Load the forward operator from a COO triplet CSV and scale it by `dx`.
pub fn load_operator(path: &str, grid: &GridConfig) -> Result<CsrMatrix, DataError> {
    let triplets = load_triplets_from_reader(open(path)?, grid.sino_len(), grid.dim(), path)?;
    let mut operator = CsrMatrix::from_triplets(grid.sino_len(), grid.dim(), &triplets);
    operator.scale(grid.dx());
    Ok(operator)
}

/// Load a single-column vector CSV with the given expected length.
pub fn load_vector(path: &str, expected_len: usize) -> Result<Vec<f64>, DataError> {
    load_vector_from_reader(open(path)?, expected_len, path)
}

/// Load the full dataset named by the config, relative to the working dir.
pub fn load_dataset(config: &Config) -> Result<Dataset, DataError> {
    load_dataset_from(Path::new("."), config)
}

/// Load the full dataset with data paths resolved against `base_dir`.
pub fn load_dataset_from(base_dir: &Path, config: &Config) -> Result<Dataset, DataError> {
    let grid = config.grid.clone();
    let resolve = |rel: &str| base_dir.join(rel).to_string_lossy().into_owned();

    let operator = load_operator(&resolve(&config.data.operator), &grid)?;
    let sinogram = load_vector(&resolve(&config.data.sinogram), grid.sino_len())?;
    let exact = load_vector(&resolve(&config.data.exact), grid.dim())?;

    Ok(Dataset {
        grid,
        operator,
        sinogram,
        exact,
        noise_std: config.noise.std,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
