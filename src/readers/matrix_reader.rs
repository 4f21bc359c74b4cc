//! Binary matrix container access.
//!
//! Two container formats are supported, chosen by file extension:
//!
//! - `.npz`: a zip of named NumPy arrays, read through `ndarray-npy`. This is
//!   the common hand-off format for data exported from scientific Python.
//! - `.nc`: NetCDF classic, read through the pure-Rust `netcdf3` crate.
//!
//! Both expose the same surface: named variables, each readable as a 2-D
//! `f64` matrix. Variable names starting with `_` are treated as private and
//! skipped when inferring a default variable.

use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use ndarray_npy::NpzReader;

use crate::error::{FluxError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerFormat {
    /// Flat archive of named arrays (`.npz`).
    ArrayArchive,
    /// Hierarchical NetCDF classic container (`.nc`).
    NetCdf,
}

/// Reads named 2-D numeric variables out of a matrix container file.
///
/// The reader holds only the path; each call opens the file for the duration
/// of the read, so no explicit close is required.
#[derive(Debug)]
pub struct MatrixReader {
    path: PathBuf,
    format: ContainerFormat,
}

impl MatrixReader {
    /// Opens a container, selecting the reader by file extension.
    pub fn open(path: &Path) -> Result<Self> {
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("npz") => ContainerFormat::ArrayArchive,
            Some("nc") => ContainerFormat::NetCdf,
            _ => {
                return Err(FluxError::FileFormat(format!(
                    "only *.npz and *.nc matrix files are accepted: {}",
                    path.display()
                )))
            }
        };
        if !path.exists() {
            return Err(FluxError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}", path.display()),
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            format,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lists the container's variable names, in container order.
    pub fn variable_names(&self) -> Result<Vec<String>> {
        match self.format {
            ContainerFormat::ArrayArchive => {
                let mut npz = NpzReader::new(File::open(&self.path)?)?;
                // Some writers keep the .npy suffix on archive member names.
                Ok(npz
                    .names()?
                    .into_iter()
                    .map(|n| n.trim_end_matches(".npy").to_string())
                    .collect())
            }
            ContainerFormat::NetCdf => {
                let reader = netcdf3::FileReader::open(&self.path)?;
                Ok(reader.data_set().get_var_names())
            }
        }
    }

    /// First variable whose name does not start with `_`.
    pub fn infer_variable(&self) -> Result<String> {
        self.variable_names()?
            .into_iter()
            .find(|name| !name.starts_with('_'))
            .ok_or_else(|| FluxError::VariableNotFound {
                name: "<any>".to_string(),
                path: self.path.display().to_string(),
            })
    }

    /// Reads a variable as a 2-D `f64` matrix.
    ///
    /// When `var_name` is `None` the variable is inferred. Returns the
    /// resolved name together with the matrix. 1-D variables come back as a
    /// single-column matrix; `f32` data is widened.
    pub fn read(&self, var_name: Option<&str>) -> Result<(String, Array2<f64>)> {
        let name = match var_name {
            Some(name) => name.to_string(),
            None => self.infer_variable()?,
        };
        let matrix = match self.format {
            ContainerFormat::ArrayArchive => self.read_npz(&name)?,
            ContainerFormat::NetCdf => self.read_netcdf(&name)?,
        };
        Ok((name, matrix))
    }

    fn missing_var(&self, name: &str) -> FluxError {
        FluxError::VariableNotFound {
            name: name.to_string(),
            path: self.path.display().to_string(),
        }
    }

    fn read_npz(&self, name: &str) -> Result<Array2<f64>> {
        let mut npz = NpzReader::new(File::open(&self.path)?)?;
        if !npz
            .names()?
            .iter()
            .any(|n| n.trim_end_matches(".npy") == name)
        {
            return Err(self.missing_var(name));
        }
        // Arrays may have been saved as f64 or f32, 2-D or 1-D.
        if let Ok(matrix) = npz.by_name::<ndarray::OwnedRepr<f64>, ndarray::Ix2>(name) {
            return Ok(matrix);
        }
        if let Ok(matrix) = npz.by_name::<ndarray::OwnedRepr<f32>, ndarray::Ix2>(name) {
            return Ok(matrix.mapv(f64::from));
        }
        if let Ok(column) = npz.by_name::<ndarray::OwnedRepr<f64>, ndarray::Ix1>(name) {
            return Ok(column_matrix(column));
        }
        if let Ok(column) = npz.by_name::<ndarray::OwnedRepr<f32>, ndarray::Ix1>(name) {
            return Ok(column_matrix(column.mapv(f64::from)));
        }
        Err(FluxError::FileFormat(format!(
            "variable '{}' in {} is not a 1-D or 2-D float array",
            name,
            self.path.display()
        )))
    }

    fn read_netcdf(&self, name: &str) -> Result<Array2<f64>> {
        let mut reader = netcdf3::FileReader::open(&self.path)?;

        let (dim_names, data_type) = {
            let var = reader
                .data_set()
                .get_var(name)
                .ok_or_else(|| self.missing_var(name))?;
            (var.dim_names(), var.data_type())
        };

        let mut sizes = Vec::with_capacity(dim_names.len());
        for dim_name in &dim_names {
            let size = reader
                .data_set()
                .get_dim(dim_name)
                .map(|d| d.size())
                .ok_or_else(|| {
                    FluxError::FileFormat(format!("dimension '{}' missing from container", dim_name))
                })?;
            sizes.push(size);
        }

        let values: Vec<f64> = match data_type {
            netcdf3::DataType::F64 => reader.read_var_f64(name)?,
            netcdf3::DataType::F32 => reader
                .read_var_f32(name)?
                .into_iter()
                .map(f64::from)
                .collect(),
            other => {
                return Err(FluxError::FileFormat(format!(
                    "variable '{}' has unsupported element type {:?}",
                    name, other
                )))
            }
        };

        let (rows, cols) = match sizes.as_slice() {
            [rows] => (*rows, 1),
            [rows, cols] => (*rows, *cols),
            _ => {
                return Err(FluxError::FileFormat(format!(
                    "variable '{}' has {} dimensions, expected 1 or 2",
                    name,
                    sizes.len()
                )))
            }
        };

        Array2::from_shape_vec((rows, cols), values).map_err(|_| FluxError::ShapeMismatch {
            expected: rows * cols,
            found: 0,
        })
    }
}

fn column_matrix(column: Array1<f64>) -> Array2<f64> {
    let len = column.len();
    column
        .into_shape((len, 1))
        .expect("reshaping a 1-D array into a column cannot fail")
}
