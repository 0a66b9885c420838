//! Matrix storage schemes
//!
//! | scheme | layout |
//! |---|---|
//! | CDS   | compressed diagonals, general |
//! | CRS   | compressed rows (CSR), general |
//! | USPS  | upper symmetric, packed column by column |
//! | USB1S | upper symmetric, variable band (skyline) in one array |
//! | USB2S | upper symmetric, fixed half bandwidth in a 2D array |
//!
//! The symmetric schemes only keep the upper triangle, so matrices stored
//! with them must be symmetric.

use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};
use crate::math::{csr_from_dense, half_bandwidth, is_symmetric, sparse_matvec, sparse_transpose_matvec};
use crate::math::{Mat, Vec as FEVec};

const SYMMETRY_TOL: f64 = 1e-10;

/// Layout used to hold the system matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageType {
    /// CDS
    CompressedDiagonal,
    /// CRS
    CompressedRow,
    /// USPS
    UpperSymmetricPacked,
    /// USB1S
    UpperSymmetricBanded1D,
    /// USB2S
    UpperSymmetricBanded2D,
}

impl StorageType {
    pub const ALL: [StorageType; 5] = [
        StorageType::CompressedDiagonal,
        StorageType::CompressedRow,
        StorageType::UpperSymmetricPacked,
        StorageType::UpperSymmetricBanded1D,
        StorageType::UpperSymmetricBanded2D,
    ];

    pub fn abbreviation(self) -> &'static str {
        match self {
            StorageType::CompressedDiagonal => "CDS",
            StorageType::CompressedRow => "CRS",
            StorageType::UpperSymmetricPacked => "USPS",
            StorageType::UpperSymmetricBanded1D => "USB1S",
            StorageType::UpperSymmetricBanded2D => "USB2S",
        }
    }

    /// Whether only the upper triangle is kept
    pub fn is_symmetric(self) -> bool {
        !matches!(
            self,
            StorageType::CompressedDiagonal | StorageType::CompressedRow
        )
    }
}

/// Compressed diagonal storage
///
/// `values[d][i]` holds `a[i][i + offsets[d]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalStorage {
    n: usize,
    offsets: Vec<isize>,
    values: Vec<Vec<f64>>,
}

/// Upper triangle packed column by column: `a[i][j]` (i <= j) at `j(j+1)/2 + i`
#[derive(Debug, Clone, PartialEq)]
pub struct PackedStorage {
    n: usize,
    values: Vec<f64>,
}

/// Skyline storage of the upper triangle
///
/// Column `j` holds rows `j - h_j ..= j` contiguously, starting at
/// `col_start[j]`; `h_j = col_start[j + 1] - col_start[j] - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct SkylineStorage {
    n: usize,
    col_start: Vec<usize>,
    values: Vec<f64>,
}

/// Fixed-bandwidth storage of the upper triangle, `band[(i, j - i)] = a[i][j]`
#[derive(Debug, Clone, PartialEq)]
pub struct BandStorage {
    bandwidth: usize,
    band: Mat,
}

/// A square matrix held in one of the storage schemes
#[derive(Debug, Clone)]
pub enum StoredMatrix {
    Diagonal(DiagonalStorage),
    Row(CsrMatrix<f64>),
    Packed(PackedStorage),
    Skyline(SkylineStorage),
    Band(BandStorage),
}

impl DiagonalStorage {
    fn from_dense(a: &Mat) -> Self {
        let n = a.nrows();
        let mut offsets = Vec::new();
        let mut values = Vec::new();
        for off in -(n as isize - 1)..=(n as isize - 1) {
            let mut diag = vec![0.0; n];
            let mut nonzero = false;
            for (i, slot) in diag.iter_mut().enumerate() {
                let j = i as isize + off;
                if j >= 0 && (j as usize) < n {
                    *slot = a[(i, j as usize)];
                    nonzero |= *slot != 0.0;
                }
            }
            if nonzero || off == 0 {
                offsets.push(off);
                values.push(diag);
            }
        }
        Self { n, offsets, values }
    }

    pub fn offsets(&self) -> &[isize] {
        &self.offsets
    }

    fn get(&self, i: usize, j: usize) -> f64 {
        let off = j as isize - i as isize;
        match self.offsets.binary_search(&off) {
            Ok(d) => self.values[d][i],
            Err(_) => 0.0,
        }
    }

    fn matvec(&self, x: &FEVec, transpose: bool) -> FEVec {
        let mut y = FEVec::zeros(self.n);
        for (d, &off) in self.offsets.iter().enumerate() {
            for i in 0..self.n {
                let j = i as isize + off;
                if j < 0 || j as usize >= self.n {
                    continue;
                }
                let j = j as usize;
                let v = self.values[d][i];
                if transpose {
                    y[j] += v * x[i];
                } else {
                    y[i] += v * x[j];
                }
            }
        }
        y
    }
}

impl PackedStorage {
    fn from_dense(a: &Mat) -> Self {
        let n = a.nrows();
        let mut values = Vec::with_capacity(n * (n + 1) / 2);
        for j in 0..n {
            for i in 0..=j {
                values.push(a[(i, j)]);
            }
        }
        Self { n, values }
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> f64 {
        let (i, j) = if i <= j { (i, j) } else { (j, i) };
        self.values[j * (j + 1) / 2 + i]
    }
}

impl SkylineStorage {
    fn from_dense(a: &Mat) -> Self {
        let n = a.nrows();
        let mut col_start = Vec::with_capacity(n + 1);
        let mut values = Vec::new();
        for j in 0..n {
            col_start.push(values.len());
            let first = (0..j).find(|&i| a[(i, j)] != 0.0).unwrap_or(j);
            for i in first..=j {
                values.push(a[(i, j)]);
            }
        }
        col_start.push(values.len());
        Self {
            n,
            col_start,
            values,
        }
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    /// First stored row of column `j`
    #[inline]
    pub fn first_row(&self, j: usize) -> usize {
        j + 1 - (self.col_start[j + 1] - self.col_start[j])
    }

    /// Stored part of column `j`, rows `first_row(j) ..= j`
    #[inline]
    pub fn column(&self, j: usize) -> &[f64] {
        &self.values[self.col_start[j]..self.col_start[j + 1]]
    }

    #[inline]
    pub(crate) fn column_mut(&mut self, j: usize) -> &mut [f64] {
        let (s, e) = (self.col_start[j], self.col_start[j + 1]);
        &mut self.values[s..e]
    }

    /// Number of stored entries (the profile)
    pub fn profile(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (i, j) = if i <= j { (i, j) } else { (j, i) };
        let first = self.first_row(j);
        if i < first {
            0.0
        } else {
            self.values[self.col_start[j] + i - first]
        }
    }
}

impl BandStorage {
    fn from_dense(a: &Mat) -> Self {
        let n = a.nrows();
        let bandwidth = half_bandwidth(a);
        let band = Mat::from_fn(n, bandwidth + 1, |i, k| {
            if i + k < n {
                a[(i, i + k)]
            } else {
                0.0
            }
        });
        Self { bandwidth, band }
    }

    pub fn bandwidth(&self) -> usize {
        self.bandwidth
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> f64 {
        let (i, j) = if i <= j { (i, j) } else { (j, i) };
        if j - i > self.bandwidth {
            0.0
        } else {
            self.band[(i, j - i)]
        }
    }
}

impl StoredMatrix {
    /// Store a dense square matrix in the given layout
    pub fn from_dense(storage: StorageType, a: &Mat) -> FEAResult<Self> {
        if a.nrows() != a.ncols() {
            return Err(FEAError::incompatible(format!(
                "system matrix must be square, got {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }
        if storage.is_symmetric() && !is_symmetric(a, SYMMETRY_TOL) {
            return Err(FEAError::incompatible(format!(
                "{} storage requires a symmetric matrix",
                storage.abbreviation()
            )));
        }
        Ok(match storage {
            StorageType::CompressedDiagonal => StoredMatrix::Diagonal(DiagonalStorage::from_dense(a)),
            StorageType::CompressedRow => StoredMatrix::Row(csr_from_dense(a)),
            StorageType::UpperSymmetricPacked => StoredMatrix::Packed(PackedStorage::from_dense(a)),
            StorageType::UpperSymmetricBanded1D => {
                StoredMatrix::Skyline(SkylineStorage::from_dense(a))
            }
            StorageType::UpperSymmetricBanded2D => StoredMatrix::Band(BandStorage::from_dense(a)),
        })
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            StoredMatrix::Diagonal(_) => StorageType::CompressedDiagonal,
            StoredMatrix::Row(_) => StorageType::CompressedRow,
            StoredMatrix::Packed(_) => StorageType::UpperSymmetricPacked,
            StoredMatrix::Skyline(_) => StorageType::UpperSymmetricBanded1D,
            StoredMatrix::Band(_) => StorageType::UpperSymmetricBanded2D,
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            StoredMatrix::Diagonal(s) => s.n,
            StoredMatrix::Row(csr) => csr.nrows(),
            StoredMatrix::Packed(s) => s.n,
            StoredMatrix::Skyline(s) => s.n,
            StoredMatrix::Band(s) => s.band.nrows(),
        }
    }

    /// Entry `a[i][j]`
    pub fn get(&self, i: usize, j: usize) -> f64 {
        match self {
            StoredMatrix::Diagonal(s) => s.get(i, j),
            StoredMatrix::Row(csr) => csr
                .get_entry(i, j)
                .map(|e| e.into_value())
                .unwrap_or(0.0),
            StoredMatrix::Packed(s) => s.get(i, j),
            StoredMatrix::Skyline(s) => s.get(i, j),
            StoredMatrix::Band(s) => s.get(i, j),
        }
    }

    /// y = A x
    pub fn matvec(&self, x: &FEVec) -> FEVec {
        match self {
            StoredMatrix::Diagonal(s) => s.matvec(x, false),
            StoredMatrix::Row(csr) => sparse_matvec(csr, x),
            _ => self.symmetric_matvec(x),
        }
    }

    /// y = A^T x
    pub fn transpose_matvec(&self, x: &FEVec) -> FEVec {
        match self {
            StoredMatrix::Diagonal(s) => s.matvec(x, true),
            StoredMatrix::Row(csr) => sparse_transpose_matvec(csr, x),
            _ => self.symmetric_matvec(x),
        }
    }

    fn symmetric_matvec(&self, x: &FEVec) -> FEVec {
        let n = self.dim();
        let mut y = FEVec::zeros(n);
        let mut visit = |i: usize, j: usize, v: f64| {
            y[i] += v * x[j];
            if i != j {
                y[j] += v * x[i];
            }
        };
        match self {
            StoredMatrix::Packed(s) => {
                for j in 0..n {
                    for i in 0..=j {
                        visit(i, j, s.get(i, j));
                    }
                }
            }
            StoredMatrix::Skyline(s) => {
                for j in 0..n {
                    let first = s.first_row(j);
                    for (k, &v) in s.column(j).iter().enumerate() {
                        visit(first + k, j, v);
                    }
                }
            }
            StoredMatrix::Band(s) => {
                for i in 0..n {
                    for k in 0..=s.bandwidth.min(n - 1 - i) {
                        visit(i, i + k, s.band[(i, k)]);
                    }
                }
            }
            StoredMatrix::Diagonal(_) | StoredMatrix::Row(_) => {}
        }
        y
    }

    pub fn diagonal(&self) -> FEVec {
        FEVec::from_fn(self.dim(), |i, _| self.get(i, i))
    }

    /// Export to compressed rows (full matrix, both triangles)
    pub fn to_csr(&self) -> CsrMatrix<f64> {
        match self {
            StoredMatrix::Row(csr) => csr.clone(),
            _ => csr_from_dense(&self.to_dense()),
        }
    }

    pub fn to_dense(&self) -> Mat {
        let n = self.dim();
        Mat::from_fn(n, n, |i, j| self.get(i, j))
    }
}
