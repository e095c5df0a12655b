use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use log::{debug, info};
use rustc_hash::FxHashMap;
use sprs::{CsMat, TriMat};

use super::constants::{BARCODE_FILE_NAME, FEATURE_FILE_NAME, MATRIX_FILE_NAME};
use super::features::Features;
use super::io::{create_text_writer, read_one_col};
use super::mtx::{read_mtx, write_mtx};
use crate::runtime::Error;

/// One entry of a long-format count table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountRecord {
    pub barcode: String,
    pub gene_id: String,
    pub count: u32,
}

/// One observation (read, UMI...) of a feature in a barcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureObservation {
    pub barcode: String,
    pub gene_id: String,
}

/**
 * Sparse count matrix with features as rows and barcodes as columns.
 *
 * Storage is CSC so that selecting barcodes is cheap. The feature catalog is shared
 * between a matrix and every matrix sliced from it.
 *
 * The whole matrix is held in memory; fine for filtered matrices of typical size.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct CountMatrix {
    features: Arc<Features>,
    barcodes: Vec<String>,
    matrix: CsMat<u32>,
}

impl CountMatrix {
    pub fn new(
        features: Arc<Features>,
        barcodes: Vec<String>,
        matrix: CsMat<u32>,
    ) -> Result<CountMatrix, Error> {
        if matrix.rows() != features.len() || matrix.cols() != barcodes.len() {
            return Err(Error::ShapeMismatch {
                rows: matrix.rows(),
                cols: matrix.cols(),
                n_features: features.len(),
                n_barcodes: barcodes.len(),
            });
        }
        let matrix = if matrix.is_csc() {
            matrix
        } else {
            matrix.to_csc()
        };
        Ok(CountMatrix {
            features,
            barcodes,
            matrix,
        })
    }

    /// Only load the barcodes of a matrix directory
    pub fn read_barcodes<P: AsRef<Path>>(matrix_dir: P) -> anyhow::Result<HashSet<String>> {
        let barcode_file = get_matrix_file_path(matrix_dir, BARCODE_FILE_NAME)?;
        Ok(read_one_col(&barcode_file)?.into_iter().collect())
    }

    pub fn from_matrix_dir<P: AsRef<Path>>(matrix_dir: P) -> anyhow::Result<CountMatrix> {
        let matrix_dir = matrix_dir.as_ref();
        info!("Reading matrix from {}", matrix_dir.display());

        let features_file = get_matrix_file_path(matrix_dir, FEATURE_FILE_NAME)?;
        let barcode_file = get_matrix_file_path(matrix_dir, BARCODE_FILE_NAME)?;
        let matrix_file = get_matrix_file_path(matrix_dir, MATRIX_FILE_NAME)?;

        let features = Features::from_tsv(&features_file)?;
        let barcodes = read_one_col(&barcode_file)?;
        let matrix = read_mtx(&matrix_file)
            .with_context(|| format!("Failed to read {}", matrix_file.display()))?;

        let cm = CountMatrix::new(Arc::new(features), barcodes, matrix)?;
        debug!("{}", cm);
        Ok(cm)
    }

    pub fn to_matrix_dir<P: AsRef<Path>>(&self, matrix_dir: P) -> anyhow::Result<()> {
        let matrix_dir = matrix_dir.as_ref();
        std::fs::create_dir_all(matrix_dir)
            .with_context(|| format!("Could not create directory {}", matrix_dir.display()))?;

        self.features.to_tsv(matrix_dir.join(FEATURE_FILE_NAME))?;

        let mut writer = create_text_writer(matrix_dir.join(BARCODE_FILE_NAME))?;
        for bc in &self.barcodes {
            writeln!(writer, "{}", bc)?;
        }
        writer.finish()?;

        write_mtx(matrix_dir.join(MATRIX_FILE_NAME), &self.matrix)?;
        Ok(())
    }

    /// Build a matrix from a long-format count table.
    ///
    /// Every feature of the catalog becomes a row, detected or not. Without `barcodes`,
    /// the columns are the distinct barcodes of the table in first-seen order; with
    /// `barcodes`, records of other barcodes are left out. Repeated (barcode, feature)
    /// pairs are summed.
    pub fn from_dataframe(
        records: &[CountRecord],
        features: Arc<Features>,
        barcodes: Option<Vec<String>>,
    ) -> Result<CountMatrix, Error> {
        let barcodes = barcodes.unwrap_or_else(|| {
            distinct_in_order(records.iter().map(|r| r.barcode.as_str()))
        });

        let feature_index = index_of(features.gene_id());
        let barcode_index = index_of(&barcodes);

        let mut tri = TriMat::with_capacity((features.len(), barcodes.len()), records.len());
        for r in records {
            let Some(&col) = barcode_index.get(r.barcode.as_str()) else {
                continue;
            };
            let row = *feature_index
                .get(r.gene_id.as_str())
                .ok_or_else(|| Error::UnknownFeature {
                    id: r.gene_id.clone(),
                })?;
            tri.add_triplet(row, col, r.count);
        }

        CountMatrix::new(features, barcodes, tri.to_csc())
    }

    /// Count how often each (barcode, feature) pair occurs over a fixed barcode and
    /// feature universe. Observations outside the barcode universe are ignored
    pub fn dataframe_to_matrix(
        observations: &[FeatureObservation],
        features: Arc<Features>,
        barcodes: Vec<String>,
    ) -> Result<CountMatrix, Error> {
        let feature_index = index_of(features.gene_id());
        let barcode_index = index_of(&barcodes);

        let mut counts: FxHashMap<(usize, usize), u32> = FxHashMap::default();
        for o in observations {
            let Some(&col) = barcode_index.get(o.barcode.as_str()) else {
                continue;
            };
            let row = *feature_index
                .get(o.gene_id.as_str())
                .ok_or_else(|| Error::UnknownFeature {
                    id: o.gene_id.clone(),
                })?;
            *counts.entry((row, col)).or_insert(0) += 1;
        }

        let mut tri = TriMat::with_capacity((features.len(), barcodes.len()), counts.len());
        for ((row, col), cnt) in counts {
            tri.add_triplet(row, col, cnt);
        }
        CountMatrix::new(features, barcodes, tri.to_csc())
    }

    /// Keep the given columns, in the given order
    pub fn slice_matrix(&self, indices: &[usize]) -> Result<CountMatrix, Error> {
        let n_cols = self.barcodes.len();
        let mut indptr = Vec::with_capacity(indices.len() + 1);
        let mut row_ind = Vec::new();
        let mut data = Vec::new();
        let mut barcodes = Vec::with_capacity(indices.len());

        indptr.push(0);
        for &col in indices {
            let column = self
                .matrix
                .outer_view(col)
                .ok_or(Error::IndexOutOfBounds {
                    index: col,
                    len: n_cols,
                })?;
            for (row, value) in column.iter() {
                row_ind.push(row);
                data.push(*value);
            }
            indptr.push(row_ind.len());
            barcodes.push(self.barcodes[col].clone());
        }

        let matrix = CsMat::new_csc((self.features.len(), indices.len()), indptr, row_ind, data);
        Ok(CountMatrix {
            features: Arc::clone(&self.features),
            barcodes,
            matrix,
        })
    }

    /// Stack the features of `other` below those of `self`. Both must have the
    /// same barcodes in the same order and no feature id in common
    pub fn concat_by_barcodes(&self, other: &CountMatrix) -> Result<CountMatrix, Error> {
        if self.barcodes != other.barcodes {
            return Err(Error::BarcodesMismatch {
                left: self.barcodes.len(),
                right: other.barcodes.len(),
            });
        }
        let shared = self.features.shared_ids(&other.features);
        if !shared.is_empty() {
            return Err(Error::DuplicatedFeatures { ids: shared });
        }

        let features = self.features.concat(&other.features);
        let row_offset = self.features.len();

        let mut indptr = Vec::with_capacity(self.barcodes.len() + 1);
        let mut row_ind = Vec::with_capacity(self.matrix.nnz() + other.matrix.nnz());
        let mut data = Vec::with_capacity(self.matrix.nnz() + other.matrix.nnz());
        indptr.push(0);
        for (upper, lower) in self
            .matrix
            .outer_iterator()
            .zip(other.matrix.outer_iterator())
        {
            for (row, value) in upper.iter() {
                row_ind.push(row);
                data.push(*value);
            }
            for (row, value) in lower.iter() {
                row_ind.push(row + row_offset);
                data.push(*value);
            }
            indptr.push(row_ind.len());
        }

        let matrix = CsMat::new_csc(
            (features.len(), self.barcodes.len()),
            indptr,
            row_ind,
            data,
        );
        CountMatrix::new(Arc::new(features), self.barcodes.clone(), matrix)
    }

    /// Column index of every barcode
    pub fn barcode_index(&self) -> HashMap<&str, usize> {
        index_of(&self.barcodes)
    }

    pub fn features(&self) -> &Arc<Features> {
        &self.features
    }

    pub fn barcodes(&self) -> &[String] {
        &self.barcodes
    }

    pub fn matrix(&self) -> &CsMat<u32> {
        &self.matrix
    }

    /// (features, barcodes)
    pub fn shape(&self) -> (usize, usize) {
        (self.matrix.rows(), self.matrix.cols())
    }
}

impl fmt::Display for CountMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (n_row, n_col) = self.shape();
        write!(
            f,
            "CountMatrix object\n {} x {} sparse matrix, {} non-zero",
            n_row,
            n_col,
            self.matrix.nnz()
        )
    }
}

/// Locate a file of a matrix directory, with or without .gz suffix
pub fn get_matrix_file_path<P: AsRef<Path>>(matrix_dir: P, file_name: &str) -> Result<PathBuf, Error> {
    let matrix_dir = matrix_dir.as_ref();
    let gz = matrix_dir.join(file_name);
    if gz.exists() {
        return Ok(gz);
    }
    if let Some(plain_name) = file_name.strip_suffix(".gz") {
        let plain = matrix_dir.join(plain_name);
        if plain.exists() {
            return Ok(plain);
        }
    }
    Err(Error::file_not_found_with_suggestion(
        gz,
        format!("Make sure {} exists in the matrix directory", file_name),
    ))
}

fn index_of<S: AsRef<str>>(list: &[S]) -> HashMap<&str, usize> {
    list.iter()
        .enumerate()
        .map(|(i, s)| (s.as_ref(), i))
        .collect()
}

fn distinct_in_order<'a>(it: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    it.filter(|s| seen.insert(*s)).map(String::from).collect()
}
