use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use csv::ReaderBuilder;
use log::info;

use crate::fileformat::io::{open_text_reader, read_one_col};
use crate::fileformat::{CountMatrix, CountRecord, FeatureObservation, Features};
use crate::runtime::Error;
use crate::utils::expand_and_resolve_path;

pub const DEFAULT_BARCODE_COLUMN: &str = "Barcode";
pub const DEFAULT_FEATURE_COLUMN: &str = "geneID";

#[derive(Args)]
pub struct CountMatrixCMD {
    /// Long-format TSV with a header, one row per observation or per (barcode, feature) count
    #[arg(short = 'i', long = "table", value_parser)]
    pub path_table: PathBuf,

    /// Feature catalog; gene_id, gene_name and optional gene_type columns
    #[arg(short = 'f', long = "features", value_parser)]
    pub path_features: PathBuf,

    /// Optional list of barcodes to use as columns, one per line
    #[arg(short = 'b', long = "barcodes", value_parser)]
    pub path_barcodes: Option<PathBuf>,

    #[arg(long = "barcode-column", default_value = DEFAULT_BARCODE_COLUMN)]
    pub barcode_column: String,

    #[arg(long = "feature-column", default_value = DEFAULT_FEATURE_COLUMN)]
    pub feature_column: String,

    /// Column holding counts. Without it, every row counts as one
    #[arg(long = "value-column")]
    pub value_column: Option<String>,

    #[arg(short = 'o', long = "outdir", value_parser)]
    pub path_out: PathBuf,
}

impl CountMatrixCMD {
    pub fn try_execute(&mut self) -> Result<()> {
        CountMatrixFromTable::run(&CountMatrixParams {
            path_table: expand_and_resolve_path(&self.path_table)?,
            path_features: expand_and_resolve_path(&self.path_features)?,
            path_barcodes: self
                .path_barcodes
                .as_ref()
                .map(expand_and_resolve_path)
                .transpose()?,
            barcode_column: self.barcode_column.clone(),
            feature_column: self.feature_column.clone(),
            value_column: self.value_column.clone(),
            path_out: self.path_out.clone(),
        })?;

        log::info!("CountMatrix has finished succesfully");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CountMatrixParams {
    pub path_table: PathBuf,
    pub path_features: PathBuf,
    pub path_barcodes: Option<PathBuf>,
    pub barcode_column: String,
    pub feature_column: String,
    pub value_column: Option<String>,
    pub path_out: PathBuf,
}

pub struct CountMatrixFromTable {}

impl CountMatrixFromTable {
    pub fn run(params: &CountMatrixParams) -> Result<CountMatrix> {
        let features = Arc::new(Features::from_tsv(&params.path_features)?);
        let barcodes = params
            .path_barcodes
            .as_ref()
            .map(read_one_col)
            .transpose()?;

        let rows = read_long_table(params)?;
        info!("Read {} rows from {}", rows.len(), params.path_table.display());

        let matrix = if params.value_column.is_some() {
            let records: Vec<CountRecord> = rows
                .into_iter()
                .map(|(barcode, gene_id, count)| CountRecord {
                    barcode,
                    gene_id,
                    count,
                })
                .collect();
            CountMatrix::from_dataframe(&records, features, barcodes)?
        } else {
            let observations: Vec<FeatureObservation> = rows
                .into_iter()
                .map(|(barcode, gene_id, _)| FeatureObservation { barcode, gene_id })
                .collect();
            let barcodes = barcodes.unwrap_or_else(|| {
                let mut seen = std::collections::HashSet::new();
                observations
                    .iter()
                    .filter(|o| seen.insert(o.barcode.as_str()))
                    .map(|o| o.barcode.clone())
                    .collect()
            });
            CountMatrix::dataframe_to_matrix(&observations, features, barcodes)?
        };

        info!("{}", matrix);
        matrix.to_matrix_dir(&params.path_out)?;
        Ok(matrix)
    }
}

/// (barcode, feature, count) per row; count is 1 without a value column
fn read_long_table(params: &CountMatrixParams) -> Result<Vec<(String, String, u32)>> {
    let path: &Path = &params.path_table;
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .quoting(false)
        .from_reader(open_text_reader(path)?);

    let headers = reader.headers()?.clone();
    let find = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            Error::file_not_valid(path, Some(format!("no column named '{}'", name)))
        })
    };
    let bc_col = find(&params.barcode_column)?;
    let feature_col = find(&params.feature_column)?;
    let value_col = params.value_column.as_deref().map(find).transpose()?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let field = |col: usize| {
            record.get(col).ok_or_else(|| {
                Error::parse_error(format!("{} line {}", path.display(), i + 2), Some("too few columns"))
            })
        };
        let count = match value_col {
            Some(col) => field(col)?.parse::<u32>().map_err(|e| {
                Error::parse_error(
                    format!("{} line {}", path.display(), i + 2),
                    Some(e.to_string()),
                )
            })?,
            None => 1,
        };
        rows.push((field(bc_col)?.to_string(), field(feature_col)?.to_string(), count));
    }
    Ok(rows)
}
