use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::info;

use crate::fileformat::CountMatrix;
use crate::utils::expand_and_resolve_path;

#[derive(Args)]
pub struct ConcatMatrixCMD {
    /// Matrix directory whose features come first
    #[arg(long = "matrix-dir", value_parser)]
    pub path_first: PathBuf,

    /// Matrix directory with the same barcodes, whose features are appended
    #[arg(long = "other-matrix-dir", value_parser)]
    pub path_second: PathBuf,

    #[arg(short = 'o', long = "outdir", value_parser)]
    pub path_out: PathBuf,
}

impl ConcatMatrixCMD {
    pub fn try_execute(&mut self) -> Result<()> {
        ConcatMatrix::run(&ConcatMatrixParams {
            path_first: expand_and_resolve_path(&self.path_first)?,
            path_second: expand_and_resolve_path(&self.path_second)?,
            path_out: self.path_out.clone(),
        })?;

        log::info!("ConcatMatrix has finished succesfully");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConcatMatrixParams {
    pub path_first: PathBuf,
    pub path_second: PathBuf,
    pub path_out: PathBuf,
}

pub struct ConcatMatrix {}

impl ConcatMatrix {
    pub fn run(params: &ConcatMatrixParams) -> Result<CountMatrix> {
        let first = CountMatrix::from_matrix_dir(&params.path_first)?;
        let second = CountMatrix::from_matrix_dir(&params.path_second)?;

        let merged = first.concat_by_barcodes(&second)?;
        info!("Merged matrix: {}", merged);
        merged.to_matrix_dir(&params.path_out)?;
        Ok(merged)
    }
}
