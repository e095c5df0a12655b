pub const FEATURE_FILE_NAME: &str = "features.tsv.gz";
pub const BARCODE_FILE_NAME: &str = "barcodes.tsv.gz";
pub const MATRIX_FILE_NAME: &str = "matrix.mtx.gz";

/// Suffix of per-sample filtered matrix directories
pub const FILTERED_MATRIX_DIR_SUFFIX: &str = "filtered";

/// Filtered matrix location below a match directory
pub const MATCH_DIR_MATRIX_SUBDIR: &str = "outs/filtered";

/// BAM aux tag holding the corrected cell barcode
pub const CELL_BARCODE_TAG: &[u8] = b"CB";

pub const PROGRESS_INTERVAL: u64 = 1_000_000;
