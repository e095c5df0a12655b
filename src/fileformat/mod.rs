pub mod bam;
pub mod constants;
pub mod count_matrix;
pub mod fastq;
pub mod features;
pub mod io;
pub mod mtx;
pub mod tag_table;
pub mod vdj;

pub use count_matrix::CountMatrix;
pub use count_matrix::CountRecord;
pub use count_matrix::FeatureObservation;
pub use count_matrix::get_matrix_file_path;

pub use features::Features;

pub use tag_table::TagBarcodes;

pub use vdj::SeqType;
pub use vdj::VdjTable;
