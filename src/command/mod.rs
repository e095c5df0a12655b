pub mod concat_matrix;
pub mod count_matrix;
pub mod split_tag;

pub use split_tag::SplitTag;
pub use split_tag::SplitTagCMD;
pub use split_tag::SplitTagParams;
pub use split_tag::SplitTagReport;

pub use concat_matrix::ConcatMatrix;
pub use concat_matrix::ConcatMatrixCMD;
pub use concat_matrix::ConcatMatrixParams;

pub use count_matrix::CountMatrixCMD;
pub use count_matrix::CountMatrixFromTable;
pub use count_matrix::CountMatrixParams;
