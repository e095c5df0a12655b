use std::io::Write;
use std::path::Path;

use sprs::io::read_matrix_market_from_bufread;
use sprs::{CsMat, TriMat};

use super::io::{create_text_writer, open_text_reader};
use crate::runtime::Error;

pub const MTX_HEADER: &str = "%%MatrixMarket matrix coordinate integer general";

/// Read a coordinate Matrix Market file (plain or compressed) into CSC storage.
/// Repeated coordinates are summed
pub fn read_mtx<P: AsRef<Path>>(path: P) -> anyhow::Result<CsMat<u32>> {
    let path = path.as_ref();
    let mut reader = open_text_reader(path)?;
    let tri: TriMat<u32> = read_matrix_market_from_bufread::<u32, usize, _>(&mut reader)
        .map_err(|e| Error::file_not_valid(path, Some(e.to_string())))?;
    Ok(tri.to_csc())
}

/// Write a CSC matrix as coordinate Matrix Market, column by column. 1-based indices
pub fn write_mtx<P: AsRef<Path>>(path: P, matrix: &CsMat<u32>) -> anyhow::Result<()> {
    let mut writer = create_text_writer(path)?;
    writeln!(writer, "{}", MTX_HEADER)?;
    writeln!(writer, "%")?;
    writeln!(writer, "{} {} {}", matrix.rows(), matrix.cols(), matrix.nnz())?;

    for (col, column) in matrix.outer_iterator().enumerate() {
        for (row, value) in column.iter() {
            writeln!(writer, "{} {} {}", row + 1, col + 1, value)?;
        }
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_real_and_sum_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("matrix.mtx");
        std::fs::write(
            &p,
            "%%MatrixMarket matrix coordinate real general\n% comment\n3 2 3\n1 1 2.0\n3 2 5\n1 1 1\n",
        )
        .unwrap();

        let m = read_mtx(&p).unwrap();
        assert!(m.is_csc());
        assert_eq!((m.rows(), m.cols()), (3, 2));
        assert_eq!(m.get(0, 0), Some(&3));
        assert_eq!(m.get(2, 1), Some(&5));
        assert_eq!(m.get(1, 1), None);
    }

    #[test]
    fn test_rejects_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("matrix.mtx");

        std::fs::write(&p, "%%MatrixMarket matrix coordinate integer general\n2 2 1\n1 1 abc\n").unwrap();
        assert!(matches!(
            read_mtx(&p).unwrap_err().downcast_ref::<Error>(),
            Some(Error::FileNotValid { .. })
        ));

        std::fs::write(&p, "%%MatrixMarket matrix array integer general\n2 2\n").unwrap();
        assert!(read_mtx(&p).is_err());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("matrix.mtx.gz");

        let mut tri = TriMat::new((4, 3));
        tri.add_triplet(0, 0, 1u32);
        tri.add_triplet(3, 0, 7);
        tri.add_triplet(2, 2, 4);
        let m: CsMat<u32> = tri.to_csc();

        write_mtx(&p, &m).unwrap();
        let back = read_mtx(&p).unwrap();
        assert_eq!(back, m);
    }
}
