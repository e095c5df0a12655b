use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use rust_htslib::bam;
use rust_htslib::bam::record::{Aux, Record as BamRecord};

use crate::runtime::Error;

/// Cell barcode of a record, if the record carries the tag as a string
pub fn get_cell_barcode<'a>(record: &'a BamRecord, tag: &[u8]) -> anyhow::Result<Option<&'a str>> {
    match record.aux(tag) {
        Ok(Aux::String(bc)) => Ok(Some(bc)),
        Ok(_) => bail!(
            "{} tag of read {} holds non-string data",
            String::from_utf8_lossy(tag),
            String::from_utf8_lossy(record.qname())
        ),
        Err(_) => Ok(None),
    }
}

pub fn open_bam<P: AsRef<Path>>(path: P) -> anyhow::Result<bam::Reader> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::file_not_found(path).into());
    }
    bam::Reader::from_path(path).with_context(|| format!("Could not open BAM file {}", path.display()))
}

/// BAM output reusing the header of an input file
pub fn create_bam_writer(path: &PathBuf, header: &bam::HeaderView) -> anyhow::Result<bam::Writer> {
    let header = bam::Header::from_template(header);
    bam::Writer::from_path(path, &header, bam::Format::Bam)
        .with_context(|| format!("Could not create BAM file {}", path.display()))
}


#[cfg(test)]
mod tests {
    use super::testdata::*;
    use super::*;
    use rust_htslib::bam::Read;

    #[test]
    fn test_get_cell_barcode() {
        let rec = make_record("r1", Some("AAAC-1"));
        assert_eq!(get_cell_barcode(&rec, b"CB").unwrap(), Some("AAAC-1"));
        assert_eq!(get_cell_barcode(&rec, b"XX").unwrap(), None);

        let mut rec_int = make_record("r2", None);
        rec_int.push_aux(b"CB", Aux::I32(5)).unwrap();
        assert!(get_cell_barcode(&rec_int, b"CB").is_err());
    }

    #[test]
    fn test_writer_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.bam");
        {
            let mut w = bam::Writer::from_path(&input, &test_header(), bam::Format::Bam).unwrap();
            w.write(&make_record("r1", Some("AAAC-1"))).unwrap();
        }

        let reader = open_bam(&input).unwrap();
        let output = dir.path().join("out.bam");
        {
            let mut w = create_bam_writer(&output, reader.header()).unwrap();
            w.write(&make_record("r2", None)).unwrap();
        }

        let out = open_bam(&output).unwrap();
        assert_eq!(out.header().target_names(), vec![&b"chr1"[..]]);
        assert_eq!(out.header().target_len(0), Some(10000));

        assert!(matches!(
            open_bam(dir.path().join("missing.bam"))
                .unwrap_err()
                .downcast_ref::<Error>(),
            Some(Error::FileNotFound { .. })
        ));
    }
}
