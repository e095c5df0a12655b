use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::debug;
use seq_io::fastq::Reader as FastqReader;

use crate::runtime::Error;

pub type BoxedFastqReader = FastqReader<Box<dyn std::io::Read>>;

/// Open a plain or compressed FASTQ file
pub fn open_fastq<P: AsRef<Path>>(path: P) -> anyhow::Result<BoxedFastqReader> {
    let path = path.as_ref();
    let opened_handle = File::open(path).map_err(|_| Error::file_not_found(path))?;

    let (reader, compression) = niffler::get_reader(Box::new(opened_handle))
        .with_context(|| format!("Could not open fastq file {}", path.display()))?;

    debug!(
        "Opened file {} with compression {:?}",
        path.display(),
        compression
    );
    Ok(FastqReader::new(reader))
}

/// Split a comma-separated list of files, e.g. several R1 lanes
pub fn split_file_list(list: &str) -> Vec<PathBuf> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/**
 * Parse a read name of the form `<barcode>_<umi>_<index>[_...]`, as written by the
 * barcode step. The index is the 1-based position of the read in the original
 * R1/R2 files. Anything after the first whitespace is ignored
 */
pub fn parse_read_name(head: &[u8]) -> Result<(&[u8], u64), Error> {
    let head = head.strip_prefix(b"@").unwrap_or(head);
    let id = head
        .split(|b| b.is_ascii_whitespace())
        .next()
        .unwrap_or(head);
    let mut splitter = id.split(|b| *b == b'_');
    let barcode = splitter.next();
    let _umi = splitter.next();
    let index = splitter.next();

    match (barcode, index) {
        (Some(barcode), Some(index)) if !barcode.is_empty() => {
            let index = std::str::from_utf8(index)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| bad_read_name(id))?;
            Ok((barcode, index))
        }
        _ => Err(bad_read_name(id)),
    }
}

fn bad_read_name(id: &[u8]) -> Error {
    Error::parse_error(
        "read name",
        Some(format!(
            "expected <barcode>_<umi>_<index>, got '{}'",
            String::from_utf8_lossy(id)
        )),
    )
}

/// Plain-text FASTQ output for one tag
pub struct FastqWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    num_written: u64,
}
impl FastqWriter {
    pub fn new(path: PathBuf) -> anyhow::Result<FastqWriter> {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create fastq output file {}", path.display()))?;
        Ok(FastqWriter {
            path,
            writer: BufWriter::new(file),
            num_written: 0,
        })
    }

    /// Write the record verbatim, header comment included
    pub fn write<R: seq_io::fastq::Record>(&mut self, record: &R) -> anyhow::Result<()> {
        write_fastq_read(&mut self.writer, record.head(), record.seq(), record.qual())?;
        self.num_written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> anyhow::Result<u64> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        Ok(self.num_written)
    }
}

////////// Write one FASTQ read
fn write_fastq_read<W: Write>(
    writer: &mut W,
    head: &[u8],
    seq: &[u8],
    qual: &[u8],
) -> std::io::Result<()> {
    writer.write_all(b"@")?;
    writer.write_all(head)?;
    writer.write_all(b"\n")?;
    writer.write_all(seq)?;
    writer.write_all(b"\n+\n")?;
    writer.write_all(qual)?;
    writer.write_all(b"\n")?;
    Ok(())
}
