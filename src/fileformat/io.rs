use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;

use crate::runtime::Error;

/// Open a plain or compressed text file for reading. Compression is detected from the content
pub fn open_text_reader<P: AsRef<Path>>(path: P) -> anyhow::Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|_| Error::file_not_found(path))?;
    let (reader, compression) = niffler::get_reader(Box::new(file))
        .with_context(|| format!("Could not open {}", path.display()))?;
    debug!(
        "Opened file {} with compression {:?}",
        path.display(),
        compression
    );
    Ok(Box::new(BufReader::new(reader)))
}

/// Plain or gzip output. Call `finish` so that the gzip trailer is written and errors surface
pub enum TextWriter {
    Plain(BufWriter<File>),
    Gz(BufWriter<GzEncoder<File>>),
}

impl TextWriter {
    pub fn finish(self) -> anyhow::Result<()> {
        match self {
            TextWriter::Plain(mut w) => w.flush()?,
            TextWriter::Gz(w) => {
                let encoder = w.into_inner().map_err(|e| e.into_error())?;
                encoder.finish()?;
            }
        }
        Ok(())
    }
}

impl Write for TextWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            TextWriter::Plain(w) => w.write(buf),
            TextWriter::Gz(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            TextWriter::Plain(w) => w.flush(),
            TextWriter::Gz(w) => w.flush(),
        }
    }
}

/// Create a text file for writing; gzip-compressed if the name ends with .gz
pub fn create_text_writer<P: AsRef<Path>>(path: P) -> anyhow::Result<TextWriter> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Could not create output file {}", path.display()))?;
    if is_gz(path) {
        Ok(TextWriter::Gz(BufWriter::new(GzEncoder::new(
            file,
            Compression::default(),
        ))))
    } else {
        Ok(TextWriter::Plain(BufWriter::new(file)))
    }
}

pub fn is_gz<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .map(|e| e == "gz")
        .unwrap_or(false)
}

/// Read a single-column file, one entry per line. Empty lines are ignored
pub fn read_one_col<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<String>> {
    let reader = open_text_reader(&path)?;
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let entry = line.split('\t').next().unwrap_or("").trim_end();
        if !entry.is_empty() {
            out.push(entry.to_string());
        }
    }
    Ok(out)
}
