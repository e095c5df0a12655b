use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use log::{debug, info, warn};
use rust_htslib::bam::record::Record as BamRecord;
use rust_htslib::bam::Read;
use rustc_hash::FxHashMap;
use seq_io::fastq::Record;

use crate::fileformat::bam::{create_bam_writer, get_cell_barcode, open_bam};
use crate::fileformat::constants::{
    CELL_BARCODE_TAG, FILTERED_MATRIX_DIR_SUFFIX, MATCH_DIR_MATRIX_SUBDIR, PROGRESS_INTERVAL,
};
use crate::fileformat::fastq::{open_fastq, parse_read_name, split_file_list, FastqWriter};
use crate::fileformat::vdj::{SeqType, VdjTable};
use crate::fileformat::{CountMatrix, TagBarcodes};
use crate::runtime::Error;
use crate::utils::{expand_and_resolve_path, find_in_subdir};

pub const DEFAULT_PATH_OUT: &str = ".";

const R2_DIR_SUFFIX: &str = "barcode";
const R2_FILE_INFIX: &str = "_2.fq";
const VDJ_DIR_SUFFIX: &str = "count_vdj";
const VDJ_FILE_INFIX: &str = "cell_confident.tsv";

#[derive(Args)]
pub struct SplitTagCMD {
    /// Barcode to tag assignment; TSV with header, barcode in the first column and a `tag` column
    #[arg(long = "umi-tag-file", value_parser)]
    pub path_umi_tag: PathBuf,

    #[arg(long = "outdir", value_parser, default_value = DEFAULT_PATH_OUT)]
    pub path_out: PathBuf,

    /// Split the filtered count matrix
    #[arg(long = "split-matrix")]
    pub split_matrix: bool,

    /// Split the BAM file by the CB tag
    #[arg(long = "split-bam")]
    pub split_bam: bool,

    /// Split R1/R2 FASTQ files
    #[arg(long = "split-fastq")]
    pub split_fastq: bool,

    /// Split VDJ cell calls and compute clonotypes per tag
    #[arg(long = "split-vdj")]
    pub split_vdj: bool,

    /// Output directory of the matching scRNA-seq run
    #[arg(long = "match-dir", value_parser)]
    pub path_match_dir: Option<PathBuf>,

    /// Filtered matrix directory; used for --split-matrix if --match-dir is not given
    #[arg(long = "matrix-dir", value_parser)]
    pub path_matrix_dir: Option<PathBuf>,

    #[arg(long = "bam-file", value_parser)]
    pub path_bam: Option<PathBuf>,

    /// Output directory of the matching VDJ run
    #[arg(long = "vdj-dir", value_parser)]
    pub path_vdj_dir: Option<PathBuf>,

    /// R1 FASTQ files, comma separated, in the order they were read by the barcode step
    #[arg(long = "r1-read")]
    pub r1_read: Option<String>,
}

impl SplitTagCMD {
    pub fn try_execute(&mut self) -> Result<()> {
        let report = SplitTag::run(&SplitTagParams {
            path_umi_tag: self.path_umi_tag.clone(),
            path_out: self.path_out.clone(),
            split_matrix: self.split_matrix,
            split_bam: self.split_bam,
            split_fastq: self.split_fastq,
            split_vdj: self.split_vdj,
            path_match_dir: self.path_match_dir.clone(),
            path_matrix_dir: self.path_matrix_dir.clone(),
            path_bam: self.path_bam.clone(),
            path_vdj_dir: self.path_vdj_dir.clone(),
            r1_read: self.r1_read.clone(),
        })?;
        debug!("{:?}", report);

        log::info!("SplitTag has finished succesfully");
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SplitTagParams {
    pub path_umi_tag: PathBuf,
    pub path_out: PathBuf,
    pub split_matrix: bool,
    pub split_bam: bool,
    pub split_fastq: bool,
    pub split_vdj: bool,
    pub path_match_dir: Option<PathBuf>,
    pub path_matrix_dir: Option<PathBuf>,
    pub path_bam: Option<PathBuf>,
    pub path_vdj_dir: Option<PathBuf>,
    pub r1_read: Option<String>,
}

impl SplitTagParams {
    pub fn any_mode(&self) -> bool {
        self.split_matrix || self.split_bam || self.split_fastq || self.split_vdj
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BamSplitStats {
    pub total: u64,
    pub written: BTreeMap<String, u64>,
    pub dropped: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FastqSplitStats {
    pub r2_total: u64,
    pub r1_total: u64,
    pub r2_written: BTreeMap<String, u64>,
    pub r1_written: BTreeMap<String, u64>,
}

/// What each enabled mode produced
#[derive(Debug, Clone, Default)]
pub struct SplitTagReport {
    /// Number of barcodes written per tag
    pub matrix: Option<BTreeMap<String, usize>>,
    pub bam: Option<BamSplitStats>,
    pub fastq: Option<FastqSplitStats>,
    /// Receptor type per tag with VDJ cells
    pub vdj: Option<BTreeMap<String, SeqType>>,
}

#[derive(Debug, Clone)]
struct FastqInputs {
    r2: PathBuf,
    r1: Vec<PathBuf>,
}

/**
 * Splits the outputs of one sample into one output per tag.
 *
 * Inputs of every enabled mode are resolved up front so that a missing file is
 * reported before anything is written.
 */
#[derive(Debug)]
pub struct SplitTag {
    path_out: PathBuf,
    tags: TagBarcodes,
    matrix_dir: Option<PathBuf>,
    bam_file: Option<PathBuf>,
    fastq: Option<FastqInputs>,
    vdj_table: Option<PathBuf>,
}

impl SplitTag {
    pub fn run(params: &SplitTagParams) -> Result<SplitTagReport> {
        if !params.any_mode() {
            info!("No split mode enabled; nothing to do");
            return Ok(SplitTagReport::default());
        }
        SplitTag::new(params)?.execute()
    }

    pub fn new(params: &SplitTagParams) -> Result<SplitTag> {
        let match_dir = params
            .path_match_dir
            .as_ref()
            .map(expand_and_resolve_path)
            .transpose()?;

        let matrix_dir = if params.split_matrix {
            let dir = match (&match_dir, &params.path_matrix_dir) {
                (Some(m), _) => m.join(MATCH_DIR_MATRIX_SUBDIR),
                (None, Some(d)) => expand_and_resolve_path(d)?,
                (None, None) => {
                    return Err(
                        Error::missing_argument("match-dir or --matrix-dir", "--split-matrix")
                            .into(),
                    )
                }
            };
            if !dir.is_dir() {
                return Err(Error::file_not_found(&dir).into());
            }
            Some(dir)
        } else {
            None
        };

        let bam_file = if params.split_bam {
            let path = params
                .path_bam
                .as_ref()
                .ok_or_else(|| Error::missing_argument("bam-file", "--split-bam"))?;
            let path = expand_and_resolve_path(path)?;
            if !path.is_file() {
                return Err(Error::file_not_found(&path).into());
            }
            Some(path)
        } else {
            None
        };

        let fastq = if params.split_fastq {
            let match_dir = match_dir
                .as_ref()
                .ok_or_else(|| Error::missing_argument("match-dir", "--split-fastq"))?;
            let r1_read = params
                .r1_read
                .as_ref()
                .ok_or_else(|| Error::missing_argument("r1-read", "--split-fastq"))?;

            let r2 = find_in_subdir(match_dir, R2_DIR_SUFFIX, R2_FILE_INFIX)?;
            let r1 = split_file_list(r1_read)
                .iter()
                .map(expand_and_resolve_path)
                .collect::<Result<Vec<_>>>()?;
            if r1.is_empty() {
                return Err(Error::missing_argument("r1-read", "--split-fastq").into());
            }
            for p in &r1 {
                if !p.is_file() {
                    return Err(Error::file_not_found(p).into());
                }
            }
            Some(FastqInputs { r2, r1 })
        } else {
            None
        };

        let vdj_table = if params.split_vdj {
            let vdj_dir = params
                .path_vdj_dir
                .as_ref()
                .ok_or_else(|| Error::missing_argument("vdj-dir", "--split-vdj"))?;
            let vdj_dir = expand_and_resolve_path(vdj_dir)?;
            Some(find_in_subdir(&vdj_dir, VDJ_DIR_SUFFIX, VDJ_FILE_INFIX)?)
        } else {
            None
        };

        let tags = TagBarcodes::from_tsv(expand_and_resolve_path(&params.path_umi_tag)?)?;

        Ok(SplitTag {
            path_out: params.path_out.clone(),
            tags,
            matrix_dir,
            bam_file,
            fastq,
            vdj_table,
        })
    }

    /// Run every enabled mode, in the order matrix, BAM, FASTQ, VDJ
    pub fn execute(&self) -> Result<SplitTagReport> {
        let mut report = SplitTagReport::default();
        if self.matrix_dir.is_some() {
            report.matrix = Some(self.split_matrix()?);
        }
        if self.bam_file.is_some() {
            report.bam = Some(self.split_bam()?);
        }
        if self.fastq.is_some() {
            report.fastq = Some(self.split_fastq()?);
        }
        if self.vdj_table.is_some() {
            report.vdj = Some(self.split_vdj()?);
        }
        Ok(report)
    }

    pub fn split_matrix(&self) -> Result<BTreeMap<String, usize>> {
        let matrix_dir = self
            .matrix_dir
            .as_ref()
            .ok_or_else(|| Error::missing_argument("match-dir or --matrix-dir", "--split-matrix"))?;
        let outdir = self.path_out.join("matrix");
        info!("Splitting matrix {}", matrix_dir.display());

        let count_matrix = CountMatrix::from_matrix_dir(matrix_dir)?;
        let barcode_index = count_matrix.barcode_index();

        let mut written = BTreeMap::new();
        for (tag, barcodes) in self.tags.iter() {
            let mut indices: Vec<usize> = barcodes
                .iter()
                .filter_map(|bc| barcode_index.get(bc.as_str()).copied())
                .collect();
            if indices.len() < barcodes.len() {
                debug!(
                    "Tag {}: {} of {} barcodes not in the matrix",
                    tag,
                    barcodes.len() - indices.len(),
                    barcodes.len()
                );
            }
            indices.sort_unstable();

            let sliced = count_matrix.slice_matrix(&indices)?;
            let tag_dir = outdir.join(format!("{}_{}", tag, FILTERED_MATRIX_DIR_SUFFIX));
            sliced.to_matrix_dir(&tag_dir)?;
            info!("Tag {}: wrote {} barcodes to {}", tag, indices.len(), tag_dir.display());
            written.insert(tag.clone(), indices.len());
        }
        Ok(written)
    }

    pub fn split_bam(&self) -> Result<BamSplitStats> {
        let bam_file = self
            .bam_file
            .as_ref()
            .ok_or_else(|| Error::missing_argument("bam-file", "--split-bam"))?;
        let outdir = self.path_out.join("bam");
        std::fs::create_dir_all(&outdir)
            .with_context(|| format!("Could not create directory {}", outdir.display()))?;
        info!("Splitting BAM {}", bam_file.display());

        let mut bam = open_bam(bam_file)?;
        let mut writers = HashMap::new();
        for tag in self.tags.tags() {
            let writer = create_bam_writer(&outdir.join(format!("{}.bam", tag)), bam.header())?;
            writers.insert(tag.as_str(), writer);
        }
        let barcode_to_tag = self.tags.barcode_to_tag();

        let mut stats = BamSplitStats {
            written: self.tags.tags().map(|t| (t.clone(), 0)).collect(),
            ..Default::default()
        };
        let mut record = BamRecord::new();
        while let Some(r) = bam.read(&mut record) {
            r.with_context(|| format!("Failed reading {}", bam_file.display()))?;
            stats.total += 1;

            let tag = get_cell_barcode(&record, CELL_BARCODE_TAG)?
                .and_then(|bc| barcode_to_tag.get(bc).copied());
            match tag.and_then(|t| writers.get_mut(t).map(|w| (t, w))) {
                Some((tag, writer)) => {
                    writer.write(&record)?;
                    if let Some(n) = stats.written.get_mut(tag) {
                        *n += 1;
                    }
                }
                None => stats.dropped += 1,
            }

            if stats.total % PROGRESS_INTERVAL == 0 {
                info!("{} records done", stats.total);
            }
        }
        //Closing a writer flushes its BGZF blocks
        drop(writers);

        info!(
            "Read {} records, {} without a known cell barcode",
            stats.total, stats.dropped
        );
        Ok(stats)
    }

    pub fn split_fastq(&self) -> Result<FastqSplitStats> {
        let inputs = self
            .fastq
            .as_ref()
            .ok_or_else(|| Error::missing_argument("match-dir", "--split-fastq"))?;
        let outdir = self.path_out.join("fastqs");
        std::fs::create_dir_all(&outdir)
            .with_context(|| format!("Could not create directory {}", outdir.display()))?;

        //Barcode -> every tag listing it
        let mut barcode_to_tags: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
        for (tag, barcodes) in self.tags.iter() {
            for bc in barcodes {
                barcode_to_tags.entry(bc.as_str()).or_default().push(tag.as_str());
            }
        }

        let mut stats = FastqSplitStats::default();

        //Pass 1: R2 reads carry the barcode and the index of the read pair
        info!("Splitting R2 {}", inputs.r2.display());
        let mut r2_writers = BTreeMap::new();
        for tag in self.tags.tags() {
            let writer = FastqWriter::new(outdir.join(format!("{}_2.fq", tag)))?;
            r2_writers.insert(tag.as_str(), writer);
        }
        let mut index_to_tags: FxHashMap<u64, BTreeSet<&str>> = FxHashMap::default();

        let mut reader = open_fastq(&inputs.r2)?;
        while let Some(record) = reader.next() {
            let record =
                record.with_context(|| format!("Failed reading {}", inputs.r2.display()))?;
            stats.r2_total += 1;

            let (barcode, read_index) = parse_read_name(record.head())?;
            let tags = std::str::from_utf8(barcode)
                .ok()
                .and_then(|bc| barcode_to_tags.get(bc));
            if let Some(tags) = tags {
                for tag in tags {
                    if let Some(writer) = r2_writers.get_mut(tag) {
                        writer.write(&record)?;
                    }
                }
                index_to_tags
                    .entry(read_index)
                    .or_default()
                    .extend(tags.iter().copied());
            }

            if stats.r2_total % PROGRESS_INTERVAL == 0 {
                info!("{} R2 reads done", stats.r2_total);
            }
        }
        for (tag, writer) in r2_writers {
            stats.r2_written.insert(tag.to_string(), writer.finish()?);
        }

        //Pass 2: R1 files back to back, paired by the 1-based read index
        let mut r1_writers = BTreeMap::new();
        for tag in self.tags.tags() {
            let writer = FastqWriter::new(outdir.join(format!("{}_1.fq", tag)))?;
            r1_writers.insert(tag.as_str(), writer);
        }
        for r1 in &inputs.r1 {
            info!("Splitting R1 {}", r1.display());
            let mut reader = open_fastq(r1)?;
            while let Some(record) = reader.next() {
                let record = record.with_context(|| format!("Failed reading {}", r1.display()))?;
                stats.r1_total += 1;

                if let Some(tags) = index_to_tags.get(&stats.r1_total) {
                    for tag in tags {
                        if let Some(writer) = r1_writers.get_mut(tag) {
                            writer.write(&record)?;
                        }
                    }
                }

                if stats.r1_total % PROGRESS_INTERVAL == 0 {
                    info!("{} R1 reads done", stats.r1_total);
                }
            }
        }
        for (tag, writer) in r1_writers {
            stats.r1_written.insert(tag.to_string(), writer.finish()?);
        }

        if stats.r1_total < stats.r2_total {
            warn!(
                "R1 files hold {} reads but R2 holds {}; some pairs are incomplete",
                stats.r1_total, stats.r2_total
            );
        }
        Ok(stats)
    }

    pub fn split_vdj(&self) -> Result<BTreeMap<String, SeqType>> {
        let vdj_file = self
            .vdj_table
            .as_ref()
            .ok_or_else(|| Error::missing_argument("vdj-dir", "--split-vdj"))?;
        let outdir = self.path_out.join("vdj");
        std::fs::create_dir_all(&outdir)
            .with_context(|| format!("Could not create directory {}", outdir.display()))?;
        info!("Splitting VDJ table {}", vdj_file.display());

        let table = VdjTable::from_tsv(vdj_file)?;
        let mut seq_types = BTreeMap::new();
        for (tag, barcodes) in self.tags.iter() {
            let sub = table.filter_barcodes(barcodes);
            let Some(seq_type) = sub.seq_type()? else {
                debug!("Tag {}: no VDJ cells", tag);
                continue;
            };

            sub.write_tsv(outdir.join(format!("{}_{}_cell_confident.tsv", tag, seq_type)))?;
            let clonotypes = sub.clonotypes();
            clonotypes.write_tsv(outdir.join(format!("{}_{}_clonotypes.tsv", tag, seq_type)))?;
            info!(
                "Tag {}: {} contigs, {} clonotypes",
                tag,
                sub.len(),
                clonotypes.clonotypes.len()
            );
            seq_types.insert(tag.clone(), seq_type);
        }
        Ok(seq_types)
    }
}
