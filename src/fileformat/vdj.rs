use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::io::Write;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use itertools::Itertools;
use rustc_hash::FxHashMap;

use super::io::{create_text_writer, open_text_reader};
use crate::runtime::Error;

pub const COL_BARCODE: &str = "barcode";
pub const COL_CHAIN: &str = "chain";
pub const COL_AA_CDR3: &str = "aaSeqCDR3";
pub const COL_NT_CDR3: &str = "nSeqCDR3";

/// Placeholder for an absent chain or an empty sequence
pub const MISSING_VALUE: &str = "NaN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqType {
    TCR,
    BCR,
}

impl SeqType {
    pub fn from_chain(chain: &str) -> Result<SeqType, Error> {
        if chain.starts_with("TR") {
            Ok(SeqType::TCR)
        } else if chain.starts_with("IG") {
            Ok(SeqType::BCR)
        } else {
            Err(Error::UnknownChain {
                chain: chain.to_string(),
            })
        }
    }
}

impl fmt::Display for SeqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeqType::TCR => write!(f, "TCR"),
            SeqType::BCR => write!(f, "BCR"),
        }
    }
}

/**
 * Cell-confident VDJ contig table. Rows are kept verbatim so that a filtered
 * table is written back with the same columns
 */
#[derive(Debug, Clone)]
pub struct VdjTable {
    headers: StringRecord,
    rows: Vec<StringRecord>,
    barcode_col: usize,
    chain_col: usize,
    aa_col: usize,
    nt_col: usize,
}

impl VdjTable {
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> anyhow::Result<VdjTable> {
        let path = path.as_ref();
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .quoting(false)
            .from_reader(open_text_reader(path)?);

        let headers = reader.headers()?.clone();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        VdjTable::new(headers, rows)
            .map_err(|msg| Error::file_not_valid(path, Some(msg)).into())
    }

    pub fn new(headers: StringRecord, rows: Vec<StringRecord>) -> Result<VdjTable, String> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| format!("no column named '{}'", name))
        };
        Ok(VdjTable {
            barcode_col: find(COL_BARCODE)?,
            chain_col: find(COL_CHAIN)?,
            aa_col: find(COL_AA_CDR3)?,
            nt_col: find(COL_NT_CDR3)?,
            headers,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose barcode is in the set, in their original order
    pub fn filter_barcodes(&self, barcodes: &HashSet<String>) -> VdjTable {
        let rows = self
            .rows
            .iter()
            .filter(|r| {
                r.get(self.barcode_col)
                    .map(|bc| barcodes.contains(bc))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        VdjTable {
            headers: self.headers.clone(),
            rows,
            ..*self
        }
    }

    pub fn chains(&self) -> BTreeSet<&str> {
        self.rows
            .iter()
            .filter_map(|r| r.get(self.chain_col))
            .collect()
    }

    /// Receptor type inferred from the first chain label in sorted order
    pub fn seq_type(&self) -> Result<Option<SeqType>, Error> {
        self.chains()
            .into_iter()
            .next()
            .map(SeqType::from_chain)
            .transpose()
    }

    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(create_text_writer(path)?);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.into_inner().map_err(|e| e.into_error())?.finish()
    }

    fn field<'a>(&self, row: &'a StringRecord, col: usize) -> &'a str {
        match row.get(col) {
            Some(v) if !v.is_empty() => v,
            _ => MISSING_VALUE,
        }
    }

    /**
     * Group barcodes by their CDR3 sequences over all chains.
     *
     * A barcode with several contigs of one chain contributes one combination per
     * pairing, like an outer join of the per-chain tables on barcode.
     */
    pub fn clonotypes(&self) -> ClonotypeTable {
        let chains: Vec<String> = self.chains().into_iter().map(str::to_string).collect();
        let chain_pos: FxHashMap<&str, usize> = chains
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        //For each barcode, the (aa, nt) pairs seen per chain
        let mut per_barcode: BTreeMap<&str, Vec<Vec<(&str, &str)>>> = BTreeMap::new();
        for row in &self.rows {
            let (Some(bc), Some(chain)) = (row.get(self.barcode_col), row.get(self.chain_col))
            else {
                continue;
            };
            let pos = chain_pos[chain];
            per_barcode
                .entry(bc)
                .or_insert_with(|| vec![Vec::new(); chains.len()])[pos]
                .push((self.field(row, self.aa_col), self.field(row, self.nt_col)));
        }

        let mut counts: BTreeMap<Vec<&str>, u64> = BTreeMap::new();
        for seqs_per_chain in per_barcode.values() {
            let combinations = seqs_per_chain
                .iter()
                .map(|seqs| {
                    if seqs.is_empty() {
                        vec![(MISSING_VALUE, MISSING_VALUE)]
                    } else {
                        seqs.clone()
                    }
                })
                .multi_cartesian_product();
            for combination in combinations {
                let key = combination
                    .into_iter()
                    .flat_map(|(aa, nt)| [aa, nt])
                    .collect::<Vec<_>>();
                *counts.entry(key).or_insert(0) += 1;
            }
        }

        let total: u64 = counts.values().sum();
        let clonotypes = counts
            .into_iter()
            .enumerate()
            .map(|(i, (key, count))| Clonotype {
                id: i + 1,
                seqs: key.into_iter().map(str::to_string).collect(),
                barcode_count: count,
                percent: round_fraction(count, total),
            })
            .collect();

        ClonotypeTable { chains, clonotypes }
    }
}

/// count/total rounded to two decimals
pub fn round_fraction(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clonotype {
    pub id: usize,
    /// aaSeqCDR3 and nSeqCDR3 for each chain, in chain order
    pub seqs: Vec<String>,
    pub barcode_count: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClonotypeTable {
    pub chains: Vec<String>,
    pub clonotypes: Vec<Clonotype>,
}

impl ClonotypeTable {
    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let mut writer = create_text_writer(path)?;

        let mut header = vec!["clonetype_ID".to_string()];
        for c in &self.chains {
            header.push(format!("{}_{}", c, COL_AA_CDR3));
            header.push(format!("{}_{}", c, COL_NT_CDR3));
        }
        header.push("barcode_count".to_string());
        header.push("percent".to_string());
        writeln!(writer, "{}", header.join("\t"))?;

        for c in &self.clonotypes {
            writeln!(
                writer,
                "{}\t{}\t{}\t{:?}",
                c.id,
                c.seqs.join("\t"),
                c.barcode_count,
                c.percent
            )?;
        }
        writer.finish()
    }
}
