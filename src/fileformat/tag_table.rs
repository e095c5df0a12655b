use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use csv::ReaderBuilder;
use log::{info, warn};
use rustc_hash::FxHashMap;

use super::io::open_text_reader;
use crate::runtime::Error;

pub type Tag = String;
pub type Barcode = String;

/// Column holding the tag of each barcode
pub const TAG_COLUMN: &str = "tag";

/**
 * Assignment of barcodes to tags, grouped as tag -> set of barcodes.
 *
 * Tags iterate in sorted order. A barcode listed under several tags ends up in
 * every one of their sets.
 */
#[derive(Debug, Clone, Default)]
pub struct TagBarcodes {
    tags: BTreeMap<Tag, HashSet<Barcode>>,
}

impl TagBarcodes {
    /// Read a tab-separated table with a header. The first column is the barcode,
    /// the tag is taken from the column named `tag`. Rows without a barcode or a
    /// tag are unassigned and left out
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> anyhow::Result<TagBarcodes> {
        let path = path.as_ref();
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(open_text_reader(path)?);

        let tag_col = reader
            .headers()?
            .iter()
            .position(|h| h == TAG_COLUMN)
            .ok_or_else(|| {
                Error::file_not_valid(path, Some(format!("no column named '{}'", TAG_COLUMN)))
            })?;

        let mut pairs = Vec::new();
        let mut num_unassigned = 0;
        for record in reader.records() {
            let record = record?;
            match (record.get(0), record.get(tag_col)) {
                (Some(bc), Some(tag)) if !bc.trim().is_empty() && !tag.trim().is_empty() => {
                    pairs.push((bc.to_string(), tag.to_string()))
                }
                _ => num_unassigned += 1,
            }
        }
        if num_unassigned > 0 {
            warn!(
                "Skipped {} rows without barcode or tag in {}",
                num_unassigned,
                path.display()
            );
        }

        let table = TagBarcodes::from_pairs(pairs);
        info!(
            "Read {} tags for {} barcodes from {}",
            table.len(),
            table.num_barcodes(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_pairs<I>(pairs: I) -> TagBarcodes
    where
        I: IntoIterator<Item = (Barcode, Tag)>,
    {
        let mut tags: BTreeMap<Tag, HashSet<Barcode>> = BTreeMap::new();
        for (bc, tag) in pairs {
            tags.entry(tag).or_default().insert(bc);
        }

        let table = TagBarcodes { tags };
        let num_multi = table.num_barcodes_in_several_tags();
        if num_multi > 0 {
            warn!(
                "{} barcodes are assigned to more than one tag; they are kept in every tag",
                num_multi
            );
        }
        table
    }

    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.keys()
    }

    pub fn barcodes(&self, tag: &str) -> Option<&HashSet<Barcode>> {
        self.tags.get(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &HashSet<Barcode>)> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Number of distinct barcodes over all tags
    pub fn num_barcodes(&self) -> usize {
        self.tags
            .values()
            .flat_map(|s| s.iter())
            .collect::<HashSet<_>>()
            .len()
    }

    fn num_barcodes_in_several_tags(&self) -> usize {
        let mut seen: FxHashMap<&str, usize> = FxHashMap::default();
        for bc in self.tags.values().flat_map(|s| s.iter()) {
            *seen.entry(bc.as_str()).or_insert(0) += 1;
        }
        seen.values().filter(|&&n| n > 1).count()
    }

    /// Reverse lookup barcode -> tag. If a barcode is in several tags, the last tag
    /// in sorted order wins
    pub fn barcode_to_tag(&self) -> FxHashMap<&str, &str> {
        let mut map = FxHashMap::default();
        for (tag, barcodes) in &self.tags {
            for bc in barcodes {
                map.insert(bc.as_str(), tag.as_str());
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("umi_tag.tsv");
        std::fs::write(
            &p,
            "barcode\tCLindex_1\tCLindex_2\ttag\nb1\t10\t0\tt1\nb2\t0\t8\tt2\nb3\t12\t1\tt1\n",
        )
        .unwrap();

        let table = TagBarcodes::from_tsv(&p).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.tags().cloned().collect::<Vec<_>>(),
            vec!["t1".to_string(), "t2".to_string()]
        );
        let t1 = table.barcodes("t1").unwrap();
        assert_eq!(t1.len(), 2);
        assert!(t1.contains("b1") && t1.contains("b3"));
        assert_eq!(table.num_barcodes(), 3);
    }

    #[test]
    fn test_rows_without_tag_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("umi_tag.tsv");
        std::fs::write(&p, "barcode\ttag\nb1\tt1\nb2\t\nb3\tt2\nb4\n").unwrap();

        let table = TagBarcodes::from_tsv(&p).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.num_barcodes(), 2);
        assert!(table.barcodes("t1").unwrap().contains("b1"));
        assert!(table.barcodes("t2").unwrap().contains("b3"));
        assert!(!table.barcode_to_tag().contains_key("b2"));
    }

    #[test]
    fn test_missing_tag_column() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("umi_tag.tsv");
        std::fs::write(&p, "barcode\tsample\nb1\tt1\n").unwrap();
        assert!(TagBarcodes::from_tsv(&p).is_err());
    }

    #[test]
    fn test_barcode_to_tag_last_wins() {
        let table = TagBarcodes::from_pairs(vec![
            ("b1".to_string(), "t2".to_string()),
            ("b1".to_string(), "t1".to_string()),
            ("b2".to_string(), "t1".to_string()),
        ]);
        assert!(table.barcodes("t1").unwrap().contains("b1"));
        assert!(table.barcodes("t2").unwrap().contains("b1"));

        let lookup = table.barcode_to_tag();
        assert_eq!(lookup.get("b1"), Some(&"t2"));
        assert_eq!(lookup.get("b2"), Some(&"t1"));
        assert_eq!(lookup.get("b9"), None);
    }
}
