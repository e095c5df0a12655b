use std::collections::HashSet;
use std::path::Path;

use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use log::warn;

use super::constants::FEATURE_FILE_NAME;
use super::io::{create_text_writer, open_text_reader};
use crate::runtime::Error;

/// Catalog of features (genes, antibodies...), one per matrix row.
///
/// `gene_type` is `None` when no feature carries a type. Downstream readers such as
/// Seurat's Read10X fail on a third column of blanks, so an all-blank type column is
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Features {
    gene_id: Vec<String>,
    gene_name: Vec<String>,
    gene_type: Option<Vec<String>>,
}

impl Features {
    /// Names default to the ids when not given
    pub fn new(
        gene_id: Vec<String>,
        gene_name: Option<Vec<String>>,
        gene_type: Option<Vec<String>>,
    ) -> Result<Features, Error> {
        let gene_name = match gene_name {
            Some(names) if !names.is_empty() => names,
            _ => gene_id.clone(),
        };
        if gene_name.len() != gene_id.len() {
            return Err(Error::parse_error(
                "features",
                Some(format!(
                    "{} gene names for {} gene ids",
                    gene_name.len(),
                    gene_id.len()
                )),
            ));
        }
        if let Some(types) = &gene_type {
            if types.len() != gene_id.len() {
                return Err(Error::parse_error(
                    "features",
                    Some(format!(
                        "{} gene types for {} gene ids",
                        types.len(),
                        gene_id.len()
                    )),
                ));
            }
        }
        Ok(Features {
            gene_id,
            gene_name,
            gene_type,
        })
    }

    pub fn from_tsv<P: AsRef<Path>>(path: P) -> anyhow::Result<Features> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::file_not_found_with_suggestion(
                path,
                format!("Rename and gzip the features file to {}", FEATURE_FILE_NAME),
            )
            .into());
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(open_text_reader(path)?);

        let mut gene_id = Vec::new();
        let mut gene_name = Vec::new();
        let mut gene_type = Vec::new();
        let mut num_skipped = 0;

        for record in reader.records() {
            let record = match record {
                Ok(r) if !r.is_empty() && r.len() <= 3 && !r[0].is_empty() => r,
                _ => {
                    num_skipped += 1;
                    continue;
                }
            };
            let id = record[0].to_string();
            let name = record
                .get(1)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .unwrap_or_else(|| id.clone());
            gene_type.push(record.get(2).unwrap_or("").to_string());
            gene_id.push(id);
            gene_name.push(name);
        }

        if num_skipped > 0 {
            warn!(
                "Skipped {} malformed lines in feature file {}",
                num_skipped,
                path.display()
            );
        }

        let gene_type = if gene_type.iter().all(|t| t.is_empty()) {
            None
        } else {
            Some(gene_type)
        };

        Ok(Features::new(gene_id, Some(gene_name), gene_type)?)
    }

    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quote_style(QuoteStyle::Never)
            .from_writer(create_text_writer(path)?);

        for i in 0..self.len() {
            match &self.gene_type {
                Some(types) => {
                    writer.write_record([&self.gene_id[i], &self.gene_name[i], &types[i]])?
                }
                None => writer.write_record([&self.gene_id[i], &self.gene_name[i]])?,
            }
        }
        writer
            .into_inner()
            .map_err(|e| e.into_error())?
            .finish()
    }

    pub fn len(&self) -> usize {
        self.gene_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gene_id.is_empty()
    }

    pub fn gene_id(&self) -> &[String] {
        &self.gene_id
    }

    pub fn gene_name(&self) -> &[String] {
        &self.gene_name
    }

    pub fn gene_type(&self) -> Option<&[String]> {
        self.gene_type.as_deref()
    }

    /// Ids present in both catalogs, in the order of `self`
    pub fn shared_ids(&self, other: &Features) -> Vec<String> {
        let other_ids: HashSet<&String> = other.gene_id.iter().collect();
        self.gene_id
            .iter()
            .filter(|id| other_ids.contains(id))
            .cloned()
            .collect()
    }

    /// Catalog of `self` followed by `other`. Types are kept only if both have them
    pub fn concat(&self, other: &Features) -> Features {
        let gene_type = match (&self.gene_type, &other.gene_type) {
            (Some(a), Some(b)) => Some([a.as_slice(), b.as_slice()].concat()),
            _ => None,
        };
        Features {
            gene_id: [self.gene_id.as_slice(), other.gene_id.as_slice()].concat(),
            gene_name: [self.gene_name.as_slice(), other.gene_name.as_slice()].concat(),
            gene_type,
        }
    }
}
