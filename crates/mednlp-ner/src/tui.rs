//! UMLS semantic types (TUIs) and semantic groups.
//!
//! Both files are pipe delimited without a header:
//! - semantic types: `abbrev|tui|description`, e.g. `dsyn|T047|Disease or Syndrome`
//! - semantic groups: `abbrev|group name|tui|description`, e.g.
//!   `DISO|Disorders|T047|Disease or Syndrome`

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use ahash::AHashMap;
use regex::Regex;
use tracing::{debug, info};

use crate::{NerError, Result};

/// One row of the semantic groups file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticGroup {
    pub abbrev: String,
    pub name: String,
    pub tui: String,
    pub desc: String,
}

/// TUI descriptions and group membership.
#[derive(Debug, Clone, Default)]
pub struct TuiCatalog {
    descs: AHashMap<String, String>,
    groups: Vec<SemanticGroup>,
}

impl TuiCatalog {
    /// Parse the semantic types file contents, and optionally the groups file.
    pub fn parse(types: &str, groups: Option<&str>) -> Result<Self> {
        let mut descs = AHashMap::new();
        for (line, mut fields) in split_rows(types, 3)? {
            let desc = fields.pop().unwrap_or_default();
            let tui = fields.pop().unwrap_or_default();
            debug!(line, "semantic type {}", tui);
            descs.insert(tui, desc);
        }
        let groups = match groups {
            Some(content) => split_rows(content, 4)?
                .into_iter()
                .map(|(_, mut f)| SemanticGroup {
                    desc: f.pop().unwrap_or_default(),
                    tui: f.pop().unwrap_or_default(),
                    name: f.pop().unwrap_or_default(),
                    abbrev: f.pop().unwrap_or_default(),
                })
                .collect(),
            None => Vec::new(),
        };
        Ok(Self { descs, groups })
    }

    pub fn from_files(types_path: &Path, groups_path: Option<&Path>) -> Result<Self> {
        let types = fs::read_to_string(types_path)?;
        let groups = groups_path.map(fs::read_to_string).transpose()?;
        let catalog = Self::parse(&types, groups.as_deref())?;
        info!(
            "loaded {} semantic types and {} group rows",
            catalog.descs.len(),
            catalog.groups.len()
        );
        Ok(catalog)
    }

    /// Description of a TUI, e.g. `T047` → `Disease or Syndrome`.
    pub fn description(&self, tui: &str) -> Option<&str> {
        self.descs.get(tui).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.descs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    pub fn groups(&self) -> &[SemanticGroup] {
        &self.groups
    }

    /// TUIs whose group name matches any of `patterns`.
    ///
    /// The patterns are regular expression alternatives searched anywhere in
    /// the group name, so `["Disorders", "Chemicals"]` selects both groups.
    pub fn tuis_for_groups<S: AsRef<str>>(&self, patterns: &[S]) -> Result<BTreeSet<String>> {
        if patterns.is_empty() {
            return Ok(BTreeSet::new());
        }
        let alts: Vec<&str> = patterns.iter().map(AsRef::as_ref).collect();
        let regex = Regex::new(&format!("^.*({})", alts.join("|")))?;
        Ok(self
            .groups
            .iter()
            .filter(|g| regex.is_match(&g.name))
            .map(|g| g.tui.clone())
            .collect())
    }

    /// Union of explicit TUIs and the TUIs of matching groups.
    ///
    /// Returns `None` when the union is empty, meaning no filtering.
    pub fn filter_tuis<S: AsRef<str>>(
        &self,
        tuis: &[S],
        group_patterns: &[S],
    ) -> Result<Option<BTreeSet<String>>> {
        let mut filter: BTreeSet<String> =
            tuis.iter().map(|t| t.as_ref().to_string()).collect();
        filter.extend(self.tuis_for_groups(group_patterns)?);
        if filter.is_empty() {
            return Ok(None);
        }
        info!(
            "filtering on tuis: {}",
            filter.iter().cloned().collect::<Vec<_>>().join(", ")
        );
        Ok(Some(filter))
    }
}

/// Read pipe-delimited records of exactly `n` fields with their line numbers.
fn split_rows(content: &str, n: usize) -> Result<Vec<(usize, Vec<String>)>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        if record.len() != n {
            return Err(NerError::Format {
                line,
                message: format!(
                    "expected {} fields, got {}: <{}>",
                    n,
                    record.len(),
                    record.iter().collect::<Vec<_>>().join("|")
                ),
            });
        }
        rows.push((line, record.iter().map(str::to_string).collect()));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: &str = "\
dsyn|T047|Disease or Syndrome
bpoc|T023|Body Part, Organ, or Organ Component
phsu|T121|Pharmacologic Substance
";

    const GROUPS: &str = "\
DISO|Disorders|T047|Disease or Syndrome
ANAT|Anatomy|T023|Body Part, Organ, or Organ Component
CHEM|Chemicals & Drugs|T121|Pharmacologic Substance
";

    fn catalog() -> TuiCatalog {
        TuiCatalog::parse(TYPES, Some(GROUPS)).unwrap()
    }

    #[test]
    fn test_descriptions() {
        let cat = catalog();
        assert_eq!(cat.len(), 3);
        assert_eq!(cat.description("T047"), Some("Disease or Syndrome"));
        assert_eq!(cat.description("T999"), None);
        assert_eq!(cat.groups()[2].name, "Chemicals & Drugs");
    }

    #[test]
    fn test_group_patterns() {
        let cat = catalog();
        let tuis = cat.tuis_for_groups(&["Disorders", "Chem"]).unwrap();
        assert_eq!(tuis.into_iter().collect::<Vec<_>>(), vec!["T047", "T121"]);
        assert!(cat.tuis_for_groups::<&str>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_filter_union() {
        let cat = catalog();
        let filter = cat.filter_tuis(&["T023"], &["Disorders"]).unwrap().unwrap();
        assert!(filter.contains("T023"));
        assert!(filter.contains("T047"));
        assert_eq!(filter.len(), 2);
        assert_eq!(cat.filter_tuis::<&str>(&[], &[]).unwrap(), None);
    }

    #[test]
    fn test_quoted_description_keeps_pipe() {
        let cat = TuiCatalog::parse("inpr|T170|\"Intellectual | Product\"\n", None).unwrap();
        assert_eq!(cat.description("T170"), Some("Intellectual | Product"));
    }

    #[test]
    fn test_wrong_field_count_reports_line() {
        let err = TuiCatalog::parse("dsyn|T047|Disease\n\nbad line\n", None).unwrap_err();
        match err {
            NerError::Format { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
