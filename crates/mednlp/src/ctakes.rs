//! Apache cTAKES as a read-only stash of concept mentions.
//!
//! Documents are written as `<n>.txt` files to a source directory, the cTAKES
//! entry point is run once over that directory, and each `<n>.txt.xmi` output
//! is parsed into [`CTakesMention`] rows on load.
//!
//! The entry point command is a template; `{entry_point_bin}`, `{home}`,
//! `{source_dir}` and `{output_dir}` are replaced per argument, so paths with
//! spaces stay one argument. `CTAKES_HOME` is set for the child process.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use mednlp_common::{MedNlpError, Stash};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{LibraryError, Result};

const SOURCE_SUFFIX: &str = ".txt";
const OUTPUT_SUFFIX: &str = ".txt.xmi";

/// `[ctakes]` section of the configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CTakesConfig {
    /// Entry point script, e.g. `bin/runClinicalPipeline.sh`.
    pub entry_point_bin: PathBuf,
    #[serde(default = "default_entry_point_cmd")]
    pub entry_point_cmd: String,
    /// cTAKES installation directory.
    pub home: PathBuf,
    /// Where documents are written for cTAKES to read.
    pub source_dir: PathBuf,
    /// Defaults to `output` next to `source_dir`.
    pub output_dir: Option<PathBuf>,
}

fn default_entry_point_cmd() -> String {
    "{entry_point_bin} -i {source_dir} --xmiOut {output_dir}".to_string()
}

impl CTakesConfig {
    pub fn new(
        entry_point_bin: impl Into<PathBuf>,
        home: impl Into<PathBuf>,
        source_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            entry_point_bin: entry_point_bin.into(),
            entry_point_cmd: default_entry_point_cmd(),
            home: home.into(),
            source_dir: source_dir.into(),
            output_dir: None,
        }
    }

    pub fn with_entry_point_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.entry_point_cmd = cmd.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }
}

/// One concept of one cTAKES mention.
///
/// A mention linked to several ontology concepts gives one row per concept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CTakesMention {
    /// Mention type, e.g. `DiseaseDisorderMention`.
    pub kind: String,
    /// Character offsets into the document.
    pub begin: usize,
    pub end: usize,
    pub text: String,
    /// `-1` when negated.
    pub polarity: i32,
    pub cui: String,
    pub tui: String,
    pub preferred_text: String,
    pub code: String,
    pub scheme: String,
}

/// Runs cTAKES over a directory of notes and serves the parsed output.
#[derive(Debug)]
pub struct CTakesParserStash {
    entry_point_bin: PathBuf,
    entry_point_cmd: String,
    home: PathBuf,
    source_dir: PathBuf,
    output_dir: PathBuf,
}

impl CTakesParserStash {
    pub fn new(config: &CTakesConfig) -> Result<Self> {
        let source_dir = absolute(&config.source_dir)?;
        let output_dir = match &config.output_dir {
            Some(dir) => absolute(dir)?,
            None => source_dir
                .parent()
                .map(|p| p.join("output"))
                .ok_or_else(|| {
                    LibraryError::Configuration(format!(
                        "cTAKES source directory has no parent: {}",
                        source_dir.display()
                    ))
                })?,
        };
        Ok(Self {
            entry_point_bin: absolute(&config.entry_point_bin)?,
            entry_point_cmd: config.entry_point_cmd.clone(),
            home: absolute(&config.home)?,
            source_dir,
            output_dir,
        })
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Replace the documents to parse; the n-th document is keyed `n`.
    pub fn set_documents<I, S>(&self, docs: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.clear()?;
        fs::create_dir_all(&self.source_dir)?;
        let mut n = 0;
        for doc in docs {
            let path = self.source_dir.join(format!("{}{}", n, SOURCE_SUFFIX));
            fs::write(&path, doc.as_ref())?;
            n += 1;
        }
        debug!("wrote {} documents to {}", n, self.source_dir.display());
        Ok(())
    }

    /// Run cTAKES unless its output already exists.
    pub fn prime(&self) -> Result<()> {
        if !self.source_dir.is_dir() {
            return Err(LibraryError::CTakes(format!(
                "source path is not an existing directory: {}",
                self.source_dir.display()
            )));
        }
        if names(&self.source_dir, SOURCE_SUFFIX)?.is_empty() {
            return Err(LibraryError::CTakes(format!(
                "source directory contains no data: {}",
                self.source_dir.display()
            )));
        }
        if names(&self.output_dir, OUTPUT_SUFFIX)?.is_empty() {
            fs::create_dir_all(&self.output_dir)?;
            self.run()?;
        }
        Ok(())
    }

    /// Mentions of document `name`, `None` if cTAKES produced no output for it.
    pub fn mentions(&self, name: &str) -> Result<Option<Vec<CTakesMention>>> {
        self.prime()?;
        let path = self.output_path(name);
        if !path.is_file() {
            return Ok(None);
        }
        let xmi = fs::read_to_string(&path)?;
        parse_xmi(&xmi).map(Some)
    }

    /// Names of the parsed documents, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.prime()?;
        names(&self.output_dir, OUTPUT_SUFFIX)
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        self.prime()?;
        Ok(self.output_path(name).is_file())
    }

    /// Remove the documents and the cTAKES output.
    pub fn clear(&self) -> Result<()> {
        remove_with_suffix(&self.output_dir, OUTPUT_SUFFIX)?;
        remove_with_suffix(&self.source_dir, SOURCE_SUFFIX)?;
        Ok(())
    }

    fn output_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}{}", name, OUTPUT_SUFFIX))
    }

    fn command_args(&self) -> Vec<String> {
        let vars = [
            ("{entry_point_bin}", &self.entry_point_bin),
            ("{home}", &self.home),
            ("{source_dir}", &self.source_dir),
            ("{output_dir}", &self.output_dir),
        ];
        self.entry_point_cmd
            .split_whitespace()
            .map(|word| {
                vars.iter().fold(word.to_string(), |acc, (var, path)| {
                    acc.replace(var, &path.to_string_lossy())
                })
            })
            .collect()
    }

    fn run(&self) -> Result<()> {
        info!("running cTAKES parser on {}", self.source_dir.display());
        let args = self.command_args();
        let (program, rest) = args.split_first().ok_or_else(|| {
            LibraryError::Configuration("empty cTAKES entry point command".to_string())
        })?;
        info!("executing {}", args.join(" "));

        let output = Command::new(program)
            .args(rest)
            .env("CTAKES_HOME", &self.home)
            .output()?;
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!(target: "mednlp::ctakes::process", "{}", line);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!(target: "mednlp::ctakes::process", "{}", line);
        }
        if !output.status.success() {
            return Err(LibraryError::CTakes(format!(
                "entry point exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Stash for CTakesParserStash {
    fn load(&self, key: &str) -> mednlp_common::Result<Option<Value>> {
        let mentions = self.mentions(key).map_err(stash_error)?;
        mentions.map(serde_json::to_value).transpose().map_err(Into::into)
    }

    fn dump(&self, key: &str, _value: &Value) -> mednlp_common::Result<()> {
        Err(MedNlpError::Stash(format!(
            "cTAKES stash is read only; cannot dump {}",
            key
        )))
    }

    fn exists(&self, key: &str) -> mednlp_common::Result<bool> {
        self.contains(key).map_err(stash_error)
    }

    fn clear(&self) -> mednlp_common::Result<()> {
        CTakesParserStash::clear(self).map_err(stash_error)
    }
}

fn stash_error(e: LibraryError) -> MedNlpError {
    match e {
        LibraryError::Common(e) => e,
        other => MedNlpError::Stash(other.to_string()),
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

/// File names in `dir` ending in `suffix`, with the suffix removed.
fn names(dir: &Path, suffix: &str) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let file_name = entry?.file_name();
        if let Some(name) = file_name.to_string_lossy().strip_suffix(suffix) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn remove_with_suffix(dir: &Path, suffix: &str) -> Result<()> {
    for name in names(dir, suffix)? {
        fs::remove_file(dir.join(format!("{}{}", name, suffix)))?;
    }
    Ok(())
}

struct XmiMention {
    kind: String,
    begin: usize,
    end: usize,
    polarity: i32,
    concept_ids: Vec<String>,
}

/// Parse the concept mentions of a cTAKES XMI document.
///
/// Mentions are `textsem:*` elements carrying `ontologyConceptArr`, which
/// lists `xmi:id`s of `refsem:UmlsConcept` elements. Rows are ordered by
/// mention offset.
pub fn parse_xmi(xmi: &str) -> Result<Vec<CTakesMention>> {
    let mut reader = Reader::from_str(xmi);
    reader.config_mut().trim_text(true);

    let mut sofa = String::new();
    let mut mentions: Vec<XmiMention> = Vec::new();
    let mut concepts: HashMap<String, HashMap<String, String>> = HashMap::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match name.split_once(':') {
                    Some(("cas", "Sofa")) => {
                        sofa = attributes(&e)?.remove("sofaString").unwrap_or_default();
                    }
                    Some(("refsem", "UmlsConcept")) => {
                        let mut attrs = attributes(&e)?;
                        if let Some(id) = attrs.remove("xmi:id") {
                            concepts.insert(id, attrs);
                        }
                    }
                    Some(("textsem", kind)) => {
                        let mut attrs = attributes(&e)?;
                        let Some(arr) = attrs.remove("ontologyConceptArr") else {
                            continue;
                        };
                        mentions.push(XmiMention {
                            kind: kind.to_string(),
                            begin: number(&attrs, "begin")?,
                            end: number(&attrs, "end")?,
                            polarity: number(&attrs, "polarity").unwrap_or(0),
                            concept_ids: arr.split_whitespace().map(str::to_string).collect(),
                        });
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(LibraryError::CTakes(format!(
                    "XMI error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    mentions.sort_by_key(|m| (m.begin, m.end));
    let mut rows = Vec::new();
    for m in &mentions {
        let text: String = sofa
            .chars()
            .skip(m.begin)
            .take(m.end.saturating_sub(m.begin))
            .collect();
        for id in &m.concept_ids {
            let Some(concept) = concepts.get(id) else {
                warn!(concept = %id, kind = %m.kind, "mention refers to a missing concept");
                continue;
            };
            let field = |key: &str| concept.get(key).cloned().unwrap_or_default();
            rows.push(CTakesMention {
                kind: m.kind.clone(),
                begin: m.begin,
                end: m.end,
                text: text.clone(),
                polarity: m.polarity,
                cui: field("cui"),
                tui: field("tui"),
                preferred_text: field("preferredText"),
                code: field("code"),
                scheme: field("codingScheme"),
            });
        }
    }
    debug!("parsed {} cTAKES mention rows", rows.len());
    Ok(rows)
}

fn attributes(e: &BytesStart<'_>) -> Result<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| LibraryError::CTakes(format!("bad XMI attribute: {}", err)))?;
        let value = attr
            .unescape_value()
            .map_err(|err| LibraryError::CTakes(format!("bad XMI attribute value: {}", err)))?;
        attrs.insert(
            String::from_utf8_lossy(attr.key.as_ref()).to_string(),
            value.to_string(),
        );
    }
    Ok(attrs)
}

fn number<T: std::str::FromStr>(attrs: &HashMap<String, String>, key: &str) -> Result<T> {
    attrs
        .get(key)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| LibraryError::CTakes(format!("mention without numeric {}", key)))
}
