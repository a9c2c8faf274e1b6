//! Lazily created, memoized resources.
//!
//! Loading a concept database or the cui2vec model takes seconds, so each
//! resource is created on first use by a [`LazyResource`] and, with
//! [`CacheScope::Process`], shared afterwards as an `Arc`. The document parser
//! is memoized the same way since building it compiles every concept name
//! into the recognizer automaton.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mednlp_common::{DirectoryStash, Stash};
use mednlp_embed::Cui2VecModel;
use mednlp_ner::{ConceptDatabase, InMemoryConceptDb, MedicalDocumentParser, TuiCatalog};
use mednlp_uts::{ReqwestTransport, UtsClient};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::MedNlpConfig;
use crate::ctakes::CTakesParserStash;
use crate::{LibraryError, Result};

/// How long a loaded resource is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    /// Load once and share until [`LazyResource::clear`].
    #[default]
    Process,
    /// Load on every access.
    Call,
}

type Loader<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

/// A memoizing factory for one resource.
pub struct LazyResource<T> {
    name: String,
    scope: CacheScope,
    loader: Loader<T>,
    cell: Mutex<Option<Arc<T>>>,
}

impl<T> std::fmt::Debug for LazyResource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyResource")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl<T> LazyResource<T> {
    pub fn new<F>(name: impl Into<String>, scope: CacheScope, loader: F) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            scope,
            loader: Box::new(loader),
            cell: Mutex::new(None),
        }
    }

    pub fn scope(&self) -> CacheScope {
        self.scope
    }

    /// The resource, loading it if not yet memoized.
    ///
    /// A failed load is not memoized; the next call tries again.
    pub fn get(&self) -> Result<Arc<T>> {
        if self.scope == CacheScope::Call {
            debug!("loading {} for this call", self.name);
            return Ok(Arc::new((self.loader)()?));
        }
        // the slot is a plain cache, so a poisoned lock is still usable
        let mut cell = self.cell.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(res) = cell.as_ref() {
            return Ok(Arc::clone(res));
        }
        info!("loading resource: {}", self.name);
        let res = Arc::new((self.loader)()?);
        *cell = Some(Arc::clone(&res));
        Ok(res)
    }

    pub fn is_loaded(&self) -> bool {
        self.cell
            .lock()
            .map(|c| c.is_some())
            .unwrap_or(false)
    }

    /// Drop the memoized value so the next access reloads.
    pub fn clear(&self) {
        let mut cell = self.cell.lock().unwrap_or_else(|p| p.into_inner());
        if cell.take().is_some() {
            debug!("cleared resource: {}", self.name);
        }
    }
}

/// The configured resources of a [`crate::MedicalLibrary`].
#[derive(Debug)]
pub struct MedicalResources {
    concept_db: Arc<LazyResource<InMemoryConceptDb>>,
    tui_catalog: Option<Arc<LazyResource<TuiCatalog>>>,
    parser: LazyResource<MedicalDocumentParser>,
    cui2vec: LazyResource<Cui2VecModel>,
    uts_client: LazyResource<UtsClient>,
    ctakes: LazyResource<CTakesParserStash>,
}

impl MedicalResources {
    pub fn new(config: &MedNlpConfig) -> Self {
        let scope = config.resources.cache_scope;

        let concepts_path = config.concepts.path.clone();
        let concept_db = Arc::new(LazyResource::new("concept database", scope, move || {
            let path = concepts_path.as_ref().ok_or_else(|| {
                LibraryError::Configuration("no concept database path configured".to_string())
            })?;
            Ok(InMemoryConceptDb::from_json_file(path)?)
        }));

        let tui_catalog = config.concepts.tuis_path.clone().map(|tuis_path| {
            let groups_path = config.concepts.groups_path.clone();
            Arc::new(LazyResource::new("semantic types", scope, move || {
                Ok(TuiCatalog::from_files(&tuis_path, groups_path.as_deref())?)
            }))
        });

        let parser = {
            let concept_db = Arc::clone(&concept_db);
            let tui_catalog = tui_catalog.clone();
            let filter_tuis = config.concepts.filter_tuis.clone();
            let filter_groups = config.concepts.filter_groups.clone();
            LazyResource::new("document parser", scope, move || {
                let db: Arc<dyn ConceptDatabase> = concept_db.get()?;
                let mut builder = MedicalDocumentParser::builder()
                    .concept_db(db)
                    .filter_tuis(filter_tuis.iter().cloned())
                    .filter_groups(filter_groups.iter().cloned());
                if let Some(tuis) = &tui_catalog {
                    builder = builder.tui_catalog(tuis.get()?);
                }
                Ok(builder.build()?)
            })
        };

        let embedding = config.embedding.clone();
        let cui2vec = LazyResource::new("cui2vec", scope, move || {
            let embedding = embedding.as_ref().ok_or_else(|| {
                LibraryError::Configuration("no cui2vec embedding configured".to_string())
            })?;
            Ok(Cui2VecModel::load(embedding)?)
        });

        let uts = UtsSettings::from_config(config);
        let uts_client = LazyResource::new("UTS client", scope, move || uts.client());

        let ctakes_config = config.ctakes.clone();
        let ctakes = LazyResource::new("cTAKES", scope, move || {
            let ctakes = ctakes_config.as_ref().ok_or_else(|| {
                LibraryError::Configuration("no [ctakes] section configured".to_string())
            })?;
            CTakesParserStash::new(ctakes)
        });

        Self {
            concept_db,
            tui_catalog,
            parser,
            cui2vec,
            uts_client,
            ctakes,
        }
    }

    pub fn concept_db(&self) -> Result<Arc<dyn ConceptDatabase>> {
        Ok(self.concept_db.get()?)
    }

    /// `None` when no semantic types file is configured.
    pub fn tui_catalog(&self) -> Result<Option<Arc<TuiCatalog>>> {
        self.tui_catalog.as_ref().map(|tuis| tuis.get()).transpose()
    }

    /// A parser over the concept database, TUI catalog and configured filter.
    pub fn parser(&self) -> Result<Arc<MedicalDocumentParser>> {
        self.parser.get()
    }

    pub fn cui2vec(&self) -> Result<Arc<Cui2VecModel>> {
        self.cui2vec.get()
    }

    pub fn uts_client(&self) -> Result<Arc<UtsClient>> {
        self.uts_client.get()
    }

    pub fn ctakes(&self) -> Result<Arc<CTakesParserStash>> {
        self.ctakes.get()
    }

    /// Drop every memoized resource.
    pub fn clear(&self) {
        self.concept_db.clear();
        if let Some(tuis) = &self.tui_catalog {
            tuis.clear();
        }
        self.parser.clear();
        self.cui2vec.clear();
        self.uts_client.clear();
        self.ctakes.clear();
    }
}

/// Owned copy of the `[uts]` section for the client loader.
struct UtsSettings {
    api_key: Option<String>,
    base_url: String,
    auth_url: String,
    version: String,
    stash_dir: Option<std::path::PathBuf>,
    tgt_lifetime: Option<Duration>,
    timeout: Duration,
}

impl UtsSettings {
    fn from_config(config: &MedNlpConfig) -> Self {
        let uts = &config.uts;
        let stash_dir = uts.cache.then(|| {
            uts.cache_dir
                .clone()
                .unwrap_or_else(|| DirectoryStash::in_cache_dir("uts").dir().to_path_buf())
        });
        Self {
            api_key: uts.api_key.as_ref().map(|k| k.expose_secret().to_string()),
            base_url: uts.base_url.clone(),
            auth_url: uts.auth_url.clone(),
            version: uts.version.clone(),
            stash_dir,
            tgt_lifetime: uts.tgt_lifetime_secs.map(Duration::from_secs),
            timeout: Duration::from_secs(uts.timeout_secs),
        }
    }

    fn client(&self) -> Result<UtsClient> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            LibraryError::Configuration(
                "no UTS API key: set [uts] api_key or UMLS_API_KEY".to_string(),
            )
        })?;
        let transport = Arc::new(ReqwestTransport::with_timeout(self.timeout)?);
        let mut client = UtsClient::with_transport(SecretString::from(api_key), transport)
            .with_base_url(&self.base_url)?
            .with_auth_url(&self.auth_url)?
            .with_version(self.version.clone());
        if let Some(dir) = &self.stash_dir {
            let stash: Arc<dyn Stash> = Arc::new(DirectoryStash::new(dir));
            client = client.with_stash(stash);
        }
        if let Some(lifetime) = self.tgt_lifetime {
            client = client.with_tgt_lifetime(lifetime);
        }
        Ok(client)
    }
}
