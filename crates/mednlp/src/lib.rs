//! Medical natural language processing with UMLS.
//!
//! [`MedicalLibrary`] ties together the pieces of the workspace behind one
//! configuration file:
//! - UMLS Terminology Services lookups ([`mednlp_uts`])
//! - concept feature tokens for text ([`mednlp_ner`])
//! - cui2vec concept similarity ([`mednlp_embed`])
//! - Apache cTAKES mentions ([`ctakes`])
//!
//! ```no_run
//! use mednlp::{MedNlpConfig, MedicalLibrary};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = MedNlpConfig::load()?;
//!     let lib = MedicalLibrary::new(&config);
//!     for sim in lib.similarity_by_term("heart disease", 5)? {
//!         println!("{} {:.3}", sim.cui, sim.similarity);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod ctakes;
pub mod error;
pub mod library;
pub mod resource;

pub use config::MedNlpConfig;
pub use ctakes::{CTakesConfig, CTakesMention, CTakesParserStash};
pub use error::{LibraryError, Result};
pub use library::{Entity, EntitySimilarity, MedicalLibrary};
pub use resource::{CacheScope, LazyResource, MedicalResources};

pub use mednlp_common as common;
pub use mednlp_embed as embed;
pub use mednlp_ner as ner;
pub use mednlp_uts as uts;
