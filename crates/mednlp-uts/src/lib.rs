//! Client for the UMLS Terminology Services (UTS) REST API.
//!
//! Every lookup authenticates with a two-step CAS ticket exchange (API key →
//! ticket-granting ticket → single-use service ticket), then issues a GET
//! against one of the content endpoints. Responses can be cached in any
//! [`mednlp_common::Stash`], including the fact that a concept has no data.
//!
//! ```no_run
//! use mednlp_uts::UtsClient;
//! use secrecy::SecretString;
//!
//! # fn main() -> mednlp_uts::Result<()> {
//! let client = UtsClient::new(SecretString::from("my-api-key"))?;
//! let matches = client.search_term("heart", 1)?;
//! let cui = matches[0]["ui"].as_str().unwrap_or_default();
//! let atom = client.get_atoms(cui, true, true)?;
//! println!("{:?}", atom);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod transport;

pub use auth::Authenticator;
pub use client::{Atoms, Record, UtsClient};
pub use error::{Result, UtsError};
pub use transport::{HttpResponse, ReqwestTransport, Transport};
