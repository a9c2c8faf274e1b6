//! Example: look up a medical term in UMLS
//!
//! Searches UTS for a term, prints the preferred atom of the best match and
//! the concepts related to it.
//!
//!   UMLS_API_KEY=... cargo run -p mednlp --example uts_lookup -- "heart disease"

use mednlp::uts::Record;
use mednlp::{MedNlpConfig, MedicalLibrary};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let term = std::env::args().nth(1).unwrap_or_else(|| "heart".to_string());

    let config = match MedNlpConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("{}; using defaults", e);
            let mut config = MedNlpConfig::default();
            config.override_api_key(std::env::var("UMLS_API_KEY").ok());
            config
        }
    };
    let lib = MedicalLibrary::new(&config);
    let client = lib.resources().uts_client()?;

    let matches = client.search_term(&term, 1)?;
    println!("{} matches for '{}'", matches.len(), term);
    for m in matches.iter().take(5) {
        println!("  {} {}", field(m, "ui"), field(m, "name"));
    }

    let Some(cui) = matches.first().and_then(|m| m.get("ui")).and_then(|ui| ui.as_str()) else {
        return Ok(());
    };

    if let Some(atom) = lib.get_atom(cui)? {
        println!("\npreferred atom of {}:\n{}", cui, serde_json::to_string_pretty(&atom)?);
    }

    let related = client.get_related_cuis(cui, false)?;
    println!("\n{} related concepts", related.len());
    for (rel_cui, rel) in related.iter().take(10) {
        println!("  {} {}", rel_cui, field(rel, "relationLabel"));
    }
    Ok(())
}

fn field<'a>(rec: &'a Record, key: &str) -> &'a str {
    rec.get(key).and_then(|v| v.as_str()).unwrap_or("-")
}
