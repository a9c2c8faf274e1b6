//! Library operations backed by UTS, served by a mock server.

use std::fs;
use std::path::Path;

use mednlp::{LibraryError, MedNlpConfig, MedicalLibrary};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CUI2VEC: &str = "\"\",\"V1\",\"V2\"
\"C0018799\",1.0,0.0
\"C0035078\",0.8,0.2
\"C0018787\",0.6,0.8
";

async fn mock_uts() -> MockServer {
    let server = MockServer::start().await;
    let form = format!(
        r#"<html><body><form action="{}/cas/v1/tickets/TGT-1-cas" method="POST"></form></body></html>"#,
        server.uri()
    );
    Mock::given(method("POST"))
        .and(path("/cas/v1/api-key"))
        .respond_with(ResponseTemplate::new(201).set_body_string(form))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cas/v1/tickets/TGT-1-cas"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ST-1-cas"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/search/2020AA"))
        .and(query_param("string", "heart disease"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"results": [
                {"ui": "C0018799", "name": "Heart Diseases", "rootSource": "MTH"},
                {"ui": "C0018787", "name": "Heart", "rootSource": "MTH"}
            ]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/search/2020AA"))
        .and(query_param("string", "zzzz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "No results containing all your search terms were found."
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/content/2020AA/CUI/C0018787/atoms/preferred/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"ui": "A0066369", "name": "Heart", "termType": "PN"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/content/2020AA/CUI/C0000000/relations/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "No results containing all your search terms were found."
        })))
        .mount(&server)
        .await;
    server
}

fn config(dir: &Path, uri: &str) -> MedNlpConfig {
    fs::write(dir.join("cui2vec.csv"), CUI2VEC).unwrap();
    fs::write(
        dir.join("concepts.json"),
        r#"[{"cui": "C0035078", "pref_name": "Kidney Failure", "type_ids": ["T047"]}]"#,
    )
    .unwrap();
    let toml = format!(
        "[uts]\napi_key = \"test-key\"\nbase_url = {uri:?}\nauth_url = {uri:?}\ncache = false\n\
         [concepts]\npath = {:?}\n\
         [embedding]\npath = {:?}\ndimension = 2\n",
        dir.join("concepts.json"),
        dir.join("cui2vec.csv"),
    );
    MedNlpConfig::from_toml_str(&toml).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_library_over_mock_uts() {
    let server = mock_uts().await;
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), &server.uri());

    tokio::task::spawn_blocking(move || {
        let lib = MedicalLibrary::new(&config);

        let sims = lib.similarity_by_term("heart disease", 2).unwrap();
        let cuis: Vec<_> = sims.iter().map(|s| s.cui.as_str()).collect();
        assert_eq!(cuis, vec!["C0035078", "C0018787"]);
        assert_eq!(sims[0].entity.as_ref().unwrap().name, "Kidney Failure");
        assert!(sims[1].entity.is_none());

        assert!(lib.similarity_by_term("zzzz", 2).unwrap().is_empty());

        let atom = lib.get_atom("C0018787").unwrap().unwrap();
        assert_eq!(atom["name"], "Heart");

        match lib.get_relations("C0000000").unwrap_err() {
            LibraryError::Uts(e) => assert!(e.is_no_results()),
            other => panic!("unexpected error: {:?}", other),
        }
    })
    .await
    .unwrap();
}
