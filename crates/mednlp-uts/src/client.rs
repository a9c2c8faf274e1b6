//! UTS REST client.
//!
//! Endpoints used (all under `{base_url}/rest`, `{version}` e.g. `2020AA`):
//!   search:    /search/{version}?string=<term>&pageNumber=<n>
//!   atoms:     /content/{version}/CUI/{cui}/atoms/[preferred/]
//!   relations: /content/{version}/CUI/{cui}/relations/
//!
//! Responses are enveloped as `{"result": ...}` or `{"error": "<message>"}`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use mednlp_common::Stash;
use regex::Regex;
use secrecy::SecretString;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};
use url::Url;

use crate::auth::Authenticator;
use crate::transport::{HttpResponse, ReqwestTransport, Transport};
use crate::{Result, UtsError};

/// UTS REST service base URL.
pub const URI: &str = "https://uts-ws.nlm.nih.gov";

/// UMLS release queried unless overridden.
pub const DEFAULT_VERSION: &str = "2020AA";

/// Error message UTS uses for a query (usually a CUI) with no data.
pub const NO_RESULTS_ERR: &str = "No results containing all your search terms were found.";

/// Value stored in the stash for a query that returned no data.
pub const MISSING_VALUE: &str = "<missing>";

/// A JSON object as returned by UTS (search match, atom, relation).
pub type Record = Map<String, Value>;

/// Parses the related CUI out of a relation's `relatedId` URL.
fn rel_id_regex() -> &'static Regex {
    static REL_ID: OnceLock<Regex> = OnceLock::new();
    REL_ID.get_or_init(|| Regex::new(r".*CUI/(.+)$").expect("static regex"))
}

/// Result of [`UtsClient::get_atoms`].
#[derive(Debug, Clone, PartialEq)]
pub enum Atoms {
    /// The single preferred atom of the concept.
    Preferred(Record),
    /// Every atom of the concept in server order.
    All(Vec<Record>),
}

impl Atoms {
    /// The preferred atom, if this came from a preferred query.
    pub fn preferred(&self) -> Option<&Record> {
        match self {
            Atoms::Preferred(rec) => Some(rec),
            Atoms::All(_) => None,
        }
    }

    pub fn into_vec(self) -> Vec<Record> {
        match self {
            Atoms::Preferred(rec) => vec![rec],
            Atoms::All(recs) => recs,
        }
    }
}

/// Authenticated, optionally cached access to UTS.
///
/// Each request performs the full ticket exchange: a fresh ticket-granting
/// ticket and a fresh service ticket. [`UtsClient::with_tgt_lifetime`] opts in
/// to reusing the ticket-granting ticket for a bounded time.
pub struct UtsClient {
    auth: Authenticator,
    transport: Arc<dyn Transport>,
    base_url: String,
    version: String,
    request_stash: Option<Arc<dyn Stash>>,
    tgt_lifetime: Option<Duration>,
    tgt: Mutex<Option<(String, Instant)>>,
}

impl std::fmt::Debug for UtsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UtsClient")
            .field("auth", &self.auth)
            .field("base_url", &self.base_url)
            .field("version", &self.version)
            .field("cached", &self.request_stash.is_some())
            .field("tgt_lifetime", &self.tgt_lifetime)
            .finish()
    }
}

impl UtsClient {
    // ── Constructors ──────────────────────────────────────────────────────────

    /// Client for the public UTS service using a `reqwest` transport.
    pub fn new(api_key: SecretString) -> Result<Self> {
        Ok(Self::with_transport(api_key, Arc::new(ReqwestTransport::new()?)))
    }

    /// Client over an arbitrary transport.
    pub fn with_transport(api_key: SecretString, transport: Arc<dyn Transport>) -> Self {
        Self {
            auth: Authenticator::new(api_key),
            transport,
            base_url: URI.to_string(),
            version: DEFAULT_VERSION.to_string(),
            request_stash: None,
            tgt_lifetime: None,
            tgt: Mutex::new(None),
        }
    }

    /// UMLS release to query, e.g. `2023AB` or `current`.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Point at a different REST server.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        Url::parse(base_url)?;
        self.base_url = base_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Point at a different CAS authentication server.
    pub fn with_auth_url(mut self, auth_url: &str) -> Result<Self> {
        Url::parse(auth_url)?;
        self.auth = self.auth.with_auth_url(auth_url);
        Ok(self)
    }

    /// Cache every response (including "no results") in `stash`.
    pub fn with_stash(mut self, stash: Arc<dyn Stash>) -> Self {
        self.request_stash = Some(stash);
        self
    }

    /// Reuse the ticket-granting ticket for at most `lifetime`.
    pub fn with_tgt_lifetime(mut self, lifetime: Duration) -> Self {
        self.tgt_lifetime = Some(lifetime);
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    // ── Operations ────────────────────────────────────────────────────────────

    /// Search for a string term in UMLS.
    ///
    /// Returns the matches of every requested page concatenated in server
    /// order. Each match has the `name` of the term, the `ui` (CUI), the `uri`
    /// of the term and the `rootSource` of the originating system.
    #[instrument(skip(self))]
    pub fn search_term(&self, term: &str, pages: usize) -> Result<Vec<Record>> {
        let url = format!("{}/rest/search/{}", self.base_url, self.version);
        let mut res = Vec::new();
        for page_n in 0..pages {
            debug!("fetching page {}", page_n);
            let mut query = BTreeMap::new();
            query.insert("string".to_string(), term.to_string());
            query.insert("pageNumber".to_string(), (page_n + 1).to_string());
            let Some(result) = self.request(&url, &query, false)? else {
                continue;
            };
            let results = match result {
                Value::Object(mut obj) => obj.remove("results").ok_or_else(|| {
                    UtsError::Protocol(format!("search result without results: {}", url))
                })?,
                other => {
                    return Err(UtsError::Protocol(format!(
                        "unexpected search result: <{}>",
                        other
                    )))
                }
            };
            res.extend(into_records(results, "search results")?);
        }
        Ok(res)
    }

    /// Get the atoms of a CUI.
    ///
    /// With `preferred` only the preferred atom is returned. With `expect`
    /// false a concept without atoms yields `None` instead of
    /// [`UtsError::NoResults`].
    #[instrument(skip(self))]
    pub fn get_atoms(&self, cui: &str, preferred: bool, expect: bool) -> Result<Option<Atoms>> {
        let mut url = format!(
            "{}/rest/content/{}/CUI/{}/atoms/",
            self.base_url, self.version, cui
        );
        if preferred {
            url.push_str("preferred/");
        }
        debug!("fetching atom {}", cui);
        let Some(result) = self.request(&url, &BTreeMap::new(), expect)? else {
            return Ok(None);
        };
        let atoms = match (preferred, result) {
            (true, Value::Object(rec)) => Atoms::Preferred(rec),
            (false, value) => Atoms::All(into_records(value, "atoms")?),
            (true, other) => {
                return Err(UtsError::Protocol(format!(
                    "expected a single preferred atom for {}: <{}>",
                    cui, other
                )))
            }
        };
        Ok(Some(atoms))
    }

    /// Get the relations of a CUI in the order returned by UTS.
    #[instrument(skip(self))]
    pub fn get_relations(&self, cui: &str, expect: bool) -> Result<Option<Vec<Record>>> {
        let url = format!(
            "{}/rest/content/{}/CUI/{}/relations/",
            self.base_url, self.version, cui
        );
        self.request(&url, &BTreeMap::new(), expect)?
            .map(|v| into_records(v, "relations"))
            .transpose()
    }

    /// Get the CUIs related to a CUI, each paired with its relation entry.
    ///
    /// A relation whose `relatedId` does not end in `CUI/<id>` fails the whole
    /// call.
    #[instrument(skip(self))]
    pub fn get_related_cuis(&self, cui: &str, expect: bool) -> Result<Vec<(String, Record)>> {
        let Some(relations) = self.get_relations(cui, expect)? else {
            info!("no relations for cui {}", cui);
            return Ok(Vec::new());
        };
        relations
            .into_iter()
            .map(|rel| -> Result<(String, Record)> {
                let rel_url = rel.get("relatedId").and_then(Value::as_str).unwrap_or("");
                let related = rel_id_regex()
                    .captures(rel_url)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
                    .ok_or_else(|| {
                        UtsError::Protocol(format!(
                            "could not parse relation ID from <{}>",
                            rel_url
                        ))
                    })?;
                Ok((related, rel))
            })
            .collect()
    }

    // ── Request execution ─────────────────────────────────────────────────────

    fn request(
        &self,
        url: &str,
        query: &BTreeMap<String, String>,
        expect: bool,
    ) -> Result<Option<Value>> {
        match &self.request_stash {
            None => self.request_remote(url, query, expect),
            Some(stash) => self.request_cache(stash.as_ref(), url, query, expect),
        }
    }

    fn request_cache(
        &self,
        stash: &dyn Stash,
        url: &str,
        query: &BTreeMap<String, String>,
        expect: bool,
    ) -> Result<Option<Value>> {
        let key = cache_key(url, query);
        debug!("key: {}", key);
        let val = match stash.load(&key)? {
            Some(val) => val,
            None => {
                let val = self
                    .request_remote(url, query, expect)?
                    .unwrap_or_else(|| Value::String(MISSING_VALUE.to_string()));
                stash.dump(&key, &val)?;
                val
            }
        };
        if val.as_str() == Some(MISSING_VALUE) {
            return Ok(None);
        }
        Ok(Some(val))
    }

    fn request_remote(
        &self,
        url: &str,
        query: &BTreeMap<String, String>,
        expect: bool,
    ) -> Result<Option<Value>> {
        let ticket = self.service_ticket()?;
        let mut params: Vec<(String, String)> =
            query.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        params.push(("ticket".to_string(), ticket));
        let resp = self.transport.get(url, &params)?;
        interpret_response(url, &resp, expect)
    }

    fn service_ticket(&self) -> Result<String> {
        info!("logging in to UTS");
        let tgt = self.granting_ticket()?;
        self.auth.service_ticket(self.transport.as_ref(), &tgt)
    }

    fn granting_ticket(&self) -> Result<String> {
        let Some(lifetime) = self.tgt_lifetime else {
            return self.auth.granting_ticket(self.transport.as_ref());
        };
        // the guarded value is only a cache, so a poisoned lock is still usable
        let mut cached = self.tgt.lock().unwrap_or_else(|p| p.into_inner());
        if let Some((tgt, acquired)) = cached.as_ref() {
            if acquired.elapsed() < lifetime {
                debug!("reusing ticket-granting ticket");
                return Ok(tgt.clone());
            }
        }
        let tgt = self.auth.granting_ticket(self.transport.as_ref())?;
        *cached = Some((tgt.clone(), Instant::now()));
        Ok(tgt)
    }
}

/// Stash key: the URL plus the sorted query (ticket excluded).
pub(crate) fn cache_key(url: &str, query: &BTreeMap<String, String>) -> String {
    let q = query
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", url, q)
}

/// Unwrap the `result` of a UTS envelope.
fn interpret_response(url: &str, resp: &HttpResponse, expect: bool) -> Result<Option<Value>> {
    let items: Value = serde_json::from_str(&resp.body).map_err(|e| {
        debug!("can not parse: <{}>: {}", resp.body, e);
        UtsError::Protocol(format!(
            "could not parse: <{}>, code: {}",
            resp.body, resp.status
        ))
    })?;
    let Value::Object(mut items) = items else {
        return Err(UtsError::Protocol(format!("unknown response: <{}>", resp.body)));
    };

    let err = match items.get("error") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };

    if err.as_deref() == Some(NO_RESULTS_ERR) {
        if !expect {
            return Ok(None);
        }
        return Err(UtsError::NoResults(format!(
            "could not request {}: {}",
            url, NO_RESULTS_ERR
        )));
    }
    if resp.status != 200 {
        let message = err.unwrap_or_else(|| format!("response: <{}>", resp.body));
        return Err(UtsError::Service {
            status: resp.status,
            url: url.to_string(),
            message,
        });
    }
    if let Some(message) = err {
        return Err(UtsError::Service {
            status: resp.status,
            url: url.to_string(),
            message,
        });
    }
    items
        .remove("result")
        .map(Some)
        .ok_or_else(|| UtsError::Protocol(format!("unknown response: <{}>", resp.body)))
}

/// Convert a JSON array of objects into records.
fn into_records(value: Value, what: &str) -> Result<Vec<Record>> {
    let Value::Array(items) = value else {
        return Err(UtsError::Protocol(format!("expected a list of {}: <{}>", what, value)));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(rec) => Ok(rec),
            other => Err(UtsError::Protocol(format!(
                "expected an object in {}: <{}>",
                what, other
            ))),
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mednlp_common::MemoryStash;
    use serde_json::json;
    use std::collections::HashMap;

    const AUTH: &str = "https://auth.test";
    const BASE: &str = "https://uts.test";
    const TGT: &str = "https://auth.test/cas/v1/tickets/TGT-1-abc-cas";
    const ST: &str = "ST-42-cas";

    /// Answers the ticket exchange and serves canned GET responses keyed like
    /// the stash (`url?sorted-query`).
    #[derive(Default)]
    struct ScriptedTransport {
        reject_key: bool,
        routes: HashMap<String, HttpResponse>,
        posts: Mutex<Vec<String>>,
        gets: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl ScriptedTransport {
        fn route(mut self, key: &str, status: u16, body: Value) -> Self {
            self.routes
                .insert(key.to_string(), HttpResponse::new(status, body.to_string()));
            self
        }

        fn raw_route(mut self, key: &str, status: u16, body: &str) -> Self {
            self.routes.insert(key.to_string(), HttpResponse::new(status, body));
            self
        }

        fn get_count(&self) -> usize {
            self.gets.lock().unwrap().len()
        }

        fn post_count(&self) -> usize {
            self.posts.lock().unwrap().len()
        }
    }

    impl Transport for ScriptedTransport {
        fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse> {
            self.posts.lock().unwrap().push(url.to_string());
            if url.ends_with("/cas/v1/api-key") {
                assert_eq!(form[0].0, "apikey");
                if self.reject_key {
                    return Ok(HttpResponse::new(
                        401,
                        r#"{"authentication_exceptions":["FailedLoginException"]}"#,
                    ));
                }
                let html = format!(r#"<html><body><form action="{}" method="POST"></form></body></html>"#, TGT);
                return Ok(HttpResponse::new(201, html));
            }
            assert_eq!(url, TGT);
            assert_eq!(form, &[("service", crate::auth::SERVICE)]);
            Ok(HttpResponse::new(200, ST))
        }

        fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse> {
            self.gets
                .lock()
                .unwrap()
                .push((url.to_string(), query.to_vec()));
            let q: BTreeMap<String, String> = query
                .iter()
                .filter(|(k, _)| k != "ticket")
                .cloned()
                .collect();
            Ok(self
                .routes
                .get(&cache_key(url, &q))
                .cloned()
                .unwrap_or_else(|| HttpResponse::new(404, r#"{"error":"Not found"}"#)))
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> UtsClient {
        UtsClient::with_transport(SecretString::from("test-api-key"), transport)
            .with_base_url(BASE)
            .unwrap()
            .with_auth_url(AUTH)
            .unwrap()
    }

    fn search_key(term: &str, page: usize) -> String {
        format!("{}/rest/search/2020AA?pageNumber={}&string={}", BASE, page, term)
    }

    fn atoms_key(cui: &str, preferred: bool) -> String {
        let suffix = if preferred { "preferred/" } else { "" };
        format!("{}/rest/content/2020AA/CUI/{}/atoms/{}?", BASE, cui, suffix)
    }

    fn relations_key(cui: &str) -> String {
        format!("{}/rest/content/2020AA/CUI/{}/relations/?", BASE, cui)
    }

    fn heart_transport() -> ScriptedTransport {
        ScriptedTransport::default()
            .route(
                &search_key("heart", 1),
                200,
                json!({"result": {"classType": "searchResults", "results": [
                    {"ui": "C0018787", "name": "Heart", "rootSource": "MTH"},
                    {"ui": "C0018799", "name": "Heart Diseases", "rootSource": "MTH"}
                ]}}),
            )
            .route(
                &search_key("heart", 2),
                200,
                json!({"result": {"results": [
                    {"ui": "C0018802", "name": "Congestive heart failure", "rootSource": "MTH"}
                ]}}),
            )
            .route(
                &atoms_key("C0018787", true),
                200,
                json!({"result": {"ui": "A0066369", "name": "Heart", "termType": "PN"}}),
            )
    }

    #[test]
    fn test_cache_key_sorts_query() {
        let mut q = BTreeMap::new();
        q.insert("string".to_string(), "heart".to_string());
        q.insert("pageNumber".to_string(), "1".to_string());
        assert_eq!(cache_key("u", &q), "u?pageNumber=1&string=heart");
        assert_eq!(cache_key("u", &BTreeMap::new()), "u?");
    }

    #[test]
    fn test_search_then_preferred_atom() {
        let transport = Arc::new(heart_transport());
        let client = client(transport.clone());

        let matches = client.search_term("heart", 1).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0]["ui"], "C0018787");

        let cui = matches[0]["ui"].as_str().unwrap();
        let atoms = client.get_atoms(cui, true, true).unwrap().unwrap();
        let atom = atoms.preferred().unwrap();
        assert!(atom.contains_key("name"));
        assert_eq!(atom["name"], "Heart");
    }

    #[test]
    fn test_search_concatenates_pages_in_order() {
        let client = client(Arc::new(heart_transport()));
        let matches = client.search_term("heart", 2).unwrap();
        let uis: Vec<_> = matches.iter().map(|m| m["ui"].as_str().unwrap()).collect();
        assert_eq!(uis, vec!["C0018787", "C0018799", "C0018802"]);
    }

    #[test]
    fn test_search_page_without_results_contributes_nothing() {
        let transport = heart_transport().route(
            &search_key("heart", 3),
            200,
            json!({"error": NO_RESULTS_ERR}),
        );
        let client = client(Arc::new(transport));
        assert_eq!(client.search_term("heart", 3).unwrap().len(), 3);
    }

    #[test]
    fn test_every_request_gets_a_fresh_ticket() {
        let transport = Arc::new(heart_transport());
        let client = client(transport.clone());
        client.search_term("heart", 2).unwrap();

        assert_eq!(transport.get_count(), 2);
        // one TGT and one ST per request
        assert_eq!(transport.post_count(), 4);
        let gets = transport.gets.lock().unwrap();
        for (_, query) in gets.iter() {
            assert!(query.contains(&("ticket".to_string(), ST.to_string())));
        }
    }

    #[test]
    fn test_tgt_reuse_is_opt_in() {
        let transport = Arc::new(heart_transport());
        let client = client(transport.clone()).with_tgt_lifetime(Duration::from_secs(60));
        client.search_term("heart", 2).unwrap();
        // one TGT shared, one ST per request
        assert_eq!(transport.post_count(), 3);
    }

    #[test]
    fn test_expired_tgt_is_fetched_again() {
        let transport = Arc::new(heart_transport());
        let client = client(transport.clone()).with_tgt_lifetime(Duration::ZERO);
        client.search_term("heart", 2).unwrap();
        // a zero lifetime never reuses: TGT and ST for each page
        assert_eq!(transport.post_count(), 4);
    }

    #[test]
    fn test_cached_requests_hit_network_once() {
        let transport = Arc::new(heart_transport());
        let stash = Arc::new(MemoryStash::new());
        let client = client(transport.clone()).with_stash(stash.clone());

        let first = client.search_term("heart", 1).unwrap();
        let second = client.search_term("heart", 1).unwrap();
        assert_eq!(first, second);
        client.get_atoms("C0018787", true, true).unwrap();
        client.get_atoms("C0018787", true, true).unwrap();

        assert_eq!(transport.get_count(), 2);
        assert_eq!(stash.len(), 2);
    }

    #[test]
    fn test_missing_value_round_trips_to_none() {
        let transport = Arc::new(ScriptedTransport::default().route(
            &relations_key("C9999999"),
            404,
            json!({"error": NO_RESULTS_ERR}),
        ));
        let stash = Arc::new(MemoryStash::new());
        let client = client(transport.clone()).with_stash(stash.clone());

        assert_eq!(client.get_relations("C9999999", false).unwrap(), None);
        assert_eq!(client.get_relations("C9999999", false).unwrap(), None);
        assert_eq!(transport.get_count(), 1);

        let key = relations_key("C9999999");
        assert_eq!(stash.load(&key).unwrap(), Some(json!(MISSING_VALUE)));
    }

    #[test]
    fn test_no_results_when_expected_is_an_error_and_not_cached() {
        let transport = Arc::new(ScriptedTransport::default().route(
            &relations_key("C9999999"),
            404,
            json!({"error": NO_RESULTS_ERR}),
        ));
        let stash = Arc::new(MemoryStash::new());
        let client = client(transport).with_stash(stash.clone());

        let err = client.get_relations("C9999999", true).unwrap_err();
        assert!(err.is_no_results());
        assert!(stash.is_empty());
    }

    #[test]
    fn test_related_cuis_without_relations_is_empty() {
        let transport = ScriptedTransport::default().route(
            &relations_key("C9999999"),
            404,
            json!({"error": NO_RESULTS_ERR}),
        );
        let client = client(Arc::new(transport));
        assert!(client.get_related_cuis("C9999999", false).unwrap().is_empty());
    }

    #[test]
    fn test_related_cuis_extracts_ids_in_order() {
        let transport = ScriptedTransport::default().route(
            &relations_key("C0018787"),
            200,
            json!({"result": [
                {"relationLabel": "RO", "relatedId": "https://uts-ws.nlm.nih.gov/rest/content/2020AA/CUI/C0027061"},
                {"relationLabel": "RB", "relatedId": "https://uts-ws.nlm.nih.gov/rest/content/2020AA/CUI/C0018799"}
            ]}),
        );
        let client = client(Arc::new(transport));
        let related = client.get_related_cuis("C0018787", true).unwrap();
        let cuis: Vec<_> = related.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(cuis, vec!["C0027061", "C0018799"]);
        assert_eq!(related[0].1["relationLabel"], "RO");
    }

    #[test]
    fn test_related_cuis_malformed_url_fails() {
        let transport = ScriptedTransport::default().route(
            &relations_key("C0018787"),
            200,
            json!({"result": [
                {"relatedId": "https://uts-ws.nlm.nih.gov/rest/content/2020AA/CUI/C0027061"},
                {"relatedId": "https://uts-ws.nlm.nih.gov/rest/content/2020AA/AUI/A123"}
            ]}),
        );
        let client = client(Arc::new(transport));
        let err = client.get_related_cuis("C0018787", true).unwrap_err();
        assert!(matches!(err, UtsError::Protocol(_)));
    }

    #[test]
    fn test_all_atoms_is_a_list() {
        let transport = ScriptedTransport::default().route(
            &atoms_key("C0018787", false),
            200,
            json!({"result": [{"name": "Heart"}, {"name": "Cardiac structure"}]}),
        );
        let client = client(Arc::new(transport));
        let atoms = client.get_atoms("C0018787", false, true).unwrap().unwrap();
        assert!(atoms.preferred().is_none());
        assert_eq!(atoms.into_vec().len(), 2);
    }

    #[test]
    fn test_service_error_carries_status_and_message() {
        let transport = ScriptedTransport::default().route(
            &atoms_key("C0018787", true),
            500,
            json!({"error": "Internal error"}),
        );
        let client = client(Arc::new(transport));
        match client.get_atoms("C0018787", true, true).unwrap_err() {
            UtsError::Service { status, message, .. } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Internal error");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_error_field_with_ok_status_is_service_error() {
        let transport = ScriptedTransport::default().route(
            &atoms_key("C0018787", true),
            200,
            json!({"error": "Something odd"}),
        );
        let client = client(Arc::new(transport));
        let err = client.get_atoms("C0018787", true, true).unwrap_err();
        assert!(matches!(err, UtsError::Service { status: 200, .. }));
    }

    #[test]
    fn test_non_json_body_is_protocol_error() {
        let transport =
            ScriptedTransport::default().raw_route(&atoms_key("C0018787", true), 502, "<html>Bad gateway</html>");
        let client = client(Arc::new(transport));
        let err = client.get_atoms("C0018787", true, true).unwrap_err();
        assert!(matches!(err, UtsError::Protocol(_)));
    }

    #[test]
    fn test_missing_result_envelope_is_protocol_error() {
        let transport = ScriptedTransport::default().route(
            &atoms_key("C0018787", true),
            200,
            json!({"pageSize": 25}),
        );
        let client = client(Arc::new(transport));
        let err = client.get_atoms("C0018787", true, true).unwrap_err();
        assert!(matches!(err, UtsError::Protocol(_)));
    }

    #[test]
    fn test_rejected_key_is_authentication_error() {
        let transport = Arc::new(ScriptedTransport {
            reject_key: true,
            ..heart_transport()
        });
        let client = client(transport.clone());
        let err = client.search_term("heart", 1).unwrap_err();
        assert!(err.is_auth_error());
        assert_eq!(transport.get_count(), 0);
    }
}
