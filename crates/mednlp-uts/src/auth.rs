//! CAS ticket exchange for UTS.
//!
//! 1. POST the API key to `{auth_url}/cas/v1/api-key`. On success the body is
//!    an HTML form whose `action` is the ticket-granting ticket (TGT) URL, e.g.
//!    `https://utslogin.nlm.nih.gov/cas/v1/tickets/TGT-36471-...-cas`.
//!    A rejected key comes back as JSON with `authentication_exceptions`.
//! 2. POST the service name to the TGT URL. The plain text body is a
//!    single-use service ticket (ST) passed as `ticket` on the next request.

use scraper::{Html, Selector};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::transport::Transport;
use crate::{Result, UtsError};

/// Authentication service base URL.
pub const AUTH_URI: &str = "https://utslogin.nlm.nih.gov";

/// Path of the API key endpoint.
pub const AUTH_ENDPOINT: &str = "/cas/v1/api-key";

/// Service the tickets are issued for.
pub const SERVICE: &str = "http://umlsks.nlm.nih.gov";

/// Performs the two POSTs of the ticket exchange.
pub struct Authenticator {
    api_key: SecretString,
    auth_url: String,
    auth_endpoint: String,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("api_key", &redact(self.api_key.expose_secret()))
            .field("auth_url", &self.auth_url)
            .field("auth_endpoint", &self.auth_endpoint)
            .finish()
    }
}

impl Authenticator {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            auth_url: AUTH_URI.to_string(),
            auth_endpoint: AUTH_ENDPOINT.to_string(),
        }
    }

    /// Point at a different CAS server (scheme and host, no trailing slash).
    pub fn with_auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_auth_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.auth_endpoint = endpoint.into();
        self
    }

    /// Exchange the API key for a ticket-granting ticket URL.
    pub fn granting_ticket(&self, transport: &dyn Transport) -> Result<String> {
        let url = format!("{}{}", self.auth_url, self.auth_endpoint);
        let resp = transport.post_form(&url, &[("apikey", self.api_key.expose_secret())])?;
        parse_granting_ticket(&resp.body, self.api_key.expose_secret())
    }

    /// Exchange a ticket-granting ticket URL for a single-use service ticket.
    pub fn service_ticket(&self, transport: &dyn Transport, tgt: &str) -> Result<String> {
        let resp = transport.post_form(tgt, &[("service", SERVICE)])?;
        if !resp.is_success() {
            return Err(UtsError::Service {
                status: resp.status,
                url: tgt.to_string(),
                message: format!("service ticket request failed: <{}>", resp.body.trim()),
            });
        }
        let ticket = resp.body.trim();
        if ticket.is_empty() {
            return Err(UtsError::Protocol("empty service ticket".to_string()));
        }
        debug!("acquired service ticket");
        Ok(ticket.to_string())
    }
}

/// Extract the TGT URL from the API key response body.
fn parse_granting_ticket(body: &str, api_key: &str) -> Result<String> {
    if body.starts_with('{') {
        match serde_json::from_str::<Value>(body) {
            Ok(obj) => {
                if obj.get("authentication_exceptions").is_some() {
                    return Err(UtsError::Authentication(redact(api_key)));
                }
            }
            Err(e) => warn!("looks like JSON, but not decodable: <{}>: {}", body, e),
        }
    }

    let doc = Html::parse_document(body);
    let selector = Selector::parse("form[action]")
        .map_err(|e| UtsError::Protocol(format!("bad form selector: {}", e)))?;
    let action = doc
        .select(&selector)
        .next()
        .and_then(|form| form.value().attr("action"))
        .ok_or_else(|| {
            UtsError::Protocol(format!("no form action in authentication response: <{}>", body))
        })?;

    // the TGT must be an absolute URL since it is POSTed to directly
    let tgt = Url::parse(action)?;
    Ok(tgt.to_string())
}

/// Keep only the last four characters of a key for messages and logs.
pub(crate) fn redact(key: &str) -> String {
    let n = key.chars().count();
    if n <= 4 {
        return "****".to_string();
    }
    let tail: String = key.chars().skip(n - 4).collect();
    format!("****{}", tail)
}
