//! HTTP transport seam.
//!
//! The protocol logic in [`crate::client`] and [`crate::auth`] only needs two
//! blocking calls: a form POST and a GET with query parameters. Keeping them
//! behind [`Transport`] lets the ticket exchange and response handling run
//! against a scripted transport in tests.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use tracing::debug;

use crate::Result;

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("mednlp-uts/", env!("CARGO_PKG_VERSION"));

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking HTTP operations used by the UTS client.
pub trait Transport: Send + Sync {
    /// POST `form` as `application/x-www-form-urlencoded`, accepting plain text.
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse>;

    /// GET `url` with `query` appended as URL parameters.
    fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse>;
}

/// [`Transport`] backed by `reqwest::blocking`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse> {
        let resp = self
            .client
            .post(url)
            .header(ACCEPT, "text/plain")
            .form(form)
            .send()?;
        let status = resp.status().as_u16();
        let body = resp.text()?;
        debug!(url, status, "POST completed");
        Ok(HttpResponse { status, body })
    }

    fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse> {
        let resp = self.client.get(url).query(query).send()?;
        let status = resp.status().as_u16();
        let body = resp.text()?;
        debug!(url, status, "GET completed");
        Ok(HttpResponse { status, body })
    }
}
