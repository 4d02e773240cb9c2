//! `HttpClient` capability: the only seam between the OCI client and actual
//! network transport. Modeling it as a trait keeps registry-wire-protocol
//! semantics (auth flow, redirect/retry policy, digest verification)
//! testable against a plain mock without pulling transport concerns into
//! the rest of the core.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse>;
    fn head(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse>;
    fn put(&self, url: &str, headers: &[(String, String)], body: Vec<u8>) -> Result<HttpResponse>;
    fn post(&self, url: &str, headers: &[(String, String)], body: Vec<u8>)
    -> Result<HttpResponse>;
    fn patch(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> Result<HttpResponse>;

    /// Stream a GET response body directly to `dest`, returning the number
    /// of bytes written. Default implementation buffers through `get`;
    /// real transports should override to avoid holding the whole blob in
    /// memory.
    fn get_to_file(
        &self,
        url: &str,
        headers: &[(String, String)],
        dest: &Path,
    ) -> Result<(u64, HttpResponse)> {
        let resp = self.get(url, headers)?;
        let mut file =
            std::fs::File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
        file.write_all(&resp.body)?;
        Ok((resp.body.len() as u64, resp))
    }
}

/// Production transport backed by `reqwest::blocking::Client`.
///
/// Follows at most one redirect per request, matching the §4.B contract;
/// applies a per-request timeout of 60 seconds unless overridden.
pub struct ReqwestHttpClient {
    client: reqwest::blocking::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(60))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(format!("devcontainer-rs/{}", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(1))
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }

    fn to_response(resp: reqwest::blocking::Response) -> Result<HttpResponse> {
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = resp.bytes().context("reading response body")?.to_vec();
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new().expect("default reqwest client")
    }
}

impl HttpClient for ReqwestHttpClient {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse> {
        let mut req = self.client.get(url);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        Self::to_response(req.send().with_context(|| format!("GET {url}"))?)
    }

    fn head(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse> {
        let mut req = self.client.head(url);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        Self::to_response(req.send().with_context(|| format!("HEAD {url}"))?)
    }

    fn put(&self, url: &str, headers: &[(String, String)], body: Vec<u8>) -> Result<HttpResponse> {
        let mut req = self.client.put(url).body(body);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        Self::to_response(req.send().with_context(|| format!("PUT {url}"))?)
    }

    fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> Result<HttpResponse> {
        let mut req = self.client.post(url).body(body);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        Self::to_response(req.send().with_context(|| format!("POST {url}"))?)
    }

    fn patch(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> Result<HttpResponse> {
        let mut req = self.client.patch(url).body(body);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        Self::to_response(req.send().with_context(|| format!("PATCH {url}"))?)
    }
}
