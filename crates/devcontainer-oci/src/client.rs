//! OCI Distribution v2 operations: manifest/blob GET/HEAD/PUT, tag listing,
//! and the redirect/retry policy shared by all of them.

use std::path::Path;
use std::sync::Arc;

use devcontainer_retry::{retry_with_backoff, RetryStrategyConfig};
use devcontainer_types::{CoreError, CoreResult, Manifest};
use serde::Deserialize;

use crate::auth::{Scope, TokenCache};
use crate::digest::sha256_digest;
use crate::http_client::{HttpClient, HttpResponse};

pub struct OciClient {
    http: Arc<dyn HttpClient>,
    tokens: TokenCache,
    retry: RetryStrategyConfig,
}

impl OciClient {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            tokens: TokenCache::new(),
            retry: RetryStrategyConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryStrategyConfig) -> Self {
        self.retry = retry;
        self
    }

    fn repo_url(registry: &str, namespace: &str, name: &str, kind: &str, locator: &str) -> String {
        format!("https://{registry}/v2/{namespace}/{name}/{kind}/{locator}")
    }

    /// Authorization header for a repository/scope, negotiating via the
    /// anonymous request's 401 challenge if no token is cached yet.
    fn authorize(
        &self,
        registry: &str,
        namespace: &str,
        name: &str,
        scope: Scope,
        probe: impl Fn() -> anyhow::Result<HttpResponse>,
    ) -> CoreResult<Option<String>> {
        let repo_path = format!("{namespace}/{name}");
        let resp = probe().map_err(|e| CoreError::network("oci", e.to_string()))?;

        if resp.status != 401 {
            return Ok(None);
        }

        let challenge = resp
            .header("www-authenticate")
            .ok_or_else(|| CoreError::auth_required(registry))?
            .to_string();

        let token = self.tokens.get_or_negotiate(
            self.http.as_ref(),
            registry,
            namespace,
            &repo_path,
            scope,
            &challenge,
        )?;

        Ok(Some(token))
    }

    fn auth_headers(token: &Option<String>) -> Vec<(String, String)> {
        match token {
            Some(t) => vec![("Authorization".to_string(), format!("Bearer {t}"))],
            None => vec![],
        }
    }

    pub fn get_session_token(
        &self,
        registry: &str,
        namespace: &str,
        name: &str,
        scope: Scope,
    ) -> CoreResult<Option<String>> {
        let manifest_url = Self::repo_url(registry, namespace, name, "manifests", "latest");
        self.authorize(registry, namespace, name, scope, || self.http.head(&manifest_url, &[]))
    }

    pub fn get_manifest(
        &self,
        registry: &str,
        namespace: &str,
        name: &str,
        reference: &str,
    ) -> CoreResult<(Vec<u8>, Manifest)> {
        let url = Self::repo_url(registry, namespace, name, "manifests", reference);
        let accept = vec![(
            "Accept".to_string(),
            "application/vnd.oci.image.manifest.v1+json".to_string(),
        )];

        let token = self.authorize(registry, namespace, name, Scope::Pull, || {
            self.http.get(&url, &accept)
        })?;
        let headers = [accept, Self::auth_headers(&token)].concat();

        let resp = self.get_with_retry(&url, &headers)?;

        match resp.status {
            200 => {
                let manifest: Manifest = serde_json::from_slice(&resp.body)
                    .map_err(|e| CoreError::bad_manifest(format!("invalid manifest JSON: {e}")))?;
                Ok((resp.body, manifest))
            }
            404 => Err(CoreError::not_found(
                "oci",
                format!("manifest not found: {namespace}/{name}:{reference}"),
            )),
            s => Err(CoreError::bad_manifest(format!(
                "unexpected status {s} fetching manifest"
            ))),
        }
    }

    pub fn head_blob(
        &self,
        registry: &str,
        namespace: &str,
        name: &str,
        digest: &str,
    ) -> CoreResult<bool> {
        let url = Self::repo_url(registry, namespace, name, "blobs", digest);
        let token = self.authorize(registry, namespace, name, Scope::Pull, || {
            self.http.head(&url, &[])
        })?;
        let headers = Self::auth_headers(&token);
        let resp = self
            .http
            .head(&url, &headers)
            .map_err(|e| CoreError::network("oci", e.to_string()))?;
        Ok(resp.status == 200)
    }

    /// Download a blob to `dest`, verifying its digest against `digest`.
    /// On mismatch the partial file is removed and an `IntegrityError` is
    /// returned.
    pub fn get_blob(
        &self,
        registry: &str,
        namespace: &str,
        name: &str,
        digest: &str,
        dest: &Path,
    ) -> CoreResult<u64> {
        let url = Self::repo_url(registry, namespace, name, "blobs", digest);
        let token = self.authorize(registry, namespace, name, Scope::Pull, || {
            self.http.get(&url, &[])
        })?;
        let headers = Self::auth_headers(&token);

        let (written, resp) = self
            .http
            .get_to_file(&url, &headers, dest)
            .map_err(|e| CoreError::network("oci", e.to_string()))?;

        if resp.status != 200 {
            let _ = std::fs::remove_file(dest);
            return Err(CoreError::not_found(
                "oci",
                format!("blob not found: {namespace}/{name}@{digest}"),
            ));
        }

        let bytes = std::fs::read(dest)
            .map_err(|e| CoreError::runtime_failure(format!("reading downloaded blob: {e}")))?;
        let actual = sha256_digest(&bytes);
        if actual != digest {
            let _ = std::fs::remove_file(dest);
            return Err(CoreError::integrity(format!(
                "blob digest mismatch: expected {digest}, got {actual}"
            )));
        }

        Ok(written)
    }

    /// Two-step blob upload: initiate the session, then PUT the content
    /// with the computed digest as a query parameter.
    pub fn put_blob(
        &self,
        registry: &str,
        namespace: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> CoreResult<String> {
        let digest = sha256_digest(&bytes);
        let initiate_url = format!("https://{registry}/v2/{namespace}/{name}/blobs/uploads/");

        let token = self.authorize(registry, namespace, name, Scope::Push, || {
            self.http.post(&initiate_url, &[], Vec::new())
        })?;
        let headers = Self::auth_headers(&token);

        let initiate = self
            .http
            .post(&initiate_url, &headers, Vec::new())
            .map_err(|e| CoreError::network("oci", e.to_string()))?;

        if initiate.status != 202 {
            return Err(CoreError::new(
                devcontainer_types::ErrorKind::AuthRequired,
                "oci",
                format!("blob upload not authorized: status {}", initiate.status),
            ));
        }

        let location = initiate
            .header("location")
            .ok_or_else(|| CoreError::runtime_failure("upload initiation missing Location"))?;
        let upload_url = format!(
            "{location}{sep}digest={digest}",
            sep = if location.contains('?') { '&' } else { '?' }
        );

        let put_resp = self
            .http
            .put(&upload_url, &headers, bytes)
            .map_err(|e| CoreError::network("oci", e.to_string()))?;

        if !put_resp.is_success() {
            return Err(CoreError::new(
                devcontainer_types::ErrorKind::AuthRequired,
                "oci",
                format!("blob upload failed: status {}", put_resp.status),
            ));
        }

        Ok(digest)
    }

    pub fn put_manifest(
        &self,
        registry: &str,
        namespace: &str,
        name: &str,
        reference: &str,
        manifest_bytes: Vec<u8>,
    ) -> CoreResult<String> {
        let url = Self::repo_url(registry, namespace, name, "manifests", reference);
        let digest = sha256_digest(&manifest_bytes);

        let token = self.authorize(registry, namespace, name, Scope::Push, || {
            self.http.put(&url, &[], Vec::new())
        })?;
        let headers = [
            Self::auth_headers(&token),
            vec![(
                "Content-Type".to_string(),
                "application/vnd.oci.image.manifest.v1+json".to_string(),
            )],
        ]
        .concat();

        let resp = self
            .http
            .put(&url, &headers, manifest_bytes)
            .map_err(|e| CoreError::network("oci", e.to_string()))?;

        if !resp.is_success() {
            return Err(CoreError::new(
                devcontainer_types::ErrorKind::AuthRequired,
                "oci",
                format!("manifest push failed: status {}", resp.status),
            ));
        }

        Ok(digest)
    }

    pub fn list_tags(&self, registry: &str, namespace: &str, name: &str) -> CoreResult<Vec<String>> {
        let url = format!("https://{registry}/v2/{namespace}/{name}/tags/list");

        let token = self.authorize(registry, namespace, name, Scope::Pull, || {
            self.http.get(&url, &[])
        })?;
        let headers = Self::auth_headers(&token);

        let resp = self.get_with_retry(&url, &headers)?;

        match resp.status {
            200 => {
                let parsed: TagsList = serde_json::from_slice(&resp.body)
                    .map_err(|e| CoreError::bad_manifest(format!("invalid tags list: {e}")))?;
                let mut tags = parsed.tags;
                tags.sort();
                Ok(tags)
            }
            404 => Err(CoreError::not_found(
                "oci",
                format!("repository not found: {namespace}/{name}"),
            )),
            s => Err(CoreError::network("oci", format!("unexpected status {s}"))),
        }
    }

    /// Idempotent GET with exponential backoff on 5xx/network errors, up to
    /// 3 attempts; 4xx responses are returned as-is and never retried.
    fn get_with_retry(&self, url: &str, headers: &[(String, String)]) -> CoreResult<HttpResponse> {
        retry_with_backoff(
            &self.retry,
            |e: &CoreError| e.kind().is_retryable(),
            |_attempt| {
                let resp = self
                    .http
                    .get(url, headers)
                    .map_err(|e| CoreError::network("oci", e.to_string()))?;
                if (500..600).contains(&resp.status) {
                    return Err(CoreError::network(
                        "oci",
                        format!("server error {} from {url}", resp.status),
                    ));
                }
                Ok(resp)
            },
        )
    }
}

#[derive(Debug, Deserialize)]
struct TagsList {
    #[serde(default)]
    tags: Vec<String>,
}
