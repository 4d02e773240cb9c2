//! Bearer token negotiation: parse a `WWW-Authenticate` challenge from a 401
//! response and exchange it for a token, per the OCI distribution auth spec.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use devcontainer_types::{CoreError, CoreResult};
use serde::Deserialize;

use crate::http_client::HttpClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Pull,
    Push,
}

impl Scope {
    fn as_str(&self) -> &'static str {
        match self {
            Scope::Pull => "pull",
            Scope::Push => "push",
        }
    }
}

#[derive(Debug, Clone)]
struct Challenge {
    realm: String,
    service: Option<String>,
    scope: Option<String>,
}

/// Parse a `Bearer realm="...",service="...",scope="..."` challenge.
fn parse_challenge(header: &str) -> Option<Challenge> {
    let rest = header.strip_prefix("Bearer ")?;
    let mut fields: HashMap<String, String> = HashMap::new();
    for part in rest.split(',') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            fields.insert(key.trim().to_string(), value.trim().trim_matches('"').to_string());
        }
    }
    let realm = fields.remove("realm")?;
    Some(Challenge {
        realm,
        service: fields.remove("service"),
        scope: fields.remove("scope"),
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(alias = "access_token")]
    token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Caches bearer tokens per `(registry, namespace, scope)` for their issued
/// lifetime, so repeated manifest/blob calls to the same repo in one run
/// don't each re-negotiate auth.
#[derive(Default)]
pub struct TokenCache {
    entries: Mutex<HashMap<(String, String, &'static str), CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a cached token, or negotiate a new one via `challenge_url` (the
    /// resource URL whose 401 response carries the `WWW-Authenticate`
    /// header) if none is cached or the cached one has expired.
    pub fn get_or_negotiate(
        &self,
        http: &dyn HttpClient,
        registry: &str,
        namespace: &str,
        repo_path: &str,
        scope: Scope,
        challenge_header: &str,
    ) -> CoreResult<String> {
        let key = (registry.to_string(), namespace.to_string(), scope.as_str());

        if let Some(cached) = self.entries.lock().unwrap().get(&key) {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }

        let challenge = parse_challenge(challenge_header)
            .ok_or_else(|| CoreError::auth_required(registry))?;

        let mut url = challenge.realm.clone();
        let mut query: Vec<String> = Vec::new();
        if let Some(service) = &challenge.service {
            query.push(format!("service={service}"));
        }
        let scope_value = challenge
            .scope
            .unwrap_or_else(|| format!("repository:{repo_path}:{}", scope.as_str()));
        query.push(format!("scope={scope_value}"));
        if !query.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&query.join("&"));
        }

        let resp = http
            .get(&url, &[])
            .map_err(|e| CoreError::network("oci", e.to_string()))?;

        if !resp.is_success() {
            return Err(CoreError::auth_required(registry));
        }

        let parsed: TokenResponse = serde_json::from_slice(&resp.body)
            .map_err(|e| CoreError::auth_required(format!("{registry}: {e}")))?;

        let ttl = Duration::from_secs(parsed.expires_in.unwrap_or(300));
        self.entries.lock().unwrap().insert(
            key,
            CachedToken {
                token: parsed.token.clone(),
                expires_at: Instant::now() + ttl,
            },
        );

        Ok(parsed.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_challenge() {
        let c = parse_challenge(
            r#"Bearer realm="https://auth.ghcr.io/token",service="ghcr.io",scope="repository:codspace/features/ruby:pull""#,
        )
        .expect("parse");
        assert_eq!(c.realm, "https://auth.ghcr.io/token");
        assert_eq!(c.service.as_deref(), Some("ghcr.io"));
        assert_eq!(c.scope.as_deref(), Some("repository:codspace/features/ruby:pull"));
    }

    #[test]
    fn rejects_non_bearer_challenge() {
        assert!(parse_challenge(r#"Basic realm="test""#).is_none());
    }

    #[test]
    fn rejects_challenge_without_realm() {
        assert!(parse_challenge(r#"Bearer service="ghcr.io""#).is_none());
    }
}
