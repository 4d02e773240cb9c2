//! # devcontainer-fetch
//!
//! Downloads Feature content referenced by a parsed [`Identifier`] to a
//! content-addressed cache directory, enforcing lockfile integrity and
//! deduplicating concurrent fetches of the same artifact within a process.
//!
//! Four identifier forms, four retrieval strategies:
//!
//! - `LocalPath` never downloads anything; the directory is already on disk.
//! - `Oci` resolves a tag to a digest via the manifest, then downloads the
//!   first layer blob, keyed by that digest.
//! - `TarballUri` downloads once, keyed by the SHA-256 of the URL itself
//!   (the content isn't addressable until after it's fetched).
//! - `GitRelease` downloads the release's `devcontainer-features.tgz` asset.
//!
//! A lockfile entry, when supplied, pins the expected digest; a mismatch is
//! a [`devcontainer_types::ErrorKind::LockIntegrityMismatch`], never a
//! silent re-resolve.

mod cache;
mod extract;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use devcontainer_oci::{HttpClient, OciClient};
use devcontainer_types::{CoreError, CoreResult, Identifier, LockEntry, OciReference};

pub use cache::SingleFlight;
pub use extract::{feature_root, read_tarball_entry};

/// Result of fetching a single Feature: where its content now lives on disk
/// and the digest it was verified against, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFeature {
    pub content_dir: PathBuf,
    pub resolved_reference: String,
    pub digest: Option<String>,
}

impl FetchedFeature {
    /// The directory containing this Feature's `devcontainer-feature.json`,
    /// extracting `content_dir`'s tarball on first use if needed.
    pub fn feature_root(&self) -> CoreResult<PathBuf> {
        extract::feature_root(&self.content_dir)
    }
}

pub struct FeatureFetcher {
    http: Arc<dyn HttpClient>,
    cache_dir: PathBuf,
    single_flight: SingleFlight,
}

impl FeatureFetcher {
    pub fn new(http: Arc<dyn HttpClient>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            http,
            cache_dir: cache_dir.into(),
            single_flight: SingleFlight::new(),
        }
    }

    /// Lists the published tags for an OCI repository, the input Stage 2
    /// version resolution (`devcontainer_resolver::resolve_tag`) matches a
    /// partial tag constraint against.
    pub fn list_tags(&self, registry: &str, namespace: &str, name: &str) -> CoreResult<Vec<String>> {
        OciClient::new(self.http.clone()).list_tags(registry, namespace, name)
    }

    /// Fetches `id`, verifying against `lockfile_entry` when one is given.
    pub fn fetch(
        &self,
        id: &Identifier,
        lockfile_entry: Option<&LockEntry>,
    ) -> CoreResult<FetchedFeature> {
        match id {
            Identifier::LocalPath { path, .. } => self.fetch_local(path),
            Identifier::Oci { .. } => self.fetch_oci(id, lockfile_entry),
            Identifier::TarballUri { url, .. } => self.fetch_tarball_uri(id, url, lockfile_entry),
            Identifier::GitRelease { .. } => self.fetch_git_release(id, lockfile_entry),
        }
    }

    fn fetch_local(&self, path: &str) -> CoreResult<FetchedFeature> {
        let dir = PathBuf::from(path);
        if !dir.is_dir() {
            return Err(CoreError::not_found(
                "fetch",
                format!("local Feature path '{path}' does not exist"),
            ));
        }
        Ok(FetchedFeature {
            content_dir: dir,
            resolved_reference: path.to_string(),
            digest: None,
        })
    }

    fn fetch_oci(
        &self,
        id: &Identifier,
        lockfile_entry: Option<&LockEntry>,
    ) -> CoreResult<FetchedFeature> {
        let Identifier::Oci {
            registry,
            namespace,
            name,
            reference,
            ..
        } = id
        else {
            unreachable!("caller guarantees Oci variant")
        };

        let client = OciClient::new(self.http.clone());

        let reference_str = match reference {
            OciReference::Tag(t) => t.clone(),
            OciReference::Digest(d) => d.clone(),
        };
        let (_, manifest) = client.get_manifest(registry, namespace, name, &reference_str)?;
        let layer = manifest.layers.first().ok_or_else(|| {
            CoreError::bad_manifest(format!("manifest for '{}' has no layers", id.canonical()))
        })?;
        let digest = layer.digest.clone();

        if let Some(entry) = lockfile_entry {
            if entry.integrity != digest {
                return Err(CoreError::lock_integrity_mismatch(
                    &id.canonical(),
                    &entry.integrity,
                    &digest,
                ));
            }
        }

        let dest = cache::tarball_path(&self.cache_dir, &digest);
        let content_dir = dest.parent().unwrap().to_path_buf();
        let key = digest.clone();

        let content_dir = self.single_flight.get_or_fetch(&key, || {
            if cache::digest_exists_and_matches(&dest, &digest) {
                return Ok(content_dir.clone());
            }
            std::fs::create_dir_all(&content_dir).map_err(|e| {
                CoreError::fetch_failure(&id.canonical(), format!("creating cache dir: {e}"))
            })?;
            client.get_blob(registry, namespace, name, &digest, &dest)?;
            if !cache::digest_exists_and_matches(&dest, &digest) {
                let _ = std::fs::remove_file(&dest);
                return Err(CoreError::integrity(format!(
                    "downloaded blob for '{}' does not match digest {digest}",
                    id.canonical()
                )));
            }
            Ok(content_dir.clone())
        })?;

        Ok(FetchedFeature {
            content_dir,
            resolved_reference: reference_str,
            digest: Some(digest),
        })
    }

    fn fetch_tarball_uri(
        &self,
        id: &Identifier,
        url: &str,
        lockfile_entry: Option<&LockEntry>,
    ) -> CoreResult<FetchedFeature> {
        let key = devcontainer_oci::sha256_digest(url.as_bytes());
        let dest = cache::tarball_path(&self.cache_dir, &key);
        let content_dir = dest.parent().unwrap().to_path_buf();

        let content_dir = self.single_flight.get_or_fetch(&key, || {
            if dest.exists() {
                return Ok(content_dir.clone());
            }
            std::fs::create_dir_all(&content_dir).map_err(|e| {
                CoreError::fetch_failure(&id.canonical(), format!("creating cache dir: {e}"))
            })?;
            download_to_file(&self.http, url, &dest)
                .map_err(|e| CoreError::fetch_failure(&id.canonical(), e.to_string()))?;
            Ok(content_dir.clone())
        })?;

        let digest = std::fs::read(&dest)
            .ok()
            .map(|bytes| devcontainer_oci::sha256_digest(&bytes));

        if let (Some(entry), Some(actual)) = (lockfile_entry, digest.as_deref()) {
            if entry.integrity != actual {
                return Err(CoreError::lock_integrity_mismatch(
                    &id.canonical(),
                    &entry.integrity,
                    actual,
                ));
            }
        }

        Ok(FetchedFeature {
            content_dir,
            resolved_reference: url.to_string(),
            digest,
        })
    }

    fn fetch_git_release(
        &self,
        id: &Identifier,
        lockfile_entry: Option<&LockEntry>,
    ) -> CoreResult<FetchedFeature> {
        let Identifier::GitRelease {
            download_uri, tag, ..
        } = id
        else {
            unreachable!("caller guarantees GitRelease variant")
        };

        let key = devcontainer_oci::sha256_digest(download_uri.as_bytes());
        let dest = cache::tarball_path(&self.cache_dir, &key);
        let content_dir = dest.parent().unwrap().to_path_buf();

        let content_dir = self.single_flight.get_or_fetch(&key, || {
            if dest.exists() {
                return Ok(content_dir.clone());
            }
            std::fs::create_dir_all(&content_dir).map_err(|e| {
                CoreError::fetch_failure(&id.canonical(), format!("creating cache dir: {e}"))
            })?;
            download_to_file(&self.http, download_uri, &dest)
                .map_err(|e| CoreError::fetch_failure(&id.canonical(), e.to_string()))?;
            Ok(content_dir.clone())
        })?;

        let digest = std::fs::read(&dest)
            .ok()
            .map(|bytes| devcontainer_oci::sha256_digest(&bytes));

        if let (Some(entry), Some(actual)) = (lockfile_entry, digest.as_deref()) {
            if entry.integrity != actual {
                return Err(CoreError::lock_integrity_mismatch(
                    &id.canonical(),
                    &entry.integrity,
                    actual,
                ));
            }
        }

        Ok(FetchedFeature {
            content_dir,
            resolved_reference: tag.clone().unwrap_or_else(|| "latest".to_string()),
            digest,
        })
    }
}

fn download_to_file(http: &Arc<dyn HttpClient>, url: &str, dest: &Path) -> anyhow::Result<()> {
    let (_, resp) = http.get_to_file(url, &[], dest)?;
    if !resp.is_success() {
        anyhow::bail!("GET {url} returned status {}", resp.status);
    }
    Ok(())
}
