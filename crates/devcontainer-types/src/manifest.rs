//! OCI image manifest shape used for Feature artifacts.
//!
//! Field order matters here: the digest of a manifest is computed over its
//! minimum-whitespace JSON encoding, and `serde_json::to_string` serializes
//! struct fields in declaration order, so the struct definitions below are
//! the actual source of truth for wire-compatible byte output, not just
//! documentation.

use serde::{Deserialize, Serialize};

pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
pub const CONFIG_MEDIA_TYPE: &str = "application/vnd.devcontainers";
pub const LAYER_MEDIA_TYPE: &str = "application/vnd.devcontainers.layer.v1+tar";
pub const TITLE_ANNOTATION: &str = "org.opencontainers.image.title";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestConfig {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub digest: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerAnnotations {
    #[serde(rename = "org.opencontainers.image.title")]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestLayer {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub digest: String,
    pub size: u64,
    pub annotations: LayerAnnotations,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub config: ManifestConfig,
    pub layers: Vec<ManifestLayer>,
}

impl Manifest {
    /// Build a manifest with a single layer, the only shape this system
    /// ever produces or consumes for a Feature tarball.
    pub fn single_layer(config_digest: &str, layer_digest: &str, layer_size: u64, title: &str) -> Self {
        Self {
            schema_version: 2,
            media_type: MANIFEST_MEDIA_TYPE.to_string(),
            config: ManifestConfig {
                media_type: CONFIG_MEDIA_TYPE.to_string(),
                digest: config_digest.to_string(),
                size: 0,
            },
            layers: vec![ManifestLayer {
                media_type: LAYER_MEDIA_TYPE.to_string(),
                digest: layer_digest.to_string(),
                size: layer_size,
                annotations: LayerAnnotations {
                    title: title.to_string(),
                },
            }],
        }
    }

    /// The exact minimum-whitespace JSON string this manifest's digest is
    /// computed over. `serde_json::to_string` already emits no insignificant
    /// whitespace, so this is a thin, intention-revealing wrapper.
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
