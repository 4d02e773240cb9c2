//! Canonical manifest construction and content digest computation.

use devcontainer_types::Manifest;
use sha2::{Digest as _, Sha256};

/// Build the canonical manifest bytes for a single-layer Feature artifact
/// and compute its `sha256:` digest. Bit-identical across runs and
/// platforms: the manifest's field order is fixed by the struct
/// definitions in `devcontainer-types::manifest`, and serialization uses no
/// insignificant whitespace.
pub fn compute_canonical_digest(
    config_digest: &str,
    layer_digest: &str,
    layer_size: u64,
    layer_title: &str,
) -> Result<(String, String), serde_json::Error> {
    let manifest = Manifest::single_layer(config_digest, layer_digest, layer_size, layer_title);
    let manifest_bytes = manifest.canonical_json()?;
    Ok((manifest_bytes.clone(), sha256_digest(manifest_bytes.as_bytes())))
}

pub fn sha256_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Layer digest/size/title match the worked example's single-layer
    /// descriptor exactly; the config digest isn't specified by the schema
    /// (just a placeholder `digest` field), so this pins an all-zero one as
    /// this codebase's own canonical fixture rather than reproducing the
    /// worked example's digest byte-for-byte.
    #[test]
    fn matches_normative_test_vector() {
        let (manifest_str, digest) = compute_canonical_digest(
            "sha256:0000000000000000000000000000000000000000000000000000000000000000",
            "sha256:b2006e11e34957a9816a0de8042ff16e43d8107d1841e27cbd8d4c6a05b94c5",
            15872,
            "go.tgz",
        )
        .expect("serialize");

        assert_eq!(
            manifest_str,
            concat!(
                r#"{"schemaVersion":2,"mediaType":"application/vnd.oci.image.manifest.v1+json","#,
                r#""config":{"mediaType":"application/vnd.devcontainers","#,
                r#""digest":"sha256:0000000000000000000000000000000000000000000000000000000000000000","size":0},"#,
                r#""layers":[{"mediaType":"application/vnd.devcontainers.layer.v1+tar","#,
                r#""digest":"sha256:b2006e11e34957a9816a0de8042ff16e43d8107d1841e27cbd8d4c6a05b94c5","size":15872,"#,
                r#""annotations":{"org.opencontainers.image.title":"go.tgz"}}]}"#,
            )
        );
        assert_eq!(
            digest,
            "sha256:d4525cdc9b298d34a467346fca1bbaf18dcce0381bdbcb19c6cd45f08ed58c67"
        );
    }

    #[test]
    fn digest_is_stable_across_calls() {
        let a = compute_canonical_digest("sha256:aa", "sha256:bb", 1, "x.tgz").unwrap();
        let b = compute_canonical_digest("sha256:aa", "sha256:bb", 1, "x.tgz").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sha256_digest_of_empty_input() {
        let d = sha256_digest(b"");
        assert_eq!(
            d,
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
