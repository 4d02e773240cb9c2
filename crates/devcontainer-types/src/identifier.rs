//! Parsed representation of a Feature identifier.
//!
//! Parsing itself (the normative string -> [`Identifier`] rules) lives in
//! `devcontainer-identifier`; this crate only owns the shape every other
//! component agrees on, so the resolver, fetcher and lockfile engine can all
//! speak the same vocabulary without depending on the parser.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An OCI reference is either a tag or a content digest, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OciReference {
    Tag(String),
    Digest(String),
}

impl fmt::Display for OciReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OciReference::Tag(t) => write!(f, "{t}"),
            OciReference::Digest(d) => write!(f, "{d}"),
        }
    }
}

/// The four identifier forms a Feature reference can take.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Identifier {
    LocalPath {
        path: String,
        is_relative: bool,
    },
    Oci {
        registry: String,
        namespace: String,
        owner: String,
        name: String,
        reference: OciReference,
    },
    TarballUri {
        url: String,
        feature_name: Option<String>,
    },
    GitRelease {
        owner: String,
        repo: String,
        name: String,
        tag: Option<String>,
        is_latest: bool,
        api_uri: String,
        download_uri: String,
    },
}

impl Identifier {
    /// The canonical string form used as a map key everywhere (lockfile,
    /// graph node id, `--skip-feature` matching).
    ///
    /// For OCI identifiers this is `registry/namespace/name[:tag|@digest]`;
    /// for a `GitRelease` it's `owner/repo/name[@tag]`; for everything else
    /// it's the normalized input.
    pub fn canonical(&self) -> String {
        match self {
            Identifier::LocalPath { path, .. } => path.clone(),
            Identifier::Oci {
                registry,
                namespace,
                name,
                reference,
                ..
            } => match reference {
                OciReference::Tag(t) => format!("{registry}/{namespace}/{name}:{t}"),
                OciReference::Digest(d) => format!("{registry}/{namespace}/{name}@{d}"),
            },
            Identifier::TarballUri { url, .. } => url.clone(),
            Identifier::GitRelease {
                owner, repo, name, tag, ..
            } => match tag {
                Some(t) => format!("{owner}/{repo}/{name}@{t}"),
                None => format!("{owner}/{repo}/{name}"),
            },
        }
    }

    pub fn is_oci(&self) -> bool {
        matches!(self, Identifier::Oci { .. })
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}
