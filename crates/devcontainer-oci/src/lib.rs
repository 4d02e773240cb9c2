//! # devcontainer-oci
//!
//! OCI Distribution v2 client used to fetch and publish Feature artifacts:
//! manifest and blob GET/HEAD/PUT, bearer token negotiation against a
//! registry's `WWW-Authenticate` challenge, and the canonical manifest
//! digest algorithm that the Lockfile Engine and Feature Fetcher both rely
//! on for integrity verification.
//!
//! Transport is abstracted behind [`HttpClient`] so the wire-protocol logic
//! here is testable without a real network stack; [`ReqwestHttpClient`] is
//! the production implementation.

pub mod auth;
pub mod client;
pub mod digest;
pub mod http_client;

pub use auth::{Scope, TokenCache};
pub use client::OciClient;
pub use digest::{compute_canonical_digest, sha256_digest};
pub use http_client::{HttpClient, HttpResponse, ReqwestHttpClient};
