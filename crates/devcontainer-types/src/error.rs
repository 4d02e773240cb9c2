//! Error taxonomy shared by every core component.
//!
//! Each variant corresponds to one of the error *kinds* enumerated in the
//! component contracts; the [`ErrorKind`] returned by [`CoreError::kind`] is
//! what callers should match on, while the `Display` message is what ends up
//! in the CLI adapter's `outcome.message` field and therefore carries a
//! stable, matchable substring (see the literal substrings called out next
//! to each variant).

use std::fmt;

/// Coarse classification of a [`CoreError`], independent of its message text.
///
/// Recoverable network/auth errors are retried internally by the component
/// that owns them (the OCI client, mainly) and never escape as an error on
/// success; everything that does escape is one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidIdentifier,
    Network,
    AuthRequired,
    NotFound,
    BadManifest,
    IntegrityError,
    LockIntegrityMismatch,
    LockfileMismatch,
    BadLockfile,
    CyclicDependency,
    OptionConflict,
    MissingHardDependency,
    FetchFailure,
    RuntimeFailure,
    ConfigNotFound,
    BadConfig,
    LifecycleCommandFailed,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// Whether this kind is conceivably transient (network hiccups, 5xx).
    ///
    /// Used by the HTTP retry loop in `devcontainer-oci`; everything else is
    /// treated as permanent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Network)
    }
}

/// A single error surfaced by the core, wrapped once at the boundary of the
/// component that raised it.
#[derive(Debug, thiserror::Error)]
pub struct CoreError {
    kind: ErrorKind,
    component: &'static str,
    message: String,
    #[source]
    source: Option<anyhow::Error>,
}

impl CoreError {
    pub fn new(kind: ErrorKind, component: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            component,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    /// The stable, matchable message (no component prefix).
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn invalid_identifier(raw: &str, rule: &str) -> Self {
        Self::new(
            ErrorKind::InvalidIdentifier,
            "identifier",
            format!("Invalid Feature identifier '{raw}': {rule}"),
        )
    }

    pub fn network(component: &'static str, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, component, detail.into())
    }

    pub fn auth_required(registry: &str) -> Self {
        Self::new(
            ErrorKind::AuthRequired,
            "oci",
            format!("authentication required for registry '{registry}'"),
        )
    }

    pub fn not_found(component: &'static str, what: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, component, what.into())
    }

    pub fn bad_manifest(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadManifest, "oci", detail.into())
    }

    pub fn integrity(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::IntegrityError, "oci", detail.into())
    }

    pub fn lock_integrity_mismatch(id: &str, expected: &str, actual: &str) -> Self {
        Self::new(
            ErrorKind::LockIntegrityMismatch,
            "fetch",
            format!("integrity mismatch for '{id}': lockfile pins {expected}, fetched {actual}"),
        )
    }

    pub fn lockfile_mismatch(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::LockfileMismatch,
            "lockfile",
            format!("Lockfile does not match. {}", detail.into()),
        )
    }

    pub fn bad_lockfile(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadLockfile, "lockfile", detail.into())
    }

    pub fn cyclic_dependency(cycle: &[String]) -> Self {
        Self::new(
            ErrorKind::CyclicDependency,
            "resolver",
            format!("cyclic dependsOn relationship detected: {}", cycle.join(" -> ")),
        )
    }

    pub fn option_conflict(id: &str) -> Self {
        Self::new(
            ErrorKind::OptionConflict,
            "resolver",
            format!("conflicting options declared for feature '{id}'"),
        )
    }

    pub fn missing_hard_dependency(from: &str, to: &str) -> Self {
        Self::new(
            ErrorKind::MissingHardDependency,
            "resolver",
            format!("feature '{from}' depends on '{to}', which was never resolved"),
        )
    }

    pub fn fetch_failure(id: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::FetchFailure,
            "fetch",
            format!("Failed to fetch tarball for '{id}': {}", detail.into()),
        )
    }

    pub fn runtime_failure(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuntimeFailure, "runtime", detail.into())
    }

    pub fn config_not_found(path: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::ConfigNotFound,
            "config",
            format!("Dev container config ({path}) not found."),
        )
    }

    pub fn bad_config(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadConfig, "config", detail.into())
    }

    pub fn lifecycle_command_failed(stage: &str, command: &str, code: Option<i32>) -> Self {
        Self::new(
            ErrorKind::LifecycleCommandFailed,
            "lifecycle",
            format!(
                "lifecycle command failed in stage '{stage}': `{command}` exited with {code:?}"
            ),
        )
    }

    pub fn cancelled(component: &'static str) -> Self {
        Self::new(ErrorKind::Cancelled, component, "operation cancelled")
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, "core", detail.into())
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.component, self.message)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_not_found_message_is_matchable() {
        let err = CoreError::config_not_found(".devcontainer/devcontainer.json");
        assert!(err.message().contains("not found."));
        assert!(err.message().starts_with("Dev container config"));
    }

    #[test]
    fn cyclic_dependency_message_contains_cyclic() {
        let err = CoreError::cyclic_dependency(&["a".into(), "b".into(), "a".into()]);
        assert!(err.message().contains("cyclic"));
    }

    #[test]
    fn lockfile_mismatch_message_is_matchable() {
        let err = CoreError::lockfile_mismatch("feature 'ruby' integrity differs");
        assert!(err.message().starts_with("Lockfile does not match."));
    }

    #[test]
    fn fetch_failure_message_is_matchable() {
        let err = CoreError::fetch_failure("ghcr.io/x/ruby:1", "connection reset");
        assert!(err.message().contains("Failed to fetch tarball"));
    }

    #[test]
    fn network_kind_is_retryable_others_are_not() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
        assert!(!ErrorKind::CyclicDependency.is_retryable());
    }

    #[test]
    fn display_includes_component_prefix() {
        let err = CoreError::bad_config("missing `image` or `dockerFile`");
        assert_eq!(format!("{err}"), "[config] missing `image` or `dockerFile`");
    }
}
