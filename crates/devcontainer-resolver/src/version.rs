//! Stage 2 — version resolution: turning a (possibly partial) requested tag
//! into the highest matching published tag.

use devcontainer_semver::{highest_matching, Constraint};
use devcontainer_types::{CoreError, CoreResult};

/// Resolves `requested` (`"1"`, `"1.0"`, or an exact version) against the
/// repo's published tags, picking the highest semver-compatible match.
/// Tags that don't parse as semver are ignored rather than rejected —
/// registries routinely carry `latest`, `dev`, or other non-semver tags
/// alongside versioned ones.
pub fn resolve_tag(requested: &str, available: &[String]) -> CoreResult<String> {
    let constraint = Constraint::parse(requested).ok_or_else(|| {
        CoreError::not_found("resolver", format!("'{requested}' is not a valid version constraint"))
    })?;

    highest_matching(available, &constraint)
        .map(|v| v.to_string())
        .ok_or_else(|| {
            CoreError::not_found("resolver", format!("no published tag satisfies '{requested}'"))
        })
}
