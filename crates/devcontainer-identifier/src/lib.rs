//! Pure parsing of a Feature identifier string into an [`Identifier`].
//!
//! No I/O, fully deterministic: the same input always produces the same
//! output, and parse failures always carry the rule that was violated so
//! callers can surface an actionable message.

use devcontainer_types::{CoreError, CoreResult, Identifier, OciReference};

/// Parse a raw Feature identifier string.
///
/// Dispatch is purely syntactic, based on segment count and delimiters:
/// a bare name is a relative local path; `./x` / `../x` / `/abs/x` are local
/// paths; `http(s)://...tgz#name` is a tarball; a slash-separated path whose
/// first segment contains a dot is OCI; otherwise a 3+-segment slash path is
/// a GitHub release reference.
pub fn parse(raw: &str) -> CoreResult<Identifier> {
    if raw.is_empty() {
        return Err(CoreError::invalid_identifier(raw, "identifier is empty"));
    }
    if raw.contains('$') {
        return Err(CoreError::invalid_identifier(raw, "contains '$'"));
    }
    if raw.starts_with('-') {
        return Err(CoreError::invalid_identifier(raw, "starts with '-'"));
    }

    if raw.starts_with("http://") || raw.starts_with("https://") {
        return parse_tarball_uri(raw);
    }

    if raw.starts_with("./") || raw.starts_with("../") {
        return Ok(Identifier::LocalPath {
            path: raw.to_string(),
            is_relative: true,
        });
    }

    if raw.starts_with('/') {
        return Ok(Identifier::LocalPath {
            path: raw.to_string(),
            is_relative: false,
        });
    }

    let segments: Vec<&str> = raw.split('/').collect();

    if segments.len() == 1 {
        let name = strip_reference(segments[0]).0;
        validate_name(raw, name)?;
        return Ok(Identifier::LocalPath {
            path: raw.to_string(),
            is_relative: true,
        });
    }

    let first_has_dot = segments[0].contains('.');

    if first_has_dot {
        parse_oci(raw, &segments)
    } else {
        parse_git_release(raw, &segments)
    }
}

fn validate_name(raw: &str, name: &str) -> CoreResult<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(CoreError::invalid_identifier(
            raw,
            "name must match [A-Za-z0-9_]+",
        ));
    }
    Ok(())
}

/// Split a trailing `:tag` or `@sha256:digest` off the last path segment.
/// Returns `(bare_name, Option<reference_suffix>)`.
fn strip_reference(segment: &str) -> (&str, Option<&str>) {
    if let Some(at) = segment.find('@') {
        (&segment[..at], Some(&segment[at + 1..]))
    } else if let Some(colon) = segment.find(':') {
        (&segment[..colon], Some(&segment[colon + 1..]))
    } else {
        (segment, None)
    }
}

fn parse_oci(raw: &str, segments: &[&str]) -> CoreResult<Identifier> {
    if segments.len() < 2 {
        return Err(CoreError::invalid_identifier(
            raw,
            "OCI reference needs registry and name segments",
        ));
    }

    let registry = segments[0].to_string();
    let last = segments[segments.len() - 1];
    let (name, suffix) = strip_reference(last);
    validate_name(raw, name)?;

    let namespace_segments = &segments[1..segments.len() - 1];
    if namespace_segments.is_empty() {
        return Err(CoreError::invalid_identifier(
            raw,
            "OCI reference needs at least one namespace segment",
        ));
    }
    let namespace = namespace_segments.join("/");
    let owner = namespace_segments[0].to_string();

    let reference = match suffix {
        Some(s) => {
            if let Some(digest) = s.strip_prefix("sha256:") {
                if digest.is_empty() {
                    return Err(CoreError::invalid_identifier(raw, "empty sha256 digest"));
                }
                OciReference::Digest(format!("sha256:{digest}"))
            } else {
                OciReference::Tag(s.to_string())
            }
        }
        None => OciReference::Tag("latest".to_string()),
    };

    Ok(Identifier::Oci {
        registry,
        namespace,
        owner,
        name: name.to_string(),
        reference,
    })
}

fn parse_git_release(raw: &str, segments: &[&str]) -> CoreResult<Identifier> {
    if segments.len() != 3 {
        return Err(CoreError::invalid_identifier(
            raw,
            "GitHub release reference needs exactly owner/repo/name segments",
        ));
    }

    let owner = segments[0].to_string();
    let repo = segments[1].to_string();
    let (name, suffix) = strip_reference(segments[2]);
    validate_name(raw, name)?;

    let tag = match suffix {
        Some(s) => {
            let t = s.strip_prefix('@').unwrap_or(s);
            Some(t.to_string())
        }
        None => None,
    };
    let is_latest = tag.is_none();

    let api_uri = match &tag {
        Some(t) => format!("https://api.github.com/repos/{owner}/{repo}/releases/tags/{t}"),
        None => format!("https://api.github.com/repos/{owner}/{repo}/releases/latest"),
    };
    let download_uri = match &tag {
        Some(t) => {
            format!("https://github.com/{owner}/{repo}/releases/download/{t}/devcontainer-features.tgz")
        }
        None => format!(
            "https://github.com/{owner}/{repo}/releases/latest/download/devcontainer-features.tgz"
        ),
    };

    Ok(Identifier::GitRelease {
        owner,
        repo,
        name: name.to_string(),
        tag,
        is_latest,
        api_uri,
        download_uri,
    })
}

fn parse_tarball_uri(raw: &str) -> CoreResult<Identifier> {
    if raw.ends_with('/') {
        return Err(CoreError::invalid_identifier(
            raw,
            "tarball URL must not end in a trailing slash",
        ));
    }

    let Some(hash_pos) = raw.find('#') else {
        return Err(CoreError::invalid_identifier(
            raw,
            "tarball URL requires a '#name' fragment",
        ));
    };

    let (url, fragment) = (&raw[..hash_pos], &raw[hash_pos + 1..]);

    if fragment.is_empty() {
        return Err(CoreError::invalid_identifier(
            raw,
            "tarball URL fragment must not be empty",
        ));
    }

    if !url.ends_with(".tgz") {
        return Err(CoreError::invalid_identifier(
            raw,
            "tarball URL must end in '.tgz' before the fragment",
        ));
    }

    validate_name(raw, fragment)?;

    Ok(Identifier::TarballUri {
        url: url.to_string(),
        feature_name: Some(fragment.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn oci_canonical_round_trips_through_parse(
            registry in "[a-z]{3,8}",
            namespace in "[a-z0-9]{2,8}",
            name in "[a-z0-9_]{2,8}",
            tag in "[a-z0-9]{1,6}",
        ) {
            let raw = format!("{registry}.io/{namespace}/{name}:{tag}");
            let first = parse(&raw).expect("valid OCI identifier should parse");
            let reparsed = parse(&first.canonical()).expect("canonical form should reparse");
            prop_assert_eq!(first, reparsed);
        }

        #[test]
        fn git_release_canonical_round_trips_through_parse(
            owner in "[a-z0-9]{2,8}",
            repo in "[a-z0-9]{2,8}",
            name in "[a-z0-9_]{2,8}",
            tag in "[a-z0-9]{1,6}",
        ) {
            let raw = format!("{owner}/{repo}/{name}@{tag}");
            let first = parse(&raw).expect("valid GitHub release identifier should parse");
            let reparsed = parse(&first.canonical()).expect("canonical form should reparse");
            prop_assert_eq!(first, reparsed);
        }
    }

    #[test]
    fn parse_oci_with_partial_tag() {
        let id = parse("ghcr.io/codspace/features/ruby:1").expect("parse");
        assert_eq!(
            id,
            Identifier::Oci {
                registry: "ghcr.io".into(),
                namespace: "codspace/features".into(),
                owner: "codspace".into(),
                name: "ruby".into(),
                reference: OciReference::Tag("1".into()),
            }
        );
    }

    #[test]
    fn parse_oci_with_digest() {
        let id = parse("ghcr.io/devcontainers/ruby@sha256:abcd1234").expect("parse");
        assert_eq!(
            id,
            Identifier::Oci {
                registry: "ghcr.io".into(),
                namespace: "devcontainers".into(),
                owner: "devcontainers".into(),
                name: "ruby".into(),
                reference: OciReference::Digest("sha256:abcd1234".into()),
            }
        );
    }

    #[test]
    fn parse_git_release_with_version() {
        let id = parse("octocat/myfeatures/helloworld@v0.0.4").expect("parse");
        assert_eq!(
            id,
            Identifier::GitRelease {
                owner: "octocat".into(),
                repo: "myfeatures".into(),
                name: "helloworld".into(),
                tag: Some("v0.0.4".into()),
                is_latest: false,
                api_uri:
                    "https://api.github.com/repos/octocat/myfeatures/releases/tags/v0.0.4".into(),
                download_uri:
                    "https://github.com/octocat/myfeatures/releases/download/v0.0.4/devcontainer-features.tgz"
                        .into(),
            }
        );
    }

    #[test]
    fn reject_two_segment_git_style_reference() {
        let result = parse("octocat/myfeatures");
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().kind(),
            devcontainer_types::ErrorKind::InvalidIdentifier
        );
    }

    #[test]
    fn parse_bare_name_is_relative_local_path() {
        let id = parse("ruby").expect("parse");
        assert_eq!(
            id,
            Identifier::LocalPath {
                path: "ruby".into(),
                is_relative: true,
            }
        );
    }

    #[test]
    fn parse_relative_dot_path() {
        let id = parse("./local-features/ruby").expect("parse");
        assert_eq!(
            id,
            Identifier::LocalPath {
                path: "./local-features/ruby".into(),
                is_relative: true,
            }
        );
    }

    #[test]
    fn parse_absolute_path() {
        let id = parse("/workspaces/app/.devcontainer/features/ruby").expect("parse");
        assert_eq!(
            id,
            Identifier::LocalPath {
                path: "/workspaces/app/.devcontainer/features/ruby".into(),
                is_relative: false,
            }
        );
    }

    #[test]
    fn parse_tarball_uri_with_fragment() {
        let id = parse("https://example.com/releases/ruby.tgz#ruby").expect("parse");
        assert_eq!(
            id,
            Identifier::TarballUri {
                url: "https://example.com/releases/ruby.tgz".into(),
                feature_name: Some("ruby".into()),
            }
        );
    }

    #[test]
    fn reject_tarball_uri_missing_fragment() {
        assert!(parse("https://example.com/releases/ruby.tgz").is_err());
    }

    #[test]
    fn reject_tarball_uri_empty_fragment() {
        assert!(parse("https://example.com/releases/ruby.tgz#").is_err());
    }

    #[test]
    fn reject_trailing_slash() {
        assert!(parse("https://example.com/releases/ruby.tgz/").is_err());
    }

    #[test]
    fn reject_dollar_sign() {
        assert!(parse("ghcr.io/devcontainers/ruby:${VERSION}").is_err());
    }

    #[test]
    fn reject_leading_dash() {
        assert!(parse("-ghcr.io/devcontainers/ruby").is_err());
    }

    #[test]
    fn reject_invalid_name_characters() {
        assert!(parse("ghcr.io/devcontainers/ru by").is_err());
    }
}
