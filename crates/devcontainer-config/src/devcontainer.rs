//! `devcontainer.json` schema: a discriminated `image | dockerfile | compose`
//! base-image shape plus every other recognized field, with unrecognized
//! fields passed through as an opaque JSON bag rather than rejected.

use std::collections::BTreeMap;
use std::path::Path;

use devcontainer_types::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jsonc::strip_comments;

/// The three mutually exclusive ways a dev container can name its base
/// image. Untagged: the source's ad-hoc "does it have `image`, `dockerFile`,
/// or `dockerComposeFile`" sniffing is replaced by exhaustive matching over
/// this enum instead of probing optional fields at every call site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BaseImage {
    Compose {
        #[serde(rename = "dockerComposeFile")]
        docker_compose_file: ComposeFileRef,
        service: String,
        #[serde(rename = "runServices", default)]
        run_services: Vec<String>,
    },
    Dockerfile {
        #[serde(rename = "dockerFile")]
        docker_file: String,
        #[serde(default)]
        build: BuildOptions,
    },
    Image { image: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ComposeFileRef {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildOptions {
    pub target: Option<String>,
    pub platform: Option<String>,
    #[serde(rename = "cacheFrom")]
    pub cache_from: Option<ComposeFileRef>,
}

/// The parsed, explicit-schema form of `devcontainer.json`. Every field the
/// spec names is a real struct field; anything else survives in `extra`
/// rather than being dropped or rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DevContainerConfig {
    #[serde(flatten)]
    pub base: BaseImage,

    #[serde(rename = "workspaceFolder", default)]
    pub workspace_folder: Option<String>,
    #[serde(rename = "workspaceMount", default)]
    pub workspace_mount: Option<String>,

    #[serde(default)]
    pub features: BTreeMap<String, Value>,
    #[serde(rename = "overrideFeatureInstallOrder", default)]
    pub override_feature_install_order: Option<Vec<String>>,

    #[serde(rename = "containerEnv", default)]
    pub container_env: BTreeMap<String, String>,
    #[serde(rename = "remoteEnv", default)]
    pub remote_env: BTreeMap<String, String>,

    #[serde(rename = "forwardPorts", default)]
    pub forward_ports: Vec<Value>,
    #[serde(rename = "appPort", default)]
    pub app_port: Option<Value>,

    #[serde(rename = "onCreateCommand", default)]
    pub on_create_command: Option<Value>,
    #[serde(rename = "updateContentCommand", default)]
    pub update_content_command: Option<Value>,
    #[serde(rename = "postCreateCommand", default)]
    pub post_create_command: Option<Value>,
    #[serde(rename = "postStartCommand", default)]
    pub post_start_command: Option<Value>,
    #[serde(rename = "postAttachCommand", default)]
    pub post_attach_command: Option<Value>,

    #[serde(default)]
    pub customizations: Value,

    /// Every field this schema doesn't name explicitly, e.g. `name`,
    /// `shutdownAction`, `mounts`, vendor-specific extensions.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Strips comments and trailing commas, then parses into the explicit
/// schema. A malformed document is `BadConfig`; a missing file path is the
/// caller's concern (`read_from_path` below handles that one).
pub fn parse(raw: &str) -> CoreResult<DevContainerConfig> {
    let stripped = strip_comments(raw);
    serde_json::from_str(&stripped)
        .map_err(|e| CoreError::bad_config(format!("failed to parse devcontainer.json: {e}")))
}

/// Reads and parses `devcontainer.json` (or `.devcontainer.json`) at `path`.
pub fn read_from_path(path: &Path) -> CoreResult<DevContainerConfig> {
    if !path.is_file() {
        return Err(CoreError::config_not_found(path.display()));
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CoreError::bad_config(format!("failed to read {}: {e}", path.display())))?;
    parse(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_image_shape() {
        let cfg = parse(r#"{ "image": "mcr.microsoft.com/devcontainers/base:ubuntu" }"#).unwrap();
        assert_eq!(
            cfg.base,
            BaseImage::Image {
                image: "mcr.microsoft.com/devcontainers/base:ubuntu".to_string()
            }
        );
    }

    #[test]
    fn parses_dockerfile_shape_with_build_options() {
        let cfg = parse(
            r#"{
                "dockerFile": "Dockerfile",
                "build": { "target": "dev", "cacheFrom": "myimage:cache" }
            }"#,
        )
        .unwrap();
        match cfg.base {
            BaseImage::Dockerfile { docker_file, build } => {
                assert_eq!(docker_file, "Dockerfile");
                assert_eq!(build.target.as_deref(), Some("dev"));
            }
            other => panic!("expected Dockerfile shape, got {other:?}"),
        }
    }

    #[test]
    fn parses_compose_shape() {
        let cfg = parse(
            r#"{
                "dockerComposeFile": "docker-compose.yml",
                "service": "app",
                "runServices": ["app", "db"]
            }"#,
        )
        .unwrap();
        match cfg.base {
            BaseImage::Compose { service, run_services, .. } => {
                assert_eq!(service, "app");
                assert_eq!(run_services, vec!["app", "db"]);
            }
            other => panic!("expected Compose shape, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_fields_land_in_extra() {
        let cfg = parse(r#"{ "image": "ubuntu", "shutdownAction": "stopContainer" }"#).unwrap();
        assert_eq!(cfg.extra.get("shutdownAction").unwrap(), "stopContainer");
    }

    #[test]
    fn strips_comments_before_parsing() {
        let cfg = parse(
            "{\n  // the base image\n  \"image\": \"ubuntu\",\n  \"features\": {}\n}",
        )
        .unwrap();
        assert_eq!(cfg.base, BaseImage::Image { image: "ubuntu".to_string() });
    }

    #[test]
    fn missing_file_is_config_not_found() {
        let err = read_from_path(Path::new("/nonexistent/devcontainer.json")).unwrap_err();
        assert_eq!(err.kind(), devcontainer_types::ErrorKind::ConfigNotFound);
        assert!(err.message().contains("not found."));
    }

    #[test]
    fn malformed_json_is_bad_config() {
        let err = parse("{ not json }").unwrap_err();
        assert_eq!(err.kind(), devcontainer_types::ErrorKind::BadConfig);
    }

    #[test]
    fn override_feature_install_order_round_trips() {
        let cfg = parse(
            r#"{ "image": "ubuntu", "overrideFeatureInstallOrder": ["a", "b"] }"#,
        )
        .unwrap();
        assert_eq!(
            cfg.override_feature_install_order,
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }
}
