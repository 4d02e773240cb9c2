//! `devcontainer-feature.json` schema: the descriptor bundled at the root
//! of every Feature tarball, consumed by the resolver as node metadata.

use std::collections::BTreeMap;
use std::path::Path;

use devcontainer_types::{CommandSpec, CoreError, CoreResult, Stage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jsonc::strip_comments;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeatureDescriptor {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
    #[serde(rename = "installsAfter", default)]
    pub installs_after: Vec<String>,
    #[serde(rename = "dependsOn", default)]
    pub depends_on: Vec<String>,
    #[serde(rename = "legacyIds", default)]
    pub legacy_ids: Vec<String>,

    #[serde(rename = "onCreateCommand", default)]
    pub on_create_command: Option<CommandSpec>,
    #[serde(rename = "updateContentCommand", default)]
    pub update_content_command: Option<CommandSpec>,
    #[serde(rename = "postCreateCommand", default)]
    pub post_create_command: Option<CommandSpec>,
    #[serde(rename = "postStartCommand", default)]
    pub post_start_command: Option<CommandSpec>,
    #[serde(rename = "postAttachCommand", default)]
    pub post_attach_command: Option<CommandSpec>,

    #[serde(default)]
    pub customizations: Value,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl FeatureDescriptor {
    /// The `(Stage, CommandSpec)` contributions this feature makes, in
    /// stage order, ready to fold into a schedule alongside the config's.
    pub fn lifecycle_contributions(&self) -> Vec<(Stage, CommandSpec)> {
        [
            (Stage::OnCreate, &self.on_create_command),
            (Stage::UpdateContent, &self.update_content_command),
            (Stage::PostCreate, &self.post_create_command),
            (Stage::PostStart, &self.post_start_command),
            (Stage::PostAttach, &self.post_attach_command),
        ]
        .into_iter()
        .filter_map(|(stage, spec)| spec.clone().map(|s| (stage, s)))
        .collect()
    }
}

pub fn parse(raw: &str) -> CoreResult<FeatureDescriptor> {
    let stripped = strip_comments(raw);
    serde_json::from_str(&stripped)
        .map_err(|e| CoreError::bad_config(format!("failed to parse devcontainer-feature.json: {e}")))
}

pub fn read_from_path(path: &Path) -> CoreResult<FeatureDescriptor> {
    if !path.is_file() {
        return Err(CoreError::not_found("config", format!("{}", path.display())));
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CoreError::bad_config(format!("failed to read {}: {e}", path.display())))?;
    parse(&raw)
}
