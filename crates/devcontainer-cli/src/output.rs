//! The stable JSON outcome shape from §6: `{ outcome, containerId?,
//! composeProjectName?, imageName?[], configuration?, mergedConfiguration?,
//! message? }`. Every command funnels its result through [`Outcome`] so the
//! shape is the same whether the command succeeded or failed.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub outcome: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compose_project_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub image_name: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_configuration: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Success,
    Error,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            outcome: OutcomeKind::Success,
            container_id: None,
            compose_project_name: None,
            image_name: Vec::new(),
            configuration: None,
            merged_configuration: None,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            outcome: OutcomeKind::Error,
            container_id: None,
            compose_project_name: None,
            image_name: Vec::new(),
            configuration: None,
            merged_configuration: None,
            message: Some(message.into()),
        }
    }

    pub fn with_container_id(mut self, id: impl Into<String>) -> Self {
        self.container_id = Some(id.into());
        self
    }

    pub fn with_image_name(mut self, names: Vec<String>) -> Self {
        self.image_name = names;
        self
    }

    pub fn with_configuration(mut self, value: Value) -> Self {
        self.configuration = Some(value);
        self
    }

    pub fn with_merged_configuration(mut self, value: Value) -> Self {
        self.merged_configuration = Some(value);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Prints this outcome to stdout as a single JSON object and returns the
    /// process exit code §6 specifies: `0` on success, `1` on any error.
    pub fn emit(&self) -> i32 {
        let json = serde_json::to_string(self).expect("Outcome always serializes");
        println!("{json}");
        match self.outcome {
            OutcomeKind::Success => 0,
            OutcomeKind::Error => 1,
        }
    }
}

impl From<devcontainer_types::CoreError> for Outcome {
    fn from(err: devcontainer_types::CoreError) -> Self {
        Outcome::error(err.message().to_string())
    }
}
