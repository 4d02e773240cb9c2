//! # devcontainer-config
//!
//! Parses `devcontainer.json` and `devcontainer-feature.json` — both
//! JSON-with-comments — into explicit schemas. Unrecognized top-level
//! fields are preserved in an `extra` bag rather than rejected, so an
//! unsupported `customizations` sub-key never fails a parse.

mod devcontainer;
mod feature;
mod jsonc;

pub use devcontainer::{BaseImage, BuildOptions, ComposeFileRef, DevContainerConfig};
pub use feature::FeatureDescriptor;
pub use jsonc::strip_comments;

pub use devcontainer::{parse as parse_devcontainer_json, read_from_path as read_devcontainer_json};
pub use feature::{parse as parse_feature_json, read_from_path as read_feature_json};
