//! # devcontainer-vars
//!
//! Pure, single-pass `${...}` placeholder substitution over arbitrary
//! JSON-shaped config trees. Expansion never re-scans its own output, and
//! an unrecognized or currently-unsatisfiable placeholder is left verbatim
//! rather than erroring — config authors may use placeholders this
//! component doesn't carry a value for yet (`${containerEnv:NAME}`, which
//! the container runtime expands after start).

use std::collections::HashMap;

use serde_json::Value;

/// Everything the substitutor can resolve locally. `container_env` is
/// intentionally absent: `${containerEnv:NAME}` is always deferred.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionContext {
    pub local_workspace_folder: Option<String>,
    pub container_workspace_folder: Option<String>,
    pub local_env: HashMap<String, String>,
    pub feature_root: Option<String>,
}

impl SubstitutionContext {
    fn local_workspace_folder_basename(&self) -> Option<String> {
        self.local_workspace_folder
            .as_ref()
            .map(|p| basename(p))
    }

    fn container_workspace_folder_basename(&self) -> Option<String> {
        self.container_workspace_folder
            .as_ref()
            .map(|p| basename(p))
    }
}

fn basename(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// Substitutes every string leaf in `value`, recursing through arrays and
/// objects unchanged in shape.
pub fn substitute(value: &Value, ctx: &SubstitutionContext) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_str(s, ctx)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, ctx)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Substitutes placeholders in a single string, left to right, without
/// rescanning replaced text.
pub fn substitute_str(input: &str, ctx: &SubstitutionContext) -> String {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(end) = input[i + 2..].find('}') {
                let token = &input[i + 2..i + 2 + end];
                out.push_str(&resolve_token(token, ctx).unwrap_or_else(|| format!("${{{token}}}")));
                i += 2 + end + 1;
                continue;
            }
        }
        let ch_len = next_char_len(bytes, i);
        out.push_str(&input[i..i + ch_len]);
        i += ch_len;
    }
    out
}

fn next_char_len(bytes: &[u8], i: usize) -> usize {
    let b = bytes[i];
    if b < 0x80 {
        1
    } else if b & 0xE0 == 0xC0 {
        2
    } else if b & 0xF0 == 0xE0 {
        3
    } else {
        4
    }
}

fn resolve_token(token: &str, ctx: &SubstitutionContext) -> Option<String> {
    match token {
        "localWorkspaceFolder" => ctx.local_workspace_folder.clone(),
        "localWorkspaceFolderBasename" => ctx.local_workspace_folder_basename(),
        "containerWorkspaceFolder" => ctx.container_workspace_folder.clone(),
        "containerWorkspaceFolderBasename" => ctx.container_workspace_folder_basename(),
        "featureRoot" => ctx.feature_root.clone(),
        _ if token.starts_with("localEnv:") => {
            let rest = &token["localEnv:".len()..];
            let (name, default) = match rest.split_once(':') {
                Some((n, d)) => (n, Some(d)),
                None => (rest, None),
            };
            Some(
                ctx.local_env
                    .get(name)
                    .cloned()
                    .or_else(|| default.map(str::to_string))
                    .unwrap_or_default(),
            )
        }
        // containerEnv is resolved by the runtime after container start.
        _ if token.starts_with("containerEnv:") => None,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> SubstitutionContext {
        SubstitutionContext {
            local_workspace_folder: Some("/home/user/project".into()),
            container_workspace_folder: Some("/workspaces/project".into()),
            local_env: [("TOKEN".to_string(), "abc123".to_string())].into_iter().collect(),
            feature_root: Some("/usr/local/devcontainer-features/ruby".into()),
        }
    }

    #[test]
    fn expands_local_workspace_folder() {
        assert_eq!(
            substitute_str("${localWorkspaceFolder}/src", &ctx()),
            "/home/user/project/src"
        );
    }

    #[test]
    fn expands_basename_variants() {
        assert_eq!(substitute_str("${localWorkspaceFolderBasename}", &ctx()), "project");
        assert_eq!(
            substitute_str("${containerWorkspaceFolderBasename}", &ctx()),
            "project"
        );
    }

    #[test]
    fn expands_local_env_with_and_without_default() {
        assert_eq!(substitute_str("${localEnv:TOKEN}", &ctx()), "abc123");
        assert_eq!(substitute_str("${localEnv:MISSING}", &ctx()), "");
        assert_eq!(substitute_str("${localEnv:MISSING:fallback}", &ctx()), "fallback");
    }

    #[test]
    fn container_env_is_deferred_unchanged() {
        assert_eq!(
            substitute_str("${containerEnv:PATH}", &ctx()),
            "${containerEnv:PATH}"
        );
    }

    #[test]
    fn unrecognized_token_passes_through() {
        assert_eq!(substitute_str("${notAThing}", &ctx()), "${notAThing}");
    }

    #[test]
    fn feature_root_expands_when_present() {
        assert_eq!(
            substitute_str("${featureRoot}/install.sh", &ctx()),
            "/usr/local/devcontainer-features/ruby/install.sh"
        );
    }

    #[test]
    fn substitution_is_single_pass() {
        let mut ctx = ctx();
        ctx.local_env.insert(
            "NESTED".to_string(),
            "${localWorkspaceFolder}".to_string(),
        );
        assert_eq!(
            substitute_str("${localEnv:NESTED}", &ctx),
            "${localWorkspaceFolder}"
        );
    }

    #[test]
    fn recurses_through_json_tree() {
        let value = serde_json::json!({
            "cmd": "${localWorkspaceFolder}/run.sh",
            "args": ["${featureRoot}", "static"],
        });
        let result = substitute(&value, &ctx());
        assert_eq!(
            result["cmd"],
            Value::String("/home/user/project/run.sh".to_string())
        );
        assert_eq!(
            result["args"][0],
            Value::String("/usr/local/devcontainer-features/ruby".to_string())
        );
        assert_eq!(result["args"][1], Value::String("static".to_string()));
    }
}
