//! Git root discovery, worktree detection, and bind-mount string assembly.

use std::path::{Path, PathBuf};

use crate::fs::FileSystem;
use crate::platform::HostPlatform;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPlan {
    pub workspace_folder: String,
    pub workspace_mount: String,
    pub additional_mount_string: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct MountOptions {
    pub mount_workspace_git_root: bool,
    pub mount_git_worktree_common_dir: bool,
}

/// Walks upward from `workspace_path` looking for a `.git/config` file.
/// Returns the enclosing directory, or `None` if no ancestor has one — as
/// is the case inside a worktree, whose `.git` is a file, not a directory.
pub fn find_git_root(fs: &dyn FileSystem, workspace_path: &Path) -> Option<PathBuf> {
    let mut candidate = Some(workspace_path.to_path_buf());
    while let Some(dir) = candidate {
        if fs.is_dir(&dir.join(".git")) && fs.is_file(&dir.join(".git").join("config")) {
            return Some(dir);
        }
        candidate = dir.parent().map(|p| p.to_path_buf());
    }
    None
}

/// Plans the bind mount(s) for `workspace_path` per the algorithm: resolve
/// `source`/basename from `mountWorkspaceGitRoot` + git-root discovery,
/// then detect (and, if enabled, mount) a worktree's shared `.git` dir.
pub fn resolve_mount(
    fs: &dyn FileSystem,
    workspace_path: &Path,
    platform: HostPlatform,
    options: MountOptions,
) -> MountPlan {
    let git_root = find_git_root(fs, workspace_path);

    let (source, basename) = if !options.mount_workspace_git_root || git_root.is_none() {
        (workspace_path.to_path_buf(), basename_of(workspace_path))
    } else {
        let root = git_root.clone().unwrap();
        (root.clone(), basename_of(&root))
    };

    let mut workspace_folder = format!("/workspaces/{basename}");
    if options.mount_workspace_git_root {
        if let Some(root) = &git_root {
            if let Ok(rel) = workspace_path.strip_prefix(root) {
                if rel.as_os_str().len() > 0 {
                    workspace_folder = format!("{workspace_folder}/{}", to_posix(rel));
                }
            }
        }
    }

    let mut workspace_mount = mount_string(&source, &format!("/workspaces/{basename}"), platform);
    let mut additional_mount_string = None;

    if let Some((common_git_dir, is_relative)) = detect_worktree(fs, &source) {
        if is_relative && options.mount_git_worktree_common_dir {
            let lca = lowest_common_ancestor(&source, &common_git_dir);
            let rel_source = to_posix(source.strip_prefix(&lca).unwrap_or(&source));
            let rel_common = to_posix(common_git_dir.strip_prefix(&lca).unwrap_or(&common_git_dir));

            workspace_folder = format!("/workspaces/{rel_source}");
            workspace_mount = mount_string(&source, &format!("/workspaces/{rel_source}"), platform);
            additional_mount_string = Some(mount_string(
                &common_git_dir,
                &format!("/workspaces/{rel_common}"),
                platform,
            ));
        }
    }

    MountPlan {
        workspace_folder,
        workspace_mount,
        additional_mount_string,
    }
}

fn basename_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn to_posix(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn mount_string(source: &Path, target: &str, platform: HostPlatform) -> String {
    let base = mount_string_no_consistency(source, target);
    if platform.needs_consistency_flag() {
        format!("{base},consistency=consistent")
    } else {
        base
    }
}

fn mount_string_no_consistency(source: &Path, target: &str) -> String {
    format!("type=bind,source={},target={target}", source.display())
}

/// Detects whether `source/.git` is a worktree pointer file. Returns the
/// resolved common git directory (with any trailing `/worktrees/<name>`
/// stripped) and whether the pointer's path was relative.
fn detect_worktree(fs: &dyn FileSystem, source: &Path) -> Option<(PathBuf, bool)> {
    let git_path = source.join(".git");
    if !fs.is_file(&git_path) {
        return None;
    }
    let contents = fs.read_to_string(&git_path).ok()?;
    let first_line = contents.lines().next()?;
    let pointer = first_line.strip_prefix("gitdir: ")?.trim();

    let pointer_path = Path::new(pointer);
    let is_relative = pointer_path.is_relative();

    let resolved = if is_relative {
        normalize(&source.join(pointer_path))
    } else {
        pointer_path.to_path_buf()
    };

    let common_dir = strip_worktree_suffix(&resolved);
    Some((common_dir, is_relative))
}

/// Strips a trailing `/worktrees/<name>` segment, leaving the shared `.git`
/// directory every worktree of the same repo points into.
fn strip_worktree_suffix(path: &Path) -> PathBuf {
    let components: Vec<_> = path.components().collect();
    if components.len() >= 2 {
        let parent = components[components.len() - 2].as_os_str();
        if parent == "worktrees" {
            return components[..components.len() - 2].iter().collect();
        }
    }
    path.to_path_buf()
}

/// Lexically normalizes `.`/`..` segments without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn lowest_common_ancestor(a: &Path, b: &Path) -> PathBuf {
    let a_components: Vec<_> = a.components().collect();
    let b_components: Vec<_> = b.components().collect();
    let mut lca = PathBuf::new();
    for (ca, cb) in a_components.iter().zip(b_components.iter()) {
        if ca == cb {
            lca.push(ca.as_os_str());
        } else {
            break;
        }
    }
    lca
}
