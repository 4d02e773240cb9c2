//! # devcontainer-workspace
//!
//! Locates the enclosing git repository for a workspace (including inside
//! a worktree), and plans the bind-mount strings — `workspaceFolder`,
//! `workspaceMount`, and an optional auxiliary mount for a worktree's
//! shared `.git` directory — with platform-specific consistency flags.

mod fs;
mod platform;
mod resolve;

pub use fs::{FileSystem, StdFileSystem};
pub use platform::HostPlatform;
pub use resolve::{find_git_root, resolve_mount, MountOptions, MountPlan};
