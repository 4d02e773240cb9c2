//! Clap argument definitions for the CLI surface specified in §6: command
//! names and shared flag names are normative, so they're spelled out here
//! verbatim rather than derived from some shorter internal vocabulary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "devcontainer", version, about = "Dev container orchestrator")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Host directory bind-mounted as the container's workspace.
    #[arg(long, global = true)]
    pub workspace_folder: Option<PathBuf>,

    /// Explicit path to devcontainer.json, bypassing workspace discovery.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Target an already-running container instead of the one discovered
    /// from the workspace.
    #[arg(long, global = true)]
    pub container_id: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[arg(long, global = true)]
    pub skip_post_create: bool,

    #[arg(long, global = true)]
    pub skip_post_attach: bool,

    /// Returns control after postCreate and backgrounds postStart/postAttach.
    #[arg(long, global = true)]
    pub skip_non_blocking_commands: bool,

    /// Where markers, the event log, and the fetch cache live.
    #[arg(long, global = true)]
    pub user_data_folder: Option<PathBuf>,

    /// Newline-separated secret values to mask out of logged command lines.
    #[arg(long, global = true)]
    pub secrets_file: Option<PathBuf>,

    #[arg(long, global = true)]
    pub experimental_lockfile: bool,

    #[arg(long, global = true)]
    pub experimental_frozen_lockfile: bool,

    #[arg(long, global = true)]
    pub cache_from: Option<String>,

    /// Target build platform, e.g. `linux/amd64`.
    #[arg(long, global = true)]
    pub platform: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = BuildKitMode::Auto)]
    pub buildkit: BuildKitMode,

    #[arg(long, global = true)]
    pub push: bool,

    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    #[arg(long = "image-name", global = true)]
    pub image_name: Vec<String>,

    #[arg(long, global = true)]
    pub no_cache: bool,

    #[arg(long = "label", global = true)]
    pub label: Vec<String>,

    #[arg(long, global = true)]
    pub dotfiles_repository: Option<String>,

    #[arg(long, global = true)]
    pub dotfiles_install_command: Option<String>,

    #[arg(long, global = true, default_value = "docker")]
    pub docker_path: String,

    #[arg(long, global = true, default_value = "docker-compose")]
    pub docker_compose_path: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Debug,
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        })
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        })
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKitMode {
    Auto,
    Never,
}

impl std::fmt::Display for BuildKitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BuildKitMode::Auto => "auto",
            BuildKitMode::Never => "never",
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the image and install every resolved Feature, without starting a container.
    Build,
    /// Build if needed, start the container, and run the lifecycle schedule.
    Up,
    /// Re-run the lifecycle schedule against an existing container.
    RunUserCommands,
    /// Parse and resolve devcontainer.json without touching a container.
    ReadConfiguration,
    /// Run a single command inside an already-running container.
    Exec {
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
    /// Run the lifecycle schedule against a container that already exists
    /// outside of `up` (e.g. started by an external orchestrator).
    SetUp,
    /// Report version drift between the lockfile, declared constraints, and the registry.
    Outdated,
    /// Re-resolve one Feature (or all) to a newer version and refresh the lockfile.
    Upgrade {
        #[arg(long)]
        feature: Option<String>,
        #[arg(long)]
        target_version: Option<String>,
    },
    /// Feature authoring subcommands (test/package/publish/info).
    Features {
        #[command(subcommand)]
        action: FeaturesAction,
    },
    /// Template authoring subcommands (apply/package/publish/generate-docs/metadata).
    Templates {
        #[command(subcommand)]
        action: TemplatesAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum FeaturesAction {
    Test,
    Package,
    Publish,
    /// Fetch and print a single Feature's descriptor.
    Info {
        #[arg(required = true)]
        identifier: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TemplatesAction {
    Apply,
    Package,
    Publish,
    GenerateDocs,
    Metadata,
}
