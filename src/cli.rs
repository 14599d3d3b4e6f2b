// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "caravel")]
#[command(about = "Build, deploy and route apps on a container orchestrator")]
#[command(version)]
pub struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print results as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new caravel.yml configuration file
    Init {
        /// Namespace the control plane manages
        #[arg(long)]
        namespace: Option<String>,

        /// Domain apps get their default subdomain under
        #[arg(long)]
        root_domain: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Register a new app
    Register {
        app: String,

        /// The app keeps data in volumes
        #[arg(long)]
        persistent: bool,
    },

    /// Build a new version of an app and roll it out
    Deploy {
        app: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Return once the build has started and follow its log
        #[arg(short, long)]
        detach: bool,
    },

    /// Show an app's build status and log
    Status { app: String },

    /// Regenerate proxy config and reload the proxy
    Reload,

    /// Remove an app and its service
    Remove { app: String },
}

/// Exactly one of `--tarball`, `--git`, `--definition` or `--image`.
#[derive(Args)]
pub struct SourceArgs {
    /// Tar archive (optionally gzipped) of the source tree
    #[arg(long, group = "kind")]
    pub tarball: Option<PathBuf>,

    /// Git repository to clone
    #[arg(long, group = "kind", requires = "branch")]
    pub git: Option<String>,

    /// Branch to clone
    #[arg(long, requires = "git")]
    pub branch: Option<String>,

    /// User for the git repository
    #[arg(long, requires = "git")]
    pub user: Option<String>,

    /// Password or token for the git repository
    #[arg(long, requires = "git")]
    pub password: Option<String>,

    /// Inline build descriptor JSON
    #[arg(long, group = "kind")]
    pub definition: Option<String>,

    /// Prebuilt image to deploy
    #[arg(long, group = "kind")]
    pub image: Option<String>,
}
