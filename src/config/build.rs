// ABOUTME: Image build configuration.
// ABOUTME: Scratch directory for build contexts and build log size.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Lines kept in each app's build log.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    /// Wait before dangling images are pruned after a deploy.
    #[serde(default = "default_prune_delay", with = "humantime_serde")]
    pub prune_delay: Duration,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("/var/lib/caravel/builds")
}

fn default_log_capacity() -> usize {
    50
}

fn default_prune_delay() -> Duration {
    Duration::from_secs(20)
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            work_dir: default_work_dir(),
            log_capacity: default_log_capacity(),
            prune_delay: default_prune_delay(),
        }
    }
}
