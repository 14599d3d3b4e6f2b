// ABOUTME: Command module aggregator for the caravel CLI.
// ABOUTME: Deploy with log following, plus the app lifecycle and status commands.

mod apps;
mod deploy;

pub use apps::{register, reload, remove, status};
pub use deploy::{deploy, source_from_args};
