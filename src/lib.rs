// ABOUTME: Library root for caravel - exposes the deploy pipeline and its collaborators.
// ABOUTME: The main binary is in main.rs.

pub mod build;
pub mod config;
pub mod deploy;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod lock;
pub mod model;
pub mod output;
pub mod platform;
pub mod proxy;
pub mod registry;
pub mod store;
pub mod types;

pub use platform::{DeployOutcome, Platform, Rollout};
