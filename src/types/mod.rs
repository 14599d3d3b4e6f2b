// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Engine ids are distinct newtypes so different object kinds never mix.

mod app_name;
mod id;
mod image_ref;
mod namespace;

pub use app_name::{AppName, AppNameError};
pub use id::{ContainerId, NetworkId, NodeId, SecretId, ServiceId};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use namespace::Namespace;
