// ABOUTME: Service reconciliation using the type state pattern.
// ABOUTME: Exports the coordinator, the update draft builder and the state markers.

mod coordinator;
mod draft;
mod error;
mod state;

pub use coordinator::{DeploymentCoordinator, Reconciled};
pub use draft::{APP_LABEL, FORCE_UPDATE_LABEL, NAMESPACE_LABEL, ServiceDraft, expand_ports};
pub use error::DeployError;
pub use state::{Created, NotRunning, Observed, Reconciliation, Updated};
