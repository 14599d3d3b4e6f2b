// ABOUTME: Reconciliation state markers and transitions for the type state pattern.
// ABOUTME: NotRunning -> Created -> Updated; each transition consumes the previous state.

use crate::engine::{ServiceError, ServiceInfo, ServiceOps, ServiceSpec};
use crate::types::ServiceId;

use super::error::DeployError;

/// No orchestrator service exists yet.
/// Available actions: `create()`
#[derive(Debug, Clone, Copy, Default)]
pub struct NotRunning;

/// The service exists, either just created or found live.
/// Available actions: `update()`
#[derive(Debug, Clone)]
pub struct Created {
    live: ServiceInfo,
}

/// The update was accepted by the orchestrator.
#[derive(Debug, Clone)]
pub struct Updated {
    id: ServiceId,
    spec: ServiceSpec,
}

/// Reconciliation of one service, parameterized by how far it got.
#[derive(Debug)]
pub struct Reconciliation<S> {
    service: String,
    state: S,
}

/// What was found when looking the service up.
#[derive(Debug)]
pub enum Observed {
    NotRunning(Reconciliation<NotRunning>),
    Running(Reconciliation<Created>),
}

impl<S> Reconciliation<S> {
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl Reconciliation<NotRunning> {
    /// Look the service up. A missing service is not an error.
    pub async fn observe<E>(engine: &E, service: &str) -> Result<Observed, DeployError>
    where
        E: ServiceOps + ?Sized,
    {
        Ok(match engine.inspect_service(service).await? {
            Some(live) => Observed::Running(Reconciliation {
                service: service.to_string(),
                state: Created { live },
            }),
            None => Observed::NotRunning(Reconciliation {
                service: service.to_string(),
                state: NotRunning,
            }),
        })
    }

    /// Create the service from `initial`.
    ///
    /// Networks and mounts are stripped: setting them at creation delays the
    /// first rollout, so the update that always follows applies them.
    pub async fn create<E>(
        self,
        engine: &E,
        initial: ServiceSpec,
    ) -> Result<Reconciliation<Created>, DeployError>
    where
        E: ServiceOps + ?Sized,
    {
        let spec = ServiceSpec {
            networks: Vec::new(),
            mounts: Vec::new(),
            ..initial
        };

        tracing::info!(service = %self.service, image = %spec.image, "creating service");
        engine.create_service(&spec).await?;

        let live = engine
            .inspect_service(&self.service)
            .await?
            .ok_or_else(|| ServiceError::NotFound(self.service.clone()))?;

        Ok(Reconciliation {
            service: self.service,
            state: Created { live },
        })
    }
}

impl Reconciliation<Created> {
    pub fn live(&self) -> &ServiceInfo {
        &self.state.live
    }

    /// Submit `spec` against the live object version.
    pub async fn update<E>(
        self,
        engine: &E,
        spec: ServiceSpec,
    ) -> Result<Reconciliation<Updated>, DeployError>
    where
        E: ServiceOps + ?Sized,
    {
        let live = self.state.live;
        tracing::info!(service = %self.service, image = %spec.image, "updating service");
        engine.update_service(&live.id, live.version, &spec).await?;

        Ok(Reconciliation {
            service: self.service,
            state: Updated { id: live.id, spec },
        })
    }
}

impl Reconciliation<Updated> {
    pub fn id(&self) -> &ServiceId {
        &self.state.id
    }

    /// The spec that was submitted.
    pub fn spec(&self) -> &ServiceSpec {
        &self.state.spec
    }

    pub fn finish(self) -> (ServiceId, ServiceSpec) {
        (self.state.id, self.state.spec)
    }
}
