// ABOUTME: Resolution of a service's node and container from its tasks.
// ABOUTME: Retries while the orchestrator settles; multiple running tasks are a hard error.

use super::retry::{Attempt, RetryPolicy, bounded_retry};
use super::traits::{
    ExecConfig, ExecError, ExecOps, ExecResult, ServiceError, ServiceOps, TaskState, TaskSummary,
};
use crate::types::{ContainerId, NodeId};

/// Errors from task-based lookups.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("could not resolve a running task for {service} after {attempts} attempts")]
    NotResolved { service: String, attempts: u32 },

    #[error("{count} running tasks found for {service}, expected exactly one")]
    Ambiguous { service: String, count: usize },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

fn running(tasks: Vec<TaskSummary>) -> Vec<TaskSummary> {
    tasks
        .into_iter()
        .filter(|t| t.desired_running && t.state == TaskState::Running)
        .collect()
}

/// Find the single running task of a service and extract a field from it.
/// `pick` returning `None` means the engine has not filled the field in yet.
async fn resolve_single<R, T, F>(
    engine: &R,
    service: &str,
    policy: RetryPolicy,
    pick: F,
) -> Result<T, ResolveError>
where
    R: ServiceOps + ?Sized,
    F: Fn(&TaskSummary) -> Option<T>,
{
    let attempts = policy.attempts.max(1);
    let pick = &pick;
    bounded_retry(policy, |_| async move {
        let tasks = match engine.list_tasks(service).await {
            Ok(tasks) => running(tasks),
            Err(e) => return Attempt::Fail(ResolveError::from(e)),
        };
        let not_ready = || ResolveError::NotResolved {
            service: service.to_string(),
            attempts,
        };
        match tasks.as_slice() {
            [] => Attempt::Retry(not_ready()),
            [task] => match pick(task) {
                Some(value) => Attempt::Done(value),
                None => Attempt::Retry(not_ready()),
            },
            many => Attempt::Fail(ResolveError::Ambiguous {
                service: service.to_string(),
                count: many.len(),
            }),
        }
    })
    .await
}

/// Node currently running the service's only task.
pub async fn resolve_node<R>(
    engine: &R,
    service: &str,
    policy: RetryPolicy,
) -> Result<NodeId, ResolveError>
where
    R: ServiceOps + ?Sized,
{
    resolve_single(engine, service, policy, |task| task.node_id.clone()).await
}

/// Container backing the service's only running task.
pub async fn resolve_container<R>(
    engine: &R,
    service: &str,
    policy: RetryPolicy,
) -> Result<ContainerId, ResolveError>
where
    R: ServiceOps + ?Sized,
{
    resolve_single(engine, service, policy, |task| task.container_id.clone()).await
}

/// Run a one-shot command in the service's sole running container; a
/// non-zero exit is an error.
pub async fn exec_in_service<R>(
    engine: &R,
    service: &str,
    cmd: &[String],
    policy: RetryPolicy,
) -> Result<ExecResult, ResolveError>
where
    R: ServiceOps + ExecOps + ?Sized,
{
    let container = resolve_container(engine, service, policy).await?;
    tracing::debug!("exec {:?} in {} ({})", cmd, service, container.short());
    Ok(engine
        .exec_checked(&container, &ExecConfig::command(cmd))
        .await?)
}
