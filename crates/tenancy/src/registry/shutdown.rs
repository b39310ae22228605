//! Best-effort shutdown of tenant data sources.
//!
//! Every hook of a data source is attempted, in order, even when an earlier
//! one fails, times out or panics. Failures are logged and collected into a
//! [`ShutdownReport`]; they never abort the caller's removal of the tenant.
//!
//! The hooks run on a spawned task. Dropping the future that requested the
//! shutdown does not stop it; the remaining hooks still run to completion.

use std::time::Duration;

use tracing::{debug, error};

use super::source::{DataSource, ShutdownHook};
use crate::error::ShutdownError;
use crate::tenant::TenantId;

/// Outcome of closing one tenant's data source.
#[derive(Debug)]
pub struct ShutdownReport {
    tenant_id: TenantId,
    closed: Vec<String>,
    failures: Vec<ShutdownError>,
    already_closed: bool,
}

impl ShutdownReport {
    fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            closed: Vec::new(),
            failures: Vec::new(),
            already_closed: false,
        }
    }

    /// Returns the tenant this report belongs to.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the names of hooks that completed successfully.
    pub fn closed_hooks(&self) -> &[String] {
        &self.closed
    }

    /// Returns the hooks that failed, timed out or panicked.
    pub fn failures(&self) -> &[ShutdownError] {
        &self.failures
    }

    /// Returns `true` if every hook succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns `true` if shutdown had already run for this data source, in
    /// which case no hooks were invoked.
    pub fn already_closed(&self) -> bool {
        self.already_closed
    }
}

/// Runs every shutdown hook of `source`, each bounded by `timeout`.
///
/// A data source is closed at most once; later calls return an empty report
/// flagged [`already_closed`](ShutdownReport::already_closed).
pub(crate) async fn close_source<M>(
    tenant_id: &TenantId,
    source: &DataSource<M>,
    timeout: Duration,
) -> ShutdownReport
where
    M: Send + Sync + 'static,
{
    if !source.mark_closed() {
        debug!(tenant_id = %tenant_id, "data source already closed, skipping hooks");
        let mut report = ShutdownReport::new(tenant_id.clone());
        report.already_closed = true;
        return report;
    }

    let hooks = source.hooks().to_vec();
    let closing = tokio::spawn(run_hooks(tenant_id.clone(), hooks, timeout));

    match closing.await {
        Ok(report) => report,
        Err(err) => {
            error!(tenant_id = %tenant_id, error = %err, "shutdown task did not complete");
            let mut report = ShutdownReport::new(tenant_id.clone());
            report.failures.push(ShutdownError::Interrupted {
                tenant_id: tenant_id.clone(),
            });
            report
        }
    }
}

async fn run_hooks(
    tenant_id: TenantId,
    hooks: Vec<ShutdownHook>,
    timeout: Duration,
) -> ShutdownReport {
    let mut report = ShutdownReport::new(tenant_id.clone());

    for hook in hooks {
        let name = hook.name().to_string();
        let running = tokio::spawn(async move { hook.run().await });
        let abort = running.abort_handle();

        let failure = match tokio::time::timeout(timeout, running).await {
            Ok(Ok(Ok(()))) => {
                debug!(tenant_id = %tenant_id, hook = %name, "shutdown hook completed");
                report.closed.push(name);
                continue;
            }
            Ok(Ok(Err(err))) => ShutdownError::HookFailed {
                tenant_id: tenant_id.clone(),
                hook: name,
                source: err,
            },
            Ok(Err(err)) if err.is_panic() => ShutdownError::Panicked {
                tenant_id: tenant_id.clone(),
                hook: name,
            },
            Ok(Err(_)) => ShutdownError::Interrupted {
                tenant_id: tenant_id.clone(),
            },
            Err(_) => {
                abort.abort();
                ShutdownError::TimedOut {
                    tenant_id: tenant_id.clone(),
                    hook: name,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }
            }
        };

        error!(
            tenant_id = %tenant_id,
            hook = failure.hook().unwrap_or_default(),
            error = %failure,
            "error closing data source"
        );
        report.failures.push(failure);
    }

    report
}
