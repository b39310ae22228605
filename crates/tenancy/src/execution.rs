//! Tenant-scoped execution of work units.
//!
//! [`TenantExecutor::execute`] binds the tenant into the ambient context,
//! resolves the tenant's data source from the registry and hands its manager
//! to the work unit. The binding is released on every exit path: success,
//! lookup failure, work failure, panic and cancellation (dropping the
//! returned future).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use helios_tenancy::registry::{DataSource, TenantRegistry};
//! use helios_tenancy::tenant::context;
//! use helios_tenancy::{RegistryError, TenantExecutor};
//!
//! # tokio_test::block_on(async {
//! let registry = Arc::new(TenantRegistry::new());
//! registry.register_tenant("acme", DataSource::bare("pool-acme")).unwrap();
//!
//! let executor = TenantExecutor::new(Arc::clone(&registry));
//! let (pool, tenant) = executor
//!     .execute("acme", |pool| async move {
//!         Ok::<_, RegistryError>((pool, context::current_tenant()))
//!     })
//!     .await
//!     .unwrap();
//!
//! assert_eq!(pool, "pool-acme");
//! assert_eq!(tenant.unwrap().as_str(), "acme");
//! assert!(context::current_tenant().is_none());
//! # });
//! ```

use std::future::Future;
use std::sync::Arc;

use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use crate::error::RegistryError;
use crate::registry::TenantRegistry;
use crate::tenant::{TenantId, context};

/// Runs work units on behalf of a tenant.
#[derive(Debug)]
pub struct TenantExecutor<M> {
    registry: Arc<TenantRegistry<M>>,
}

impl<M> Clone for TenantExecutor<M> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<M> TenantExecutor<M>
where
    M: Clone + Send + Sync + 'static,
{
    /// Creates an executor over `registry`.
    pub fn new(registry: Arc<TenantRegistry<M>>) -> Self {
        Self { registry }
    }

    /// Returns the registry this executor resolves tenants from.
    pub fn registry(&self) -> &Arc<TenantRegistry<M>> {
        &self.registry
    }

    /// Runs `work` with the manager of `tenant_id`'s data source while the
    /// tenant is bound in the ambient context.
    ///
    /// The work runs in a fresh task scope bound to the tenant, so the
    /// binding never leaks into the caller and a nested `execute` never
    /// clobbers an outer one. The scope ends on every exit path.
    ///
    /// # Errors
    ///
    /// Lookup failures are converted into `E` via `From<RegistryError>`.
    /// Errors returned by `work` are passed through unchanged.
    pub async fn execute<F, Fut, T, E>(
        &self,
        tenant_id: impl Into<TenantId>,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce(M) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RegistryError>,
    {
        let tenant_id = tenant_id.into();
        let span = info_span!(
            "tenant_execute",
            tenant_id = %tenant_id,
            execution_id = %Uuid::new_v4(),
        );

        context::with_tenant(tenant_id.clone(), async move {
            let manager = self.resolve(&tenant_id)?;
            debug!("running work unit");
            work(manager).await
        })
        .instrument(span)
        .await
    }

    /// Synchronous counterpart of [`execute`](Self::execute) for
    /// thread-per-request hosts.
    ///
    /// `work` runs in a synchronous task scope bound to the tenant, which is
    /// torn down when `work` returns or panics. Works on plain threads and
    /// inside tokio tasks alike.
    pub fn execute_sync<F, T, E>(&self, tenant_id: impl Into<TenantId>, work: F) -> Result<T, E>
    where
        F: FnOnce(M) -> Result<T, E>,
        E: From<RegistryError>,
    {
        let tenant_id = tenant_id.into();
        let span = info_span!(
            "tenant_execute",
            tenant_id = %tenant_id,
            execution_id = %Uuid::new_v4(),
        );
        let _entered = span.enter();

        context::with_tenant_sync(tenant_id.clone(), || {
            let manager = self.resolve(&tenant_id)?;
            debug!("running work unit");
            work(manager)
        })
    }

    fn resolve(&self, tenant_id: &TenantId) -> Result<M, RegistryError> {
        let source = self.registry.get_data_source(tenant_id.as_str())?;
        Ok(source.manager().clone())
    }
}
