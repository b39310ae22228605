//! Tenant data source registry.
//!
//! The [`TenantRegistry`] owns the mapping from [`TenantId`] to the tenant's
//! [`DataSource`] and its lifecycle: registration, lookup, removal and bulk
//! shutdown. It is constructed explicitly at startup, shared behind an `Arc`
//! with the [`TenantExecutor`](crate::TenantExecutor) and with shutdown
//! logic, and torn down with [`TenantRegistry::close_all`].
//!
//! # Concurrency
//!
//! Bindings live behind a reader/writer lock. Lookups take the read side;
//! registration and removal take the write side. The lock is never held
//! while a shutdown hook runs, and a binding leaves the map before its hooks
//! are invoked, so a concurrent lookup never observes a half-closed handle.
//!
//! # Example
//!
//! ```
//! use helios_tenancy::registry::{DataSource, TenantRegistry};
//!
//! # tokio_test::block_on(async {
//! let registry = TenantRegistry::new();
//! registry.register_tenant("acme", DataSource::bare("pool-acme")).unwrap();
//!
//! let source = registry.get_data_source("acme").unwrap();
//! assert_eq!(*source.manager(), "pool-acme");
//!
//! let removal = registry.delete_tenant("acme").await.unwrap();
//! assert!(removal.is_removed());
//! assert!(registry.get_data_source("acme").is_err());
//! # });
//! ```

mod shutdown;
mod source;

pub use shutdown::ShutdownReport;
pub use source::{
    CloseFn, Closeable, DESTROY_HOOK, DataSource, DataSourceBuilder, DataSourceShape, END_HOOK,
    ShutdownHook, close_fn,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::TenancyConfig;
use crate::error::{InvalidArgumentError, RegistryError, RegistryResult};
use crate::tenant::TenantId;

/// Result of [`TenantRegistry::delete_tenant`].
#[derive(Debug)]
pub enum Removal {
    /// No binding existed for the tenant.
    NotFound,
    /// The binding was removed; the report lists shutdown outcomes.
    Removed(ShutdownReport),
}

impl Removal {
    /// Returns `true` if a binding was removed, regardless of shutdown
    /// failures.
    pub fn is_removed(&self) -> bool {
        matches!(self, Removal::Removed(_))
    }

    /// Returns the shutdown report, if a binding was removed.
    pub fn report(&self) -> Option<&ShutdownReport> {
        match self {
            Removal::Removed(report) => Some(report),
            Removal::NotFound => None,
        }
    }
}

/// Registry of tenant data sources.
///
/// `M` is the manager facade type handed to work units.
pub struct TenantRegistry<M> {
    config: TenancyConfig,
    sources: RwLock<HashMap<TenantId, Arc<DataSource<M>>>>,
}

impl<M> TenantRegistry<M>
where
    M: Send + Sync + 'static,
{
    /// Creates an empty registry with default configuration.
    pub fn new() -> Self {
        Self::with_config(TenancyConfig::default())
    }

    /// Creates an empty registry with the given configuration.
    pub fn with_config(config: TenancyConfig) -> Self {
        Self {
            config,
            sources: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TenancyConfig {
        &self.config
    }

    /// Registers `source` for `tenant_id`.
    ///
    /// An existing binding is overwritten without being closed and is handed
    /// back to the caller, who owns its shutdown from then on (see
    /// [`DataSource::close`]). Use [`replace_tenant`](Self::replace_tenant)
    /// to have the registry close it instead.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `tenant_id` is blank
    /// - `AlreadyRegistered` if the tenant exists and overwrites are disabled
    /// - `CapacityExceeded` if a new tenant would exceed `max_tenants`
    pub fn register_tenant(
        &self,
        tenant_id: impl Into<TenantId>,
        source: DataSource<M>,
    ) -> RegistryResult<Option<Arc<DataSource<M>>>> {
        self.insert(tenant_id.into(), source, self.config.allow_overwrite)
    }

    /// Registers `source` for `tenant_id`, closing any displaced data source.
    ///
    /// Returns the shutdown report of the displaced data source, if any.
    /// Overwriting is allowed here regardless of configuration.
    pub async fn replace_tenant(
        &self,
        tenant_id: impl Into<TenantId>,
        source: DataSource<M>,
    ) -> RegistryResult<Option<ShutdownReport>> {
        let tenant_id = tenant_id.into();
        let previous = self.insert(tenant_id.clone(), source, true)?;

        match previous {
            Some(previous) => {
                let report =
                    shutdown::close_source(&tenant_id, &previous, self.config.shutdown_timeout())
                        .await;
                Ok(Some(report))
            }
            None => Ok(None),
        }
    }

    fn insert(
        &self,
        tenant_id: TenantId,
        source: DataSource<M>,
        allow_overwrite: bool,
    ) -> RegistryResult<Option<Arc<DataSource<M>>>> {
        tenant_id.validate()?;

        let shape = source.shape();
        let hooks = source.hook_names().count();

        let previous = {
            let mut sources = self.sources.write();
            let exists = sources.contains_key(&tenant_id);

            if exists && !allow_overwrite {
                return Err(RegistryError::AlreadyRegistered { tenant_id });
            }

            if let Some(max_tenants) = self.config.max_tenants {
                if !exists && sources.len() >= max_tenants {
                    return Err(RegistryError::CapacityExceeded {
                        tenant_id,
                        max_tenants,
                    });
                }
            }

            sources.insert(tenant_id.clone(), Arc::new(source))
        };

        if previous.is_some() {
            warn!(
                tenant_id = %tenant_id,
                "tenant re-registered; previous data source was not closed by the registry"
            );
        }
        info!(tenant_id = %tenant_id, shape = ?shape, hooks, "tenant registered");

        Ok(previous)
    }

    /// Returns the data source registered for `tenant_id`.
    ///
    /// The registry keeps ownership; callers share the handle for the
    /// duration of their work.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the tenant has no binding.
    pub fn get_data_source(&self, tenant_id: &str) -> RegistryResult<Arc<DataSource<M>>> {
        let source = self.sources.read().get(tenant_id).cloned();

        match source {
            Some(source) => {
                source.touch();
                Ok(source)
            }
            None => {
                debug!(tenant_id = %tenant_id, "tenant lookup missed");
                Err(RegistryError::NotFound {
                    tenant_id: TenantId::new(tenant_id),
                })
            }
        }
    }

    /// Removes the tenant and closes its data source.
    ///
    /// Shutdown is best-effort: hook failures are logged and reported in the
    /// returned [`Removal`], and the binding is removed regardless.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `tenant_id` is blank. An unknown tenant
    /// is not an error and yields [`Removal::NotFound`].
    pub async fn delete_tenant(&self, tenant_id: &str) -> RegistryResult<Removal> {
        if tenant_id.trim().is_empty() {
            return Err(InvalidArgumentError::EmptyTenantId.into());
        }

        let removed = self.sources.write().remove_entry(tenant_id);

        let Some((tenant_id, source)) = removed else {
            warn!(tenant_id = %tenant_id, "tenant not found");
            return Ok(Removal::NotFound);
        };

        let report =
            shutdown::close_source(&tenant_id, &source, self.config.shutdown_timeout()).await;
        info!(
            tenant_id = %tenant_id,
            clean = report.is_clean(),
            "tenant removed from registry"
        );

        Ok(Removal::Removed(report))
    }

    /// Closes every registered data source and clears the registry.
    ///
    /// Intended for process shutdown. Bindings are removed before their hooks
    /// run, so no closed handle stays resolvable.
    pub async fn close_all(&self) -> Vec<ShutdownReport> {
        let drained: Vec<_> = self.sources.write().drain().collect();
        let timeout = self.config.shutdown_timeout();

        let mut reports = Vec::with_capacity(drained.len());
        for (tenant_id, source) in drained {
            reports.push(shutdown::close_source(&tenant_id, &source, timeout).await);
        }

        let failed = reports.iter().filter(|r| !r.is_clean()).count();
        info!(tenants = reports.len(), failed, "closed all tenant data sources");

        reports
    }

    /// Returns tenants whose data source has not been looked up for `idle`.
    pub fn idle_tenants(&self, idle: Duration) -> Vec<TenantId> {
        self.sources
            .read()
            .iter()
            .filter(|(_, source)| source.idle_for() >= idle)
            .map(|(tenant_id, _)| tenant_id.clone())
            .collect()
    }

    /// Removes and closes tenants idle for longer than the configured idle
    /// timeout.
    pub async fn evict_idle(&self) -> Vec<ShutdownReport> {
        let idle = self.config.idle_timeout();

        let evicted: Vec<_> = {
            let mut sources = self.sources.write();
            let stale: Vec<TenantId> = sources
                .iter()
                .filter(|(_, source)| source.idle_for() >= idle)
                .map(|(tenant_id, _)| tenant_id.clone())
                .collect();
            stale
                .into_iter()
                .filter_map(|tenant_id| sources.remove_entry(&tenant_id))
                .collect()
        };

        let mut reports = Vec::with_capacity(evicted.len());
        for (tenant_id, source) in evicted {
            info!(tenant_id = %tenant_id, "evicting idle tenant");
            let report =
                shutdown::close_source(&tenant_id, &source, self.config.shutdown_timeout()).await;
            reports.push(report);
        }

        reports
    }

    /// Returns `true` if `tenant_id` has a binding.
    pub fn contains(&self, tenant_id: &str) -> bool {
        self.sources.read().contains_key(tenant_id)
    }

    /// Returns the registered tenant IDs, sorted.
    pub fn tenant_ids(&self) -> Vec<TenantId> {
        let mut ids: Vec<_> = self.sources.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the number of registered tenants.
    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    /// Returns `true` if no tenant is registered.
    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }
}

impl<M> Default for TenantRegistry<M>
where
    M: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M> std::fmt::Debug for TenantRegistry<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantRegistry")
            .field("config", &self.config)
            .field("tenants", &self.sources.read().len())
            .finish()
    }
}
