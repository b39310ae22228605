//! Tenant data sources.
//!
//! A [`DataSource`] wraps whatever the host uses to talk to a tenant's
//! database: the facade handed to work units (the "manager") plus the hooks
//! that release the underlying resources. The shape is fixed when the data
//! source is built, so nothing is probed per call.
//!
//! # Shapes
//!
//! - [`DataSourceShape::Bare`] - the pool itself is handed to work units
//! - [`DataSourceShape::WithManager`] - a separate facade is handed out and
//!   the raw pool is retained alongside it
//!
//! # Example
//!
//! ```
//! use helios_tenancy::registry::{close_fn, DataSource, DataSourceShape};
//! use helios_tenancy::error::BoxError;
//!
//! #[derive(Clone)]
//! struct Pool;
//!
//! let source = DataSource::bare(Pool)
//!     .on_end(close_fn(|| async { Ok::<(), BoxError>(()) }));
//!
//! assert_eq!(source.shape(), DataSourceShape::Bare);
//! assert_eq!(source.hook_names().collect::<Vec<_>>(), vec!["end"]);
//! ```

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::shutdown::{ShutdownReport, close_source};
use crate::error::{BoxError, InvalidArgumentError};
use crate::tenant::TenantId;

/// Hook name used by [`DataSource::on_destroy`].
pub const DESTROY_HOOK: &str = "destroy";

/// Hook name used by [`DataSource::on_end`].
pub const END_HOOK: &str = "end";

/// A resource that can be shut down asynchronously.
#[async_trait]
pub trait Closeable: Send + Sync {
    /// Releases the underlying resource.
    async fn close(&self) -> Result<(), BoxError>;
}

#[async_trait]
impl<T> Closeable for Arc<T>
where
    T: Closeable + ?Sized,
{
    async fn close(&self) -> Result<(), BoxError> {
        (**self).close().await
    }
}

/// A [`Closeable`] backed by an async closure.
pub struct CloseFn<F>(F);

/// Wraps an async closure as a [`Closeable`].
pub fn close_fn<F, Fut>(f: F) -> CloseFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    CloseFn(f)
}

#[async_trait]
impl<F, Fut> Closeable for CloseFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    async fn close(&self) -> Result<(), BoxError> {
        (self.0)().await
    }
}

impl<F> fmt::Debug for CloseFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CloseFn")
    }
}

/// A named shutdown operation.
#[derive(Clone)]
pub struct ShutdownHook {
    name: String,
    target: Arc<dyn Closeable>,
}

impl ShutdownHook {
    /// Creates a hook with the given name.
    pub fn new(name: impl Into<String>, target: impl Closeable + 'static) -> Self {
        Self {
            name: name.into(),
            target: Arc::new(target),
        }
    }

    /// Returns the hook name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) async fn run(&self) -> Result<(), BoxError> {
        self.target.close().await
    }
}

impl fmt::Debug for ShutdownHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHook")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// How a data source presents itself to work units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceShape {
    /// The raw pool is the facade.
    Bare,
    /// A distinct manager facade wraps the raw pool.
    WithManager,
}

/// A tenant's resource handle.
///
/// `M` is the facade type handed to work units. It is cloned once per
/// execution, so pool handles that are cheap `Arc` clones fit naturally.
pub struct DataSource<M> {
    manager: M,
    raw: Option<Arc<dyn Any + Send + Sync>>,
    hooks: Vec<ShutdownHook>,
    closed: AtomicBool,
    last_access: Mutex<Instant>,
}

impl<M> DataSource<M>
where
    M: Send + Sync + 'static,
{
    /// Creates a data source whose pool is handed to work units directly.
    pub fn bare(pool: M) -> Self {
        Self::from_parts(pool, None, Vec::new())
    }

    /// Creates a data source that hands `manager` to work units and keeps
    /// `pool` alive alongside it.
    pub fn with_manager<P>(pool: P, manager: M) -> Self
    where
        P: Send + Sync + 'static,
    {
        Self::from_parts(manager, Some(Arc::new(pool)), Vec::new())
    }

    /// Returns a builder for assembling a data source piece by piece.
    pub fn builder() -> DataSourceBuilder<M> {
        DataSourceBuilder::new()
    }

    fn from_parts(
        manager: M,
        raw: Option<Arc<dyn Any + Send + Sync>>,
        hooks: Vec<ShutdownHook>,
    ) -> Self {
        Self {
            manager,
            raw,
            hooks,
            closed: AtomicBool::new(false),
            last_access: Mutex::new(Instant::now()),
        }
    }

    /// Adds a high-level `destroy` shutdown hook.
    pub fn on_destroy(self, target: impl Closeable + 'static) -> Self {
        self.with_shutdown_hook(DESTROY_HOOK, target)
    }

    /// Adds a low-level `end` shutdown hook.
    pub fn on_end(self, target: impl Closeable + 'static) -> Self {
        self.with_shutdown_hook(END_HOOK, target)
    }

    /// Adds a named shutdown hook. Hooks run in the order they were added.
    pub fn with_shutdown_hook(
        mut self,
        name: impl Into<String>,
        target: impl Closeable + 'static,
    ) -> Self {
        self.hooks.push(ShutdownHook::new(name, target));
        self
    }

    /// Returns the facade handed to work units.
    pub fn manager(&self) -> &M {
        &self.manager
    }

    /// Returns the shape chosen at construction.
    pub fn shape(&self) -> DataSourceShape {
        if self.raw.is_some() {
            DataSourceShape::WithManager
        } else {
            DataSourceShape::Bare
        }
    }

    /// Returns the raw pool if it has type `P`.
    ///
    /// For a bare data source the manager is the pool.
    pub fn pool<P: Any>(&self) -> Option<&P> {
        match &self.raw {
            Some(raw) => raw.downcast_ref::<P>(),
            None => (&self.manager as &dyn Any).downcast_ref::<P>(),
        }
    }

    /// Returns the names of the registered shutdown hooks, in run order.
    pub fn hook_names(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().map(ShutdownHook::name)
    }

    pub(crate) fn hooks(&self) -> &[ShutdownHook] {
        &self.hooks
    }

    /// Runs this data source's shutdown hooks, each bounded by `timeout`.
    ///
    /// Intended for data sources the registry handed back on re-registration.
    /// Only the first close of a data source runs its hooks; later calls
    /// return a report flagged
    /// [`already_closed`](ShutdownReport::already_closed). Failures are
    /// reported, never returned as errors.
    pub async fn close(&self, tenant_id: impl Into<TenantId>, timeout: Duration) -> ShutdownReport {
        close_source(&tenant_id.into(), self, timeout).await
    }

    /// Returns `true` once shutdown has started for this data source.
    ///
    /// Started shutdowns always run to completion, even if the caller that
    /// requested them is dropped.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Marks the data source closed, returning `false` if it already was.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    /// Returns how long ago the data source was last looked up.
    pub fn idle_for(&self) -> Duration {
        self.last_access.lock().elapsed()
    }
}

impl<M> fmt::Debug for DataSource<M>
where
    M: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("shape", &self.shape())
            .field("hooks", &self.hooks)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Builder for [`DataSource`], for hosts that assemble handles from
/// configuration.
///
/// A manager is required; supplying a pool as well yields a
/// [`DataSourceShape::WithManager`] data source.
pub struct DataSourceBuilder<M> {
    manager: Option<M>,
    raw: Option<Arc<dyn Any + Send + Sync>>,
    hooks: Vec<ShutdownHook>,
}

impl<M> DataSourceBuilder<M>
where
    M: Send + Sync + 'static,
{
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            manager: None,
            raw: None,
            hooks: Vec::new(),
        }
    }

    /// Sets the facade handed to work units.
    pub fn manager(mut self, manager: M) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Sets the raw pool kept alongside the manager.
    pub fn pool<P>(mut self, pool: P) -> Self
    where
        P: Send + Sync + 'static,
    {
        self.raw = Some(Arc::new(pool));
        self
    }

    /// Adds a `destroy` hook.
    pub fn on_destroy(self, target: impl Closeable + 'static) -> Self {
        self.hook(DESTROY_HOOK, target)
    }

    /// Adds an `end` hook.
    pub fn on_end(self, target: impl Closeable + 'static) -> Self {
        self.hook(END_HOOK, target)
    }

    /// Adds a named shutdown hook.
    pub fn hook(mut self, name: impl Into<String>, target: impl Closeable + 'static) -> Self {
        self.hooks.push(ShutdownHook::new(name, target));
        self
    }

    /// Builds the data source, failing if no manager was supplied.
    pub fn build(self) -> Result<DataSource<M>, InvalidArgumentError> {
        let manager = self
            .manager
            .ok_or_else(|| InvalidArgumentError::MissingRequiredField {
                field: "manager".to_string(),
            })?;

        Ok(DataSource::from_parts(manager, self.raw, self.hooks))
    }
}

impl<M> Default for DataSourceBuilder<M>
where
    M: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
