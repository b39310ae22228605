//! # helios-tenancy - Per-Request Tenant Isolation
//!
//! This crate lets a multi-tenant service run each unit of work against the
//! correct tenant's database resources, while any code in that unit's call
//! graph can ask "which tenant is this" without the identifier being passed
//! down explicitly.
//!
//! ## Components
//!
//! - [`tenant::context`] - Ambient, per-task binding of the current [`TenantId`]
//! - [`TenantRegistry`] - Map from tenant to its [`DataSource`], with
//!   best-effort shutdown of removed data sources
//! - [`TenantExecutor`] - Binds a tenant, resolves its data source and runs a
//!   work unit, releasing the binding on every exit path
//!
//! The crate does not pool connections itself. A [`DataSource`] wraps
//! whatever pool or ORM handle the host already has, plus the hooks that
//! release it.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use helios_tenancy::error::BoxError;
//! use helios_tenancy::registry::close_fn;
//! use helios_tenancy::tenant::context;
//! use helios_tenancy::{DataSource, RegistryError, TenantExecutor, TenantRegistry};
//!
//! #[derive(Clone)]
//! struct Pool(&'static str);
//!
//! # tokio_test::block_on(async {
//! // Construct the registry at startup and share it.
//! let registry = Arc::new(TenantRegistry::new());
//! registry
//!     .register_tenant(
//!         "acme",
//!         DataSource::bare(Pool("postgres://acme"))
//!             .on_end(close_fn(|| async { Ok::<(), BoxError>(()) })),
//!     )
//!     .unwrap();
//!
//! // Run work on behalf of a tenant.
//! let executor = TenantExecutor::new(Arc::clone(&registry));
//! let url = executor
//!     .execute("acme", |pool: Pool| async move {
//!         assert_eq!(context::current_tenant().unwrap().as_str(), "acme");
//!         Ok::<_, RegistryError>(pool.0)
//!     })
//!     .await
//!     .unwrap();
//! assert_eq!(url, "postgres://acme");
//!
//! // Close everything at shutdown.
//! let reports = registry.close_all().await;
//! assert!(reports.iter().all(|r| r.is_clean()));
//! # });
//! ```
//!
//! ## Concurrency Model
//!
//! Inside [`TenantExecutor::execute`] the binding lives in a tokio task-local
//! slot: it survives suspension points and worker-thread migration and is
//! invisible to every other task. Callers that are not tokio tasks (plain
//! threads, `block_on` bodies) get a thread-local slot instead. A tokio task
//! outside any task scope has no slot, so it can never bind a tenant through
//! a worker thread shared with other tasks.
//!
//! ## Configuration
//!
//! See [`TenancyConfig`] for the environment variables and their defaults.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod execution;
pub mod registry;
pub mod tenant;

pub use config::TenancyConfig;
pub use error::{InvalidArgumentError, RegistryError, RegistryResult, ShutdownError};
pub use execution::TenantExecutor;
pub use registry::{DataSource, Removal, ShutdownReport, TenantRegistry};
pub use tenant::TenantId;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initializes logging with the given level.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("helios_tenancy={level},tenancy_harness={level}"))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
