//! Test infrastructure for the tenancy crate.
//!
//! Provides mock pools whose shutdown hooks count invocations or fail on
//! demand, plus a work-unit error type that absorbs registry errors.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use helios_tenancy::error::BoxError;
use helios_tenancy::registry::close_fn;
use helios_tenancy::{DataSource, RegistryError, TenancyConfig, TenantExecutor, TenantRegistry};

// ============================================================================
// Mock Pools
// ============================================================================

/// Shutdown hook counters shared between a mock pool and the test.
#[derive(Debug, Default)]
pub struct HookCounters {
    pub destroyed: AtomicUsize,
    pub ended: AtomicUsize,
}

impl HookCounters {
    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn ended(&self) -> usize {
        self.ended.load(Ordering::SeqCst)
    }
}

/// An in-memory stand-in for a tenant connection pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPool {
    pub name: String,
}

impl MockPool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

/// How a mock data source's `destroy` hook behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyBehavior {
    Succeed,
    Fail,
    Hang,
    Panic,
}

/// Builds a bare data source with counting `destroy` and `end` hooks.
pub fn mock_source(name: &str) -> (DataSource<MockPool>, Arc<HookCounters>) {
    mock_source_with(name, DestroyBehavior::Succeed)
}

/// Builds a bare data source whose `destroy` hook behaves as requested.
///
/// The `end` hook always succeeds and counts its invocations.
pub fn mock_source_with(
    name: &str,
    destroy: DestroyBehavior,
) -> (DataSource<MockPool>, Arc<HookCounters>) {
    let counters = Arc::new(HookCounters::default());

    let on_destroy = Arc::clone(&counters);
    let on_end = Arc::clone(&counters);

    let source = DataSource::bare(MockPool::new(name))
        .on_destroy(close_fn(move || {
            let counters = Arc::clone(&on_destroy);
            async move {
                counters.destroyed.fetch_add(1, Ordering::SeqCst);
                match destroy {
                    DestroyBehavior::Succeed => Ok(()),
                    DestroyBehavior::Fail => Err::<(), BoxError>("destroy failed".into()),
                    DestroyBehavior::Hang => {
                        std::future::pending::<()>().await;
                        Ok(())
                    }
                    DestroyBehavior::Panic => panic!("destroy panicked"),
                }
            }
        }))
        .on_end(close_fn(move || {
            let counters = Arc::clone(&on_end);
            async move {
                counters.ended.fetch_add(1, Ordering::SeqCst);
                Ok::<(), BoxError>(())
            }
        }));

    (source, counters)
}

// ============================================================================
// Registry Helpers
// ============================================================================

/// Creates an empty registry with short shutdown timeouts.
pub fn create_registry() -> Arc<TenantRegistry<MockPool>> {
    Arc::new(TenantRegistry::with_config(TenancyConfig::for_testing()))
}

/// Creates a registry with the given tenants registered, plus an executor
/// over it.
pub fn create_executor(tenants: &[&str]) -> TenantExecutor<MockPool> {
    let registry = create_registry();
    for tenant in tenants {
        let (source, _) = mock_source(&format!("pool-{tenant}"));
        registry
            .register_tenant(*tenant, source)
            .expect("Failed to register tenant");
    }
    TenantExecutor::new(registry)
}

// ============================================================================
// Work Unit Errors
// ============================================================================

/// Error type returned by test work units.
#[derive(Debug, thiserror::Error)]
pub enum WorkError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("work failed: {0}")]
    Failed(String),
}
