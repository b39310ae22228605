//! Tests for the tenant registry lifecycle.
//!
//! Registration, overwrite semantics, deletion tolerance and best-effort
//! shutdown.

mod common;

use std::sync::Arc;

use helios_tenancy::error::ShutdownError;
use helios_tenancy::{
    DataSource, RegistryError, Removal, TenancyConfig, TenantExecutor, TenantId, TenantRegistry,
};
use tokio_test::{assert_err, assert_ok};

use common::{DestroyBehavior, MockPool, WorkError, create_registry, mock_source, mock_source_with};

// ============================================================================
// Registration
// ============================================================================

/// Test that an empty tenant id is rejected before the map changes.
#[tokio::test]
async fn test_register_empty_id_rejected() {
    let registry = create_registry();
    let (source, _) = mock_source("pool");

    let err = assert_err!(registry.register_tenant("", source));
    assert!(err.is_invalid_argument());
    assert!(registry.is_empty());
}

/// Test that an incomplete data source is rejected at build time.
#[test]
fn test_incomplete_data_source_rejected() {
    let result = DataSource::<MockPool>::builder().pool("raw").build();
    assert_err!(result);
}

/// Test that re-registration hands back H1 unclosed and serves H2.
#[tokio::test]
async fn test_overwrite_returns_previous_unclosed() {
    let registry = create_registry();
    let (h1, h1_counters) = mock_source("h1");
    let (h2, _) = mock_source("h2");

    assert!(assert_ok!(registry.register_tenant("acme", h1)).is_none());
    let previous = assert_ok!(registry.register_tenant("acme", h2)).unwrap();

    assert_eq!(previous.manager().name, "h1");
    assert!(!previous.is_closed());
    assert_eq!(h1_counters.destroyed(), 0);
    assert_eq!(h1_counters.ended(), 0);

    let current = registry.get_data_source("acme").unwrap();
    assert_eq!(current.manager().name, "h2");
    assert_eq!(registry.len(), 1);
}

/// Test that the caller can close a displaced handle exactly once.
#[tokio::test]
async fn test_caller_closes_displaced_handle() {
    let registry = create_registry();
    let (h1, h1_counters) = mock_source("h1");
    let (h2, h2_counters) = mock_source("h2");

    registry.register_tenant("acme", h1).unwrap();
    let displaced = registry.register_tenant("acme", h2).unwrap().unwrap();

    let timeout = registry.config().shutdown_timeout();
    let report = displaced.close("acme", timeout).await;
    assert!(report.is_clean());
    assert_eq!(report.closed_hooks(), ["destroy", "end"]);

    let again = displaced.close("acme", timeout).await;
    assert!(again.already_closed());

    assert_eq!(h1_counters.destroyed(), 1);
    assert_eq!(h1_counters.ended(), 1);
    assert_eq!(h2_counters.destroyed(), 0);
    assert!(!registry.get_data_source("acme").unwrap().is_closed());
}

/// Test that replace_tenant closes the displaced handle.
#[tokio::test]
async fn test_replace_closes_previous() {
    let registry = create_registry();
    let (h1, h1_counters) = mock_source("h1");
    let (h2, h2_counters) = mock_source("h2");

    registry.register_tenant("acme", h1).unwrap();
    let report = registry
        .replace_tenant("acme", h2)
        .await
        .unwrap()
        .expect("Expected a shutdown report for h1");

    assert!(report.is_clean());
    assert_eq!(h1_counters.destroyed(), 1);
    assert_eq!(h1_counters.ended(), 1);
    assert_eq!(h2_counters.ended(), 0);
}

/// Test the overwrite and capacity policies from configuration.
#[tokio::test]
async fn test_config_policies() {
    let registry: TenantRegistry<MockPool> = TenantRegistry::with_config(TenancyConfig {
        allow_overwrite: false,
        max_tenants: Some(1),
        ..TenancyConfig::for_testing()
    });

    registry.register_tenant("acme", mock_source("h1").0).unwrap();

    let err = registry
        .register_tenant("acme", mock_source("h2").0)
        .unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));

    let err = registry
        .register_tenant("globex", mock_source("g1").0)
        .unwrap_err();
    assert!(matches!(err, RegistryError::CapacityExceeded { max_tenants: 1, .. }));
}

// ============================================================================
// Deletion
// ============================================================================

/// Test that deleting a tenant runs destroy then end and removes it.
#[tokio::test]
async fn test_delete_runs_hooks() {
    let registry = create_registry();
    let (source, counters) = mock_source("h1");
    registry.register_tenant("acme", source).unwrap();

    let removal = registry.delete_tenant("acme").await.unwrap();

    let report = removal.report().expect("Expected a shutdown report");
    assert_eq!(report.closed_hooks(), ["destroy", "end"]);
    assert_eq!(counters.destroyed(), 1);
    assert_eq!(counters.ended(), 1);
    assert!(matches!(
        registry.get_data_source("acme"),
        Err(RegistryError::NotFound { .. })
    ));
}

/// Test that deleting an unknown tenant is tolerated and changes nothing.
#[tokio::test]
async fn test_delete_unknown_tolerated() {
    let registry = create_registry();
    let (source, _) = mock_source("h1");
    registry.register_tenant("acme", source).unwrap();

    let removal = registry.delete_tenant("ghost").await.unwrap();

    assert!(matches!(removal, Removal::NotFound));
    assert_eq!(registry.tenant_ids(), vec![TenantId::new("acme")]);
}

/// Test that deleting with an empty id is an invalid argument.
#[tokio::test]
async fn test_delete_empty_id_rejected() {
    let registry = create_registry();
    let err = registry.delete_tenant("").await.unwrap_err();
    assert!(err.is_invalid_argument());
}

/// Test that a failing destroy is logged and the tenant is still removed.
#[tokio::test]
async fn test_delete_with_failing_destroy() {
    let registry = create_registry();
    let (source, counters) = mock_source_with("h1", DestroyBehavior::Fail);
    registry.register_tenant("acme", source).unwrap();

    let removal = assert_ok!(registry.delete_tenant("acme").await);

    let report = removal.report().unwrap();
    assert!(!report.is_clean());
    assert!(matches!(
        report.failures(),
        [ShutdownError::HookFailed { hook, .. }] if hook == "destroy"
    ));
    // Later hooks still run.
    assert_eq!(counters.ended(), 1);

    let executor = TenantExecutor::new(Arc::clone(&registry));
    let result = executor
        .execute("acme", |_| async { Ok::<_, WorkError>(()) })
        .await;
    assert!(matches!(result, Err(WorkError::Registry(ref e)) if e.is_not_found()));
}

/// Test that a hanging hook times out instead of blocking deletion.
#[tokio::test]
async fn test_delete_with_hanging_destroy() {
    let registry = create_registry();
    let (source, counters) = mock_source_with("h1", DestroyBehavior::Hang);
    registry.register_tenant("acme", source).unwrap();

    let removal = registry.delete_tenant("acme").await.unwrap();

    let report = removal.report().unwrap();
    assert!(matches!(report.failures(), [ShutdownError::TimedOut { .. }]));
    assert_eq!(counters.ended(), 1);
    assert!(!registry.contains("acme"));
}

/// Test that an in-flight handle survives deletion of its tenant.
#[tokio::test]
async fn test_held_handle_outlives_deletion() {
    let registry = create_registry();
    let (source, _) = mock_source("h1");
    registry.register_tenant("acme", source).unwrap();

    let held = registry.get_data_source("acme").unwrap();
    registry.delete_tenant("acme").await.unwrap();

    assert!(held.is_closed());
    assert_eq!(held.manager().name, "h1");
}

// ============================================================================
// Close All
// ============================================================================

/// Test that close_all closes every tenant and empties the registry.
#[tokio::test]
async fn test_close_all() {
    let registry = create_registry();
    let mut counters = Vec::new();
    for tenant in ["a", "b", "c"] {
        let behavior = if tenant == "b" {
            DestroyBehavior::Fail
        } else {
            DestroyBehavior::Succeed
        };
        let (source, c) = mock_source_with(tenant, behavior);
        registry.register_tenant(tenant, source).unwrap();
        counters.push(c);
    }

    let reports = registry.close_all().await;

    assert_eq!(reports.len(), 3);
    assert_eq!(reports.iter().filter(|r| !r.is_clean()).count(), 1);
    assert!(counters.iter().all(|c| c.ended() == 1));
    assert!(registry.is_empty());
}

/// Test that panicking hooks do not stop close_all from closing the rest.
#[tokio::test]
async fn test_close_all_survives_panicking_hooks() {
    let registry = create_registry();
    let mut counters = Vec::new();
    for (tenant, behavior) in [
        ("a", DestroyBehavior::Panic),
        ("b", DestroyBehavior::Panic),
        ("c", DestroyBehavior::Succeed),
        ("d", DestroyBehavior::Succeed),
    ] {
        let (source, c) = mock_source_with(tenant, behavior);
        registry.register_tenant(tenant, source).unwrap();
        counters.push(c);
    }

    let reports = registry.close_all().await;

    assert_eq!(reports.len(), 4);
    let panicked: Vec<_> = reports
        .iter()
        .filter(|r| {
            matches!(
                r.failures(),
                [ShutdownError::Panicked { hook, .. }] if hook == "destroy"
            )
        })
        .map(|r| r.tenant_id().as_str())
        .collect();
    assert_eq!(panicked.len(), 2);
    assert!(panicked.contains(&"a") && panicked.contains(&"b"));
    assert!(counters.iter().all(|c| c.destroyed() == 1 && c.ended() == 1));
    assert!(registry.is_empty());
}

/// Test that a panicking destroy during deletion is reported, not raised.
#[tokio::test]
async fn test_delete_with_panicking_destroy() {
    let registry = create_registry();
    let (source, counters) = mock_source_with("h1", DestroyBehavior::Panic);
    registry.register_tenant("acme", source).unwrap();

    let removal = assert_ok!(registry.delete_tenant("acme").await);

    let report = removal.report().unwrap();
    assert!(matches!(report.failures(), [ShutdownError::Panicked { .. }]));
    assert_eq!(counters.ended(), 1);
    assert!(!registry.contains("acme"));
}

/// Test that concurrent registrations and deletions keep the map consistent.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mutations() {
    let registry = create_registry();

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..32 {
        let registry = Arc::clone(&registry);
        tasks.spawn(async move {
            let tenant = format!("tenant-{}", i % 8);
            let (source, _) = mock_source(&tenant);
            registry.register_tenant(tenant.as_str(), source).unwrap();
            if i % 3 == 0 {
                registry.delete_tenant(&tenant).await.unwrap();
            }
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap();
    }

    assert!(registry.len() <= 8);
    for tenant in registry.tenant_ids() {
        assert!(!registry.get_data_source(tenant.as_str()).unwrap().is_closed());
    }
}
