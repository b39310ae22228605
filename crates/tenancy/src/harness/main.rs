//! Tenancy harness CLI
//!
//! Registers a handful of in-memory tenants, fires concurrent work units at
//! them and checks that every unit observes its own tenant in the ambient
//! context. All tenants are closed on exit, including on Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! # Run with default settings
//! tenancy-harness
//!
//! # More tenants and requests, shorter shutdown timeout
//! TENANCY_SHUTDOWN_TIMEOUT_MS=500 tenancy-harness --tenants 8 --requests 200
//!
//! # Simulate a tenant whose pool fails to close
//! tenancy-harness --failing-tenant tenant-2
//! ```
//!
//! # Environment Variables
//!
//! Every `TENANCY_*` variable understood by `TenancyConfig` applies.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use helios_tenancy::error::BoxError;
use helios_tenancy::registry::close_fn;
use helios_tenancy::tenant::context;
use helios_tenancy::{
    DataSource, RegistryError, ShutdownReport, TenancyConfig, TenantExecutor, TenantRegistry,
};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "tenancy-harness")]
#[command(about = "Exercise tenant isolation against in-memory data sources")]
struct HarnessArgs {
    #[command(flatten)]
    config: TenancyConfig,

    /// Number of tenants to register.
    #[arg(long, default_value = "3")]
    tenants: usize,

    /// Number of concurrent work units to run.
    #[arg(long, default_value = "50")]
    requests: usize,

    /// Upper bound for the simulated query latency, in milliseconds.
    #[arg(long, default_value = "20")]
    max_latency_ms: u64,

    /// Tenant whose `destroy` hook fails during shutdown.
    #[arg(long)]
    failing_tenant: Option<String>,
}

/// In-memory stand-in for a connection pool.
#[derive(Debug, Clone)]
struct DemoPool {
    tenant: String,
    queries: Arc<AtomicU64>,
}

impl DemoPool {
    fn new(tenant: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            queries: Arc::new(AtomicU64::new(0)),
        }
    }

    async fn query(&self, latency: Duration) -> u64 {
        tokio::time::sleep(latency).await;
        self.queries.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[derive(Debug, thiserror::Error)]
enum WorkError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("context mismatch: expected {expected}, observed {observed:?}")]
    ContextMismatch {
        expected: String,
        observed: Option<String>,
    },
}

fn demo_source(pool: DemoPool, failing: bool) -> DataSource<DemoPool> {
    let tenant = pool.tenant.clone();
    let queries = Arc::clone(&pool.queries);

    DataSource::bare(pool)
        .on_destroy(close_fn(move || {
            let tenant = tenant.clone();
            async move {
                if failing {
                    let reason = format!("pool for {tenant} refused to drain");
                    return Err::<(), BoxError>(reason.into());
                }
                Ok(())
            }
        }))
        .on_end(close_fn(move || {
            let queries = Arc::clone(&queries);
            async move {
                info!(queries = queries.load(Ordering::Relaxed), "pool ended");
                Ok::<(), BoxError>(())
            }
        }))
}

async fn run(executor: TenantExecutor<DemoPool>, args: &HarnessArgs) -> anyhow::Result<()> {
    let mut tasks = JoinSet::new();

    for request in 0..args.requests {
        let executor = executor.clone();
        let tenant = format!("tenant-{}", request % args.tenants);
        let latency = Duration::from_millis((request as u64 * 7) % (args.max_latency_ms + 1));

        tasks.spawn(async move {
            executor
                .execute(tenant.clone(), |pool: DemoPool| async move {
                    let count = pool.query(latency).await;
                    let observed = context::current_tenant().map(|t| t.into_string());
                    if observed.as_deref() != Some(pool.tenant.as_str()) {
                        return Err(WorkError::ContextMismatch {
                            expected: pool.tenant,
                            observed,
                        });
                    }
                    Ok(count)
                })
                .await
        });
    }

    let mut completed = 0usize;
    let mut mismatches = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined.context("work unit panicked")? {
            Ok(_) => completed += 1,
            Err(err) => {
                error!(error = %err, "work unit failed");
                mismatches += 1;
            }
        }
    }

    info!(completed, mismatches, "all work units finished");
    if mismatches > 0 {
        bail!("{mismatches} work units observed the wrong tenant");
    }

    // A missing tenant surfaces as NotFound and leaves the context unbound.
    let missing = executor
        .execute("ghost", |_| async { Ok::<(), WorkError>(()) })
        .await;
    if !matches!(missing, Err(WorkError::Registry(ref e)) if e.is_not_found()) {
        bail!("lookup of an unregistered tenant did not fail with NotFound");
    }
    if context::current_tenant().is_some() {
        bail!("tenant binding leaked out of execute");
    }

    Ok(())
}

fn log_report(report: &ShutdownReport) {
    if report.is_clean() {
        info!(
            tenant_id = %report.tenant_id(),
            hooks = ?report.closed_hooks(),
            "tenant closed"
        );
    } else {
        warn!(
            tenant_id = %report.tenant_id(),
            failures = report.failures().len(),
            "tenant closed with errors"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = HarnessArgs::parse();

    if let Err(errors) = args.config.validate() {
        bail!("invalid configuration: {}", errors.join("; "));
    }
    if args.tenants == 0 {
        bail!("--tenants must be at least 1");
    }

    helios_tenancy::init_logging(&args.config.log_level);
    info!(
        version = helios_tenancy::VERSION,
        tenants = args.tenants,
        requests = args.requests,
        "tenancy harness starting"
    );

    let registry = Arc::new(TenantRegistry::with_config(args.config.clone()));
    for index in 0..args.tenants {
        let tenant = format!("tenant-{index}");
        let failing = args.failing_tenant.as_deref() == Some(tenant.as_str());
        registry
            .register_tenant(tenant.as_str(), demo_source(DemoPool::new(&tenant), failing))
            .with_context(|| format!("registering {tenant}"))?;
    }

    let executor = TenantExecutor::new(Arc::clone(&registry));
    let outcome = tokio::select! {
        outcome = run(executor, &args) => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, closing tenants...");
            Ok(())
        }
    };

    let reports = registry.close_all().await;
    reports.iter().for_each(log_report);

    let failed = reports.iter().filter(|r| !r.is_clean()).count();
    info!(closed = reports.len(), failed, "tenancy harness stopped");

    outcome
}
