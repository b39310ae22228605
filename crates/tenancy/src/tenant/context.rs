//! Ambient tenant context.
//!
//! This module binds a [`TenantId`] to the currently executing logical task so
//! that code deep in a call graph can ask "which tenant is this" without the
//! identifier being threaded through every signature.
//!
//! Two storage slots back the context:
//!
//! - a tokio task-local slot, active inside [`scope`], [`with_tenant`],
//!   [`with_tenant_sync`] and [`in_current_tenant`] (and therefore inside
//!   every `TenantExecutor` call). It travels with the task across worker
//!   threads and suspension points and is invisible to other tasks.
//! - a thread-local slot, used by code that is not running as a tokio task:
//!   plain threads, synchronous callers and `block_on` bodies.
//!
//! A tokio task running without a task scope has no slot at all. Worker
//! threads are shared between tasks, so the thread slot is off limits there:
//! [`set_tenant`] and [`bind`] log a warning and change nothing, and
//! [`current_tenant`] returns `None`.
//!
//! Within one slot the semantics are flat: [`set_tenant`] replaces, [`clear`]
//! unbinds, [`current_tenant`] reads. The raw storage is never exposed.
//!
//! Spawned tasks do not inherit the caller's binding. Wrap the spawned future
//! with [`in_current_tenant`] to carry it over.
//!
//! # Example
//!
//! ```
//! use helios_tenancy::tenant::context;
//!
//! # tokio_test::block_on(async {
//! let tenant = context::scope(async {
//!     context::set_tenant("acme");
//!     context::current_tenant()
//! })
//! .await;
//!
//! assert_eq!(tenant.unwrap().as_str(), "acme");
//! assert!(context::current_tenant().is_none());
//! # });
//! ```

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;

use tracing::warn;

use super::id::TenantId;

type Slot = RefCell<Option<TenantId>>;

tokio::task_local! {
    static TASK_TENANT: Slot;
}

thread_local! {
    static THREAD_TENANT: Slot = const { RefCell::new(None) };
}

/// Runs `f` against the active slot, or returns `None` when the caller is a
/// tokio task outside any task scope.
fn with_slot<R>(f: impl FnOnce(&Slot) -> R) -> Option<R> {
    if is_scoped() {
        Some(TASK_TENANT.with(f))
    } else if tokio::task::try_id().is_some() {
        None
    } else {
        Some(THREAD_TENANT.with(f))
    }
}

/// Returns `true` if the caller runs inside a task scope created by one of
/// the scope functions of this module.
pub fn is_scoped() -> bool {
    TASK_TENANT.try_with(|_| ()).is_ok()
}

/// Binds `tenant_id` as the current tenant, replacing any prior binding.
///
/// Ignored, with a warning, in a tokio task outside a task scope.
pub fn set_tenant(tenant_id: impl Into<TenantId>) {
    let tenant_id = tenant_id.into();
    let bound = with_slot(|slot| {
        *slot.borrow_mut() = Some(tenant_id.clone());
    });
    if bound.is_none() {
        warn!(tenant_id = %tenant_id, "tenant set outside a task scope; binding ignored");
    }
}

/// Returns the tenant bound to the current task, or `None` when unbound.
pub fn current_tenant() -> Option<TenantId> {
    with_slot(|slot| slot.borrow().clone()).flatten()
}

/// Removes the current binding.
pub fn clear() {
    with_slot(|slot| {
        slot.borrow_mut().take();
    });
}

/// Runs `fut` inside a fresh, unbound task scope.
///
/// Bindings made inside the scope are dropped with it and never reach the
/// caller's slot.
pub fn scope<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    TASK_TENANT.scope(RefCell::new(None), fut)
}

/// Runs `fut` inside a fresh task scope bound to `tenant_id`.
///
/// The binding ends with the scope, whether `fut` completes, panics or is
/// dropped.
pub fn with_tenant<F>(tenant_id: impl Into<TenantId>, fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    TASK_TENANT.scope(RefCell::new(Some(tenant_id.into())), fut)
}

/// Runs `f` inside a synchronous task scope bound to `tenant_id`.
///
/// The scope is torn down when `f` returns or unwinds.
pub fn with_tenant_sync<R>(tenant_id: impl Into<TenantId>, f: impl FnOnce() -> R) -> R {
    TASK_TENANT.sync_scope(RefCell::new(Some(tenant_id.into())), f)
}

/// Runs `fut` inside a fresh task scope seeded with the caller's current
/// tenant.
///
/// The binding is captured when this function is called, so the returned
/// future can be handed to `tokio::spawn`.
pub fn in_current_tenant<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    TASK_TENANT.scope(RefCell::new(current_tenant()), fut)
}

/// Binds `tenant_id` and returns a guard that restores the previous binding
/// when dropped.
///
/// The guard runs on every exit path, including early returns and panics.
/// It is `!Send`, so it cannot be held across an `.await` in a spawned task;
/// async code should use [`with_tenant`] instead. In a tokio task outside a
/// task scope nothing is bound and the guard is inert.
pub fn bind(tenant_id: impl Into<TenantId>) -> ContextGuard {
    let tenant_id = tenant_id.into();
    let scoped = is_scoped();
    let Some(previous) = with_slot(|slot| slot.replace(Some(tenant_id.clone()))) else {
        warn!(tenant_id = %tenant_id, "tenant bound outside a task scope; binding ignored");
        return ContextGuard {
            previous: None,
            scoped,
            active: false,
            _not_send: PhantomData,
        };
    };

    ContextGuard {
        previous,
        scoped,
        active: true,
        _not_send: PhantomData,
    }
}

/// Restores the tenant binding that was active before [`bind`].
#[derive(Debug)]
#[must_use = "the tenant binding is released as soon as the guard is dropped"]
pub struct ContextGuard {
    previous: Option<TenantId>,
    scoped: bool,
    active: bool,
    // Restoring must happen on the thread (or task) that bound.
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        // The task scope is already torn down; its slot goes with it.
        if self.scoped && !is_scoped() {
            return;
        }
        let previous = self.previous.take();
        with_slot(|slot| {
            *slot.borrow_mut() = previous;
        });
    }
}
