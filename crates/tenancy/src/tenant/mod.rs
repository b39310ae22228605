//! Tenant identity and the ambient tenant context.
//!
//! - [`TenantId`] - Opaque tenant identifier
//! - [`context`] - Per-task binding of the current tenant
//!
//! # Examples
//!
//! ```
//! use helios_tenancy::tenant::{context, TenantId};
//!
//! let tenant = TenantId::try_new("acme").unwrap();
//!
//! {
//!     let _guard = context::bind(tenant.clone());
//!     assert_eq!(context::current_tenant(), Some(tenant));
//! }
//!
//! assert_eq!(context::current_tenant(), None);
//! ```

pub mod context;
mod id;

pub use context::ContextGuard;
pub use id::TenantId;
