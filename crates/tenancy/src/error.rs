//! Error types for the tenancy layer.
//!
//! Registration and lookup failures surface as [`RegistryError`]. Failures
//! while closing a tenant's data source surface as [`ShutdownError`]; those
//! are collected into shutdown reports and never propagated.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::tenant::TenantId;

/// Boxed error returned by data source shutdown hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type for registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Caller supplied an unusable argument
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgumentError),

    /// No data source is registered for the tenant.
    #[error("tenant not registered: {tenant_id}")]
    NotFound { tenant_id: TenantId },

    /// Re-registration was attempted while overwrites are disabled.
    #[error("tenant already registered: {tenant_id}")]
    AlreadyRegistered { tenant_id: TenantId },

    /// The registry holds its configured maximum number of tenants.
    #[error("tenant registry is full: cannot register {tenant_id} (maximum: {max_tenants})")]
    CapacityExceeded {
        tenant_id: TenantId,
        max_tenants: usize,
    },
}

impl RegistryError {
    /// Returns `true` for caller programming errors.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, RegistryError::InvalidArgument(_))
    }

    /// Returns `true` when the tenant is not provisioned.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }
}

/// Errors caused by invalid caller input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidArgumentError {
    /// The tenant identifier was empty or blank.
    #[error("tenant id is required")]
    EmptyTenantId,

    /// A data source was assembled without a required part.
    #[error("missing required field: {field}")]
    MissingRequiredField { field: String },
}

/// A single failed shutdown hook.
#[derive(Error, Debug)]
pub enum ShutdownError {
    /// The hook returned an error.
    #[error("{hook} failed for tenant {tenant_id}: {source}")]
    HookFailed {
        tenant_id: TenantId,
        hook: String,
        #[source]
        source: BoxError,
    },

    /// The hook did not finish within the configured timeout.
    #[error("{hook} timed out after {timeout_ms}ms for tenant {tenant_id}")]
    TimedOut {
        tenant_id: TenantId,
        hook: String,
        timeout_ms: u64,
    },

    /// The hook panicked.
    #[error("{hook} panicked for tenant {tenant_id}")]
    Panicked { tenant_id: TenantId, hook: String },

    /// The shutdown task was cancelled before its hooks finished, which
    /// happens when the runtime shuts down.
    #[error("shutdown interrupted for tenant {tenant_id}")]
    Interrupted { tenant_id: TenantId },
}

impl ShutdownError {
    /// Returns the name of the hook that failed, if a single hook is to
    /// blame.
    pub fn hook(&self) -> Option<&str> {
        match self {
            ShutdownError::HookFailed { hook, .. }
            | ShutdownError::TimedOut { hook, .. }
            | ShutdownError::Panicked { hook, .. } => Some(hook),
            ShutdownError::Interrupted { .. } => None,
        }
    }

    /// Returns the tenant whose data source failed to close.
    pub fn tenant_id(&self) -> &TenantId {
        match self {
            ShutdownError::HookFailed { tenant_id, .. }
            | ShutdownError::TimedOut { tenant_id, .. }
            | ShutdownError::Panicked { tenant_id, .. }
            | ShutdownError::Interrupted { tenant_id } => tenant_id,
        }
    }
}

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
