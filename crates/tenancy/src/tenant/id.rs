//! Tenant identifier type.
//!
//! This module defines the [`TenantId`] type, an opaque identifier naming the
//! tenant a unit of work belongs to.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidArgumentError;

/// An opaque tenant identifier.
///
/// `TenantId` is a comparable string token. Construction through
/// [`TenantId::new`] never fails, so identifiers read from untrusted input
/// should go through [`TenantId::try_new`], which rejects blank values.
/// The registry validates every identifier it stores.
///
/// # Examples
///
/// ```
/// use helios_tenancy::tenant::TenantId;
///
/// let tenant = TenantId::new("acme");
/// assert_eq!(tenant.as_str(), "acme");
/// assert!(TenantId::try_new("  ").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a new tenant ID from the given string without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a tenant ID, rejecting empty or whitespace-only values.
    pub fn try_new(id: impl Into<String>) -> Result<Self, InvalidArgumentError> {
        let tenant = Self::new(id);
        tenant.validate()?;
        Ok(tenant)
    }

    /// Returns the tenant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this identifier may be registered.
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }

    /// Checks that the identifier is non-blank.
    pub fn validate(&self) -> Result<(), InvalidArgumentError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(InvalidArgumentError::EmptyTenantId)
        }
    }

    /// Consumes the identifier, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl FromStr for TenantId {
    type Err = InvalidArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TenantId::try_new(s)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        TenantId::new(s)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        TenantId::new(s)
    }
}

impl From<&TenantId> for TenantId {
    fn from(id: &TenantId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets registry maps be queried with a plain `&str`.
impl Borrow<str> for TenantId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
