//! Explicit lazy association state.
//!
//! # Responsibility
//! - Track whether a related collection has been fetched from storage.
//! - Gate resolution on an active unit of work.
//!
//! # Invariants
//! - `Deferred` reads fail with `AssociationError::NotResolved`; they never
//!   fall back to an empty value.
//! - Resolution only fetches while the given unit of work is active.
//! - Once `Resolved`, the value is owned in memory and stays readable after
//!   the unit of work is released.

use crate::uow::UnitOfWork;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Read-side failure of a lazy association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AssociationError {
    /// The association was never resolved while its unit of work was active.
    #[error("association is not resolved; load it inside an active unit of work")]
    NotResolved,
}

/// Failure while resolving a deferred association.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum ResolveError<E> {
    /// The unit of work had already been released.
    #[error("no active unit of work")]
    Inactive,
    /// The underlying fetch failed.
    #[error("association fetch failed: {0}")]
    Fetch(E),
}

/// A relation that is either still in storage or fully loaded in memory.
///
/// Serialized as `null` while deferred and as the inner value once resolved,
/// so an empty resolved collection stays distinguishable from an absent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Association<T> {
    /// Not fetched yet.
    Deferred,
    /// Materialized value.
    Resolved(T),
}

impl<T> Default for Association<T> {
    fn default() -> Self {
        Self::Deferred
    }
}

impl<T> Association<T> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Returns the loaded value.
    pub fn get(&self) -> Result<&T, AssociationError> {
        match self {
            Self::Resolved(value) => Ok(value),
            Self::Deferred => Err(AssociationError::NotResolved),
        }
    }

    pub fn get_mut(&mut self) -> Result<&mut T, AssociationError> {
        match self {
            Self::Resolved(value) => Ok(value),
            Self::Deferred => Err(AssociationError::NotResolved),
        }
    }

    pub fn into_inner(self) -> Result<T, AssociationError> {
        match self {
            Self::Resolved(value) => Ok(value),
            Self::Deferred => Err(AssociationError::NotResolved),
        }
    }

    /// Loads the value through `fetch` unless it is already resolved.
    /// Read the loaded value afterwards through `get`.
    ///
    /// # Contract
    /// - Already resolved: no-op, `unit` is not consulted.
    /// - Deferred and `unit` inactive: `ResolveError::Inactive`, `fetch` is
    ///   not called.
    /// - Fetch failure leaves the association `Deferred`.
    pub fn resolve<U, E, F>(&mut self, unit: &U, fetch: F) -> Result<(), ResolveError<E>>
    where
        U: UnitOfWork + ?Sized,
        F: FnOnce() -> Result<T, E>,
    {
        if self.is_resolved() {
            return Ok(());
        }
        if !unit.is_active() {
            return Err(ResolveError::Inactive);
        }
        *self = Self::Resolved(fetch().map_err(ResolveError::Fetch)?);
        Ok(())
    }
}

impl<T: Serialize> Serialize for Association<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Deferred => serializer.serialize_none(),
            Self::Resolved(value) => serializer.serialize_some(value),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Association<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.map_or(Self::Deferred, Self::Resolved))
    }
}
