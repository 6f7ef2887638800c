//! Unit-of-work contracts and scoped release.
//!
//! # Responsibility
//! - Model the session that bounds lazy association resolution.
//! - Guarantee one release per acquired unit on every exit path.
//!
//! # Invariants
//! - A released unit never becomes active again.
//! - `UnitScope` releases its unit exactly once: explicitly via `close`, or
//!   on drop when `close` was never reached.

use log::warn;
use thiserror::Error;

mod sqlite;

pub use sqlite::{SqliteUnitOfWork, SqliteUnitOfWorkSource};

pub type UnitOfWorkResult<T> = Result<T, UnitOfWorkError>;

#[derive(Debug, Error)]
pub enum UnitOfWorkError {
    #[error("no active unit of work")]
    Inactive,
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Session bounding which lazy associations may still be resolved.
pub trait UnitOfWork {
    fn is_active(&self) -> bool;
    /// Ends the session. Fails with `Inactive` when already released.
    fn release(&mut self) -> UnitOfWorkResult<()>;
}

impl<U: UnitOfWork + ?Sized> UnitOfWork for &mut U {
    fn is_active(&self) -> bool {
        (**self).is_active()
    }

    fn release(&mut self) -> UnitOfWorkResult<()> {
        (**self).release()
    }
}

impl<U: UnitOfWork + ?Sized> UnitOfWork for Box<U> {
    fn is_active(&self) -> bool {
        (**self).is_active()
    }

    fn release(&mut self) -> UnitOfWorkResult<()> {
        (**self).release()
    }
}

/// Factory for fresh units of work.
pub trait UnitOfWorkSource {
    type Unit: UnitOfWork;

    fn acquire(&self) -> UnitOfWorkResult<Self::Unit>;
}

impl<S: UnitOfWorkSource + ?Sized> UnitOfWorkSource for &S {
    type Unit = S::Unit;

    fn acquire(&self) -> UnitOfWorkResult<Self::Unit> {
        (**self).acquire()
    }
}

/// Scoped ownership of an active unit of work.
pub struct UnitScope<U: UnitOfWork> {
    unit: U,
    closed: bool,
}

impl<U: UnitOfWork> UnitScope<U> {
    /// Takes ownership of `unit`.
    ///
    /// Fails with `Inactive` when the unit was already released; such a unit
    /// is not released again.
    pub fn enter(unit: U) -> UnitOfWorkResult<Self> {
        if !unit.is_active() {
            return Err(UnitOfWorkError::Inactive);
        }
        Ok(Self {
            unit,
            closed: false,
        })
    }

    pub fn unit(&self) -> &U {
        &self.unit
    }

    /// Releases the unit explicitly.
    pub fn close(mut self) -> UnitOfWorkResult<()> {
        self.closed = true;
        self.unit.release()
    }
}

impl<U: UnitOfWork> Drop for UnitScope<U> {
    fn drop(&mut self) {
        if self.closed || !self.unit.is_active() {
            return;
        }
        if let Err(err) = self.unit.release() {
            warn!("event=uow_release module=uow status=error path=drop error={err}");
        }
    }
}
