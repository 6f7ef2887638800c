//! SQLite unit of work backed by a deferred transaction.
//!
//! # Invariants
//! - Acquire opens the transaction; release commits it.
//! - A unit dropped before release rolls back.
//! - Only one unit may be active per connection at a time.

use super::{UnitOfWork, UnitOfWorkError, UnitOfWorkResult, UnitOfWorkSource};
use log::debug;
use rusqlite::{Connection, Transaction};

/// Active session on a shared connection.
pub struct SqliteUnitOfWork<'conn> {
    tx: Option<Transaction<'conn>>,
}

impl<'conn> SqliteUnitOfWork<'conn> {
    /// Starts a deferred transaction on `conn`.
    ///
    /// Repositories holding the same connection observe this transaction
    /// until the unit is released.
    pub fn begin(conn: &'conn Connection) -> UnitOfWorkResult<Self> {
        let tx = conn.unchecked_transaction()?;
        debug!("event=uow_acquire module=uow status=ok backend=sqlite");
        Ok(Self { tx: Some(tx) })
    }
}

impl UnitOfWork for SqliteUnitOfWork<'_> {
    fn is_active(&self) -> bool {
        self.tx.is_some()
    }

    fn release(&mut self) -> UnitOfWorkResult<()> {
        let tx = self.tx.take().ok_or(UnitOfWorkError::Inactive)?;
        tx.commit()?;
        debug!("event=uow_release module=uow status=ok backend=sqlite");
        Ok(())
    }
}

/// Hands out `SqliteUnitOfWork` instances for one connection.
#[derive(Clone, Copy)]
pub struct SqliteUnitOfWorkSource<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUnitOfWorkSource<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl<'conn> UnitOfWorkSource for SqliteUnitOfWorkSource<'conn> {
    type Unit = SqliteUnitOfWork<'conn>;

    fn acquire(&self) -> UnitOfWorkResult<Self::Unit> {
        SqliteUnitOfWork::begin(self.conn)
    }
}
