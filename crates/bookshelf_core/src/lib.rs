//! Core domain logic for bookshelf.
//! Books own pages; listing resolves every book's pages before the loading
//! unit of work is released.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod uow;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::association::{Association, AssociationError, ResolveError};
pub use model::book::{Book, BookId, BookValidationError, Page, PageId};
pub use repo::book_repo::{BookRepository, RepoError, RepoResult, SqliteBookRepository};
pub use service::book_service::{BookService, ServiceError, ServiceResult};
pub use uow::{
    SqliteUnitOfWork, SqliteUnitOfWorkSource, UnitOfWork, UnitOfWorkError, UnitOfWorkResult,
    UnitOfWorkSource, UnitScope,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
