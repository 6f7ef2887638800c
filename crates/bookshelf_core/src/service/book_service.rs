//! Book use-case service.
//!
//! # Responsibility
//! - Provide list/get/save/update/delete entry points for books.
//! - Resolve every listed book's pages before the loading unit of work ends.
//!
//! # Invariants
//! - `list_books_with_pages*` returns only fully resolved books, or an error;
//!   never a partially resolved list.
//! - Each unit of work entered here is released exactly once, on success and
//!   on failure.
//! - Single-book lookups leave pages deferred.

use crate::model::association::{Association, ResolveError};
use crate::model::book::{Book, BookId, BookValidationError};
use crate::repo::book_repo::{BookRepository, RepoError};
use crate::uow::{UnitOfWork, UnitOfWorkError, UnitOfWorkSource, UnitScope};
use log::{debug, error, info, warn};
use std::time::Instant;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for book use-cases.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Target book does not exist.
    #[error("book not found: {0}")]
    NotFound(BookId),
    /// Association resolution was attempted outside an active unit of work.
    #[error("no active unit of work")]
    UnitOfWorkInactive,
    /// Fetching a book's pages failed.
    #[error("failed to resolve pages of book {book_id}")]
    ResolutionFailure {
        book_id: BookId,
        #[source]
        source: RepoError,
    },
    /// Entity rejected before persistence.
    #[error(transparent)]
    Validation(BookValidationError),
    /// `update` was called with an id that differs from the book's own id.
    #[error("book id {book_id} does not match target id {path_id}")]
    IdMismatch { path_id: BookId, book_id: BookId },
    /// Persistence-layer failure.
    #[error(transparent)]
    Storage(RepoError),
    /// Acquiring or releasing a unit of work failed.
    #[error(transparent)]
    UnitOfWork(UnitOfWorkError),
    /// Internal consistency mismatch between write and read-back.
    #[error("inconsistent book state: {0}")]
    InconsistentState(&'static str),
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Storage(other),
        }
    }
}

impl From<UnitOfWorkError> for ServiceError {
    fn from(value: UnitOfWorkError) -> Self {
        match value {
            UnitOfWorkError::Inactive => Self::UnitOfWorkInactive,
            other => Self::UnitOfWork(other),
        }
    }
}

/// Book service facade over a repository and a unit-of-work source.
pub struct BookService<R, S> {
    repo: R,
    units: S,
}

impl<R: BookRepository, S: UnitOfWorkSource> BookService<R, S> {
    /// Creates a service using the provided repository and unit source.
    pub fn new(repo: R, units: S) -> Self {
        Self { repo, units }
    }

    /// Lists all books with their pages resolved.
    ///
    /// Acquires a fresh unit of work from the source and releases it before
    /// returning.
    pub fn list_books_with_pages(&self) -> ServiceResult<Vec<Book>> {
        let unit = self.units.acquire()?;
        self.list_books_with_pages_in(unit)
    }

    /// Lists all books with their pages resolved inside a caller-provided unit.
    ///
    /// # Contract
    /// - Fails with `UnitOfWorkInactive` when `unit` is already released.
    /// - Resolves pages of every book while `unit` is active, then releases
    ///   `unit` explicitly. Pass `&mut unit` to inspect it afterwards.
    /// - Any page fetch failure aborts the whole listing with
    ///   `ResolutionFailure`.
    /// - Order is the repository's `find_all` order.
    pub fn list_books_with_pages_in<U: UnitOfWork>(&self, unit: U) -> ServiceResult<Vec<Book>> {
        self.within_unit("list_books", unit, |unit| {
            let mut books = self.repo.find_all()?;
            for book in &mut books {
                self.resolve_pages(unit, book)?;
            }
            Ok(books)
        })
    }

    /// Resolves the pages of one (possibly detached) book in a fresh unit.
    ///
    /// No-op when the pages are already resolved.
    pub fn load_pages(&self, book: &mut Book) -> ServiceResult<()> {
        if book.pages.is_resolved() {
            return Ok(());
        }
        let unit = self.units.acquire()?;
        self.within_unit("load_pages", unit, |unit| self.resolve_pages(unit, book))
    }

    /// Gets one book by id. Pages stay deferred.
    pub fn get_book(&self, id: BookId) -> ServiceResult<Book> {
        self.repo.find_by_id(id)?.ok_or(ServiceError::NotFound(id))
    }

    /// Inserts or updates `book` by its own id and returns the persisted id.
    pub fn save_or_update(&self, book: &Book) -> ServiceResult<BookId> {
        let saved = self.repo.save(book)?;
        debug!("event=book_save module=service status=ok id={:?}", saved.id);
        saved
            .id
            .ok_or(ServiceError::InconsistentState("saved book has no id"))
    }

    /// Deletes one book and its pages.
    pub fn delete(&self, id: BookId) -> ServiceResult<()> {
        self.repo.delete_by_id(id)?;
        info!("event=book_delete module=service status=ok id={id}");
        Ok(())
    }

    /// Replaces the stored book `id` with `book`.
    ///
    /// # Contract
    /// - `book.id`, when set, must equal `id` (`IdMismatch` otherwise).
    /// - The target book must already exist (`NotFound` otherwise); the
    ///   existence check and the write are one repository step, so `update`
    ///   never inserts.
    /// - Deferred pages are left untouched; resolved pages replace the stored set.
    pub fn update(&self, book: &Book, id: BookId) -> ServiceResult<()> {
        if let Some(book_id) = book.id {
            if book_id != id {
                return Err(ServiceError::IdMismatch {
                    path_id: id,
                    book_id,
                });
            }
        }

        self.repo.update(id, book)?;
        debug!("event=book_update module=service status=ok id={id}");
        Ok(())
    }

    fn resolve_pages<U: UnitOfWork + ?Sized>(&self, unit: &U, book: &mut Book) -> ServiceResult<()> {
        let Some(book_id) = book.id else {
            // Unsaved books own no stored pages.
            if !book.pages.is_resolved() {
                book.pages = Association::Resolved(Vec::new());
            }
            return Ok(());
        };

        book.pages
            .resolve(unit, || self.repo.find_pages(book_id))
            .map_err(|err| match err {
                ResolveError::Inactive => ServiceError::UnitOfWorkInactive,
                ResolveError::Fetch(source) => ServiceError::ResolutionFailure { book_id, source },
            })
    }

    fn within_unit<U, T>(
        &self,
        operation: &'static str,
        unit: U,
        work: impl FnOnce(&U) -> ServiceResult<T>,
    ) -> ServiceResult<T>
    where
        U: UnitOfWork,
    {
        let started_at = Instant::now();
        let scope = match UnitScope::enter(unit) {
            Ok(scope) => scope,
            Err(err) => {
                warn!(
                    "event={operation} module=service status=error error_code=uow_inactive error={err}"
                );
                return Err(err.into());
            }
        };
        let outcome = work(scope.unit());
        let released = scope.close();

        match (outcome, released) {
            (Ok(value), Ok(())) => {
                info!(
                    "event={operation} module=service status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            (Ok(_), Err(release_err)) => {
                error!(
                    "event={operation} module=service status=error error_code=uow_release_failed error={release_err}"
                );
                Err(release_err.into())
            }
            (Err(err), Ok(())) => {
                warn!(
                    "event={operation} module=service status=error duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
            (Err(err), Err(release_err)) => {
                error!(
                    "event={operation} module=service status=error error={err} release_error={release_err}"
                );
                Err(err)
            }
        }
    }
}
