//! Book aggregate and its page children.
//!
//! # Responsibility
//! - Define the parent (`Book`) and child (`Page`) records.
//! - Validate write-side invariants before persistence.
//!
//! # Invariants
//! - `Book::id` is `None` until the book is first saved.
//! - Page numbers are 1-based and unique within one book.
//! - Books loaded from storage start with `pages` deferred.

use crate::model::association::{Association, AssociationError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Storage identifier of a book.
pub type BookId = i64;

/// Storage identifier of a page.
pub type PageId = i64;

/// Validation failures for book/page write paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookValidationError {
    #[error("book title must not be blank")]
    BlankTitle,
    #[error("book author must not be blank")]
    BlankAuthor,
    #[error("book isbn must not be blank")]
    BlankIsbn,
    #[error("page number must be >= 1, got {0}")]
    InvalidPageNumber(u32),
    #[error("page number {0} appears more than once")]
    DuplicatePageNumber(u32),
}

/// One page owned by a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// `None` until the page is first saved.
    #[serde(default)]
    pub id: Option<PageId>,
    /// 1-based position inside the owning book.
    pub number: u32,
    pub chapter: String,
    pub content: String,
}

impl Page {
    pub fn new(number: u32, chapter: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            number,
            chapter: chapter.into(),
            content: content.into(),
        }
    }
}

/// Parent record with a lazily fetched page collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    #[serde(default)]
    pub id: Option<BookId>,
    pub title: String,
    pub author: String,
    pub isbn: String,
    /// Deferred until resolved inside an active unit of work.
    #[serde(default)]
    pub pages: Association<Vec<Page>>,
}

impl Book {
    /// Creates an unsaved book.
    ///
    /// A new book has a known page set, so `pages` starts resolved and empty.
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        isbn: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            author: author.into(),
            isbn: isbn.into(),
            pages: Association::Resolved(Vec::new()),
        }
    }

    /// Replaces the page set with `pages`.
    pub fn with_pages(mut self, pages: Vec<Page>) -> Self {
        self.pages = Association::Resolved(pages);
        self
    }

    /// Returns the loaded pages.
    ///
    /// Fails when the pages were never resolved, e.g. on a book returned by a
    /// single-entity lookup whose unit of work has already ended.
    pub fn pages(&self) -> Result<&[Page], AssociationError> {
        self.pages.get().map(Vec::as_slice)
    }

    /// Appends a page to a resolved page set.
    pub fn add_page(&mut self, page: Page) -> Result<(), AssociationError> {
        self.pages.get_mut()?.push(page);
        Ok(())
    }

    /// Checks write-side invariants.
    ///
    /// Deferred pages are not inspected; they are left untouched by saves.
    pub fn validate(&self) -> Result<(), BookValidationError> {
        if self.title.trim().is_empty() {
            return Err(BookValidationError::BlankTitle);
        }
        if self.author.trim().is_empty() {
            return Err(BookValidationError::BlankAuthor);
        }
        if self.isbn.trim().is_empty() {
            return Err(BookValidationError::BlankIsbn);
        }

        if let Association::Resolved(pages) = &self.pages {
            let mut seen = HashSet::with_capacity(pages.len());
            for page in pages {
                if page.number == 0 {
                    return Err(BookValidationError::InvalidPageNumber(page.number));
                }
                if !seen.insert(page.number) {
                    return Err(BookValidationError::DuplicatePageNumber(page.number));
                }
            }
        }

        Ok(())
    }
}
