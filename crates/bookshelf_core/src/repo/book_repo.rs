//! Book repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over `books` and the page rows they own.
//! - Fetch page collections on demand for lazy association resolution.
//!
//! # Invariants
//! - Read paths return books with `pages` deferred.
//! - `save`/`update` replace the page set only when the book's pages are
//!   resolved. A page keeps its id and moves when saved under another book.
//! - `update` never inserts a book row.
//! - A book row and its page rows are written atomically.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::association::Association;
use crate::model::book::{Book, BookId, BookValidationError, Page};
use log::warn;
use rusqlite::{params, Connection, Row};
use thiserror::Error;

const BOOK_SELECT_SQL: &str = "SELECT
    id,
    title,
    author,
    isbn
FROM books";

const PAGE_SELECT_SQL: &str = "SELECT
    id,
    number,
    chapter,
    content
FROM pages";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for book persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] BookValidationError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("book not found: {0}")]
    NotFound(BookId),
    #[error("invalid persisted book data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for book CRUD operations.
pub trait BookRepository {
    /// Lists every book, pages deferred.
    fn find_all(&self) -> RepoResult<Vec<Book>>;
    /// Gets one book by id, pages deferred.
    fn find_by_id(&self, id: BookId) -> RepoResult<Option<Book>>;
    /// Inserts a new book or updates the existing row with the same id.
    ///
    /// Returns the persisted book with its id (and page ids) assigned.
    fn save(&self, book: &Book) -> RepoResult<Book>;
    /// Overwrites the existing book `id` with `book`, ignoring `book.id`.
    /// `NotFound` when no such row exists; never inserts.
    fn update(&self, id: BookId, book: &Book) -> RepoResult<Book>;
    /// Deletes one book together with its pages.
    fn delete_by_id(&self, id: BookId) -> RepoResult<()>;
    /// Fetches the page collection of one book, ordered by page number.
    fn find_pages(&self, book_id: BookId) -> RepoResult<Vec<Page>>;
}

impl<R: BookRepository + ?Sized> BookRepository for &R {
    fn find_all(&self) -> RepoResult<Vec<Book>> {
        (**self).find_all()
    }

    fn find_by_id(&self, id: BookId) -> RepoResult<Option<Book>> {
        (**self).find_by_id(id)
    }

    fn save(&self, book: &Book) -> RepoResult<Book> {
        (**self).save(book)
    }

    fn update(&self, id: BookId, book: &Book) -> RepoResult<Book> {
        (**self).update(id, book)
    }

    fn delete_by_id(&self, id: BookId) -> RepoResult<()> {
        (**self).delete_by_id(id)
    }

    fn find_pages(&self, book_id: BookId) -> RepoResult<Vec<Page>> {
        (**self).find_pages(book_id)
    }
}

/// SQLite-backed book repository.
///
/// Shares its connection with `SqliteUnitOfWorkSource`, so reads issued
/// while a unit of work is active run inside that unit's transaction.
#[derive(Clone, Copy)]
pub struct SqliteBookRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBookRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl BookRepository for SqliteBookRepository<'_> {
    fn find_all(&self) -> RepoResult<Vec<Book>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BOOK_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut books = Vec::new();

        while let Some(row) = rows.next()? {
            books.push(parse_book_row(row)?);
        }

        Ok(books)
    }

    fn find_by_id(&self, id: BookId) -> RepoResult<Option<Book>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BOOK_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_book_row(row)?));
        }

        Ok(None)
    }

    fn save(&self, book: &Book) -> RepoResult<Book> {
        book.validate()?;

        with_savepoint(self.conn, |conn| {
            let id = upsert_book(conn, book)?;
            write_pages(conn, id, book)
        })
    }

    fn update(&self, id: BookId, book: &Book) -> RepoResult<Book> {
        book.validate()?;

        with_savepoint(self.conn, |conn| {
            if !update_book_row(conn, id, book)? {
                return Err(RepoError::NotFound(id));
            }
            write_pages(conn, id, book)
        })
    }

    fn delete_by_id(&self, id: BookId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM books WHERE id = ?1;", [id])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn find_pages(&self, book_id: BookId) -> RepoResult<Vec<Page>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PAGE_SELECT_SQL}
             WHERE book_id = ?1
             ORDER BY number ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([book_id])?;
        let mut pages = Vec::new();

        while let Some(row) = rows.next()? {
            pages.push(parse_page_row(row)?);
        }

        Ok(pages)
    }
}

fn update_book_row(conn: &Connection, id: BookId, book: &Book) -> RepoResult<bool> {
    let changed = conn.execute(
        "UPDATE books
         SET
            title = ?2,
            author = ?3,
            isbn = ?4
         WHERE id = ?1;",
        params![id, book.title, book.author, book.isbn],
    )?;
    Ok(changed > 0)
}

fn upsert_book(conn: &Connection, book: &Book) -> RepoResult<BookId> {
    match book.id {
        Some(id) => {
            if !update_book_row(conn, id, book)? {
                conn.execute(
                    "INSERT INTO books (id, title, author, isbn) VALUES (?1, ?2, ?3, ?4);",
                    params![id, book.title, book.author, book.isbn],
                )?;
            }
            Ok(id)
        }
        None => {
            conn.execute(
                "INSERT INTO books (title, author, isbn) VALUES (?1, ?2, ?3);",
                params![book.title, book.author, book.isbn],
            )?;
            Ok(conn.last_insert_rowid())
        }
    }
}

fn write_pages(conn: &Connection, id: BookId, book: &Book) -> RepoResult<Book> {
    let pages = match &book.pages {
        Association::Resolved(pages) => Association::Resolved(replace_pages(conn, id, pages)?),
        Association::Deferred => Association::Deferred,
    };

    Ok(Book {
        id: Some(id),
        title: book.title.clone(),
        author: book.author.clone(),
        isbn: book.isbn.clone(),
        pages,
    })
}

// Pages carrying an id stored under another book are moved, not duplicated.
fn replace_pages(conn: &Connection, book_id: BookId, pages: &[Page]) -> RepoResult<Vec<Page>> {
    conn.execute("DELETE FROM pages WHERE book_id = ?1;", [book_id])?;

    let mut saved = Vec::with_capacity(pages.len());
    for page in pages {
        conn.execute(
            "INSERT INTO pages (id, number, chapter, content, book_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                number = excluded.number,
                chapter = excluded.chapter,
                content = excluded.content,
                book_id = excluded.book_id;",
            params![page.id, page.number, page.chapter, page.content, book_id],
        )?;
        saved.push(Page {
            id: Some(page.id.unwrap_or_else(|| conn.last_insert_rowid())),
            ..page.clone()
        });
    }

    Ok(saved)
}

/// Runs `work` inside a savepoint so it nests under an active unit of work.
fn with_savepoint<T>(
    conn: &Connection,
    work: impl FnOnce(&Connection) -> RepoResult<T>,
) -> RepoResult<T> {
    conn.execute_batch("SAVEPOINT book_save;")?;

    match work(conn) {
        Ok(value) => {
            conn.execute_batch("RELEASE SAVEPOINT book_save;")?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = conn
                .execute_batch("ROLLBACK TO SAVEPOINT book_save; RELEASE SAVEPOINT book_save;")
            {
                warn!(
                    "event=book_save module=repo status=error error_code=savepoint_rollback_failed error={rollback_err}"
                );
            }
            Err(err)
        }
    }
}

fn parse_book_row(row: &Row<'_>) -> RepoResult<Book> {
    let id: BookId = row.get("id")?;
    let book = Book {
        id: Some(id),
        title: row.get("title")?,
        author: row.get("author")?,
        isbn: row.get("isbn")?,
        pages: Association::Deferred,
    };
    book.validate()
        .map_err(|err| RepoError::InvalidData(format!("books.id={id}: {err}")))?;
    Ok(book)
}

fn parse_page_row(row: &Row<'_>) -> RepoResult<Page> {
    let id: i64 = row.get("id")?;
    let number = match row.get::<_, i64>("number")? {
        value if value >= 1 => u32::try_from(value).map_err(|_| {
            RepoError::InvalidData(format!("page number `{value}` out of range in pages.id={id}"))
        })?,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid page number `{other}` in pages.id={id}"
            )));
        }
    };

    Ok(Page {
        id: Some(id),
        number,
        chapter: row.get("chapter")?,
        content: row.get("content")?,
    })
}
