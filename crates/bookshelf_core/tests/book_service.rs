use bookshelf_core::db::open_db_in_memory;
use bookshelf_core::{
    Association, AssociationError, Book, BookRepository, BookService, Page, ServiceError,
    SqliteBookRepository, SqliteUnitOfWork, SqliteUnitOfWorkSource, UnitOfWork,
};
use rusqlite::Connection;

type SqliteBookService<'conn> =
    BookService<SqliteBookRepository<'conn>, SqliteUnitOfWorkSource<'conn>>;

fn service(conn: &Connection) -> SqliteBookService<'_> {
    BookService::new(
        SqliteBookRepository::new(conn),
        SqliteUnitOfWorkSource::new(conn),
    )
}

fn page(number: u32, content: &str) -> Page {
    Page::new(number, "Chapter 1", content)
}

#[test]
fn list_returns_books_with_pages_in_repository_order() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let first = Book::new("P1", "Author", "isbn-1").with_pages(vec![page(1, "C1"), page(2, "C2")]);
    let second = Book::new("P2", "Author", "isbn-2");
    assert_eq!(service.save_or_update(&first).unwrap(), 1);
    assert_eq!(service.save_or_update(&second).unwrap(), 2);

    let books = service.list_books_with_pages().unwrap();
    assert!(conn.is_autocommit(), "unit of work must be released");

    assert_eq!(books.len(), 2);
    assert_eq!(books[0].id, Some(1));
    let contents: Vec<&str> = books[0]
        .pages()
        .unwrap()
        .iter()
        .map(|page| page.content.as_str())
        .collect();
    assert_eq!(contents, vec!["C1", "C2"]);

    assert_eq!(books[1].id, Some(2));
    assert_eq!(books[1].pages, Association::Resolved(Vec::new()));
}

#[test]
fn listed_pages_stay_readable_after_connection_closes() {
    let conn = open_db_in_memory().unwrap();
    let books = {
        let service = service(&conn);
        service
            .save_or_update(&Book::new("Dune", "Frank Herbert", "9780441013593").with_pages(
                vec![page(1, "A beginning"), page(2, "is the time")],
            ))
            .unwrap();
        service.list_books_with_pages().unwrap()
    };
    drop(conn);

    assert_eq!(books[0].pages().unwrap().len(), 2);
}

#[test]
fn list_with_ambient_unit_releases_it() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service
        .save_or_update(&Book::new("Emma", "Jane Austen", "9780141439587").with_pages(vec![
            page(1, "Emma Woodhouse, handsome, clever, and rich"),
        ]))
        .unwrap();

    let mut unit = SqliteUnitOfWork::begin(&conn).unwrap();
    let books = service.list_books_with_pages_in(&mut unit).unwrap();

    assert!(!unit.is_active());
    assert!(conn.is_autocommit());
    assert_eq!(books[0].pages().unwrap().len(), 1);
}

#[test]
fn list_with_released_unit_fails_immediately() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let mut unit = SqliteUnitOfWork::begin(&conn).unwrap();
    unit.release().unwrap();

    let err = service.list_books_with_pages_in(&mut unit).unwrap_err();
    assert!(matches!(err, ServiceError::UnitOfWorkInactive));
}

#[test]
fn list_on_empty_store_returns_empty() {
    let conn = open_db_in_memory().unwrap();
    let books = service(&conn).list_books_with_pages().unwrap();
    assert!(books.is_empty());
}

#[test]
fn get_book_is_idempotent_and_leaves_pages_deferred() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let id = service
        .save_or_update(&Book::new("Dune", "Frank Herbert", "9780441013593").with_pages(vec![
            page(1, "A beginning"),
        ]))
        .unwrap();

    let first = service.get_book(id).unwrap();
    let second = service.get_book(id).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.pages().unwrap_err(), AssociationError::NotResolved);
}

#[test]
fn load_pages_reattaches_detached_book() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let id = service
        .save_or_update(&Book::new("Dune", "Frank Herbert", "9780441013593").with_pages(vec![
            page(1, "A beginning"),
            page(2, "is the time"),
        ]))
        .unwrap();

    let mut book = service.get_book(id).unwrap();
    service.load_pages(&mut book).unwrap();

    assert!(conn.is_autocommit());
    assert_eq!(book.pages().unwrap().len(), 2);
}

#[test]
fn save_then_get_returns_saved_data() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let draft = Book::new("Beloved", "Toni Morrison", "9781400033416");

    let id = service.save_or_update(&draft).unwrap();
    let loaded = service.get_book(id).unwrap();

    assert_eq!(loaded.id, Some(id));
    assert_eq!(loaded.title, draft.title);
    assert_eq!(loaded.author, draft.author);
    assert_eq!(loaded.isbn, draft.isbn);
}

#[test]
fn save_or_update_updates_existing_book() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let id = service
        .save_or_update(&Book::new("Beloved", "Toni Morrison", "9781400033416"))
        .unwrap();

    let mut book = service.get_book(id).unwrap();
    book.title = "Beloved: A Novel".to_string();
    assert_eq!(service.save_or_update(&book).unwrap(), id);

    assert_eq!(service.get_book(id).unwrap().title, "Beloved: A Novel");
    assert_eq!(service.list_books_with_pages().unwrap().len(), 1);
}

#[test]
fn delete_then_get_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let id = service
        .save_or_update(&Book::new("Emma", "Jane Austen", "9780141439587"))
        .unwrap();

    service.delete(id).unwrap();

    assert!(matches!(service.get_book(id), Err(ServiceError::NotFound(missing)) if missing == id));
    assert!(matches!(service.delete(id), Err(ServiceError::NotFound(_))));
}

#[test]
fn update_replaces_book_by_id() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let id = service
        .save_or_update(&Book::new("Emma", "Jane Austen", "9780141439587"))
        .unwrap();

    let replacement = Book::new("Emma (Annotated)", "Jane Austen", "9780141439587")
        .with_pages(vec![page(1, "Emma Woodhouse")]);
    service.update(&replacement, id).unwrap();

    let mut loaded = service.get_book(id).unwrap();
    assert_eq!(loaded.title, "Emma (Annotated)");
    service.load_pages(&mut loaded).unwrap();
    assert_eq!(loaded.pages().unwrap().len(), 1);
}

#[test]
fn update_rejects_conflicting_ids() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let id = service
        .save_or_update(&Book::new("Emma", "Jane Austen", "9780141439587"))
        .unwrap();

    let mut other = service.get_book(id).unwrap();
    other.id = Some(id + 1);
    let err = service.update(&other, id).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::IdMismatch { path_id, book_id } if path_id == id && book_id == id + 1
    ));
}

#[test]
fn update_of_missing_book_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let err = service
        .update(&Book::new("Emma", "Jane Austen", "9780141439587"), 77)
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(77)));
    assert!(SqliteBookRepository::new(&conn).find_all().unwrap().is_empty());
}

#[test]
fn invalid_book_is_reported_as_validation_error() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let err = service
        .save_or_update(&Book::new("Emma", "", "9780141439587"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[test]
fn constraint_violation_is_reported_as_storage_error() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service
        .save_or_update(&Book::new("Emma", "Jane Austen", "9780141439587"))
        .unwrap();

    let err = service
        .save_or_update(&Book::new("Emma again", "Jane Austen", "9780141439587"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Storage(_)));
}
