//! Bookshelf command-line entry point.
//!
//! # Responsibility
//! - Resolve configuration (file, then flags) and open the database.
//! - Map subcommands onto `BookService` use-cases and print JSON results.

use anyhow::{Context, Result};
use bookshelf_core::db::open_db;
use bookshelf_core::{
    init_logging, Book, BookId, BookService, CoreConfig, Page, SqliteBookRepository,
    SqliteUnitOfWorkSource,
};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bookshelf", version, about = "Manage books and their pages")]
struct Cli {
    /// TOML config file; flags below override its values.
    #[arg(long, env = "BOOKSHELF_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file.
    #[arg(long, env = "BOOKSHELF_DB")]
    db: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every book with its pages.
    List,
    /// Show one book.
    Get {
        id: BookId,
        /// Also load the book's pages.
        #[arg(long)]
        with_pages: bool,
    },
    /// Add a new book.
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        isbn: String,
    },
    /// Append a page to an existing book.
    AddPage {
        book_id: BookId,
        #[arg(long)]
        number: u32,
        #[arg(long)]
        chapter: String,
        #[arg(long)]
        content: String,
    },
    /// Change fields of an existing book.
    Update {
        id: BookId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        isbn: Option<String>,
    },
    /// Delete a book and its pages.
    Delete { id: BookId },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    if let Some(log_dir) = config.log_dir.as_ref() {
        init_logging(&config.log_level, log_dir).context("failed to initialize logging")?;
    }

    let conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open `{}`", config.db_path.display()))?;
    let service = BookService::new(
        SqliteBookRepository::new(&conn),
        SqliteUnitOfWorkSource::new(&conn),
    );

    run(&service, cli.command)
}

fn resolve_config(cli: &Cli) -> Result<CoreConfig> {
    let mut config = match cli.config.as_ref() {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    if let Some(db) = cli.db.clone() {
        config.db_path = db;
    }
    if let Some(level) = cli.log_level.clone() {
        config.log_level = level;
    }
    if let Some(log_dir) = cli.log_dir.clone() {
        config.log_dir = Some(log_dir);
    }
    Ok(config)
}

fn run(
    service: &BookService<SqliteBookRepository<'_>, SqliteUnitOfWorkSource<'_>>,
    command: Command,
) -> Result<()> {
    match command {
        Command::List => print_json(&service.list_books_with_pages()?),
        Command::Get { id, with_pages } => {
            let mut book = service.get_book(id)?;
            if with_pages {
                service.load_pages(&mut book)?;
            }
            print_json(&book)
        }
        Command::Add {
            title,
            author,
            isbn,
        } => {
            let id = service.save_or_update(&Book::new(title, author, isbn))?;
            info!("event=cli_add module=cli status=ok id={id}");
            print_json(&serde_json::json!({ "id": id }))
        }
        Command::AddPage {
            book_id,
            number,
            chapter,
            content,
        } => {
            let mut book = service.get_book(book_id)?;
            service.load_pages(&mut book)?;
            book.add_page(Page::new(number, chapter, content))?;
            service.update(&book, book_id)?;

            let mut saved = service.get_book(book_id)?;
            service.load_pages(&mut saved)?;
            print_json(&saved)
        }
        Command::Update {
            id,
            title,
            author,
            isbn,
        } => {
            let mut book = service.get_book(id)?;
            if let Some(title) = title {
                book.title = title;
            }
            if let Some(author) = author {
                book.author = author;
            }
            if let Some(isbn) = isbn {
                book.isbn = isbn;
            }
            service.update(&book, id)?;
            print_json(&service.get_book(id)?)
        }
        Command::Delete { id } => {
            service.delete(id)?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{resolve_config, Cli, Command};
    use clap::{CommandFactory, Parser};
    use std::path::PathBuf;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "bookshelf",
            "--db",
            "/tmp/books.db",
            "--log-level",
            "warn",
            "get",
            "3",
            "--with-pages",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/books.db"));
        assert_eq!(config.log_level, "warn");
        assert!(matches!(
            cli.command,
            Command::Get {
                id: 3,
                with_pages: true
            }
        ));
    }

    #[test]
    fn add_page_requires_number() {
        let parsed = Cli::try_parse_from([
            "bookshelf",
            "add-page",
            "1",
            "--chapter",
            "One",
            "--content",
            "text",
        ]);
        assert!(parsed.is_err());
    }
}
