//! Domain model for books and their pages.
//!
//! # Responsibility
//! - Define the `Book` aggregate and its owned `Page` children.
//! - Represent lazily fetched relations explicitly through `Association`.
//!
//! # Invariants
//! - A `Page` belongs to exactly one `Book`.
//! - A deferred association is never read as if it were empty.

pub mod association;
pub mod book;
