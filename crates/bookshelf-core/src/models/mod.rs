//! Data models for bookshelf entities.
//!
//! Records are normalized once at the API boundary: alternate server
//! field names (`_id` vs `id`, `publishedYear` vs `year`, numeric vs
//! string identifiers) are mapped onto one canonical shape here, so
//! nothing deeper in the crate branches on field spelling.

pub mod book;
pub mod user;

pub use book::{Book, BookDraft, BookPayload, FieldError, PageCursor};
pub use user::User;
