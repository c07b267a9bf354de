//! REST API client module for the book catalog service.
//!
//! This module provides `BookClient` for the paginated list/search and
//! CRUD operations against `/api/books`, and the `ApiError` taxonomy
//! shared by every operation. Requests are executed through
//! `SessionManager::auth_fetch`, which attaches the bearer token and
//! tears the session down on a 401.

pub mod books;
pub mod error;

pub use books::{Authorizer, BookClient};
pub use error::ApiError;
