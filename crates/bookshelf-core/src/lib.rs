//! Core library for the bookshelf client.
//!
//! This crate contains everything except the presentation layer:
//!
//! - `auth`: session management, credential storage, authenticated fetch
//! - `api`: the paginated book CRUD client and its error taxonomy
//! - `models`: canonical record shapes normalized at the API boundary
//! - `config`: base URL, endpoints, and local configuration file

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiError, Authorizer, BookClient};
pub use auth::{
    AuthError, CredentialStore, FileCredentialStore, KeyringCredentialStore,
    MemoryCredentialStore, NewUser, SessionManager, KEY_TOKEN, KEY_USER,
};
pub use config::Config;
pub use models::{Book, BookDraft, BookPayload, FieldError, PageCursor, User};
