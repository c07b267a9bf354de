//! Authentication module for managing the user session and credentials.
//!
//! This module provides:
//! - `SessionManager`: owns the in-memory session (token + user profile),
//!   performs login/register/logout, and wraps outbound requests with the
//!   bearer token via `auth_fetch`
//! - `CredentialStore`: pluggable persistent storage for the token and
//!   serialized profile, with keychain, file, and in-memory backends
//!
//! A 401 on any authenticated request tears the session down; there is no
//! token refresh and no retry.

pub mod session;
pub mod store;

pub use session::{AuthError, NewUser, SessionManager};
pub use store::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
    KEY_TOKEN, KEY_USER,
};
