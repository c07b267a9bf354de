//! Paginated book CRUD client.
//!
//! Holds the transient cached copy of the remote collection (the books
//! for the current view plus the pagination cursor). A plain `list`
//! replaces the cache; `load_more` appends the next page. Mutations never
//! schedule a hidden refresh: `create`/`update` return the saved record
//! and `remove` drops the entry from the cache optimistically, leaving
//! any follow-up `list` to the caller.

use chrono::{Datelike, Utc};
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use crate::api::error::ApiError;
use crate::auth::SessionManager;
use crate::config::{Config, BOOKS_PATH, GENRES_PATH};
use crate::models::{Book, BookDraft, FieldError, PageCursor, User};

/// Authorization policy for edit/delete actions, supplied by the caller.
pub type Authorizer = Box<dyn Fn(Option<&User>, &Book) -> bool + Send + Sync>;

pub struct BookClient {
    books_url: String,
    genres_url: String,
    page_size: u32,
    books: Vec<Book>,
    cursor: PageCursor,
    authorizer: Authorizer,
}

impl BookClient {
    pub fn new(config: &Config) -> Self {
        Self {
            books_url: config.api_url(BOOKS_PATH),
            genres_url: config.api_url(GENRES_PATH),
            page_size: config.page_size,
            books: Vec::new(),
            cursor: PageCursor::default(),
            authorizer: Box::new(|_, _| true),
        }
    }

    /// The cached list for the current view.
    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    /// Replace the allow-all authorization policy.
    pub fn set_authorizer(&mut self, authorizer: Authorizer) {
        self.authorizer = authorizer;
    }

    /// Whether the given user may edit or delete the book.
    pub fn can_modify(&self, user: Option<&User>, book: &Book) -> bool {
        (self.authorizer)(user, book)
    }

    fn require_session(session: &SessionManager) -> Result<(), ApiError> {
        if session.is_authenticated() {
            Ok(())
        } else {
            Err(ApiError::AuthRequired)
        }
    }

    fn book_url(&self, id: &str) -> String {
        format!("{}/{}", self.books_url, id)
    }

    /// Fetch one page of the collection, replacing the cached list.
    ///
    /// `search` is included as a query parameter only when non-empty.
    /// Both server response shapes are accepted: the paginated object and
    /// the bare array (which is treated as a single page).
    pub async fn list(
        &mut self,
        session: &mut SessionManager,
        search: &str,
        page: u32,
    ) -> Result<&[Book], ApiError> {
        Self::require_session(session)?;
        let (books, cursor) = self.fetch_page(session, search, page).await?;
        self.books = dedup_by_id(books);
        self.cursor = cursor;
        debug!(count = self.books.len(), page = cursor.page, "Book list replaced");
        Ok(&self.books)
    }

    /// Fetch the next page and append it to the cached list, skipping
    /// entries already present. Returns `false` without touching the
    /// network when the cursor reports no further pages.
    pub async fn load_more(
        &mut self,
        session: &mut SessionManager,
        search: &str,
    ) -> Result<bool, ApiError> {
        if !self.cursor.has_next {
            return Ok(false);
        }
        Self::require_session(session)?;
        let next = self.cursor.page + 1;
        let (books, cursor) = self.fetch_page(session, search, next).await?;
        for book in books {
            if !self.books.iter().any(|b| b.id == book.id) {
                self.books.push(book);
            }
        }
        self.cursor = cursor;
        debug!(count = self.books.len(), page = cursor.page, "Book list extended");
        Ok(true)
    }

    async fn fetch_page(
        &self,
        session: &mut SessionManager,
        search: &str,
        page: u32,
    ) -> Result<(Vec<Book>, PageCursor), ApiError> {
        let mut query = vec![
            ("page", page.to_string()),
            ("limit", self.page_size.to_string()),
        ];
        if !search.is_empty() {
            query.push(("search", search.to_string()));
        }

        let builder = session.http().get(&self.books_url).query(&query);
        let response = session.auth_fetch(builder).await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, &text));
        }
        parse_book_list(&text, page)
    }

    /// Create a book. Validation runs locally first; on failure no
    /// request is made. Returns the saved record as reported by the
    /// server; the cached list is not refreshed here.
    pub async fn create(
        &mut self,
        session: &mut SessionManager,
        draft: &BookDraft,
    ) -> Result<Book, ApiError> {
        Self::require_session(session)?;
        let payload = draft
            .validate(Utc::now().year())
            .map_err(|errors| ApiError::Validation(join_field_errors(&errors)))?;

        let builder = session.http().post(&self.books_url).json(&payload);
        let response = session.auth_fetch(builder).await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, &text));
        }
        parse_saved_book(&text)
    }

    /// Update a book by id. Same local validation as `create`. On success
    /// the matching cached entry, if any, is patched in place with the
    /// record the server returned.
    pub async fn update(
        &mut self,
        session: &mut SessionManager,
        id: &str,
        draft: &BookDraft,
    ) -> Result<Book, ApiError> {
        Self::require_session(session)?;
        if id.trim().is_empty() {
            return Err(ApiError::Validation("book id is required".to_string()));
        }
        let payload = draft
            .validate(Utc::now().year())
            .map_err(|errors| ApiError::Validation(join_field_errors(&errors)))?;

        let builder = session.http().put(self.book_url(id)).json(&payload);
        let response = session.auth_fetch(builder).await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, &text));
        }

        let saved = parse_saved_book(&text)?;
        if let Some(slot) = self.books.iter_mut().find(|b| b.id == saved.id) {
            *slot = saved.clone();
        }
        Ok(saved)
    }

    /// Delete a book by id. On an OK response the entry is removed from
    /// the cached list immediately (optimistic, no rollback).
    pub async fn remove(
        &mut self,
        session: &mut SessionManager,
        id: &str,
    ) -> Result<(), ApiError> {
        Self::require_session(session)?;
        if id.trim().is_empty() {
            return Err(ApiError::Validation("book id is required".to_string()));
        }

        let builder = session
            .http()
            .request(Method::DELETE, self.book_url(id));
        let response = session.auth_fetch(builder).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            return Err(ApiError::from_status(status, &text));
        }

        self.books.retain(|b| b.id != id);
        debug!(id, "Book removed from cached list");
        Ok(())
    }

    /// Fetch the genre catalog.
    pub async fn genres(&self, session: &mut SessionManager) -> Result<Vec<String>, ApiError> {
        Self::require_session(session)?;
        let builder = session.http().get(&self.genres_url);
        let response = session.auth_fetch(builder).await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, &text));
        }

        parse_genres(&text)
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Drop duplicate ids, keeping the first occurrence.
fn dedup_by_id(books: Vec<Book>) -> Vec<Book> {
    let mut seen = std::collections::HashSet::new();
    books
        .into_iter()
        .filter(|b| seen.insert(b.id.clone()))
        .collect()
}

/// Paginated list response shape.
#[derive(Deserialize)]
struct PagedBooks {
    books: Vec<Book>,
    #[serde(rename = "currentPage", default)]
    current_page: Option<u32>,
    #[serde(rename = "totalPages", default)]
    total_pages: Option<u32>,
    #[serde(rename = "hasNextPage", default)]
    has_next_page: Option<bool>,
}

/// Parse a list body in either accepted shape.
///
/// A bare array carries no pagination metadata and defaults to a cursor
/// of `{page: requested, total_pages: 1, has_next: false}`.
fn parse_book_list(text: &str, requested_page: u32) -> Result<(Vec<Book>, PageCursor), ApiError> {
    if let Ok(books) = serde_json::from_str::<Vec<Book>>(text) {
        return Ok((books, PageCursor::single_page(requested_page)));
    }

    match serde_json::from_str::<PagedBooks>(text) {
        Ok(paged) => {
            let cursor = PageCursor::new(
                paged.current_page.unwrap_or(requested_page),
                paged.total_pages.unwrap_or(1),
                paged.has_next_page.unwrap_or(false),
            );
            Ok((paged.books, cursor))
        }
        Err(e) => Err(ApiError::InvalidResponse(format!(
            "Failed to parse book list: {}",
            e
        ))),
    }
}

/// The genre catalog comes back either bare or under a `genres` key.
/// The key is required in the wrapper shape, so an unrelated object is
/// reported as malformed rather than read as an empty catalog.
fn parse_genres(text: &str) -> Result<Vec<String>, ApiError> {
    if let Ok(genres) = serde_json::from_str::<Vec<String>>(text) {
        return Ok(genres);
    }

    #[derive(Deserialize)]
    struct GenresWrapper {
        genres: Vec<String>,
    }
    match serde_json::from_str::<GenresWrapper>(text) {
        Ok(wrapper) => Ok(wrapper.genres),
        Err(e) => Err(ApiError::InvalidResponse(format!(
            "Failed to parse genres: {}",
            e
        ))),
    }
}

/// The saved record comes back either bare or under a `book`/`data` key.
fn parse_saved_book(text: &str) -> Result<Book, ApiError> {
    if let Ok(book) = serde_json::from_str::<Book>(text) {
        return Ok(book);
    }

    #[derive(Deserialize)]
    struct SavedWrapper {
        #[serde(default)]
        book: Option<Book>,
        #[serde(default)]
        data: Option<Book>,
    }

    serde_json::from_str::<SavedWrapper>(text)
        .ok()
        .and_then(|w| w.book.or(w.data))
        .ok_or_else(|| {
            ApiError::InvalidResponse("Response did not include the saved book".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;

    fn book_json(id: &str, title: &str) -> String {
        format!(r#"{{"id":"{}","title":"{}","author":"A","genre":"G"}}"#, id, title)
    }

    #[test]
    fn paginated_shape_yields_books_and_cursor() {
        let body = format!(
            r#"{{"books":[{},{}],"currentPage":2,"totalPages":3,"hasNextPage":true}}"#,
            book_json("b1", "One"),
            book_json("b2", "Two")
        );
        let (books, cursor) = parse_book_list(&body, 2).unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].id, "b1");
        assert_eq!(cursor, PageCursor { page: 2, total_pages: 3, has_next: true });
    }

    #[test]
    fn bare_array_shape_defaults_the_cursor() {
        let body = format!("[{}]", book_json("b1", "One"));
        let (books, cursor) = parse_book_list(&body, 1).unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(cursor, PageCursor { page: 1, total_pages: 1, has_next: false });
    }

    #[test]
    fn paginated_shape_with_missing_metadata_defaults() {
        let body = format!(r#"{{"books":[{}]}}"#, book_json("b1", "One"));
        let (_, cursor) = parse_book_list(&body, 4).unwrap();
        assert_eq!(cursor.page, 1); // clamped to total_pages
        assert_eq!(cursor.total_pages, 1);
        assert!(!cursor.has_next);
    }

    #[test]
    fn garbage_body_is_an_invalid_response() {
        let err = parse_book_list("not json", 1).unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn duplicate_ids_are_dropped_first_wins() {
        let body = format!(
            "[{},{},{}]",
            book_json("b1", "One"),
            book_json("b1", "Copy"),
            book_json("b2", "Two")
        );
        let (books, _) = parse_book_list(&body, 1).unwrap();
        let books = dedup_by_id(books);
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].title, "One");
    }

    #[test]
    fn saved_book_parses_bare_and_wrapped() {
        let bare = book_json("b9", "Bare");
        assert_eq!(parse_saved_book(&bare).unwrap().id, "b9");

        let wrapped = format!(r#"{{"message":"created","book":{}}}"#, book_json("b9", "Wrapped"));
        assert_eq!(parse_saved_book(&wrapped).unwrap().title, "Wrapped");

        let data = format!(r#"{{"data":{}}}"#, book_json("b7", "Data"));
        assert_eq!(parse_saved_book(&data).unwrap().id, "b7");

        assert!(parse_saved_book(r#"{"message":"ok"}"#).is_err());
    }

    #[test]
    fn genres_parse_bare_and_wrapped_but_not_unrelated_objects() {
        assert_eq!(
            parse_genres(r#"["Fiction","Horror"]"#).unwrap(),
            vec!["Fiction", "Horror"]
        );
        assert_eq!(
            parse_genres(r#"{"genres":["Fiction"]}"#).unwrap(),
            vec!["Fiction"]
        );
        assert!(matches!(
            parse_genres(r#"{"message":"ok"}"#).unwrap_err(),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn endpoint_urls_come_from_config_without_double_slashes() {
        let config = Config {
            base_url: "http://localhost:3000/".to_string(),
            ..Config::default()
        };
        let client = BookClient::new(&config);
        assert_eq!(client.books_url, "http://localhost:3000/api/books");
        assert_eq!(client.genres_url, "http://localhost:3000/api/books/genres/list");
        assert_eq!(client.book_url("b1"), "http://localhost:3000/api/books/b1");
    }

    #[test]
    fn authorizer_defaults_to_allow_all() {
        let client = BookClient::new(&Config::default());
        let book: Book = serde_json::from_str(&book_json("b1", "One")).unwrap();
        assert!(client.can_modify(None, &book));
    }

    #[test]
    fn custom_authorizer_is_consulted() {
        let mut client = BookClient::new(&Config::default());
        client.set_authorizer(Box::new(|user, _| user.is_some()));
        let book: Book = serde_json::from_str(&book_json("b1", "One")).unwrap();
        assert!(!client.can_modify(None, &book));
    }

    #[tokio::test]
    async fn operations_require_a_session_before_any_network_call() {
        // Unroutable base URL: if a request were dispatched, these would
        // fail with a network error instead of AuthRequired.
        let config = Config {
            base_url: "http://127.0.0.1:1".to_string(),
            ..Config::default()
        };
        let mut session =
            SessionManager::new(&config.base_url, Box::new(MemoryCredentialStore::new())).unwrap();
        session.restore();
        let mut client = BookClient::new(&config);

        assert!(matches!(
            client.list(&mut session, "", 1).await.unwrap_err(),
            ApiError::AuthRequired
        ));
        assert!(matches!(
            client.create(&mut session, &BookDraft::default()).await.unwrap_err(),
            ApiError::AuthRequired
        ));
        assert!(matches!(
            client.remove(&mut session, "b1").await.unwrap_err(),
            ApiError::AuthRequired
        ));
        assert!(matches!(
            client.genres(&mut session).await.unwrap_err(),
            ApiError::AuthRequired
        ));
    }
}
