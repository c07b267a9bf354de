use serde::{Deserialize, Deserializer, Serialize};

/// Earliest publication year the form accepts
const YEAR_MIN: i32 = 1000;

/// Latest publication year the form accepts
const YEAR_MAX: i32 = 2030;

/// Canonical book record.
///
/// The remote API returns the identifier under either `id` or `_id`,
/// sometimes as a number, and the year under either `year` or
/// `publishedYear`. All of that is normalized here during deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    #[serde(alias = "_id", deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default, alias = "publishedYear")]
    pub year: Option<i32>,
    #[serde(default = "default_true")]
    pub available: bool,
}

fn default_true() -> bool {
    true
}

/// Accept an identifier serialized as either a JSON string or a number.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}

/// A single failed form field with a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Book form input as typed by a user: price and year arrive as raw
/// strings and are parsed during validation.
#[derive(Debug, Clone, Default)]
pub struct BookDraft {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub description: String,
    pub price: Option<String>,
    pub year: Option<String>,
    pub available: bool,
}

impl BookDraft {
    /// Validate the draft and produce the normalized wire payload.
    ///
    /// All checks run locally, before any network call: required
    /// non-empty title/author/genre; year, when supplied, an integer in
    /// [1000, 2030]; price, when supplied, a non-negative number. An
    /// omitted price defaults to 0 and an omitted year to `current_year`.
    pub fn validate(&self, current_year: i32) -> Result<BookPayload, Vec<FieldError>> {
        let mut errors = Vec::new();

        let title = self.title.trim();
        let author = self.author.trim();
        let genre = self.genre.trim();

        if title.is_empty() {
            errors.push(FieldError {
                field: "title",
                message: "title is required".to_string(),
            });
        }
        if author.is_empty() {
            errors.push(FieldError {
                field: "author",
                message: "author is required".to_string(),
            });
        }
        if genre.is_empty() {
            errors.push(FieldError {
                field: "genre",
                message: "genre is required".to_string(),
            });
        }

        let mut year = current_year;
        if let Some(raw) = self.year.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            match raw.parse::<i32>() {
                Ok(y) if (YEAR_MIN..=YEAR_MAX).contains(&y) => year = y,
                _ => errors.push(FieldError {
                    field: "year",
                    message: format!("year must be between {} and {}", YEAR_MIN, YEAR_MAX),
                }),
            }
        }

        let mut price = 0.0;
        if let Some(raw) = self.price.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            match raw.parse::<f64>() {
                Ok(p) if p >= 0.0 => price = p,
                _ => errors.push(FieldError {
                    field: "price",
                    message: "price must be 0 or greater".to_string(),
                }),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(BookPayload {
            title: title.to_string(),
            author: author.to_string(),
            genre: genre.to_string(),
            description: self.description.trim().to_string(),
            price,
            year,
            available: self.available,
        })
    }

    /// Pre-fill a draft from an existing record for editing.
    pub fn from_book(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            author: book.author.clone(),
            genre: book.genre.clone(),
            description: book.description.clone(),
            price: Some(book.price.to_string()),
            year: book.year.map(|y| y.to_string()),
            available: book.available,
        }
    }
}

/// Normalized book fields sent to the API on create and update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookPayload {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub description: String,
    pub price: f64,
    pub year: i32,
    pub available: bool,
}

/// Pagination position for the book list view.
///
/// `page` is 1-based. When the server supplies metadata, `page` is
/// clamped to `total_pages`; a bare-array response is treated as a
/// single page at the requested position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub page: u32,
    pub total_pages: u32,
    pub has_next: bool,
}

impl PageCursor {
    pub fn new(page: u32, total_pages: u32, has_next: bool) -> Self {
        let total_pages = total_pages.max(1);
        Self {
            page: page.clamp(1, total_pages),
            total_pages,
            has_next,
        }
    }

    /// Cursor for a response that carried no pagination metadata.
    pub fn single_page(page: u32) -> Self {
        Self {
            page: page.max(1),
            total_pages: 1,
            has_next: false,
        }
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::single_page(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> BookDraft {
        BookDraft {
            title: "The Hobbit".to_string(),
            author: "J.R.R. Tolkien".to_string(),
            genre: "Fantasy".to_string(),
            description: "There and back again".to_string(),
            price: Some("12.50".to_string()),
            year: Some("1937".to_string()),
            available: true,
        }
    }

    #[test]
    fn valid_draft_produces_payload() {
        let payload = draft().validate(2025).unwrap();
        assert_eq!(payload.title, "The Hobbit");
        assert_eq!(payload.price, 12.5);
        assert_eq!(payload.year, 1937);
        assert!(payload.available);
    }

    #[test]
    fn required_fields_are_trimmed_before_checking() {
        let mut d = draft();
        d.title = "   ".to_string();
        d.author = String::new();
        let errors = d.validate(2025).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["title", "author"]);
    }

    #[test]
    fn year_out_of_range_is_rejected() {
        for bad in ["999", "2031", "abc"] {
            let mut d = draft();
            d.year = Some(bad.to_string());
            let errors = d.validate(2025).unwrap_err();
            assert_eq!(errors[0].field, "year", "year {:?} should fail", bad);
        }
    }

    #[test]
    fn omitted_year_defaults_to_current_year() {
        let mut d = draft();
        d.year = None;
        assert_eq!(d.validate(2025).unwrap().year, 2025);

        d.year = Some("  ".to_string());
        assert_eq!(d.validate(2025).unwrap().year, 2025);
    }

    #[test]
    fn negative_price_is_rejected_and_omitted_price_defaults_to_zero() {
        let mut d = draft();
        d.price = Some("-1".to_string());
        let errors = d.validate(2025).unwrap_err();
        assert_eq!(errors[0].field, "price");

        d.price = None;
        assert_eq!(d.validate(2025).unwrap().price, 0.0);
    }

    #[test]
    fn book_id_normalizes_from_underscore_id() {
        let book: Book = serde_json::from_str(
            r#"{"_id":"abc123","title":"T","author":"A","genre":"G"}"#,
        )
        .unwrap();
        assert_eq!(book.id, "abc123");
        assert!(book.available);
        assert_eq!(book.price, 0.0);
    }

    #[test]
    fn book_id_normalizes_from_numeric_id() {
        let book: Book =
            serde_json::from_str(r#"{"id":42,"title":"T","author":"A","genre":"G"}"#).unwrap();
        assert_eq!(book.id, "42");
    }

    #[test]
    fn book_year_normalizes_from_published_year() {
        let book: Book = serde_json::from_str(
            r#"{"id":"1","title":"T","author":"A","genre":"G","publishedYear":1984}"#,
        )
        .unwrap();
        assert_eq!(book.year, Some(1984));
    }

    #[test]
    fn cursor_page_is_clamped_to_total_pages() {
        let cursor = PageCursor::new(5, 3, false);
        assert_eq!(cursor.page, 3);
        assert_eq!(cursor.total_pages, 3);

        let cursor = PageCursor::new(0, 0, false);
        assert_eq!(cursor.page, 1);
        assert_eq!(cursor.total_pages, 1);
    }
}
