//! Book (catalog title) model

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Copy, Entity, Publisher};

/// A catalog title. Physical copies hang off it through `Copy::book_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Book {
    pub id: Option<i64>,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub author: String,
    pub publication_year: i32,
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: String,
    pub publisher_id: Option<i64>,
    /// Publisher name as displayed in listings, kept alongside the reference
    pub publisher_name: Option<String>,
    #[serde(default)]
    pub(crate) copies: Vec<Copy>,
}

impl Book {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        publication_year: i32,
        isbn: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            author: author.into(),
            publication_year,
            isbn: isbn.into(),
            publisher_id: None,
            publisher_name: None,
            copies: Vec::new(),
        }
    }

    /// Point this book at a publisher, or detach it with `None`.
    ///
    /// Only touches this side of the association; `Publisher::add_book` and
    /// `Publisher::remove_book` keep both sides in step.
    pub fn set_publisher(&mut self, publisher: Option<&Publisher>) {
        match publisher {
            Some(publisher) => {
                self.publisher_id = publisher.id;
                self.publisher_name = Some(publisher.name.clone());
            }
            None => {
                self.publisher_id = None;
                self.publisher_name = None;
            }
        }
    }

    /// Copies loaded with this book. Empty when the book came from a listing
    /// query that does not fetch copies.
    pub fn copies(&self) -> &[Copy] {
        &self.copies
    }

    pub fn available_copies(&self) -> usize {
        self.copies.iter().filter(|c| c.is_available()).count()
    }

    /// Same persisted row, or the same ISBN when either side is unsaved
    pub(crate) fn same_title(&self, other: &Book) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            _ => self.isbn == other.isbn,
        }
    }
}

impl Entity for Book {
    const KIND: &'static str = "Book";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}
