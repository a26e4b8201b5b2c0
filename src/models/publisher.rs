//! Publisher model

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Book, Entity};
use crate::error::{AppError, AppResult};

/// Publisher record with the books that reference it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Publisher {
    pub id: Option<i64>,
    #[validate(length(min = 1, message = "Publisher name is required"))]
    pub name: String,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    #[serde(default)]
    pub(crate) books: Vec<Book>,
}

impl Publisher {
    pub fn new(
        name: impl Into<String>,
        address: Option<String>,
        phone_number: Option<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            address,
            phone_number,
            books: Vec::new(),
        }
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    /// Attach a book to this publisher, updating both sides.
    ///
    /// The book's publisher reference is set first, so the entry kept in
    /// `books()` already points back at this publisher. Re-adding the same
    /// title replaces the earlier entry. The publisher must already be
    /// persisted, otherwise the book would carry a name without an id.
    pub fn add_book(&mut self, book: &mut Book) -> AppResult<()> {
        if self.id.is_none() {
            return Err(AppError::Validation(format!(
                "Publisher '{}' must be saved before adding books",
                self.name
            )));
        }
        book.set_publisher(Some(self));
        self.books.retain(|b| !b.same_title(book));
        self.books.push(book.clone());
        Ok(())
    }

    /// Detach a book from this publisher, updating both sides.
    ///
    /// A book that belongs to another publisher is left untouched. Returns
    /// whether anything was unlinked.
    pub fn remove_book(&mut self, book: &mut Book) -> bool {
        let before = self.books.len();
        self.books.retain(|b| !b.same_title(book));
        let listed = self.books.len() != before;
        let linked = self.id.is_some() && book.publisher_id == self.id;
        if listed || linked {
            book.set_publisher(None);
        }
        listed || linked
    }
}

impl Entity for Publisher {
    const KIND: &'static str = "Publisher";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}
