//! Copy (physical specimen of a book) model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Book, Entity};
use crate::error::{AppError, AppResult};

/// Circulation status of a copy, stored as text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CopyStatus {
    #[default]
    Available,
    Borrowed,
}

impl CopyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyStatus::Available => "Available",
            CopyStatus::Borrowed => "Borrowed",
        }
    }
}

impl fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CopyStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Available" => Ok(CopyStatus::Available),
            "Borrowed" => Ok(CopyStatus::Borrowed),
            other => Err(AppError::Validation(format!("Unknown copy status '{}'", other))),
        }
    }
}

/// A physical copy. Always belongs to exactly one book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Copy {
    pub id: Option<i64>,
    pub book_id: i64,
    pub status: CopyStatus,
}

impl Copy {
    /// New available copy of the given book
    pub fn new(book_id: i64) -> Self {
        Self {
            id: None,
            book_id,
            status: CopyStatus::Available,
        }
    }

    /// New available copy of a book that has already been persisted
    pub fn of(book: &Book) -> AppResult<Self> {
        let book_id = book.id.ok_or_else(|| {
            AppError::Validation(format!("Book '{}' must be saved before adding copies", book.title))
        })?;
        Ok(Self::new(book_id))
    }

    pub fn is_available(&self) -> bool {
        self.status == CopyStatus::Available
    }
}

impl Entity for Copy {
    const KIND: &'static str = "Copy";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}
