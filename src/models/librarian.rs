//! Librarian model (staff role of a user, one-to-one)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Entity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Librarian {
    pub id: Option<i64>,
    pub user_id: i64,
    pub employment_date: NaiveDate,
    #[validate(length(min = 1, message = "Position is required"))]
    pub position: String,
}

impl Librarian {
    pub fn new(user_id: i64, employment_date: NaiveDate, position: impl Into<String>) -> Self {
        Self {
            id: None,
            user_id,
            employment_date,
            position: position.into(),
        }
    }
}

impl Entity for Librarian {
    const KIND: &'static str = "Librarian";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}
