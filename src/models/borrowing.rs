//! Borrowing (loan of a copy to a user) model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Entity;

/// A loan of one copy to one user. Open while `return_date` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Borrowing {
    pub id: Option<i64>,
    pub user_id: i64,
    pub copy_id: i64,
    pub borrow_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
}

impl Borrowing {
    pub fn new(user_id: i64, copy_id: i64, borrow_date: NaiveDate) -> Self {
        Self {
            id: None,
            user_id,
            copy_id,
            borrow_date,
            return_date: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }
}

impl Entity for Borrowing {
    const KIND: &'static str = "Borrowing";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}
