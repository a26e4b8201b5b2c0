//! User (library member) model

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Borrowing, Entity};
use crate::error::{AppError, AppResult};

/// Library member with their borrowing history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct User {
    pub id: Option<i64>,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub(crate) borrowings: Vec<Borrowing>,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone_number: Option<String>,
        address: Option<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            phone_number,
            address,
            borrowings: Vec::new(),
        }
    }

    pub fn borrowings(&self) -> &[Borrowing] {
        &self.borrowings
    }

    /// Record a borrowing under this user and point it back at the user.
    ///
    /// The user must already be persisted since a borrowing cannot exist
    /// without a user id.
    pub fn add_borrowing(&mut self, borrowing: &mut Borrowing) -> AppResult<()> {
        let user_id = self.id.ok_or_else(|| {
            AppError::Validation(format!("User '{}' must be saved before borrowing", self.name))
        })?;
        borrowing.user_id = user_id;
        if let Some(id) = borrowing.id {
            self.borrowings.retain(|b| b.id != Some(id));
        }
        self.borrowings.push(borrowing.clone());
        Ok(())
    }
}

impl Entity for User {
    const KIND: &'static str = "User";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}
