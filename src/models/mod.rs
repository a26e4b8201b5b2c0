//! Entity model for the library store

pub mod book;
pub mod borrowing;
pub mod copy;
pub mod librarian;
pub mod publisher;
pub mod user;

// Re-export commonly used types
pub use book::Book;
pub use borrowing::Borrowing;
pub use copy::{Copy, CopyStatus};
pub use librarian::Librarian;
pub use publisher::Publisher;
pub use user::User;

/// A persisted record with an auto-assigned integer identity.
///
/// `id()` is `None` until the record has been created through its DAO.
pub trait Entity: Send + Sync + 'static {
    /// Human-readable entity name used in log lines and error messages
    const KIND: &'static str;

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);
}
