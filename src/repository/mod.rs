//! Repository layer: the generic DAO contract and one DAO per entity
//!
//! Every DAO call is its own round-trip to the store; nothing is cached
//! between calls. Operations touching more than one row run in a single
//! transaction, so a failure leaves no partial write behind.

pub mod books;
pub mod borrowings;
pub mod copies;
pub mod librarians;
pub mod publishers;
pub mod users;

use async_trait::async_trait;

use crate::context::PersistenceContext;
use crate::error::{AppError, AppResult};
use crate::models::Entity;

pub use books::BookDao;
pub use borrowings::BorrowingDao;
pub use copies::CopyDao;
pub use librarians::LibrarianDao;
pub use publishers::PublisherDao;
pub use users::UserDao;

/// CRUD contract shared by every entity DAO
#[async_trait]
pub trait Dao<T: Entity>: Send + Sync {
    /// Insert a new row and write the assigned id back into `entity`.
    /// Any id already present on `entity` is ignored.
    async fn create(&self, entity: &mut T) -> AppResult<()>;

    /// `Ok(None)` when no row has this id
    async fn find_by_id(&self, id: i64) -> AppResult<Option<T>>;

    /// All rows, ordered by id
    async fn find_all(&self) -> AppResult<Vec<T>>;

    /// Overwrite the persisted row. Fails with `NotFound` when the id is unknown.
    async fn update(&self, entity: &T) -> AppResult<()>;

    /// Remove the row if present; unknown ids are a no-op
    async fn delete(&self, id: i64) -> AppResult<()>;
}

/// Every DAO, all sharing one persistence context
#[derive(Clone)]
pub struct Repository {
    pub context: PersistenceContext,
    pub books: BookDao,
    pub copies: CopyDao,
    pub publishers: PublisherDao,
    pub users: UserDao,
    pub librarians: LibrarianDao,
    pub borrowings: BorrowingDao,
}

impl Repository {
    pub fn new(context: PersistenceContext) -> Self {
        Self {
            books: BookDao::new(context.clone()),
            copies: CopyDao::new(context.clone()),
            publishers: PublisherDao::new(context.clone()),
            users: UserDao::new(context.clone()),
            librarians: LibrarianDao::new(context.clone()),
            borrowings: BorrowingDao::new(context.clone()),
            context,
        }
    }
}

pub(crate) fn require_id<T: Entity>(entity: &T) -> AppResult<i64> {
    entity
        .id()
        .ok_or_else(|| AppError::Validation(format!("{} has no id; create it first", T::KIND)))
}

pub(crate) fn not_found<T: Entity>(id: i64) -> AppError {
    AppError::NotFound(format!("{} with id {} not found", T::KIND, id))
}
