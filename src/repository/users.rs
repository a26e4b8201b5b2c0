//! Users repository for database operations

use async_trait::async_trait;
use sqlx::SqliteConnection;
use validator::Validate;

use super::borrowings::BorrowingInternal;
use super::{not_found, require_id, Dao};
use crate::{
    context::PersistenceContext,
    error::{AppError, AppResult},
    models::{Entity, User},
};

#[derive(Clone)]
pub struct UserDao {
    ctx: PersistenceContext,
}

impl UserDao {
    pub fn new(ctx: PersistenceContext) -> Self {
        Self { ctx }
    }

    /// Get user by email (unique). Borrowings are loaded.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let mut conn = self.ctx.connection().await?;
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, phone_number, address FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(mut user) = row.map(User::from) else {
            return Ok(None);
        };
        if let Some(id) = user.id {
            user.borrowings = BorrowingInternal::find_by_user(&mut conn, id).await?;
        }
        Ok(Some(user))
    }

    async fn find_row(con: &mut SqliteConnection, id: i64) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, phone_number, address FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *con)
        .await?;
        Ok(row.map(User::from))
    }
}

#[async_trait]
impl Dao<User> for UserDao {
    async fn create(&self, user: &mut User) -> AppResult<()> {
        user.validate()?;

        let mut conn = self.ctx.connection().await?;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (name, email, phone_number, address)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(&user.address)
        .fetch_one(&mut *conn)
        .await?;

        user.set_id(id);
        tracing::debug!("Created user {}", id);
        Ok(())
    }

    /// Loads the user's borrowings, newest first
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let mut conn = self.ctx.connection().await?;
        let Some(mut user) = Self::find_row(&mut conn, id).await? else {
            return Ok(None);
        };
        user.borrowings = BorrowingInternal::find_by_user(&mut conn, id).await?;
        Ok(Some(user))
    }

    async fn find_all(&self) -> AppResult<Vec<User>> {
        let mut conn = self.ctx.connection().await?;
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, phone_number, address FROM users ORDER BY id",
        )
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn update(&self, user: &User) -> AppResult<()> {
        let id = require_id(user)?;
        user.validate()?;

        let mut conn = self.ctx.connection().await?;
        let result = sqlx::query(
            "UPDATE users SET name = ?, email = ?, phone_number = ?, address = ? WHERE id = ?",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(&user.address)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found::<User>(id));
        }
        Ok(())
    }

    /// Refused while the user has borrowings or a librarian record
    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tx = self.ctx.begin().await?;

        if Self::find_row(&mut tx, id).await?.is_none() {
            return Ok(());
        }

        let borrowings: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM borrowings WHERE user_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if borrowings > 0 {
            tracing::warn!("Refused to delete user {} with {} borrowings", id, borrowings);
            return Err(AppError::BusinessRule(format!(
                "Cannot delete user {}: it has {} borrowing(s)",
                id, borrowings
            )));
        }

        let librarian: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM librarians WHERE user_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if librarian > 0 {
            return Err(AppError::BusinessRule(format!(
                "Cannot delete user {}: remove the librarian record first",
                id
            )));
        }

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!("Deleted user {}", id);
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    phone_number: Option<String>,
    address: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: Some(row.id),
            name: row.name,
            email: row.email,
            phone_number: row.phone_number,
            address: row.address,
            borrowings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Book, Borrowing, Copy, Librarian};
    use crate::repository::Repository;
    use chrono::NaiveDate;

    fn repo() -> Repository {
        Repository::new(PersistenceContext::in_memory())
    }

    #[tokio::test]
    async fn create_and_find_by_email() {
        let repo = repo();
        let mut user = User::new(
            "Grace",
            "grace@example.com",
            Some("555-0100".into()),
            Some("1 Main St".into()),
        );
        repo.users.create(&mut user).await.unwrap();

        let found = repo.users.find_by_email("grace@example.com").await.unwrap();
        assert_eq!(found, Some(user));
        assert!(repo.users.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let repo = repo();
        let mut user = User::new("Bad", "not-an-email", None, None);

        let err = repo.users.create(&mut user).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_constraint_violation() {
        let repo = repo();
        repo.users
            .create(&mut User::new("One", "same@example.com", None, None))
            .await
            .unwrap();

        let err = repo
            .users
            .create(&mut User::new("Two", "same@example.com", None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Constraint(_)));
    }

    #[tokio::test]
    async fn find_by_id_loads_borrowings() {
        let repo = repo();
        let mut user = User::new("Lin", "lin@example.com", None, None);
        repo.users.create(&mut user).await.unwrap();
        let mut book = Book::new("Kindred", "Octavia Butler", 1979, "9780807083697");
        repo.books.create(&mut book).await.unwrap();
        let mut copy = Copy::new(book.id.unwrap());
        repo.copies.create(&mut copy).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let mut borrowing = Borrowing::new(user.id.unwrap(), copy.id.unwrap(), day);
        repo.borrowings.create(&mut borrowing).await.unwrap();

        let found = repo.users.find_by_id(user.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(found.borrowings(), &[borrowing]);
    }

    #[tokio::test]
    async fn delete_is_blocked_by_librarian_record() {
        let repo = repo();
        let mut user = User::new("Staff", "staff@example.com", None, None);
        repo.users.create(&mut user).await.unwrap();
        let hired = NaiveDate::from_ymd_opt(2020, 9, 1).unwrap();
        let mut librarian = Librarian::new(user.id.unwrap(), hired, "Archivist");
        repo.librarians.create(&mut librarian).await.unwrap();

        let err = repo.users.delete(user.id.unwrap()).await.unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));

        repo.librarians.delete(librarian.id.unwrap()).await.unwrap();
        repo.users.delete(user.id.unwrap()).await.unwrap();
        assert!(repo.users.find_by_id(user.id.unwrap()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_blocked_by_borrowing_history() {
        let repo = repo();
        let mut user = User::new("Reader", "reader@example.com", None, None);
        repo.users.create(&mut user).await.unwrap();
        let mut book = Book::new("Dubliners", "James Joyce", 1914, "9780141182452");
        repo.books.create(&mut book).await.unwrap();
        let mut copy = Copy::new(book.id.unwrap());
        repo.copies.create(&mut copy).await.unwrap();

        let mut borrowing = Borrowing::new(
            user.id.unwrap(),
            copy.id.unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        );
        borrowing.return_date = NaiveDate::from_ymd_opt(2024, 2, 14);
        repo.borrowings.create(&mut borrowing).await.unwrap();

        let err = repo.users.delete(user.id.unwrap()).await.unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));

        let stored = repo.users.find_by_id(user.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.borrowings(), &[borrowing]);
    }

    #[tokio::test]
    async fn update_of_unknown_user_is_not_found() {
        let repo = repo();
        let mut user = User::new("Ghost", "ghost@example.com", None, None);
        user.id = Some(404);

        assert!(matches!(repo.users.update(&user).await, Err(AppError::NotFound(_))));
    }
}
