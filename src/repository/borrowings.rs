//! Borrowings repository
//!
//! Borrowings drive copy circulation: opening one marks its copy `Borrowed`,
//! closing or deleting it marks the copy `Available` again. Both writes
//! always share one transaction.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqliteConnection;

use super::books::BookInternal;
use super::copies::CopyInternal;
use super::{not_found, require_id, Dao};
use crate::{
    context::PersistenceContext,
    error::{AppError, AppResult},
    models::{Book, Borrowing, Copy, CopyStatus, Entity},
};

#[derive(Clone)]
pub struct BorrowingDao {
    ctx: PersistenceContext,
}

impl BorrowingDao {
    pub fn new(ctx: PersistenceContext) -> Self {
        Self { ctx }
    }

    /// Close the open borrowing of a copy as of today
    pub async fn return_copy(&self, copy_id: i64) -> AppResult<Borrowing> {
        self.return_copy_on(copy_id, today()).await
    }

    /// Close the open borrowing of a copy and put the copy back in circulation.
    ///
    /// `date` may not precede the borrow date. Borrow dates are never later
    /// than today, so `return_copy` always satisfies this.
    pub async fn return_copy_on(&self, copy_id: i64, date: NaiveDate) -> AppResult<Borrowing> {
        let mut tx = self.ctx.begin().await?;

        let mut borrowing = BorrowingInternal::find_open_by_copy(&mut tx, copy_id)
            .await?
            .ok_or_else(|| {
                AppError::BusinessRule(format!("Copy {} is not currently borrowed", copy_id))
            })?;
        if date < borrowing.borrow_date {
            return Err(AppError::Validation(format!(
                "Return date {} is before borrow date {}",
                date, borrowing.borrow_date
            )));
        }
        let id = require_id(&borrowing)?;

        sqlx::query("UPDATE borrowings SET return_date = ? WHERE id = ?")
            .bind(date)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        CopyInternal::set_status(&mut tx, copy_id, CopyStatus::Available).await?;

        tx.commit().await?;
        borrowing.return_date = Some(date);
        tracing::info!("Copy {} returned by user {} on {}", copy_id, borrowing.user_id, date);
        Ok(borrowing)
    }

    /// Borrowing history of a user, newest first
    pub async fn find_by_user(&self, user_id: i64) -> AppResult<Vec<Borrowing>> {
        let mut conn = self.ctx.connection().await?;
        BorrowingInternal::find_by_user(&mut conn, user_id).await
    }

    pub async fn find_open_by_copy(&self, copy_id: i64) -> AppResult<Option<Borrowing>> {
        let mut conn = self.ctx.connection().await?;
        BorrowingInternal::find_open_by_copy(&mut conn, copy_id).await
    }

    /// Lend a specific copy to a user
    pub async fn borrow_copy(
        &self,
        user_id: i64,
        copy_id: i64,
        date: NaiveDate,
    ) -> AppResult<Borrowing> {
        let mut borrowing = Borrowing::new(user_id, copy_id, date);
        self.create(&mut borrowing).await?;
        Ok(borrowing)
    }

    /// Lend the first available copy (lowest id) of a book to a user
    pub async fn borrow_title(
        &self,
        user_id: i64,
        book_id: i64,
        date: NaiveDate,
    ) -> AppResult<Borrowing> {
        check_borrow_date(date)?;

        let mut tx = self.ctx.begin().await?;

        if BookInternal::find_by_id(&mut tx, book_id).await?.is_none() {
            return Err(not_found::<Book>(book_id));
        }

        let copy_id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM copies WHERE book_id = ? AND status = ? ORDER BY id LIMIT 1",
        )
        .bind(book_id)
        .bind(CopyStatus::Available.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(copy_id) = copy_id else {
            tracing::warn!("No available copy of book {} for user {}", book_id, user_id);
            return Err(AppError::BusinessRule(format!(
                "Book {} has no available copy",
                book_id
            )));
        };

        let mut borrowing = Borrowing::new(user_id, copy_id, date);
        BorrowingInternal::claim_copy(&mut tx, copy_id).await?;
        let id = BorrowingInternal::insert(&mut tx, &borrowing).await?;

        tx.commit().await?;
        borrowing.set_id(id);
        tracing::info!("Copy {} of book {} borrowed by user {}", copy_id, book_id, user_id);
        Ok(borrowing)
    }
}

#[async_trait]
impl Dao<Borrowing> for BorrowingDao {
    /// An open borrowing claims its copy in the same transaction
    async fn create(&self, borrowing: &mut Borrowing) -> AppResult<()> {
        check_dates(borrowing)?;

        let mut tx = self.ctx.begin().await?;
        if borrowing.is_open() {
            BorrowingInternal::claim_copy(&mut tx, borrowing.copy_id).await?;
        }
        let id = BorrowingInternal::insert(&mut tx, borrowing).await?;
        tx.commit().await?;

        borrowing.set_id(id);
        if borrowing.is_open() {
            tracing::info!("Copy {} borrowed by user {}", borrowing.copy_id, borrowing.user_id);
        } else {
            tracing::debug!("Recorded returned borrowing {}", id);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Borrowing>> {
        let mut conn = self.ctx.connection().await?;
        BorrowingInternal::find_by_id(&mut conn, id).await
    }

    async fn find_all(&self) -> AppResult<Vec<Borrowing>> {
        let mut conn = self.ctx.connection().await?;
        let rows = sqlx::query_as::<_, BorrowingRow>(
            "SELECT id, user_id, copy_id, borrow_date, return_date FROM borrowings ORDER BY id",
        )
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(Borrowing::from).collect())
    }

    /// Closing an open borrowing releases its copy; reopening one, or moving
    /// an open one to another copy, claims the new copy.
    async fn update(&self, borrowing: &Borrowing) -> AppResult<()> {
        let id = require_id(borrowing)?;
        check_dates(borrowing)?;

        let mut tx = self.ctx.begin().await?;
        let stored = BorrowingInternal::find_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| not_found::<Borrowing>(id))?;

        let same_copy = stored.copy_id == borrowing.copy_id;
        if stored.is_open() && !(borrowing.is_open() && same_copy) {
            CopyInternal::set_status(&mut tx, stored.copy_id, CopyStatus::Available).await?;
        }
        if borrowing.is_open() && !(stored.is_open() && same_copy) {
            BorrowingInternal::claim_copy(&mut tx, borrowing.copy_id).await?;
        }

        sqlx::query(
            r#"
            UPDATE borrowings
            SET user_id = ?, copy_id = ?, borrow_date = ?, return_date = ?
            WHERE id = ?
            "#,
        )
        .bind(borrowing.user_id)
        .bind(borrowing.copy_id)
        .bind(borrowing.borrow_date)
        .bind(borrowing.return_date)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// An open borrowing releases its copy first
    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tx = self.ctx.begin().await?;

        let Some(stored) = BorrowingInternal::find_by_id(&mut tx, id).await? else {
            return Ok(());
        };
        if stored.is_open() {
            CopyInternal::set_status(&mut tx, stored.copy_id, CopyStatus::Available).await?;
        }

        sqlx::query("DELETE FROM borrowings WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!("Deleted borrowing {}", id);
        Ok(())
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// A borrowing may not start after today
fn check_borrow_date(date: NaiveDate) -> AppResult<()> {
    if date > today() {
        return Err(AppError::Validation(format!("Borrow date {} is in the future", date)));
    }
    Ok(())
}

fn check_dates(borrowing: &Borrowing) -> AppResult<()> {
    check_borrow_date(borrowing.borrow_date)?;
    match borrowing.return_date {
        Some(returned) if returned < borrowing.borrow_date => Err(AppError::Validation(format!(
            "Return date {} is before borrow date {}",
            returned, borrowing.borrow_date
        ))),
        _ => Ok(()),
    }
}

#[derive(sqlx::FromRow)]
struct BorrowingRow {
    id: i64,
    user_id: i64,
    copy_id: i64,
    borrow_date: NaiveDate,
    return_date: Option<NaiveDate>,
}

impl From<BorrowingRow> for Borrowing {
    fn from(row: BorrowingRow) -> Self {
        Borrowing {
            id: Some(row.id),
            user_id: row.user_id,
            copy_id: row.copy_id,
            borrow_date: row.borrow_date,
            return_date: row.return_date,
        }
    }
}

/// Borrowing queries that run on a caller-supplied connection or transaction
pub(super) struct BorrowingInternal;

impl BorrowingInternal {
    async fn find_by_id(con: &mut SqliteConnection, id: i64) -> AppResult<Option<Borrowing>> {
        let row = sqlx::query_as::<_, BorrowingRow>(
            "SELECT id, user_id, copy_id, borrow_date, return_date FROM borrowings WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *con)
        .await?;
        Ok(row.map(Borrowing::from))
    }

    pub(super) async fn find_by_user(
        con: &mut SqliteConnection,
        user_id: i64,
    ) -> AppResult<Vec<Borrowing>> {
        let rows = sqlx::query_as::<_, BorrowingRow>(
            r#"
            SELECT id, user_id, copy_id, borrow_date, return_date
            FROM borrowings
            WHERE user_id = ?
            ORDER BY borrow_date DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *con)
        .await?;
        Ok(rows.into_iter().map(Borrowing::from).collect())
    }

    async fn find_open_by_copy(
        con: &mut SqliteConnection,
        copy_id: i64,
    ) -> AppResult<Option<Borrowing>> {
        let row = sqlx::query_as::<_, BorrowingRow>(
            r#"
            SELECT id, user_id, copy_id, borrow_date, return_date
            FROM borrowings
            WHERE copy_id = ? AND return_date IS NULL
            "#,
        )
        .bind(copy_id)
        .fetch_optional(&mut *con)
        .await?;
        Ok(row.map(Borrowing::from))
    }

    /// Mark a copy `Borrowed`, refusing if it is already out
    async fn claim_copy(con: &mut SqliteConnection, copy_id: i64) -> AppResult<()> {
        let copy = CopyInternal::find_by_id(&mut *con, copy_id)
            .await?
            .ok_or_else(|| {
                AppError::Constraint(format!("{} {} does not exist", Copy::KIND, copy_id))
            })?;

        let open = Self::find_open_by_copy(&mut *con, copy_id).await?;
        if !copy.is_available() || open.is_some() {
            tracing::warn!("Refused to lend copy {}: already borrowed", copy_id);
            return Err(AppError::BusinessRule(format!(
                "Copy {} is already borrowed",
                copy_id
            )));
        }

        CopyInternal::set_status(con, copy_id, CopyStatus::Borrowed).await
    }

    async fn insert(con: &mut SqliteConnection, borrowing: &Borrowing) -> AppResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO borrowings (user_id, copy_id, borrow_date, return_date)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(borrowing.user_id)
        .bind(borrowing.copy_id)
        .bind(borrowing.borrow_date)
        .bind(borrowing.return_date)
        .fetch_one(&mut *con)
        .await?;
        Ok(id)
    }
}
