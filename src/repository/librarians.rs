//! Librarians repository

use async_trait::async_trait;
use validator::Validate;

use super::{not_found, require_id, Dao};
use crate::{
    context::PersistenceContext,
    error::AppResult,
    models::{Entity, Librarian},
};

#[derive(Clone)]
pub struct LibrarianDao {
    ctx: PersistenceContext,
}

impl LibrarianDao {
    pub fn new(ctx: PersistenceContext) -> Self {
        Self { ctx }
    }

    /// The librarian record of a user, if they are staff
    pub async fn find_by_user(&self, user_id: i64) -> AppResult<Option<Librarian>> {
        let mut conn = self.ctx.connection().await?;
        let row = sqlx::query_as::<_, LibrarianRow>(
            "SELECT id, user_id, employment_date, position FROM librarians WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.map(Librarian::from))
    }
}

#[async_trait]
impl Dao<Librarian> for LibrarianDao {
    async fn create(&self, librarian: &mut Librarian) -> AppResult<()> {
        librarian.validate()?;

        let mut conn = self.ctx.connection().await?;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO librarians (user_id, employment_date, position)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(librarian.user_id)
        .bind(librarian.employment_date)
        .bind(&librarian.position)
        .fetch_one(&mut *conn)
        .await?;

        librarian.set_id(id);
        tracing::debug!("Created librarian {} for user {}", id, librarian.user_id);
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Librarian>> {
        let mut conn = self.ctx.connection().await?;
        let row = sqlx::query_as::<_, LibrarianRow>(
            "SELECT id, user_id, employment_date, position FROM librarians WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.map(Librarian::from))
    }

    async fn find_all(&self) -> AppResult<Vec<Librarian>> {
        let mut conn = self.ctx.connection().await?;
        let rows = sqlx::query_as::<_, LibrarianRow>(
            "SELECT id, user_id, employment_date, position FROM librarians ORDER BY id",
        )
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(Librarian::from).collect())
    }

    async fn update(&self, librarian: &Librarian) -> AppResult<()> {
        let id = require_id(librarian)?;
        librarian.validate()?;

        let mut conn = self.ctx.connection().await?;
        let result = sqlx::query(
            "UPDATE librarians SET user_id = ?, employment_date = ?, position = ? WHERE id = ?",
        )
        .bind(librarian.user_id)
        .bind(librarian.employment_date)
        .bind(&librarian.position)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found::<Librarian>(id));
        }
        Ok(())
    }

    /// Only the staff role goes; the underlying user is kept
    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut conn = self.ctx.connection().await?;
        sqlx::query("DELETE FROM librarians WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct LibrarianRow {
    id: i64,
    user_id: i64,
    employment_date: chrono::NaiveDate,
    position: String,
}

impl From<LibrarianRow> for Librarian {
    fn from(row: LibrarianRow) -> Self {
        Librarian {
            id: Some(row.id),
            user_id: row.user_id,
            employment_date: row.employment_date,
            position: row.position,
        }
    }
}
