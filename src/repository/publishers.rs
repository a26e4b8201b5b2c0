//! Publishers repository

use async_trait::async_trait;
use sqlx::SqliteConnection;
use validator::Validate;

use super::books::BookInternal;
use super::{not_found, require_id, Dao};
use crate::{
    context::PersistenceContext,
    error::{AppError, AppResult},
    models::{Entity, Publisher},
};

#[derive(Clone)]
pub struct PublisherDao {
    ctx: PersistenceContext,
}

impl PublisherDao {
    pub fn new(ctx: PersistenceContext) -> Self {
        Self { ctx }
    }

    async fn find_row(con: &mut SqliteConnection, id: i64) -> AppResult<Option<Publisher>> {
        let row = sqlx::query_as::<_, PublisherRow>(
            "SELECT id, name, address, phone_number FROM publishers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *con)
        .await?;
        Ok(row.map(Publisher::from))
    }
}

#[async_trait]
impl Dao<Publisher> for PublisherDao {
    async fn create(&self, publisher: &mut Publisher) -> AppResult<()> {
        publisher.validate()?;

        let mut conn = self.ctx.connection().await?;
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO publishers (name, address, phone_number) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&publisher.name)
        .bind(&publisher.address)
        .bind(&publisher.phone_number)
        .fetch_one(&mut *conn)
        .await?;

        publisher.set_id(id);
        tracing::debug!("Created publisher {} ({})", id, publisher.name);
        Ok(())
    }

    /// Loads the books published by this publisher as well
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Publisher>> {
        let mut conn = self.ctx.connection().await?;
        let Some(mut publisher) = Self::find_row(&mut conn, id).await? else {
            return Ok(None);
        };
        publisher.books = BookInternal::find_by_publisher(&mut conn, id).await?;
        Ok(Some(publisher))
    }

    async fn find_all(&self) -> AppResult<Vec<Publisher>> {
        let mut conn = self.ctx.connection().await?;
        let rows = sqlx::query_as::<_, PublisherRow>(
            "SELECT id, name, address, phone_number FROM publishers ORDER BY id",
        )
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(Publisher::from).collect())
    }

    /// Renaming a publisher also rewrites the name cached on its books
    async fn update(&self, publisher: &Publisher) -> AppResult<()> {
        let id = require_id(publisher)?;
        publisher.validate()?;

        let mut tx = self.ctx.begin().await?;
        let result = sqlx::query(
            "UPDATE publishers SET name = ?, address = ?, phone_number = ? WHERE id = ?",
        )
        .bind(&publisher.name)
        .bind(&publisher.address)
        .bind(&publisher.phone_number)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found::<Publisher>(id));
        }

        sqlx::query("UPDATE books SET publisher_name = ? WHERE publisher_id = ?")
            .bind(&publisher.name)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Refused while any book references the publisher
    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tx = self.ctx.begin().await?;

        if Self::find_row(&mut tx, id).await?.is_none() {
            return Ok(());
        }

        let books: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE publisher_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if books > 0 {
            tracing::warn!("Refused to delete publisher {} with {} books", id, books);
            return Err(AppError::BusinessRule(format!(
                "Cannot delete publisher {}: {} book(s) still reference it",
                id, books
            )));
        }

        sqlx::query("DELETE FROM publishers WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!("Deleted publisher {}", id);
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct PublisherRow {
    id: i64,
    name: String,
    address: Option<String>,
    phone_number: Option<String>,
}

impl From<PublisherRow> for Publisher {
    fn from(row: PublisherRow) -> Self {
        Publisher {
            id: Some(row.id),
            name: row.name,
            address: row.address,
            phone_number: row.phone_number,
            books: Vec::new(),
        }
    }
}
