//! Books repository

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::SqliteConnection;
use validator::Validate;

use super::copies::{CopyInternal, CopyRow};
use super::{not_found, require_id, Dao};
use crate::{
    context::PersistenceContext,
    error::{AppError, AppResult},
    models::{Book, Copy, CopyStatus, Entity},
};

const BOOK_COLUMNS: &str =
    "b.id, b.title, b.author, b.publication_year, b.isbn, b.publisher_id, b.publisher_name";

#[derive(Clone)]
pub struct BookDao {
    ctx: PersistenceContext,
}

impl BookDao {
    pub fn new(ctx: PersistenceContext) -> Self {
        Self { ctx }
    }

    /// Every book with its copies loaded, ordered by id
    pub async fn find_all_with_copies(&self) -> AppResult<Vec<Book>> {
        let mut conn = self.ctx.connection().await?;
        let books = BookInternal::find_all(&mut conn).await?;
        BookInternal::attach_copies(&mut conn, books).await
    }

    /// Books with at least one available copy, each listed once, ordered by
    /// title then id. Copies are loaded.
    pub async fn find_available_titles(&self) -> AppResult<Vec<Book>> {
        let mut conn = self.ctx.connection().await?;
        let rows = sqlx::query_as::<_, BookRow>(&format!(
            r#"
            SELECT {BOOK_COLUMNS}
            FROM books b
            WHERE EXISTS (
                SELECT 1 FROM copies c WHERE c.book_id = b.id AND c.status = ?
            )
            ORDER BY b.title, b.id
            "#
        ))
        .bind(CopyStatus::Available.as_str())
        .fetch_all(&mut *conn)
        .await?;

        let books = rows.into_iter().map(Book::from).collect();
        BookInternal::attach_copies(&mut conn, books).await
    }

    /// Look a book up by its (unique) ISBN. Copies are loaded.
    pub async fn find_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>> {
        let mut conn = self.ctx.connection().await?;
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books b WHERE b.isbn = ?"
        ))
        .bind(isbn)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let mut book = Book::from(row);
                if let Some(id) = book.id {
                    book.copies = CopyInternal::find_by_book(&mut conn, id).await?;
                }
                Ok(Some(book))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Dao<Book> for BookDao {
    async fn create(&self, book: &mut Book) -> AppResult<()> {
        book.validate()?;

        let mut conn = self.ctx.connection().await?;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO books (title, author, publication_year, isbn, publisher_id, publisher_name)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.publication_year)
        .bind(&book.isbn)
        .bind(book.publisher_id)
        .bind(&book.publisher_name)
        .fetch_one(&mut *conn)
        .await?;

        book.set_id(id);
        tracing::debug!("Created book {} ({})", id, book.isbn);
        Ok(())
    }

    /// Loads the book's copies as well
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Book>> {
        let mut conn = self.ctx.connection().await?;
        let Some(mut book) = BookInternal::find_by_id(&mut conn, id).await? else {
            return Ok(None);
        };
        book.copies = CopyInternal::find_by_book(&mut conn, id).await?;
        Ok(Some(book))
    }

    /// Copies are not loaded; see `find_all_with_copies`
    async fn find_all(&self) -> AppResult<Vec<Book>> {
        let mut conn = self.ctx.connection().await?;
        BookInternal::find_all(&mut conn).await
    }

    /// Writes the scalar columns only. Copies are managed through the copy DAO.
    async fn update(&self, book: &Book) -> AppResult<()> {
        let id = require_id(book)?;
        book.validate()?;

        let mut conn = self.ctx.connection().await?;
        let result = sqlx::query(
            r#"
            UPDATE books
            SET title = ?, author = ?, publication_year = ?, isbn = ?,
                publisher_id = ?, publisher_name = ?
            WHERE id = ?
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.publication_year)
        .bind(&book.isbn)
        .bind(book.publisher_id)
        .bind(&book.publisher_name)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found::<Book>(id));
        }
        Ok(())
    }

    /// Refused while the book still has copies or borrowings
    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tx = self.ctx.begin().await?;

        if BookInternal::find_by_id(&mut tx, id).await?.is_none() {
            return Ok(());
        }

        let copies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM copies WHERE book_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let borrowings: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM borrowings br
            JOIN copies c ON c.id = br.copy_id
            WHERE c.book_id = ?
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if copies > 0 || borrowings > 0 {
            tracing::warn!(
                "Refused to delete book {}: {} copies, {} borrowings",
                id,
                copies,
                borrowings
            );
            return Err(AppError::BusinessRule(format!(
                "Cannot delete book {}: it has {} copy(ies) and {} borrowing(s)",
                id, copies, borrowings
            )));
        }

        sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!("Deleted book {}", id);
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct BookRow {
    id: i64,
    title: String,
    author: String,
    publication_year: i32,
    isbn: String,
    publisher_id: Option<i64>,
    publisher_name: Option<String>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Book {
            id: Some(row.id),
            title: row.title,
            author: row.author,
            publication_year: row.publication_year,
            isbn: row.isbn,
            publisher_id: row.publisher_id,
            publisher_name: row.publisher_name,
            copies: Vec::new(),
        }
    }
}

/// Book queries that run on a caller-supplied connection or transaction
pub(super) struct BookInternal;

impl BookInternal {
    pub(super) async fn find_by_id(
        con: &mut SqliteConnection,
        id: i64,
    ) -> AppResult<Option<Book>> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books b WHERE b.id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *con)
        .await?;
        Ok(row.map(Book::from))
    }

    async fn find_all(con: &mut SqliteConnection) -> AppResult<Vec<Book>> {
        let rows = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books b ORDER BY b.id"
        ))
        .fetch_all(&mut *con)
        .await?;
        Ok(rows.into_iter().map(Book::from).collect())
    }

    pub(super) async fn find_by_publisher(
        con: &mut SqliteConnection,
        publisher_id: i64,
    ) -> AppResult<Vec<Book>> {
        let rows = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books b WHERE b.publisher_id = ? ORDER BY b.id"
        ))
        .bind(publisher_id)
        .fetch_all(&mut *con)
        .await?;
        Ok(rows.into_iter().map(Book::from).collect())
    }

    /// Fill in `copies` for the given books with a single query
    async fn attach_copies(
        con: &mut SqliteConnection,
        mut books: Vec<Book>,
    ) -> AppResult<Vec<Book>> {
        let ids: Vec<i64> = books.iter().filter_map(|b| b.id).collect();
        if ids.is_empty() {
            return Ok(books);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let select_query = format!(
            "SELECT id, book_id, status FROM copies WHERE book_id IN ({}) ORDER BY book_id, id",
            placeholders
        );

        let mut select_builder = sqlx::query_as::<_, CopyRow>(&select_query);
        for id in &ids {
            select_builder = select_builder.bind(*id);
        }
        let rows = select_builder.fetch_all(&mut *con).await?;

        let mut by_book: HashMap<i64, Vec<Copy>> = HashMap::new();
        for row in rows {
            let copy = Copy::try_from(row)?;
            by_book.entry(copy.book_id).or_default().push(copy);
        }

        for book in &mut books {
            if let Some(id) = book.id {
                book.copies = by_book.remove(&id).unwrap_or_default();
            }
        }
        Ok(books)
    }
}
