//! Library Store - bootstrap
//!
//! Opens the configured store, applies the schema and logs a short catalog
//! summary. The desktop front end embeds the library crate the same way.

use library_store::{
    config::AppConfig, logging, repository::Dao, PersistenceContext, Repository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    let _guard = logging::init(&config.logging);

    tracing::info!("Starting Library Store v{}", env!("CARGO_PKG_VERSION"));

    let context = PersistenceContext::new(config.database.clone());
    let repository = Repository::new(context.clone());

    let books = repository.books.find_all_with_copies().await?;
    let copies: usize = books.iter().map(|b| b.copies().len()).sum();
    let available = repository.books.find_available_titles().await?;
    let users = repository.users.find_all().await?;
    let open_borrowings = repository
        .borrowings
        .find_all()
        .await?
        .iter()
        .filter(|b| b.is_open())
        .count();

    tracing::info!(
        "Catalog: {} titles, {} copies, {} titles available, {} members, {} open borrowings",
        books.len(),
        copies,
        available.len(),
        users.len(),
        open_borrowings
    );
    for book in &available {
        tracing::debug!(
            "{} by {} ({} of {} copies available)",
            book.title,
            book.author,
            book.available_copies(),
            book.copies().len()
        );
    }

    context.close().await;
    Ok(())
}
