//! Library Store
//!
//! Persistence layer of a small library management system: publishers, books
//! and their physical copies, members, librarians and borrowings, stored in
//! SQLite and accessed through one DAO per entity.

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod models;
pub mod repository;

pub use config::AppConfig;
pub use context::PersistenceContext;
pub use error::{AppError, AppResult};
pub use repository::{Dao, Repository};
