//! # registry-store
//!
//! SQLite data-access layer for the entity registry.
//!
//! Two layers, strictly stacked:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Registry  (types/users schema, field rules,│
//! │             full name / attrs / type name)  │
//! ├─────────────────────────────────────────────┤
//! │  Database  (create / insert / query /       │
//! │             describe / export any table)    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use registry_store::{Database, Registry, UserData};
//!
//! let db = Database::open("data/registry.db")?;
//! let registry = Registry::new(db.clone());
//! registry.generate_db().await?;
//!
//! let id = registry
//!     .add_user(
//!         UserData::new()
//!             .with("login", "anna".to_string())
//!             .with("password", "secret".to_string())
//!             .with("type", 3)
//!             .with("inn", 366316608880_i64)
//!             .with("address", "Воронеж".to_string())
//!             .with("snils", 11223344595_i64)
//!             .with("surname", "Петрова".to_string())
//!             .with("name", "Анна".to_string())
//!             .with("middle_name", "Сергеевна".to_string()),
//!     )
//!     .await?;
//!
//! assert_eq!(registry.get_user_type("anna").await?, "Физическое лицо");
//! db.close().await?;
//! ```

pub mod db;
pub mod error;
pub mod frame;
pub mod password;
pub mod registry;
pub mod table;
pub mod value;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult, ValidationError};
pub use frame::TableFrame;
pub use registry::{
    EntityType, REQUIRED_FIELDS, Registry, RegistryOptions, UserData, registry_tables, type_code, validate,
};
pub use rusqlite::types::Value;
pub use table::{ColumnDef, ColumnInfo, Row};
