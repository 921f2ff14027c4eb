//! SQLite database builder for EDK2 workspaces.
//!
//! Table generators are registered on an [`Edk2Db`] handle and executed by
//! [`Edk2Db::parse`] in two phases: every generator creates its tables, then
//! every generator populates them. Results are read back through scoped
//! [`Session`]s or through [`AdvancedQuery`] implementations that combine
//! several store queries with in-memory joins.

pub mod db;
pub mod errors;
pub mod generator;
pub mod junction;
pub mod queries;
pub mod query;
pub mod session;
pub mod tables;

pub use db::Edk2Db;
pub use errors::{DbError, Result};
pub use generator::{GeneratorRegistry, ParseContext, TableGenerator};
pub use query::AdvancedQuery;
pub use session::Session;

pub use edk2db_core::{Edk2Path, Env, RunId};
