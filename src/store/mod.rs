//! Persistence layer — SQLite-backed violation log.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlViolationLog;
pub use traits::{ViolationAction, ViolationLog, ViolationRecord};
