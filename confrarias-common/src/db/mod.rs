//! Database initialization, migrations and settings access

pub mod init;
pub mod migrations;
pub mod settings;

pub use init::{create_schema, init_database, init_memory_database};
pub use migrations::run_migrations;
