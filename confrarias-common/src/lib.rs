//! # Confrarias Common Library
//!
//! Shared code for the confrarias services:
//! - Domain models and validation
//! - Authorization guard and rank engine
//! - Submission, membership and content workflows
//! - Database initialisation and migrations
//! - Identity provider and blob store collaborators
//! - Configuration loading
//!
//! Nothing here depends on an HTTP framework.

pub mod blob;
pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod identity;
pub mod models;
pub mod pagination;
pub mod rank;
pub mod slug;
pub mod validation;
pub mod workflow;

pub use error::{Error, Result};
pub use guard::{Action, AuthorizationGuard, Target};
pub use models::Actor;
