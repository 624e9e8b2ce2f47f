//! HTTP API handlers

pub mod admin;
pub mod auth;
pub mod confrarias;
pub mod content;
pub mod discoveries;
pub mod extract;
pub mod health;
pub mod memberships;
pub mod session;
pub mod submissions;
pub mod ui;
pub mod users;

pub use admin::admin_routes;
pub use auth::auth_routes;
pub use confrarias::confraria_routes;
pub use content::content_routes;
pub use discoveries::discovery_routes;
pub use health::health_routes;
pub use memberships::membership_routes;
pub use extract::{ApiJson, ApiQuery};
pub use session::{MaybeActor, SignedIn};
pub use submissions::submission_routes;
pub use ui::ui_routes;
pub use users::user_routes;
