// handlers/public/mod.rs - Endpoints that need no token
//
// Security Level: None
// Middleware: None

pub mod health;
pub mod login;

pub use health::health_get;
pub use login::{login_post, master_login_post};
