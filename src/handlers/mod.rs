pub mod auth;
pub mod health;
pub mod password_reset;

pub use auth::authenticate;
pub use health::health_check;
pub use password_reset::{confirm_password_reset, request_password_reset, show_reset_form};
