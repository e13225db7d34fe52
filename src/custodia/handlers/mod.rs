pub mod auth;
pub mod health;
pub mod openapi;
pub mod types;

pub use self::health::health;
pub use self::openapi::openapi;
