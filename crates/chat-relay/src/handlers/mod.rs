//! HTTP request handlers.

pub mod chat;
mod health;
mod version;

pub use health::{livez, readyz};
pub use version::version;
