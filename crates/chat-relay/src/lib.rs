//! Chat relay - forwards storefront chat messages to a hosted inference endpoint.

pub mod config;
pub mod handlers;
pub mod llm;
pub mod response;
pub mod server;
