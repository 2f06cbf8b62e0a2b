//! Relay client for hosted chat completions.

pub mod auth;
mod client;
mod error;
mod types;

pub use auth::{
    ApiKeyAuthorizer, AuthConfig, Authorizer, CredentialChain, CredentialError, SdkTokenSource,
    TOKEN_SCOPE, TokenSource,
};
pub use client::{
    ChatCompleter, DEFAULT_API_VERSION, DEFAULT_TIMEOUT, MAX_OUTPUT_TOKENS, RelayClient,
    RelayConfig, SYSTEM_PROMPT, build_conversation,
};
pub use error::RelayError;
pub use types::{
    ChatCompletionRequest, ChatCompletionResponse, Choice, Message, ResponseMessage, Role, Usage,
};
