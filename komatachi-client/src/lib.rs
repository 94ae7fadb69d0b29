//! komatachi-client - Anthropic Messages API client
//!
//! The one production implementation of `komatachi_core::ModelClient`.

mod anthropic;

pub use anthropic::{AnthropicClient, AnthropicClientBuilder};
