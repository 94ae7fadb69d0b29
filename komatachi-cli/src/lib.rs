//! komatachi-cli - The Komatachi agent process
//!
//! Wires the store, the Anthropic client, and the turn loop together behind
//! a JSON-lines protocol on stdio. Split as a library so the protocol loop
//! is testable; `main.rs` is a thin shell.

pub mod config;
pub mod protocol;
