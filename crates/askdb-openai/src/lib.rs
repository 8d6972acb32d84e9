//! A [`LanguageModel`] backed by an OpenAI-compatible chat-completions API.
//!
//! [`LanguageModel`]: askdb_core::model::LanguageModel

mod client;
mod error;
mod wire;

pub use client::{OpenAiClient, OpenAiConfig};
pub use error::{Error, Result};
