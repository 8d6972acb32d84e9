//! Query resolution: question + chat history + live schema → one SQL
//! statement → results → explanation.
//!
//! The [`Resolver`] runs a two-call protocol against a [`LanguageModel`]. The
//! first call is forced to use the `ask_database` tool, so its output is a
//! mechanically parseable SQL string. The second call is unconstrained and
//! its prose is relayed to the caller, whole or as a token stream, never
//! parsed.
//!
//! [`LanguageModel`]: askdb_core::model::LanguageModel

mod context;
mod error;
mod resolver;
mod stream;

pub use context::{DEFAULT_SYSTEM_PROMPT, SCHEMA_PLACEHOLDER, assemble_context, render_system_prompt};
pub use error::ResolveError;
pub use resolver::{Resolution, Resolver, ResolverConfig};
