//! Aggregation and retrieval-context pipeline for Pawlog.
//!
//! Sits between an [`EntityStore`](pawlog_core::store::EntityStore) and the
//! presentation layer:
//!
//! - [`fetch`] reads one category of events for a subject;
//! - [`aggregate`] fans out over the categories and composes dashboard views;
//! - [`context`] builds the bounded structure handed to the assistant;
//! - [`auth`], [`generate`] and [`chat`] guard and drive the chat turn.
//!
//! Every request builds its views from scratch. Nothing here holds state
//! across requests or spawns background tasks.

#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod auth;
pub mod chat;
pub mod context;
pub mod fetch;
pub mod generate;

#[cfg(test)]
mod testing;

pub use aggregate::{AggregateError, AggregatedView, Aggregator, TimeWindow};
pub use auth::{AuthError, AuthGate, IdentityVerifier, InvalidToken, Principal};
pub use chat::{ChatError, ChatReply, ChatService};
pub use context::{ContextBuilder, ContextError, ContextLimits, RetrievalContext};
pub use fetch::{EventFetcher, FetchError};
pub use generate::{GenerationError, GenerationInvoker, Generator};

/// Boxed error used at the store boundary, where the backend type is erased.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
