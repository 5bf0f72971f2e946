//! Core types and trait definitions for the Pawlog health event pipeline.
//!
//! This crate is deliberately free of HTTP, database and runtime
//! dependencies. Everything that reads events depends on it: the document
//! model, the event sum type, timestamp normalization and scoring all live
//! here.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod event;
pub mod score;
pub mod store;
pub mod subject;
pub mod time;

pub use error::{Error, Result};
