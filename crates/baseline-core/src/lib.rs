//! Core types, fact engine, and service operations for system baselines.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Fact normalisation and diffing are pure functions; everything that touches
//! storage or the inventory goes through the [`store::BaselineStore`] and
//! [`inventory::InventoryFetcher`] traits.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod baseline;
pub mod diff;
pub mod error;
pub mod fact;
pub mod inventory;
pub mod normalize;
pub mod service;
pub mod store;
pub mod system;

pub use error::{Error, Result, ValidationError};
