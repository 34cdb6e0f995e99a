//! Core types and computations for the divvy credential-pool manager.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; the evaluation pipeline (normalize →
//! access → assign → health) is pure functions over snapshots, so every
//! surface recomputes the same answers from the same data.

pub mod access;
pub mod assign;
pub mod credential;
pub mod error;
pub mod health;
pub mod normalize;
pub mod stats;
pub mod store;
pub mod subscriber;
pub mod view;

pub use error::{Error, Result};
