//! zkCLOB Core Library
//!
//! Shared types, curve primitives, order signing and the sequencer client
//! for zkCLOB order authentication.

pub mod api;
pub mod config;
pub mod curve;
pub mod error;
pub mod signing;
pub mod types;

pub use error::{Error, Result};
