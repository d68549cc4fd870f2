//! RidgeFS Common - Shared types and utilities
//!
//! This crate provides the identifier types and domain vocabulary used
//! across all RidgeFS metadata server components.

pub mod types;

pub use types::*;
