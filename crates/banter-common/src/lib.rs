//! # banter-common
//!
//! Shared types, configuration, error handling, and utilities used across all Banter crates.
//! This is the foundation layer; no business logic.

pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod snowflake;
pub mod validation;
