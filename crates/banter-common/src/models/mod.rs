//! Core domain models shared across all Banter services.
//!
//! These are the "truth" types: what the stores persist and the API serializes.

pub mod account;
pub mod session;

pub use account::*;
pub use session::*;
