//! Repository layer: storage contracts and their Postgres/Redis implementations.

pub mod accounts;
pub mod sessions;
