//! Domain models for Warden.
//!
//! These are the core types shared across all crates.

pub mod permission;
pub mod refresh_token;
pub mod role;
pub mod user;
