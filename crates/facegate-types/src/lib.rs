//! Shared domain types for the Facegate project.

pub mod auth;
pub mod capture;
pub mod config;

mod errors;

pub use errors::{FacegateError, Result};
