// Promptbook shared type definitions
// Each submodule defines types used across the crate.

pub mod auth;
pub mod errors;
pub mod library;
pub mod prompt;
pub mod settings;
pub mod sync;
