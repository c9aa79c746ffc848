//! Domain layer - Pure business abstractions
//!
//! Repository contracts, input types and the domain error type.
//! No Axum in here; models come from the SeaORM entity definitions.

pub mod errors;
pub mod repositories;

pub use errors::DomainError;
pub use repositories::*;
