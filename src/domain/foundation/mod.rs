//! Shared domain primitives.

mod ids;

pub use ids::AccountId;
