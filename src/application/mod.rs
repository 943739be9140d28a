//! Application layer: use-case orchestration over the domain.

mod webhook;

pub use webhook::{ProcessWebhookCommand, ProcessWebhookHandler};
