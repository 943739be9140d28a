//! Adapters: implementations of the ports for concrete infrastructure.

pub mod http;
pub mod memory;
pub mod postgres;
