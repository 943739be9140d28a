//! Branchwise Billing - Entitlement Reconciliation Service
//!
//! This crate implements the billing backend for the Branchwise tutorial
//! platform: it receives Stripe webhook notifications and reconciles each
//! account's local entitlement record with the provider's authoritative
//! subscription state.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
