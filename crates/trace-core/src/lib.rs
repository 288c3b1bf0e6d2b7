//! Core types for the trace capability layer.
//!
//! This crate holds the storage-agnostic model: owner types and entity
//! descriptors, validity windows, generic records, status definitions,
//! query filters, validation rules and id generation.

pub mod filter;
pub mod idgen;
pub mod owner;
pub mod record;
pub mod status;
pub mod validation;
pub mod window;
