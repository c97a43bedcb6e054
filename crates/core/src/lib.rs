//! Gem Catalog Core - Shared types library.
//!
//! This crate provides the domain types used across the workspace:
//! - `admin` - Catalog console (sync layer, category tree, HTTP API)
//! - `cli` - Command-line tools for seeding and inspecting the catalog
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no store
//! access, no HTTP clients. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for document IDs, prices, names and image lists

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
